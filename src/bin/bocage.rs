//! Scenario harness for the bocage runtime (feature-gated).
//!
//! Runs the classic behaviour-oriented-concurrency example programs on
//! either the parallel pool or the systematic runtime, with an optional
//! JSON trace dump of systematic schedules.

use bocage::{
    schedule, when, Channel, Cown, Runtime, RuntimeConfig, SystematicConfig, SystematicRuntime,
};
use clap::{Args, Parser, Subcommand};
use std::io::{self, Write as _};
use std::sync::{Arc, Mutex};

#[derive(Parser, Debug)]
#[command(name = "bocage", version, about = "Behaviour-oriented concurrency scenarios")]
struct Cli {
    #[command(flatten)]
    common: CommonArgs,

    #[command(subcommand)]
    scenario: Scenario,
}

#[derive(Args, Debug)]
struct CommonArgs {
    /// Worker threads for the parallel runtime
    #[arg(short = 't', long = "threads", default_value_t = 4)]
    threads: usize,

    /// Use the deterministic systematic runtime instead of worker threads
    #[arg(long = "systematic")]
    systematic: bool,

    /// Seed for the systematic schedule
    #[arg(short = 's', long = "seed", default_value_t = 42)]
    seed: u64,

    /// Dump the systematic trace as JSON to stdout
    #[arg(long = "dump-trace")]
    dump_trace: bool,
}

#[derive(Subcommand, Debug)]
enum Scenario {
    /// Atomic transfers between bank accounts
    Bank,
    /// Dining philosophers over fork cowns
    Dining {
        /// Number of philosophers (and forks)
        #[arg(long, default_value_t = 5)]
        philosophers: usize,
        /// Meals per philosopher
        #[arg(long, default_value_t = 10)]
        hunger: usize,
    },
    /// Fork/join fibonacci over result cowns
    Fib {
        /// Which fibonacci number to compute
        #[arg(short = 'n', long, default_value_t = 15)]
        n: u64,
    },
    /// Many accounts copying from one shared account
    Readonly {
        /// Number of accounts
        #[arg(long, default_value_t = 64)]
        accounts: usize,
        /// Acquire the shared account in read mode
        #[arg(long)]
        ro: bool,
    },
    /// Two writers and two readers over a channel cown
    Channel,
    /// Happens-before barrier ordering
    Barrier,
}

fn main() -> io::Result<()> {
    let cli = Cli::parse();
    let out = Arc::new(Mutex::new(Vec::<String>::new()));

    let entry: Box<dyn FnOnce() + Send> = {
        let out = Arc::clone(&out);
        match cli.scenario {
            Scenario::Bank => Box::new(move || bank(&out)),
            Scenario::Dining {
                philosophers,
                hunger,
            } => Box::new(move || dining(&out, philosophers, hunger)),
            Scenario::Fib { n } => Box::new(move || fib(&out, n)),
            Scenario::Readonly { accounts, ro } => Box::new(move || readonly(&out, accounts, ro)),
            Scenario::Channel => Box::new(move || channel(&out)),
            Scenario::Barrier => Box::new(move || barrier(&out)),
        }
    };

    if cli.common.systematic {
        let mut runtime = SystematicRuntime::new(SystematicConfig::new(cli.common.seed));
        let report = runtime.run(entry);
        eprintln!(
            "systematic: seed={} steps={} quiescent={}",
            cli.common.seed, report.steps, report.quiescent
        );
        if cli.common.dump_trace {
            let stdout = io::stdout();
            let mut lock = stdout.lock();
            serde_json::to_writer_pretty(&mut lock, &report.trace.to_vec())?;
            writeln!(lock)?;
        }
    } else {
        let runtime = Runtime::new(RuntimeConfig::new().workers(cli.common.threads))
            .expect("invalid worker count");
        runtime.run(entry);
    }

    for line in out.lock().expect("output lock").iter() {
        println!("{line}");
    }
    Ok(())
}

type Output = Arc<Mutex<Vec<String>>>;

fn emit(out: &Output, line: String) {
    out.lock().expect("output lock").push(line);
}

struct Account {
    balance: i64,
    frozen: bool,
}

impl Account {
    fn new(balance: i64) -> Self {
        Self {
            balance,
            frozen: false,
        }
    }
}

/// Atomic transfer: the observer never sees a half-applied transfer.
fn bank(out: &Output) {
    let src = Cown::new(Account::new(100));
    let dst = Cown::new(Account::new(0));

    {
        let (src, dst) = (src.clone(), dst.clone());
        schedule(move || {
            when((src, dst)).run(|(mut src, mut dst)| {
                if src.balance >= 50 && !src.frozen && !dst.frozen {
                    src.balance -= 50;
                    dst.balance += 50;
                }
            });
        });
    }

    let report = Arc::clone(out);
    schedule(move || {
        when((src, dst)).run(move |(src, dst)| {
            emit(
                &report,
                format!("balances: src={} dst={}", src.balance, dst.balance),
            );
        });
    });
}

struct Fork {
    uses: usize,
}

struct Philosopher {
    left: Cown<Fork>,
    right: Cown<Fork>,
    hunger: usize,
}

impl Philosopher {
    fn eat(mut self) {
        if self.hunger == 0 {
            return;
        }
        let (left, right) = (self.left.clone(), self.right.clone());
        when((left, right)).run(move |(mut left, mut right)| {
            left.uses += 1;
            right.uses += 1;
            self.hunger -= 1;
            self.eat();
        });
    }
}

fn dining(out: &Output, philosophers: usize, hunger: usize) {
    assert!(philosophers >= 2, "need at least two philosophers");
    let forks: Vec<Cown<Fork>> = (0..philosophers)
        .map(|_| Cown::new(Fork { uses: 0 }))
        .collect();

    for seat in 0..philosophers {
        Philosopher {
            left: forks[seat].clone(),
            right: forks[(seat + 1) % philosophers].clone(),
            hunger,
        }
        .eat();
    }

    let report = Arc::clone(out);
    let table = forks.clone();
    // Checking fork usage must wait for every chain to drain; chains respawn
    // themselves, so queue the check behind a drained table instead: a
    // behaviour over all forks runs only once no philosopher is mid-meal,
    // and re-queues itself until the counts settle.
    fn check(table: Vec<Cown<Fork>>, report: Output, expected: usize) {
        let again = table.clone();
        when(table).run(move |forks| {
            if forks.iter().all(|fork| fork.uses == expected) {
                for (index, fork) in forks.iter().enumerate() {
                    emit(&report, format!("fork {index}: {} uses", fork.uses));
                }
            } else {
                drop(forks);
                check(again, report, expected);
            }
        });
    }
    check(table, report, hunger * 2);
}

fn fib_sequential(n: u64) -> u64 {
    if n <= 1 {
        n
    } else {
        fib_sequential(n - 1) + fib_sequential(n - 2)
    }
}

fn fib_parallel(n: u64) -> Cown<u64> {
    if n <= 4 {
        let result = Cown::new(0_u64);
        when(result.clone()).run(move |mut value| *value = fib_sequential(n));
        result
    } else {
        let f1 = fib_parallel(n - 1);
        let f2 = fib_parallel(n - 2);
        when((f1.clone(), f2)).run(|(mut f1, f2)| *f1 += *f2);
        f1
    }
}

fn fib(out: &Output, n: u64) {
    let report = Arc::clone(out);
    when(fib_parallel(n)).run(move |value| {
        emit(&report, format!("fib({n}) = {}", *value));
    });
}

fn readonly(out: &Output, accounts: usize, ro: bool) {
    let common = Cown::new(Account::new(100));
    let cells: Vec<Cown<Account>> = (0..accounts).map(|_| Cown::new(Account::new(0))).collect();

    when(common.clone()).run(|mut account| account.balance -= 10);

    for cell in cells {
        if ro {
            when((cell, common.read())).run(|(mut mine, shared)| {
                mine.balance = shared.balance;
            });
        } else {
            when((cell, common.clone())).run(|(mut mine, shared)| {
                mine.balance = shared.balance;
            });
        }
    }

    when(common.clone()).run(|mut account| account.balance += 10);

    let report = Arc::clone(out);
    when(common.read()).run(move |account| {
        emit(&report, format!("final balance: {}", account.balance));
    });
}

fn channel(out: &Output) {
    let chan = Channel::new();

    for value in [2_u32, 42] {
        let chan = chan.clone();
        schedule(move || chan.write(value));
    }
    for reader in 0..2 {
        let chan = chan.clone();
        let report = Arc::clone(out);
        schedule(move || {
            chan.read(move |value| emit(&report, format!("reader {reader} got {value}")));
        });
    }
}

struct Participant {
    count: i64,
}

fn barrier(out: &Output) {
    let p1 = Cown::new(Participant { count: 10 });
    let p2 = Cown::new(Participant { count: 20 });

    when(p1.clone()).run(|mut p| p.count -= 1);
    when(p2.clone()).run(|mut p| p.count -= 1);

    let first = Arc::clone(out);
    when((p1.clone(), p2.clone())).run(move |(p1, p2)| {
        emit(&first, format!("after step 1: {} {}", p1.count, p2.count));
    });

    when(p1.clone()).run(|mut p| p.count += 1);
    when(p2.clone()).run(|mut p| p.count += 1);

    let second = Arc::clone(out);
    when((p1, p2)).run(move |(p1, p2)| {
        emit(&second, format!("after step 2: {} {}", p1.count, p2.count));
    });
}
