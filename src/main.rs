use std::alloc::System;
use std::collections::HashMap;
use std::fmt::{self, Display};
use std::fs::File;
use std::hash::Hash;
use std::io::{self, BufWriter};
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand, ValueEnum};
use fiya::local::{self, LocalRecorder};
use fiya::measure::{Clock, HeapUsage, ThreadCpuClock, TimeValue, WallClock};
use fiya::recorder::{ScopeError, StrRecorder, ValueRecorder};
use fiya::report::Report;
use fiya::trigger::{self, HeapTracking, ScopeGuard, Timing, TrackingAllocator, Triggered};
use tracing_subscriber::EnvFilter;

#[global_allocator]
static ALLOC: TrackingAllocator<System> = TrackingAllocator::new(System);

#[derive(Parser, Debug)]
#[command(
    name = "fiya",
    about = "Record a synthetic call workload and write collapsed stacks for flame-graph tools"
)]
struct Cli {
    /// Log lifecycle events at debug level (RUST_LOG takes precedence).
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Text labels, one RAII timer per function.
    Time {
        /// Collapsed-stack output file.
        #[arg(long, default_value = "fiya-time-measure.txt")]
        output: PathBuf,
        /// Clock charged to each scope.
        #[arg(long, value_enum, default_value_t = ClockKind::Wall)]
        clock: ClockKind,
        #[command(flatten)]
        run: RunArgs,
    },
    /// Enum labels, heap activity counted by the tracking allocator.
    Heap {
        /// Collapsed-stack output file (peak bytes per node).
        #[arg(long, default_value = "fiya-heap-measure.txt")]
        output: PathBuf,
        #[command(flatten)]
        run: RunArgs,
    },
    /// Function addresses as labels, recorded by enter/exit hooks and
    /// resolved to names on export.
    Addr {
        /// Collapsed-stack output file.
        #[arg(long, default_value = "fiya-cyg-time-measure.txt")]
        output: PathBuf,
        /// Clock charged to each scope.
        #[arg(long, value_enum, default_value_t = ClockKind::Wall)]
        clock: ClockKind,
        #[command(flatten)]
        run: RunArgs,
    },
}

#[derive(Args, Debug)]
struct RunArgs {
    /// Print the self/total report to stdout.
    #[arg(long)]
    report: bool,
    /// Workload scale: busy-loop millions of iterations (time) or
    /// allocations (heap) per unit.
    #[arg(long, default_value_t = 1)]
    work: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum ClockKind {
    /// Monotonic wall-clock time.
    Wall,
    /// CPU time of the recording thread.
    Thread,
}

#[derive(Debug, Clone, Copy)]
enum DemoClock {
    Wall(WallClock),
    Thread(ThreadCpuClock),
}

impl DemoClock {
    fn new(kind: ClockKind) -> Self {
        match kind {
            ClockKind::Wall => DemoClock::Wall(WallClock::new()),
            ClockKind::Thread => DemoClock::Thread(ThreadCpuClock),
        }
    }
}

impl Clock for DemoClock {
    fn now(&self) -> Duration {
        match self {
            DemoClock::Wall(clock) => clock.now(),
            DemoClock::Thread(clock) => clock.now(),
        }
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match cli.command {
        Commands::Time { output, clock, run } => run_time(&output, DemoClock::new(clock), &run)?,
        Commands::Heap { output, run } => run_heap(&output, &run)?,
        Commands::Addr { output, clock, run } => run_addr(&output, DemoClock::new(clock), &run)?,
    }

    Ok(())
}

fn init_tracing(verbose: bool) {
    let default = if verbose { "debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();
}

// Workload: func1 calls func2 and func3, func2 calls func3 and func4, func3
// calls func4. `Burn` units are spent in the calling function itself.

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum Func {
    Root,
    Func1,
    Func2,
    Func3,
    Func4,
}

#[derive(Debug, Clone, Copy)]
enum Step {
    Burn(u64),
    Call(Func),
}

impl Func {
    const CALLABLE: [Func; 4] = [Func::Func1, Func::Func2, Func::Func3, Func::Func4];

    fn name(self) -> &'static str {
        match self {
            Func::Root => "root",
            Func::Func1 => "func1",
            Func::Func2 => "func2",
            Func::Func3 => "func3",
            Func::Func4 => "func4",
        }
    }

    fn body(self) -> &'static [Step] {
        use Step::{Burn, Call};
        match self {
            Func::Root => &[Call(Func::Func1)],
            Func::Func1 => &[Burn(1), Call(Func::Func2), Burn(3), Call(Func::Func3), Burn(1)],
            Func::Func2 => &[Burn(1), Call(Func::Func3), Burn(2), Call(Func::Func4), Burn(5)],
            Func::Func3 => &[Burn(10), Call(Func::Func4), Burn(2)],
            Func::Func4 => &[Burn(1)],
        }
    }

    /// Hook-instrumented implementation, whose address is the label.
    fn hooked(self) -> fn(u64) {
        match self {
            Func::Root => hooked_root,
            Func::Func1 => hooked_func1,
            Func::Func2 => hooked_func2,
            Func::Func3 => hooked_func3,
            Func::Func4 => hooked_func4,
        }
    }
}

impl Display for Func {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

fn busy_wait(units: u64) {
    let mut state = 0x9E37_79B9_7F4A_7C15u64;
    for _ in 0..units.saturating_mul(1_000_000) {
        state ^= state << 13;
        state ^= state >> 7;
        state ^= state << 17;
    }
    std::hint::black_box(state);
}

fn allocate(sink: &mut Vec<Box<u64>>, count: u64) {
    for i in 0..count {
        sink.push(Box::new(i));
    }
}

// time: RAII timers with text labels

fn timed(
    rec: &mut StrRecorder<TimeValue>,
    func: Func,
    clock: DemoClock,
    work: u64,
) -> Result<(), ScopeError> {
    let mut scope = ScopeGuard::timed(rec, func.name(), clock)?;
    for step in func.body() {
        match *step {
            Step::Burn(units) => busy_wait(units * work),
            Step::Call(callee) => timed(&mut scope, callee, clock, work)?,
        }
    }
    Ok(())
}

fn run_time(output: &Path, clock: DemoClock, run: &RunArgs) -> Result<()> {
    let mut rec = StrRecorder::new(
        TimeValue::default(),
        Func::Root.name(),
        TimeValue::started(&clock),
    )?;
    for step in Func::Root.body() {
        if let Step::Call(callee) = *step {
            timed(&mut rec, callee, clock, run.work)?;
        }
    }
    rec.current_measure_mut().charge(clock.now());

    let out = create(output)?;
    rec.write_collapsed(out, |label| *label, TimeValue::as_micros)
        .with_context(|| format!("failed to write {}", output.display()))?;

    if run.report {
        print_report(&rec.report(), |label| *label, TimeValue::as_micros);
    }
    announce(output);
    Ok(())
}

// heap: RAII heap scopes with enum labels

type HeapRecorder = ValueRecorder<Func, HeapUsage>;

fn heap_scoped(
    rec: &mut HeapRecorder,
    func: Func,
    work: u64,
    sink: &mut Vec<Box<u64>>,
) -> Result<(), ScopeError> {
    let mut scope = ScopeGuard::heap(rec, &func)?;
    for step in func.body() {
        match *step {
            Step::Burn(units) => allocate(sink, units * work),
            Step::Call(callee) => heap_scoped(&mut scope, callee, work, sink)?,
        }
    }
    Ok(())
}

fn run_heap(output: &Path, run: &RunArgs) -> Result<()> {
    let mut rec = HeapRecorder::from_values(HeapUsage::default(), Func::Root, HeapUsage::default());
    let mut sink = Vec::new();
    {
        let _session = HeapTracking::start();
        for step in Func::Root.body() {
            if let Step::Call(callee) = *step {
                heap_scoped(&mut rec, callee, run.work, &mut sink)?;
            }
        }
        trigger::flush_pending(rec.current_measure_mut());
    }
    tracing::debug!(blocks = sink.len(), "heap workload finished");

    let out = create(output)?;
    rec.write_collapsed(out, |func| *func, |usage| usage.peak_allocations)
        .with_context(|| format!("failed to write {}", output.display()))?;

    if run.report {
        print_report(&rec.report(), |func| *func, |usage| u128::from(usage.total_allocations));
    }
    announce(output);
    Ok(())
}

// addr: enter/exit hooks with address labels and a thread-local recorder

type AddrScopes = Triggered<ValueRecorder<usize, TimeValue>, Timing<DemoClock>>;

fn addr_scopes(clock: DemoClock) -> AddrScopes {
    let rec = ValueRecorder::from_values(TimeValue::default(), 0, TimeValue::started(&clock));
    Triggered::new(rec, Timing::new(clock))
}

thread_local! {
    static ADDR_SCOPES: LocalRecorder<AddrScopes> =
        LocalRecorder::new(addr_scopes(DemoClock::Wall(WallClock::new())));
}

fn profile_enter(addr: usize) {
    if let Err(err) = local::enter(&ADDR_SCOPES, &addr) {
        tracing::warn!(%err, addr, "enter hook failed");
    }
}

fn profile_exit(addr: usize) {
    local::exit(&ADDR_SCOPES, &addr);
}

fn hooked(addr: usize, func: Func, work: u64) {
    profile_enter(addr);
    for step in func.body() {
        match *step {
            Step::Burn(units) => busy_wait(units * work),
            Step::Call(callee) => callee.hooked()(work),
        }
    }
    profile_exit(addr);
}

fn hooked_root(work: u64) {
    for step in Func::Root.body() {
        if let Step::Call(callee) = *step {
            callee.hooked()(work);
        }
    }
}

fn hooked_func1(work: u64) {
    hooked(hooked_func1 as fn(u64) as usize, Func::Func1, work);
}

fn hooked_func2(work: u64) {
    hooked(hooked_func2 as fn(u64) as usize, Func::Func2, work);
}

fn hooked_func3(work: u64) {
    hooked(hooked_func3 as fn(u64) as usize, Func::Func3, work);
}

fn hooked_func4(work: u64) {
    hooked(hooked_func4 as fn(u64) as usize, Func::Func4, work);
}

/// Address to name, standing in for a symbol lookup.
fn symbols() -> HashMap<usize, &'static str> {
    Func::CALLABLE
        .iter()
        .map(|func| (func.hooked() as usize, func.name()))
        .chain([(0, Func::Root.name())])
        .collect()
}

fn run_addr(output: &Path, clock: DemoClock, run: &RunArgs) -> Result<()> {
    ADDR_SCOPES
        .with(|slot| slot.replace(addr_scopes(clock)))
        .context("address recorder is in use")?;
    Func::Root.hooked()(run.work);
    let mut scopes = ADDR_SCOPES
        .with(|slot| slot.replace(addr_scopes(clock)))
        .context("address recorder is in use")?;
    scopes.settle();
    let rec = scopes.into_inner();

    let names = symbols();
    let name_of = |addr: &usize| names.get(addr).copied().unwrap_or("unknown");

    let out = create(output)?;
    rec.write_collapsed(out, name_of, TimeValue::as_micros)
        .with_context(|| format!("failed to write {}", output.display()))?;

    if run.report {
        print_report(&rec.report(), name_of, TimeValue::as_micros);
    }
    announce(output);
    Ok(())
}

// output

fn create(path: &Path) -> Result<BufWriter<File>> {
    let file = File::create(path).with_context(|| format!("failed to create {}", path.display()))?;
    Ok(BufWriter::new(file))
}

/// Rows by descending total.
fn print_report<K, M, DL>(
    report: &Report<K, M>,
    label: impl Fn(&K) -> DL,
    value: impl Fn(&M) -> u128,
) where
    K: Eq + Hash,
    DL: Display,
{
    println!();
    for (key, entry) in report.sorted_by(|a, b| value(&b.total).cmp(&value(&a.total))) {
        println!(
            "{}: self {}, total {}",
            label(key),
            value(&entry.self_measure),
            value(&entry.total)
        );
    }
}

fn announce(output: &Path) {
    println!("Output written to {}", output.display());
    println!("Open speedscope.app and drop the file there, or run flamegraph.pl on it.");
}
