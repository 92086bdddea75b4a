//! Entangler scenario runner.
//!
//! This binary drives the entangler core model from the command line. It performs:
//! 1. **Scenario run:** Load a JSON scenario, simulate it and print per-core results.
//! 2. **Demo:** Run the built-in two-core heralding experiment.
//! 3. **Register map:** List the register addresses of a protocol revision.

use std::process;

use clap::{Parser, Subcommand, ValueEnum};
use tracing_subscriber::EnvFilter;

use entangler_core::config::ProtocolRevision;
use entangler_core::core::registers::RegisterAddress;
use entangler_core::stats::RunStats;
use entangler_core::{Scenario, Simulator};

#[derive(Parser, Debug)]
#[command(
    name = "entangler",
    author,
    version,
    about = "Tick-accurate entangler controller simulator",
    long_about = "Simulate master/slave entangler cores from a JSON scenario.\n\nExamples:\n  entangler demo\n  entangler run scenarios/herald.json --json\n  entangler map --revision extended"
)]
struct Cli {
    /// Log filter used when RUST_LOG is unset (e.g. "info", "entangler_core=debug").
    #[arg(long, global = true, default_value = "warn")]
    log_level: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run a scenario file.
    Run {
        /// Scenario JSON path.
        path: String,

        /// Override the scenario's tick budget.
        #[arg(long)]
        max_ticks: Option<u64>,

        /// Print statistics as JSON instead of a table.
        #[arg(long)]
        json: bool,
    },

    /// Run the built-in two-core demo.
    Demo {
        /// Print statistics as JSON instead of a table.
        #[arg(long)]
        json: bool,
    },

    /// Print the register map of a protocol revision.
    Map {
        /// Protocol revision.
        #[arg(long, value_enum, default_value_t = Revision::Standard)]
        revision: Revision,
    },
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum Revision {
    Legacy,
    Standard,
    Extended,
}

impl From<Revision> for ProtocolRevision {
    fn from(r: Revision) -> Self {
        match r {
            Revision::Legacy => Self::Legacy,
            Revision::Standard => Self::Standard,
            Revision::Extended => Self::Extended,
        }
    }
}

fn main() {
    let cli = Cli::parse();
    init_tracing(&cli.log_level);

    match cli.command {
        Commands::Run {
            path,
            max_ticks,
            json,
        } => {
            tracing::debug!(%path, "loading scenario");
            let mut scenario = match Scenario::from_file(&path) {
                Ok(s) => s,
                Err(e) => {
                    eprintln!("Error: {e}");
                    process::exit(1);
                }
            };
            if let Some(max) = max_ticks {
                scenario.config.general.max_ticks = max;
            }
            simulate(&scenario, json);
        }
        Commands::Demo { json } => simulate(&Scenario::demo(), json),
        Commands::Map { revision } => print_map(revision.into()),
    }
}

fn init_tracing(level: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}

fn simulate(scenario: &Scenario, json: bool) {
    let mut sim = Simulator::new(scenario);
    let _ = sim.run();
    let stats = sim.into_stats();
    if json {
        print_json(&stats);
    } else {
        stats.print();
    }
}

fn print_json(stats: &RunStats) {
    match serde_json::to_string_pretty(stats) {
        Ok(s) => println!("{s}"),
        Err(e) => {
            eprintln!("Error: failed to serialize statistics: {e}");
            process::exit(1);
        }
    }
}

fn print_map(revision: ProtocolRevision) {
    let mut regs = vec![
        RegisterAddress::Config,
        RegisterAddress::Run,
        RegisterAddress::CycleLength,
        RegisterAddress::Heralds,
    ];
    regs.extend((0..revision.output_channels()).map(RegisterAddress::Output));
    regs.extend((0..revision.gate_channels()).map(RegisterAddress::Gate));
    regs.extend([
        RegisterAddress::Status,
        RegisterAddress::NCycles,
        RegisterAddress::TimeRemaining,
        RegisterAddress::NTriggers,
        RegisterAddress::RunResult,
        RegisterAddress::Fault,
    ]);
    regs.extend((0..5).map(RegisterAddress::Timestamp));

    println!("REGISTER MAP ({revision:?})");
    println!("----------------------------------------------------------");
    for reg in regs {
        let access = if reg.is_writable() { "W" } else { "R" };
        println!("  {:#04x}  {access}  {reg:?}", reg.address(revision));
    }
}
