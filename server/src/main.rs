use std::path::PathBuf;
use std::process::ExitCode;

use bevy::app::AppExit;
use clap::Parser;
use siege_server::init;
use siege_server::scenario::Scenario;

#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Args {
    /// Scenario file (RON). The built-in valley scenario is used if omitted.
    #[arg(short, long)]
    scenario: Option<PathBuf>,

    /// Run this many fixed steps as fast as possible, then exit.
    #[arg(short, long)]
    ticks: Option<u64>,

    /// Log an ASCII depth map every few seconds.
    #[arg(short, long)]
    debug_overlay: bool,

    /// Override the terrain hill seed.
    #[arg(long)]
    seed: Option<u64>,

    /// Write the default scenario to this path and exit.
    #[arg(long)]
    dump_scenario: Option<PathBuf>,
}

fn main() -> ExitCode {
    let args = Args::parse();

    if let Some(path) = args.dump_scenario {
        let text = match Scenario::default().to_ron() {
            Ok(text) => text,
            Err(err) => {
                eprintln!("Error: {err}");
                return ExitCode::FAILURE;
            }
        };
        if let Err(err) = std::fs::write(&path, text) {
            eprintln!("Error: could not write {}: {err}", path.display());
            return ExitCode::FAILURE;
        }
        println!("Wrote default scenario to {}", path.display());
        return ExitCode::SUCCESS;
    }

    let mut scenario = match &args.scenario {
        Some(path) => match Scenario::load(path) {
            Ok(scenario) => scenario,
            Err(err) => {
                eprintln!("Error: {err}");
                return ExitCode::FAILURE;
            }
        },
        None => Scenario::default(),
    };

    if args.ticks == Some(0) {
        eprintln!("Error: --ticks must be at least 1.");
        return ExitCode::FAILURE;
    }

    if args.debug_overlay {
        scenario.fluid.debug_overlay = true;
    }
    if let Some(seed) = args.seed {
        if let Some(hills) = scenario.terrain.hills.as_mut() {
            hills.seed = seed;
        }
    }

    match init::run(scenario, args.ticks) {
        AppExit::Success => ExitCode::SUCCESS,
        AppExit::Error(code) => ExitCode::from(code.get()),
    }
}
