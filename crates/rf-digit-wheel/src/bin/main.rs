//! digit-wheel — run, simulate and inspect digit wheel machines
//!
//! Usage:
//!   digit-wheel run --sessions 3           - Play sessions in real time
//!   digit-wheel simulate --sessions 10000  - Logical-clock distribution check
//!   digit-wheel config                     - Print the effective config (YAML)

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use tokio::sync::broadcast::error::RecvError;

use rf_digit_wheel::{
    DriverConfig, DriverEvent, FadeCue, LuckySchedule, MachineConfig, NoopResolver,
    RestResolver, ResultResolver, RosterResolver, SpinCoordinator, SpinDriver, TimingProfile,
};
use rf_stage::Stage;

#[derive(Parser)]
#[command(name = "digit-wheel", about = "Digit wheel spin orchestration")]
struct Cli {
    #[command(flatten)]
    machine: MachineArgs,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Args)]
struct MachineArgs {
    /// Machine config file (.json, .yaml, .yml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Timing profile: normal, turbo, studio
    #[arg(long, global = true)]
    profile: Option<String>,

    /// RNG seed for reproducible sessions
    #[arg(long, global = true)]
    seed: Option<u64>,

    /// First spin (1-based) that takes a lucky number
    #[arg(long, global = true, default_value_t = 1)]
    lucky_from: u64,

    /// Lucky numbers, comma separated, forced one per spin
    #[arg(long, global = true, value_delimiter = ',')]
    lucky: Vec<u64>,
}

#[derive(Args)]
struct LookupArgs {
    /// Roster file (.json, .yaml, .yml)
    #[arg(long)]
    roster: Option<PathBuf>,

    /// REST endpoint base URL
    #[arg(long)]
    rest_url: Option<String>,

    /// REST table
    #[arg(long, default_value = "ESTUDIANTES")]
    rest_table: String,

    /// REST key column
    #[arg(long, default_value = "NUMERO")]
    rest_column: String,

    /// REST api key
    #[arg(long)]
    api_key: Option<String>,

    /// Lookup timeout in milliseconds
    #[arg(long, default_value_t = 5000)]
    lookup_timeout_ms: u64,
}

#[derive(Subcommand)]
enum Commands {
    /// Play sessions in real time
    Run {
        /// Number of sessions
        #[arg(short, long, default_value_t = 1)]
        sessions: u32,

        #[command(flatten)]
        lookup: LookupArgs,
    },
    /// Run sessions on the logical clock and report digit statistics
    Simulate {
        /// Number of sessions
        #[arg(short, long, default_value_t = 10_000)]
        sessions: u32,
    },
    /// Print the effective machine config as YAML
    Config,
}

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::init();
    let cli = Cli::parse();

    match cli.command {
        Commands::Run { sessions, lookup } => run(&cli.machine, &lookup, sessions).await,
        Commands::Simulate { sessions } => simulate(&cli.machine, sessions),
        Commands::Config => {
            print!("{}", machine_config(&cli.machine)?.to_yaml()?);
            Ok(())
        }
    }
}

fn machine_config(args: &MachineArgs) -> Result<MachineConfig> {
    let mut config = match &args.config {
        Some(path) => MachineConfig::load(path)
            .with_context(|| format!("loading {}", path.display()))?,
        None => MachineConfig::four_digit(),
    };
    if let Some(name) = &args.profile {
        let Some(profile) = TimingProfile::from_name(name) else {
            bail!("unknown timing profile '{}'", name);
        };
        config = config.with_profile(profile);
    }
    Ok(config)
}

fn coordinator(args: &MachineArgs) -> Result<SpinCoordinator> {
    let config = machine_config(args)?;
    let mut coordinator = match args.seed {
        Some(seed) => SpinCoordinator::with_seed(config, seed)?,
        None => SpinCoordinator::new(config)?,
    };
    if !args.lucky.is_empty() {
        coordinator = coordinator.with_override(Box::new(LuckySchedule::new(
            args.lucky_from,
            args.lucky.iter().copied(),
        )));
    }
    Ok(coordinator)
}

fn resolver(args: &LookupArgs) -> Result<Arc<dyn ResultResolver>> {
    if let Some(path) = &args.roster {
        return Ok(Arc::new(RosterResolver::load(path)?));
    }
    if let Some(url) = &args.rest_url {
        let mut rest = RestResolver::new(url.as_str(), args.rest_table.as_str())
            .with_column(args.rest_column.as_str());
        if let Some(key) = &args.api_key {
            rest = rest.with_api_key(key.as_str());
        }
        return Ok(Arc::new(rest));
    }
    Ok(Arc::new(NoopResolver))
}

async fn run(machine: &MachineArgs, lookup: &LookupArgs, sessions: u32) -> Result<()> {
    let coordinator = coordinator(machine)?;
    let fade_ms = coordinator.config().timing.audio_fade_ms;
    let coordinator = coordinator.with_audio(Box::new(FadeCue::new(fade_ms)));

    let config = DriverConfig {
        lookup_timeout: Duration::from_millis(lookup.lookup_timeout_ms),
        ..DriverConfig::default()
    };
    let mut driver = SpinDriver::start(coordinator, resolver(lookup)?, config);
    let mut events = driver.subscribe();

    for _ in 0..sessions {
        let Some(generation) = driver.spin() else {
            bail!("a session is already running");
        };
        println!("spin #{}", generation);

        loop {
            match events.recv().await {
                Ok(DriverEvent::Stage(event)) if event.is_from(generation) => match event.stage {
                    Stage::WheelReveal { wheel_index, digit } => {
                        println!("  wheel {} -> {}", wheel_index, digit)
                    }
                    Stage::WheelForced { wheel_index, digit } => {
                        println!("  wheel {} -> {} (watchdog)", wheel_index, digit)
                    }
                    Stage::SpinComplete { final_number, .. } => {
                        println!("  number {}", final_number)
                    }
                    _ => {}
                },
                Ok(DriverEvent::Resolved(resolution)) if resolution.generation == generation => {
                    match resolution.record {
                        Some(record) => println!("  {} ({})", record.name, record.program),
                        None => println!("  no match"),
                    }
                    break;
                }
                Ok(_) => {}
                Err(RecvError::Lagged(skipped)) => {
                    log::warn!("[Driver] subscriber lagged, {} events skipped", skipped);
                }
                Err(RecvError::Closed) => bail!("driver stopped"),
            }
        }
    }

    driver.shutdown().await;
    Ok(())
}

fn simulate(machine: &MachineArgs, sessions: u32) -> Result<()> {
    let mut coordinator = coordinator(machine)?;
    coordinator.set_stage_recording(false);

    for _ in 0..sessions {
        coordinator.spin();
        coordinator.run_until_complete();
        while coordinator.take_completed().is_some() {}
    }

    let stats = coordinator.stats();
    println!("machine:   {}", coordinator.config().name);
    println!("sessions:  {}", stats.sessions);
    println!("watchdog:  {:.2}%", stats.watchdog_rate() * 100.0);
    if let (Some(min), Some(max)) = (stats.min_final, stats.max_final) {
        println!("range:     {}..={}", min, max);
    }
    for wheel in 0..coordinator.config().wheel_count() {
        let (Some(chi), Some(df)) = (stats.chi_square(wheel), stats.degrees_of_freedom(wheel))
        else {
            continue;
        };
        let verdict = match stats.looks_uniform(wheel) {
            Some(true) => "uniform",
            Some(false) => "SKEWED",
            None => "-",
        };
        println!("wheel {:>2}:  chi2 = {:>8.3}  df = {}  {}", wheel, chi, df, verdict);
    }
    Ok(())
}
