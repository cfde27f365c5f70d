use anyhow::{bail, Context};
use clap::{value_parser, Arg, ArgAction, ArgMatches, Command};
use dxflow_sim::{
    init_tracing, replay_json_lines, run_simulation, BackendConfig, SimulationConfig,
};
use dxflow_status::{ControllerView, StatusConfig};
use std::path::PathBuf;
use std::time::Duration;

fn cli() -> Command {
    Command::new("dxflow-sim")
        .version(dxflow_sim::VERSION)
        .about("Diagnosis workflow status simulator")
        .arg(
            Arg::new("log-json")
                .long("log-json")
                .global(true)
                .action(ArgAction::SetTrue)
                .help("Emit logs as JSON on stderr"),
        )
        .arg(
            Arg::new("config")
                .long("config")
                .global(true)
                .value_parser(value_parser!(PathBuf))
                .help("TOML status configuration"),
        )
        .subcommand_required(true)
        .subcommand(
            Command::new("simulate")
                .about("Follow a simulated diagnosis job")
                .arg(
                    Arg::new("seed")
                        .long("seed")
                        .default_value("42")
                        .value_parser(value_parser!(u64))
                        .help("Random seed for reproducibility"),
                )
                .arg(
                    Arg::new("failure-rate")
                        .long("failure-rate")
                        .default_value("0.0")
                        .value_parser(value_parser!(f64))
                        .help("Probability that a fetch fails transiently"),
                )
                .arg(
                    Arg::new("latency-ms")
                        .long("latency-ms")
                        .default_value("20")
                        .value_parser(value_parser!(u64))
                        .help("Simulated backend latency per fetch"),
                )
                .arg(
                    Arg::new("restart-after")
                        .long("restart-after")
                        .value_parser(value_parser!(usize))
                        .help("Press \"start over\" after this many projections"),
                )
                .arg(
                    Arg::new("json")
                        .long("json")
                        .action(ArgAction::SetTrue)
                        .help("Print projections as JSON lines"),
                ),
        )
        .subcommand(
            Command::new("decode")
                .about("Replay recorded push messages (one JSON object per line)")
                .arg(
                    Arg::new("file")
                        .required(true)
                        .value_parser(value_parser!(PathBuf)),
                )
                .arg(
                    Arg::new("json")
                        .long("json")
                        .action(ArgAction::SetTrue)
                        .help("Print projections as JSON lines"),
                ),
        )
        .subcommand(Command::new("config").about("Print the effective configuration"))
}

fn load_config(matches: &ArgMatches) -> anyhow::Result<StatusConfig> {
    match matches.get_one::<PathBuf>("config") {
        Some(path) => StatusConfig::load(path)
            .with_context(|| format!("loading {}", path.display())),
        None => Ok(StatusConfig::default()),
    }
}

fn print_view(view: &ControllerView, json: bool) {
    if json {
        match serde_json::to_string(view) {
            Ok(line) => println!("{line}"),
            Err(err) => tracing::error!(error = %err, "failed to encode projection"),
        }
    } else {
        println!("{view}");
    }
}

async fn simulate(args: &ArgMatches, status: StatusConfig) -> anyhow::Result<bool> {
    let seed = args.get_one::<u64>("seed").copied().unwrap_or(42);
    let failure_rate = args.get_one::<f64>("failure-rate").copied().unwrap_or(0.0);
    let latency_ms = args.get_one::<u64>("latency-ms").copied().unwrap_or(20);
    let json = args.get_flag("json");

    if !(0.0..=1.0).contains(&failure_rate) {
        bail!("--failure-rate must be within [0, 1], got {failure_rate}");
    }

    let config = SimulationConfig {
        backend: BackendConfig {
            seed,
            failure_rate,
            latency: Duration::from_millis(latency_ms),
            confidence_threshold: status.confidence_threshold,
        },
        status,
        restart_after: args.get_one::<usize>("restart-after").copied(),
        ..SimulationConfig::default()
    };

    tracing::info!(seed, failure_rate, latency_ms, "starting simulation");
    let report = run_simulation(config, |view| print_view(view, json)).await;

    if !json {
        println!();
        print!("{}", report.generate_text());
    }
    Ok(report.passed())
}

fn decode(args: &ArgMatches) -> anyhow::Result<bool> {
    let Some(path) = args.get_one::<PathBuf>("file") else {
        bail!("missing input file");
    };
    let json = args.get_flag("json");

    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("reading {}", path.display()))?;
    let views = replay_json_lines(&raw).context("replaying messages")?;
    for view in &views {
        print_view(view, json);
    }
    Ok(views.last().map_or(true, |v| !v.is_failed()))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let matches = cli().get_matches();
    init_tracing(matches.get_flag("log-json"));
    let status = load_config(&matches)?;

    let passed = match matches.subcommand() {
        Some(("simulate", args)) => simulate(args, status).await?,
        Some(("decode", args)) => decode(args)?,
        Some(("config", _)) => {
            print!("{}", status.to_toml_string()?);
            true
        }
        _ => unreachable!("subcommand is required"),
    };

    std::process::exit(i32::from(!passed));
}
