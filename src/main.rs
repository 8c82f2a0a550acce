use std::collections::HashMap;
use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Instant;

use clap::{Parser, Subcommand};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use seriea_stats::api::parse_query_string;
use seriea_stats::{
    dashboard_charts, Config, DashboardApi, DashboardQuery, Endpoint, ParquetStore, Result,
    WinsFilter,
};

/// Number of benchmark runs
const NUM_RUNS: usize = 10;

#[derive(Parser, Debug)]
#[command(name = "seriea-stats", version, about = "League statistics over Parquet tables")]
struct Cli {
    /// Path to the configuration file
    #[arg(short, long, env = "SERIEA_CONFIG")]
    config: Option<PathBuf>,

    /// Directory holding one <table>.parquet file per entity
    #[arg(short, long, env = "SERIEA_DATA_DIR")]
    data_dir: Option<PathBuf>,

    /// Default minimum points for the goal difference query
    #[arg(long, env = "SERIEA_DEFAULT_MIN_POINTS")]
    default_min_points: Option<i64>,

    /// Default row limit for the top players query
    #[arg(long, env = "SERIEA_DEFAULT_LIMIT")]
    default_limit: Option<usize>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run one API endpoint and print its JSON body
    Query {
        /// Endpoint path, e.g. players/top
        endpoint: String,

        /// Query parameter as key=value (repeatable)
        #[arg(short, long = "param", value_parser = parse_key_val)]
        params: Vec<(String, String)>,

        /// Query string, e.g. "limit=5&team=inter"
        #[arg(short, long)]
        query: Option<String>,
    },
    /// Print the six dashboard chart specs as JSON
    Charts,
    /// Print record counts per table
    Report,
    /// Time every catalogue query
    Bench,
    /// List the available endpoints
    Endpoints,
}

fn parse_key_val(s: &str) -> std::result::Result<(String, String), String> {
    let (key, value) = s.split_once('=').ok_or_else(|| format!("expected key=value, got {s}"))?;
    Ok((key.to_string(), value.to_string()))
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{e}");
            ExitCode::FAILURE
        }
    }
}

fn load_config(cli: &Cli) -> Result<Config> {
    let mut config = Config::load(cli.config.as_deref())?;
    if let Some(data_dir) = &cli.data_dir {
        config.data_dir = data_dir.clone();
    }
    if let Some(min_points) = cli.default_min_points {
        config.default_min_points = min_points;
    }
    if let Some(limit) = cli.default_limit {
        config.default_limit = limit;
    }
    Ok(config)
}

fn open_api(config: Config) -> Result<DashboardApi<ParquetStore>> {
    let store = ParquetStore::open(&config.data_dir)?;
    Ok(DashboardApi::new(store, config))
}

fn run(cli: Cli) -> Result<()> {
    let config = load_config(&cli)?;

    match cli.command {
        Command::Query { endpoint, params, query } => {
            let api = open_api(config)?;
            let mut raw: HashMap<String, String> =
                query.as_deref().map(parse_query_string).unwrap_or_default();
            raw.extend(params);
            let body = api.handle(&endpoint, &raw)?;
            println!("{}", serde_json::to_string_pretty(&body)?);
        }
        Command::Charts => {
            let api = open_api(config)?;
            let charts = dashboard_charts(api.store(), &api.config().charts)?;
            let documents = charts.iter().map(|c| c.to_json()).collect::<Result<Vec<_>>>()?;
            println!("{}", serde_json::to_string_pretty(&documents)?);
        }
        Command::Report => {
            let api = open_api(config)?;
            let body = api.handle(Endpoint::SimpleStats.path(), &HashMap::new())?;
            println!("{}", serde_json::to_string_pretty(&body)?);
        }
        Command::Bench => bench(&open_api(config)?)?,
        Command::Endpoints => {
            for endpoint in Endpoint::ALL {
                println!("{endpoint}");
            }
        }
    }

    Ok(())
}

fn bench(api: &DashboardApi<ParquetStore>) -> Result<()> {
    let config = api.config();
    let queries = [
        DashboardQuery::TeamsBestGoalDifference { min_points: config.default_min_points },
        DashboardQuery::AvgPlayerAgeByTeam,
        DashboardQuery::TeamWinsByYear(WinsFilter::default()),
        DashboardQuery::TopPlayersByContributions { limit: config.default_limit },
        DashboardQuery::MatchesByMonth,
        DashboardQuery::CoachesByCountry,
    ];

    info!(data_dir = %config.data_dir.display(), runs = NUM_RUNS, "benchmarking query catalogue");
    println!(
        "{:<30} {:>8} {:>10} {:>10} {:>10} {:>10}",
        "query", "rows", "mean ms", "stddev", "min", "max"
    );
    println!("{:-<83}", "");

    for query in &queries {
        // Warmup run (not counted)
        let rows = query.execute(api.store())?.num_rows();

        let mut times = Vec::with_capacity(NUM_RUNS);
        for _ in 0..NUM_RUNS {
            let start = Instant::now();
            query.execute(api.store())?;
            times.push(start.elapsed().as_secs_f64() * 1000.0);
        }

        let mean = times.iter().sum::<f64>() / times.len() as f64;
        let variance = times.iter().map(|t| (t - mean).powi(2)).sum::<f64>() / times.len() as f64;
        let stddev = variance.sqrt();
        let min = times.iter().cloned().fold(f64::INFINITY, f64::min);
        let max = times.iter().cloned().fold(f64::NEG_INFINITY, f64::max);

        println!(
            "{:<30} {:>8} {:>10.3} {:>10.3} {:>10.3} {:>10.3}",
            query.name(),
            rows,
            mean,
            stddev,
            min,
            max
        );
    }

    Ok(())
}
