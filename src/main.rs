use clap::{Parser, Subcommand};
use tracing::{error, info, level_filters::LevelFilter};
use tracing_subscriber::EnvFilter;

use crate::{
    algorithm::Strategy,
    closure::ClosureInstance,
    validation::RandomConfig,
};

pub mod algorithm;
pub mod closure;
pub mod dinic;
pub mod mkm;
pub mod network;
pub mod preflow_push;
pub mod validation;

#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

#[derive(Parser, Debug)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Solve a project selection instance given as JSON.
    Closure {
        /// Path to the instance file.
        #[arg(short, long)]
        path: std::path::PathBuf,
        /// Strategies to run; all of them must agree (every strategy if not specified).
        #[arg(short, long, value_enum)]
        strategy: Vec<Strategy>,
        /// Also enumerate every selection and compare.
        #[arg(short, long)]
        brute_force: bool,
        /// Print the full report as JSON.
        #[arg(short, long)]
        json: bool,
    },
    /// Cross-validate all strategies on random networks.
    Random {
        /// Number of vertices.
        #[arg(short = 'n', long, default_value_t = 64)]
        vertices: usize,
        /// Number of edges.
        #[arg(short = 'm', long, default_value_t = 512)]
        edges: usize,
        /// Capacities are drawn from 0 up to this value.
        #[arg(short = 'c', long, default_value_t = 100)]
        max_capacity: i64,
        /// Probability that an edge is directed.
        #[arg(short, long, default_value_t = 1.0)]
        directed_ratio: f64,
        /// Number of random networks.
        #[arg(short, long, default_value_t = 256)]
        trials: usize,
        /// Seed of the first network.
        #[arg(short, long, default_value_t = 0)]
        seed: u64,
        /// Number of threads to use (use all available threads if not specified).
        #[arg(long)]
        threads: Option<usize>,
    },
}

fn solve_closure(
    path: std::path::PathBuf,
    strategy: Vec<Strategy>,
    brute_force: bool,
    json: bool,
) -> anyhow::Result<()> {
    let instance = ClosureInstance::load(path)?;
    info!("Instance loaded: {} items", instance.size());
    let strategies = if strategy.is_empty() {
        Strategy::ALL.to_vec()
    } else {
        strategy
    };
    let report = instance.solve(&strategies)?;
    if brute_force {
        let expected = instance.brute_force()?;
        anyhow::ensure!(
            expected == report.best_profit,
            "brute force found {expected} but the flow gives {}",
            report.best_profit
        );
        info!("Brute force agrees");
    }
    if json {
        println!("{}", simd_json::to_string(&report)?);
    } else {
        println!("{}", report.best_profit);
    }
    Ok(())
}

fn run(cli: Cli) -> anyhow::Result<()> {
    match cli.command {
        Command::Closure {
            path,
            strategy,
            brute_force,
            json,
        } => solve_closure(path, strategy, brute_force, json),
        Command::Random {
            vertices,
            edges,
            max_capacity,
            directed_ratio,
            trials,
            seed,
            threads,
        } => {
            let thd_cnt = threads.unwrap_or_else(|| {
                std::thread::available_parallelism()
                    .map(|x| x.get())
                    .unwrap_or(1)
            });
            rayon::ThreadPoolBuilder::new()
                .num_threads(thd_cnt)
                .build_global()?;
            let config = RandomConfig {
                vertices,
                edges,
                max_capacity,
                directed_ratio,
                seed,
            };
            let outcomes = validation::cross_validate(&config, trials)?;
            let total: i64 = outcomes.iter().map(|x| x.flow).sum();
            println!(
                "{} networks, all strategies agree, mean flow {:.2}",
                outcomes.len(),
                total as f64 / outcomes.len().max(1) as f64
            );
            Ok(())
        }
    }
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::builder()
                .with_default_directive(LevelFilter::INFO.into())
                .with_env_var("MAXFLOW_LOG_LEVEL")
                .from_env_lossy(),
        )
        .init();
    let cli = Cli::parse();
    if let Err(err) = run(cli) {
        error!("{:#}", err);
        std::process::exit(1);
    }
}
