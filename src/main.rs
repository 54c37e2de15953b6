use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use colored::Colorize;
use tracing::info;
use tracing_subscriber::EnvFilter;

use portfolio_allocator::{
    charts,
    data::synthetic::SyntheticMarket,
    env::PortfolioEnv,
    history::EpisodeSummary,
    utils::uniform_weights,
    Config, FusionMode, PortfolioNetwork,
};

#[derive(Parser)]
#[command(name = "portfolio_allocator")]
#[command(about = "Cross-asset attention portfolio allocator and its trading simulator", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run episodes over a synthetic market
    Simulate {
        #[arg(short, long)]
        config: Option<PathBuf>,

        #[arg(short, long, default_value_t = 3)]
        episodes: usize,

        #[arg(short, long, value_enum, default_value_t = PolicyKind::Network)]
        policy: PolicyKind,

        #[arg(long, value_enum)]
        fusion: Option<FusionMode>,

        #[arg(long, default_value_t = 500)]
        steps: usize,

        #[arg(long, default_value_t = 7)]
        market_seed: u64,

        /// Write per-episode charts under this directory
        #[arg(long)]
        chart_dir: Option<String>,
    },
    /// Print the resolved configuration and network dimensions
    Inspect {
        #[arg(short, long)]
        config: Option<PathBuf>,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum PolicyKind {
    /// Randomly initialized attention network, inference mode
    Network,
    /// Equal weights every step
    Uniform,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    println!("{}", "Start".green());

    let cli = Cli::parse();
    match cli.command {
        Some(Commands::Simulate {
            config,
            episodes,
            policy,
            fusion,
            steps,
            market_seed,
            chart_dir,
        }) => {
            let mut config = load_config(config.as_deref())?;
            if let Some(fusion) = fusion {
                config.network.fusion = fusion;
            }
            let market = SyntheticMarket {
                steps,
                seed: market_seed,
                ..Default::default()
            };
            simulate(&config, &market, episodes, policy, chart_dir.as_deref())?;
        }
        Some(Commands::Inspect { config }) => {
            inspect(&load_config(config.as_deref())?)?;
        }
        None => {
            simulate(
                &Config::default(),
                &SyntheticMarket::default(),
                1,
                PolicyKind::Network,
                None,
            )?;
        }
    }

    println!("{}", "End".green());
    Ok(())
}

fn load_config(path: Option<&Path>) -> Result<Config> {
    let Some(path) = path else {
        return Ok(Config::default());
    };
    let json = fs::read_to_string(path)
        .with_context(|| format!("unable to read config file {}", path.display()))?;
    Config::from_json_str(&json).with_context(|| format!("invalid config file {}", path.display()))
}

fn simulate(
    config: &Config,
    market: &SyntheticMarket,
    episodes: usize,
    policy: PolicyKind,
    chart_dir: Option<&str>,
) -> Result<()> {
    config.validate()?;
    let data = Arc::new(market.generate(&config.market)?);
    let network = PortfolioNetwork::new(&config.market, &config.network)?;
    let mut env = PortfolioEnv::new(&config.market, config.env.clone(), data)?;

    info!(
        policy = ?policy,
        steps_per_episode = env.total_steps(),
        params = network.param_count(),
        "starting simulation"
    );

    for _ in 0..episodes {
        let (mut observation, _) = env.reset();
        loop {
            let action = match policy {
                PolicyKind::Network => network.allocate(observation.market.view())?,
                PolicyKind::Uniform => uniform_weights(config.market.num_assets),
            };
            let step = env.step(&action)?;
            observation = step.observation;
            if step.terminated || step.truncated {
                break;
            }
        }

        print_summary(env.episode, &env.summary());
        if let Some(dir) = chart_dir {
            charts::episode_charts(dir, env.episode, &env.episode_history, &env.equal_weight_benchmark())
                .map_err(|err| anyhow::anyhow!("unable to write charts: {err}"))?;
        }
    }

    Ok(())
}

fn print_summary(episode: usize, summary: &EpisodeSummary) {
    let percent = |value: f64| format!("{:.2}%", value * 100.0);

    let strategy_str = if summary.total_return >= 0.0 {
        percent(summary.total_return).green()
    } else {
        percent(summary.total_return).red()
    };
    let benchmark_str = if summary.benchmark_return >= 0.0 {
        percent(summary.benchmark_return).cyan()
    } else {
        percent(summary.benchmark_return).red()
    };
    let outperf_str = if summary.outperformance > 0.0 {
        format!("+{}", percent(summary.outperformance)).bright_green().bold()
    } else if summary.outperformance < 0.0 {
        percent(summary.outperformance).bright_red().bold()
    } else {
        percent(summary.outperformance).yellow()
    };

    println!(
        "{} {} - Value: {} ({}) | Equal weight: {} | Outperformance: {} | Costs: {} | Max drawdown: {} | Sharpe {:.2} | cumulative reward {:.3}",
        "Episode".bright_blue(),
        episode.to_string().bright_blue().bold(),
        format!("${:.2}", summary.final_value).bright_white().bold(),
        strategy_str,
        benchmark_str,
        outperf_str,
        format!("${:.2}", summary.total_costs).yellow(),
        percent(summary.max_drawdown),
        summary.sharpe,
        summary.cumulative_reward,
    );
}

fn inspect(config: &Config) -> Result<()> {
    let network = PortfolioNetwork::new(&config.market, &config.network)?;

    println!("{}", serde_json::to_string_pretty(config)?);
    println!(
        "{} {} | {} {} | {} {} | {} {}",
        "params".bright_blue(),
        network.param_count(),
        "latent dim".bright_blue(),
        network.latent_dim(),
        "key dim".bright_blue(),
        network.key_dim(),
        "context dim".bright_blue(),
        network.context_dim(),
    );
    Ok(())
}
