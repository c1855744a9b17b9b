use clap::{Parser, ValueEnum};
use colored::*;
use log::error;
use repolens::{logging, Analyzer, Config, Granularity, Result};
use std::process;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum GranularityArg {
    Repository,
    Directory,
    File,
}

impl From<GranularityArg> for Granularity {
    fn from(arg: GranularityArg) -> Self {
        match arg {
            GranularityArg::Repository => Granularity::Repository,
            GranularityArg::Directory => Granularity::Directory,
            GranularityArg::File => Granularity::File,
        }
    }
}

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// GitHub repository URL to analyze
    url: String,

    /// Analysis granularity
    #[arg(short, long, value_enum, default_value_t = GranularityArg::Repository)]
    granularity: GranularityArg,

    /// Directory or file path, required for the narrower granularities
    #[arg(short, long)]
    path: Option<String>,

    /// Invalidate cached results for the repository instead of analyzing
    #[arg(long)]
    invalidate: bool,

    /// Log level (error, warn, info, debug, trace)
    #[arg(long, default_value = "info")]
    log_level: String,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    if let Err(e) = logging::init(&cli.log_level) {
        eprintln!("{} {}", "Failed to initialize logging:".red(), e);
    }

    if let Err(e) = run(cli).await {
        error!("{}", e);
        eprintln!("{} {}", "Error:".red().bold(), e);
        process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<()> {
    let config = Config::load()?;
    config.validate()?;
    let analyzer = Analyzer::from_config(&config)?;

    if cli.invalidate {
        let granularity = cli.path.is_some().then(|| cli.granularity.into());
        analyzer
            .invalidate(&cli.url, granularity, cli.path.as_deref())
            .await?;
        println!("{} {}", "Invalidated cache for".green(), cli.url);
        return Ok(());
    }

    let output = match cli.granularity {
        GranularityArg::Repository => {
            let analysis = analyzer.analyze_repository(&cli.url).await?;
            serde_json::to_string_pretty(&analysis)?
        }
        GranularityArg::Directory => {
            let path = require_path(cli.path.as_deref())?;
            let analysis = analyzer.analyze_directory(&cli.url, path).await?;
            serde_json::to_string_pretty(&analysis)?
        }
        GranularityArg::File => {
            let path = require_path(cli.path.as_deref())?;
            let analysis = analyzer.analyze_file(&cli.url, path).await?;
            serde_json::to_string_pretty(&analysis)?
        }
    };

    println!("{}", output);
    Ok(())
}

fn require_path(path: Option<&str>) -> Result<&str> {
    path.ok_or_else(|| {
        repolens::AnalysisError::new("--path is required for directory and file granularity")
    })
}
