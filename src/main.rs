use chrono::Local;
use clap::Parser;
use futures::StreamExt;
use log::error;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use runwatch::config::{ClientConfig, RunFile};
use runwatch::{ExecutionTask, Result, ResultEvent, WatchClient, WatchError, WatchEvent};

/// Submit a program to the Evaluation Service and follow it until its verdicts arrive.
#[derive(Parser, Debug)]
#[command(name = "runwatch", version)]
struct Cli {
    /// Run description in TOML (unit, index, code or sources)
    #[arg(long, conflicts_with_all = ["unit", "index", "sources"])]
    run_file: Option<PathBuf>,

    /// Unit the objective belongs to
    #[arg(required_unless_present = "run_file")]
    unit: Option<String>,

    /// Objective index inside the unit
    #[arg(required_unless_present = "run_file")]
    index: Option<u32>,

    /// Source files, one per editable code region
    sources: Vec<PathBuf>,

    /// Config file (defaults to the user config dir)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Override the API base URL
    #[arg(long)]
    api_base: Option<String>,
}

#[tokio::main]
async fn main() -> ExitCode {
    let dotenv = dotenvy::dotenv();
    env_logger::init_from_env(env_logger::Env::new().default_filter_or("info"));
    if let Err(e) = dotenv {
        log::debug!("No .env file loaded: {}", e);
    }

    let cli = Cli::parse();
    match run(cli).await {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::from(1),
        Err(WatchError::Prerun(reason)) => {
            error!("Run rejected: {}", reason);
            ExitCode::from(2)
        }
        Err(e) => {
            error!("{}", e);
            ExitCode::from(2)
        }
    }
}

async fn run(cli: Cli) -> Result<bool> {
    let mut config = match &cli.config {
        Some(path) => ClientConfig::from_file(path)?,
        None => ClientConfig::load()?,
    };
    if let Some(api_base) = cli.api_base.clone() {
        config.api_base = api_base;
    }

    let task = build_task(&cli)?;
    let client = WatchClient::new(config)?;
    let mut events = client.watch(&task).await?;

    let mut all_passed = false;
    while let Some(event) = events.next().await {
        match event? {
            WatchEvent::Progress(progress) => {
                println!(
                    "{} task {} queued at position {}",
                    Local::now().format("%H:%M:%S"),
                    progress.task_id,
                    progress.position
                );
            }
            WatchEvent::Result(result) => {
                print_result(&result);
                all_passed = result.all_passed();
            }
        }
    }
    Ok(all_passed)
}

fn build_task(cli: &Cli) -> Result<ExecutionTask> {
    if let Some(path) = &cli.run_file {
        let base_dir = path.parent().unwrap_or(Path::new("."));
        return RunFile::from_file(path)?.into_task(base_dir);
    }
    let (Some(unit), Some(index)) = (&cli.unit, cli.index) else {
        return Err(WatchError::Config("A unit and an objective index are required.".to_string()));
    };
    let code = cli
        .sources
        .iter()
        .map(std::fs::read_to_string)
        .collect::<std::io::Result<Vec<_>>>()?;
    Ok(ExecutionTask::new(unit.clone(), index, code))
}

fn print_result(result: &ResultEvent) {
    let task = result
        .task_id
        .map_or_else(|| "?".to_string(), |id| id.to_string());
    println!("{} task {} finished", Local::now().format("%H:%M:%S"), task);
    if let Some(report) = result.compile_error() {
        println!("Compiler \"{}\" exited with code {}.", report.compiler, report.exit_code);
        println!("{}", report.error);
        return;
    }
    for (point, verdict) in result.results.iter().enumerate() {
        println!("#{:<3} {}", point + 1, verdict);
    }
    if result.results.is_empty() {
        println!("No test point verdicts were reported.");
    }
    println!("Passed {}/{}", result.passed(), result.results.len());
}
