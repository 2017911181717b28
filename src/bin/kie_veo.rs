//! kie-veo: generate the stone-bench intro clip end to end.
//!
//! Usage:
//!   kie-veo [run] [--config <file>] [--output <path>] [--task-id <id>]
//!   kie-veo status <task-id> [--config <file>]

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{anyhow, Context};
use kie_veo::prompt::build_prompt;
use kie_veo::telemetry::TracingEventSink;
use kie_veo::{download, AppConfig, CancelHandle, JobClient, JobClientBuilder};
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Debug, Default)]
struct RunArgs {
    config: Option<PathBuf>,
    output: Option<PathBuf>,
    task_id: Option<String>,
}

#[derive(Debug)]
enum Command {
    Run(RunArgs),
    Status {
        task_id: String,
        config: Option<PathBuf>,
    },
    Help,
    Version,
}

#[tokio::main]
async fn main() {
    let args: Vec<String> = std::env::args().skip(1).collect();
    let command = match parse_args(&args) {
        Ok(command) => command,
        Err(e) => {
            eprintln!("Error: {e}");
            eprintln!();
            print_usage();
            std::process::exit(2);
        }
    };

    match command {
        Command::Help => print_usage(),
        Command::Version => println!("kie-veo {}", env!("CARGO_PKG_VERSION")),
        Command::Run(args) => {
            init_tracing();
            if let Err(e) = cmd_run(args).await {
                exit_with(e);
            }
        }
        Command::Status { task_id, config } => {
            init_tracing();
            if let Err(e) = cmd_status(&task_id, config).await {
                exit_with(e);
            }
        }
    }
}

fn print_usage() {
    println!(
        r#"kie-veo: KieAI VEO image-to-video runner

USAGE:
    kie-veo [run] [OPTIONS]
    kie-veo status <task-id> [--config <file>]

COMMANDS:
    run                     Submit (or resume), poll and download the clip (default)
    status <task-id>        Print one status snapshot as JSON
    version                 Show version information
    help                    Show this help message

OPTIONS:
    --config <file>         YAML config file; KIEAI_* variables override it
    --output <path>         Destination (default <results_dir>/<topic>-intro.mp4)
    --task-id <id>          Resume polling an existing task instead of submitting

ENVIRONMENT:
    KIEAI_API_KEY           API key (required)
    KIEAI_API_FLAVOR        enveloped | flat
    RUST_LOG                Log filter (default info)"#
    );
}

fn parse_args(args: &[String]) -> anyhow::Result<Command> {
    let (name, rest) = match args.split_first() {
        Some((first, rest)) if !first.starts_with("--") => (first.as_str(), rest),
        _ => ("run", args),
    };

    match name {
        "help" | "-h" => Ok(Command::Help),
        "version" | "-V" => Ok(Command::Version),
        "run" => {
            let mut run = RunArgs::default();
            let mut iter = rest.iter();
            while let Some(flag) = iter.next() {
                let mut value = || {
                    iter.next()
                        .cloned()
                        .ok_or_else(|| anyhow!("{flag} needs a value"))
                };
                match flag.as_str() {
                    "--config" => run.config = Some(PathBuf::from(value()?)),
                    "--output" => run.output = Some(PathBuf::from(value()?)),
                    "--task-id" => run.task_id = Some(value()?),
                    "--help" => return Ok(Command::Help),
                    "--version" => return Ok(Command::Version),
                    other => return Err(anyhow!("unknown option: {other}")),
                }
            }
            Ok(Command::Run(run))
        }
        "status" => {
            let mut task_id = None;
            let mut config = None;
            let mut iter = rest.iter();
            while let Some(arg) = iter.next() {
                if arg == "--config" {
                    let path = iter.next().ok_or_else(|| anyhow!("--config needs a value"))?;
                    config = Some(PathBuf::from(path));
                } else if task_id.is_none() && !arg.starts_with("--") {
                    task_id = Some(arg.clone());
                } else {
                    return Err(anyhow!("unexpected argument: {arg}"));
                }
            }
            let task_id = task_id.ok_or_else(|| anyhow!("status needs a task id"))?;
            Ok(Command::Status { task_id, config })
        }
        other => Err(anyhow!("unknown command: {other}")),
    }
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

fn load_config(path: Option<PathBuf>) -> anyhow::Result<AppConfig> {
    match path {
        Some(path) => AppConfig::from_yaml_file(&path)
            .with_context(|| format!("loading configuration from {}", path.display())),
        None => AppConfig::from_env().context("loading configuration from environment"),
    }
}

fn build_client(config: &AppConfig) -> anyhow::Result<JobClient> {
    JobClientBuilder::from_config(config)
        .event_sink(Arc::new(TracingEventSink::new()))
        .build()
        .context("creating job client")
}

async fn cmd_run(args: RunArgs) -> anyhow::Result<()> {
    let config = load_config(args.config)?;
    let client = build_client(&config)?;

    let cancel = CancelHandle::new();
    let on_ctrl_c = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("interrupt received, cancelling");
            on_ctrl_c.cancel();
        }
    });

    let task_id = match args.task_id {
        Some(task_id) => {
            info!(task_id = task_id.as_str(), "resuming existing task");
            task_id
        }
        None => {
            let prompt = build_prompt(&config.prompt);
            info!(topic = config.topic.as_str(), "prompt composed");
            let request = config
                .generation_request(prompt)
                .context("building generation request")?;
            client.submit(&request).await.context("submitting")?.task_id
        }
    };

    let (status, report) = client
        .poll_until_complete_with_report(&task_id, &client.poll_options(), &cancel)
        .await
        .with_context(|| format!("waiting for task {task_id}"))?;
    info!(
        task_id = task_id.as_str(),
        observations = report.observations,
        transitions = report.transitions,
        elapsed_secs = report.elapsed.as_secs(),
        "task completed"
    );

    let asset_url = status
        .asset_url()
        .ok_or_else(|| anyhow!("task {task_id} completed without an asset URL"))?;
    let target = args.output.unwrap_or_else(|| config.output_path());
    let saved = download::download_asset(asset_url, &target)
        .await
        .with_context(|| format!("downloading {asset_url}"))?;

    info!(path = %saved.path.display(), bytes = saved.bytes, "workflow completed");
    println!("{}", saved.path.display());
    Ok(())
}

async fn cmd_status(task_id: &str, config: Option<PathBuf>) -> anyhow::Result<()> {
    let config = load_config(config)?;
    let client = build_client(&config)?;
    let status = client
        .get_status(task_id)
        .await
        .with_context(|| format!("fetching status of task {task_id}"))?;
    println!("{}", serde_json::to_string_pretty(&status)?);
    Ok(())
}

fn exit_with(err: anyhow::Error) -> ! {
    let typed = err.chain().find_map(|e| e.downcast_ref::<kie_veo::Error>());
    let code = typed.map(kie_veo::Error::exit_code).unwrap_or(1);
    match typed.and_then(kie_veo::Error::task_id) {
        Some(task_id) => error!(
            task_id,
            kind = typed.map(kie_veo::Error::kind),
            "workflow failed: {err:#}"
        ),
        None => error!("workflow failed: {err:#}"),
    }
    std::process::exit(code);
}
