use clap::{Parser, Subcommand};
use futures::future::join_all;
use log::{error, info};
use shotlift::console::{ConsoleResolver, ConsoleSink};
use shotlift::{NotificationSink, Settings, UploadManager};
use shotlift_core::logging::init_logging;
use std::error::Error;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

#[derive(Parser)]
#[command(name = "shotlift", version, about = "Upload screenshots over FTP, SFTP or SCP")]
struct Cli {
    /// Settings file; defaults to <config dir>/shotlift/settings.json
    #[arg(long, global = true, env = "SHOTLIFT_CONFIG")]
    config: Option<PathBuf>,

    /// Log as JSON lines instead of human-readable text
    #[arg(long, global = true)]
    json_logs: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Upload image files and print their links
    Upload {
        #[arg(required = true)]
        files: Vec<PathBuf>,
    },
    /// Write a settings file with default values
    InitConfig {
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.json_logs);

    match run(cli).await {
        Ok(code) => code,
        Err(e) => {
            error!("{}", e);
            eprintln!("error: {}", e);
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<ExitCode, Box<dyn Error>> {
    let path = match cli.config.or_else(Settings::default_path) {
        Some(p) => p,
        None => return Err("no configuration directory; pass --config".into()),
    };

    match cli.command {
        Command::InitConfig { force } => {
            if path.exists() && !force {
                return Err(format!("{} already exists; use --force to overwrite", path.display()).into());
            }
            Settings::default().save(&path)?;
            println!("{}", path.display());
            Ok(ExitCode::SUCCESS)
        }
        Command::Upload { files } => upload(&path, files).await,
    }
}

async fn upload(config: &std::path::Path, files: Vec<PathBuf>) -> Result<ExitCode, Box<dyn Error>> {
    let settings = Settings::load(config)?;
    settings.validate()?;
    info!("Loaded settings from {}", config.display());

    let sink = Arc::new(ConsoleSink::new());
    let notifications: Arc<dyn NotificationSink> = sink.clone();
    let manager =
        Arc::new(UploadManager::new(settings, notifications).with_resolver(Arc::new(ConsoleResolver::stdin())));

    let tickets = manager.upload_files(&files);
    let skipped = files.len() - tickets.len();
    if skipped > 0 {
        eprintln!("Skipped {} file(s) that are not images", skipped);
    }

    let results = join_all(tickets.into_iter().map(|t| t.handle)).await;
    for joined in results {
        if let Err(e) = joined {
            error!("Upload task panicked: {}", e);
        }
    }
    manager.shutdown().await;

    Ok(if sink.failed() == 0 && sink.succeeded() > 0 {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}
