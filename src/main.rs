use std::fs::File;
use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use cortex_chat::core::config::{CliOverrides, load_config, resolve};
use cortex_chat::tui;
use simplelog::{ConfigBuilder, LevelFilter, WriteLogger};

#[derive(Parser)]
#[command(name = "cortex-chat", about = "Terminal chat client for Cortex agents")]
struct Args {
    /// Config file (defaults to ~/.cortex-chat/config.toml)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Database holding the agent
    #[arg(long)]
    database: Option<String>,

    /// Schema holding the agent
    #[arg(long)]
    schema: Option<String>,

    /// Agent name
    #[arg(short, long)]
    agent: Option<String>,

    /// Origin application tag used to scope threads
    #[arg(long)]
    application: Option<String>,

    /// Where to write the debug log
    #[arg(long, default_value = "cortex-chat.log")]
    log_file: PathBuf,
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();
    dotenv::dotenv().ok();

    // File logger only: the TUI owns stdout
    let log_config = ConfigBuilder::new().set_time_format_rfc3339().build();
    if let Ok(log_file) = File::create(&args.log_file) {
        let _ = WriteLogger::init(LevelFilter::Debug, log_config, log_file);
    }

    let cli = CliOverrides {
        database: args.database,
        schema: args.schema,
        agent: args.agent,
        application: args.application,
    };

    let config = match load_config(args.config.as_deref()).and_then(|file| resolve(&file, &cli)) {
        Ok(config) => config,
        Err(e) => {
            log::error!("Configuration error: {}", e);
            eprintln!("cortex-chat: {e}");
            return ExitCode::FAILURE;
        }
    };

    log::info!(
        "Cortex chat starting: agent {}.{}.{}, application {}",
        config.database,
        config.schema,
        config.agent_name,
        config.application
    );

    match tui::run(config) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            log::error!("TUI exited with error: {}", e);
            eprintln!("cortex-chat: {e}");
            ExitCode::FAILURE
        }
    }
}
