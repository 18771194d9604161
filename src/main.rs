//! CLI entry point for rust_cld.
//!
//! Provides a headless stand-in for a graphical logging toggle:
//! - `print`: build the object document and list what was built
//! - `run`: turn logging on for a fixed time (or until Ctrl+C), then off
//! - `interactive`: read `on`, `off`, `status` and `quit` lines from stdin
//!
//! # Usage
//!
//! ```bash
//! cld-log --objects config/cld.toml run --seconds 10
//! ```

use anyhow::{Context as _, Result};
use clap::{Parser, Subcommand};
use rust_cld::config::Settings;
use rust_cld::context::Context;
use rust_cld::toggle::LogTarget;
use rust_cld::tracing_init;
use std::io::BufRead;
use std::path::PathBuf;
use std::time::Duration;
use tracing::info;

#[derive(Parser)]
#[command(name = "cld-log")]
#[command(about = "Configuration-driven data logger", long_about = None)]
struct Cli {
    /// Settings file
    #[arg(long, default_value = rust_cld::config::DEFAULT_SETTINGS_PATH)]
    settings: PathBuf,

    /// Object document, overriding the settings file
    #[arg(long)]
    objects: Option<PathBuf>,

    /// Toggle only this log instead of all of them
    #[arg(long)]
    log: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Build the object document and print the registry
    Print,

    /// Log for a fixed duration, or until Ctrl+C
    Run {
        /// Seconds to log for; 0 waits for Ctrl+C
        #[arg(long, default_value = "0")]
        seconds: u64,
    },

    /// Toggle logging from stdin commands
    Interactive,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut settings = Settings::load_from(&cli.settings)
        .with_context(|| format!("loading settings from {}", cli.settings.display()))?;
    if let Some(objects) = cli.objects {
        settings.objects.path = objects;
    }
    settings.validate()?;
    tracing_init::init_from_settings(&settings)?;

    let context = Context::new(settings).context("building objects")?;
    let target = cli.log.map_or(LogTarget::All, LogTarget::Named);

    match cli.command {
        Commands::Print => {
            print!("{}", context.describe());
            Ok(())
        }
        Commands::Run { seconds } => run_for(&context, &target, seconds).await,
        Commands::Interactive => interactive(&context, &target),
    }
}

async fn run_for(context: &Context, target: &LogTarget, seconds: u64) -> Result<()> {
    context.start_logging(target)?;
    println!("📝 Logging started - Press Ctrl+C to stop");

    if seconds == 0 {
        tokio::signal::ctrl_c().await?;
    } else {
        tokio::select! {
            _ = tokio::time::sleep(Duration::from_secs(seconds)) => {}
            result = tokio::signal::ctrl_c() => result?,
        }
    }

    context.set_logging(false, target)?;
    let stats = context.controller().stats();
    println!(
        "✅ Logging stopped: {} samples, {} rows written, {} write errors",
        stats.samples, stats.writes, stats.write_errors
    );
    Ok(())
}

fn interactive(context: &Context, target: &LogTarget) -> Result<()> {
    println!("Commands: on, off, status, quit");

    for line in std::io::stdin().lock().lines() {
        let result = match line?.trim() {
            "on" => context.set_logging(true, target),
            "off" => context.set_logging(false, target),
            "status" => {
                println!("acquisition: {}", if context.is_logging() { "active" } else { "idle" });
                for (name, log) in context.registry().logs() {
                    println!("  {name}: {}", log.current_state());
                }
                Ok(())
            }
            "quit" | "exit" => break,
            "" => Ok(()),
            other => {
                println!("unknown command '{other}'");
                Ok(())
            }
        };
        if let Err(e) = result {
            eprintln!("❌ {e}");
        }
    }

    info!("Shutting down");
    context.shutdown()?;
    Ok(())
}
