use clap::{Parser, Subcommand};
use linden::{load_ast_json, parse_script, Engine, EngineConfig, Error, StdoutSink};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Enable debug logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run a script (LSL source or AST JSON), printing chat to stdout
    Run {
        script: PathBuf,

        /// Path to an engine config file
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Stop after this many seconds instead of waiting for Ctrl+C
        #[arg(short, long)]
        duration: Option<f64>,

        /// Read `channel message` lines from stdin as the owner's chat
        #[arg(short, long)]
        interactive: bool,

        /// Also print warnings to stderr
        #[arg(long)]
        diagnostics: bool,
    },
    /// Parse and validate a script
    Check { script: PathBuf },
    /// Print the AST of a script as JSON
    Ast { script: PathBuf },
}

fn read_script(path: &Path) -> Result<String, Error> {
    std::fs::read_to_string(path)
        .map_err(|e| Error::internal(format!("Failed to read {}: {}", path.display(), e)))
}

fn load(source: &str) -> Result<linden::ast::Script, Error> {
    if source.trim_start().starts_with('{') {
        Ok(load_ast_json(source)?)
    } else {
        Ok(parse_script(source)?)
    }
}

/// `"5 hello there"` → `(5, "hello there")`. A line without a leading
/// channel number is said on channel 0.
fn parse_chat_line(line: &str) -> (i32, String) {
    let line = line.trim();
    match line.split_once(char::is_whitespace) {
        Some((channel, rest)) => match channel.parse() {
            Ok(channel) => (channel, rest.trim_start().to_string()),
            Err(_) => (0, line.to_string()),
        },
        None => match line.parse() {
            Ok(channel) => (channel, String::new()),
            Err(_) => (0, line.to_string()),
        },
    }
}

async fn run(
    path: &Path,
    config: Option<&Path>,
    duration: Option<f64>,
    interactive: bool,
    diagnostics: bool,
) -> Result<(), Error> {
    let config = match config {
        Some(path) => EngineConfig::from_file(path)?,
        None => EngineConfig::default(),
    };
    debug!("config: {:?}", config);

    let source = read_script(path)?;
    let script = load(&source)?;
    let sink = Arc::new(StdoutSink {
        show_diagnostics: diagnostics,
    });
    let engine = Engine::new(script, config, sink);
    engine.start().await?;
    info!("running {}", path.display());

    let deadline = async {
        match duration {
            Some(secs) => tokio::time::sleep(Duration::from_secs_f64(secs.max(0.0))).await,
            None => std::future::pending().await,
        }
    };
    tokio::pin!(deadline);

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut stdin_open = interactive;
    loop {
        tokio::select! {
            _ = &mut deadline => break,
            _ = tokio::signal::ctrl_c() => {
                println!("Shutdown signal received");
                break;
            }
            line = lines.next_line(), if stdin_open => match line {
                Ok(Some(line)) if !line.trim().is_empty() => {
                    let (channel, message) = parse_chat_line(&line);
                    let owner = engine.env().object();
                    let heard = engine.inject_channel_message(
                        channel,
                        &owner.owner_name,
                        &owner.owner_key,
                        &message,
                    )?;
                    debug!(channel, heard, "stdin chat");
                }
                Ok(Some(_)) => {}
                Ok(None) | Err(_) => {
                    stdin_open = false;
                    if duration.is_none() {
                        engine.wait_for_idle(Duration::from_secs(5)).await;
                        break;
                    }
                }
            },
        }
        if engine.status() == linden::EngineStatus::Failed {
            break;
        }
    }

    engine.stop().await?;
    if engine.status() == linden::EngineStatus::Failed {
        return Err(Error::internal("script stopped on a fatal error"));
    }
    Ok(())
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let result = match &cli.command {
        Command::Run {
            script,
            config,
            duration,
            interactive,
            diagnostics,
        } => {
            run(
                script,
                config.as_deref(),
                *duration,
                *interactive,
                *diagnostics,
            )
            .await
        }
        Command::Check { script } => read_script(script).and_then(|s| load(&s)).map(|script| {
            println!(
                "ok: {} state(s), {} function(s), {} global(s)",
                script.states.len(),
                script.functions.len(),
                script.globals.len()
            );
        }),
        Command::Ast { script } => read_script(script).and_then(|s| load(&s)).and_then(|script| {
            let json = serde_json::to_string_pretty(&script)
                .map_err(|e| Error::internal(e.to_string()))?;
            println!("{}", json);
            Ok(())
        }),
    };

    if let Err(e) = result {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_chat_line() {
        assert_eq!(parse_chat_line("5 hello there"), (5, "hello there".to_string()));
        assert_eq!(parse_chat_line("hello"), (0, "hello".to_string()));
        assert_eq!(parse_chat_line("-3"), (-3, String::new()));
    }
}
