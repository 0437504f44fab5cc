use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;

use sketchbook_client::GameClient;
use sketchbook_core::config::{Config, ExportConfig, LoggingConfig};
use sketchbook_core::reveal::{GalleryPrompt, gallery_actions, gallery_prompt};
use sketchbook_core::{GameResult, NavigationDriver, RevealEvent, RevealSequencer, Route};
use sketchbook_export::ExportPipeline;

#[derive(Parser)]
#[command(
    name = "sketchbook",
    about = "Terminal client for the Sketchbook drawing and guessing game",
    version
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Config file path
    #[arg(short, long, global = true)]
    config: Option<String>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Join a room and play from the terminal
    Play {
        /// Room id to join
        #[arg(long)]
        room: String,

        /// Display name to announce after joining
        #[arg(long)]
        name: Option<String>,

        /// Full WebSocket URL, overriding the configured template
        #[arg(long)]
        url: Option<String>,
    },

    /// Bundle the images of a saved result list into a zip
    Export {
        /// JSON file holding an array of results
        #[arg(long)]
        results: PathBuf,

        /// Output directory (default: configured export dir)
        #[arg(long)]
        out: Option<PathBuf>,
    },

    /// Configuration management
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Show current configuration
    Show,
    /// Check the configuration for problems
    Validate,
}

fn init_logging(verbose: bool, logging: Option<&LoggingConfig>) {
    let level = if verbose {
        "debug".to_string()
    } else {
        logging
            .and_then(|l| l.level.clone())
            .unwrap_or_else(|| "info".to_string())
    };
    let mut directives = vec![level];
    if let Some(logging) = logging {
        directives.extend(logging.filters.iter().cloned());
    }
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(directives.join(",")));

    let json = logging.is_some_and(|l| l.format == "json");
    if json {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Load config
    let config_path = cli
        .config
        .map(PathBuf::from)
        .unwrap_or_else(Config::default_path);

    let config = Config::load(&config_path)?;
    init_logging(cli.verbose, config.logging.as_ref());

    match cli.command {
        Commands::Play { room, name, url } => {
            let server = config.server();
            let url = url.unwrap_or_else(|| server.room_url(&room));
            let name = name.or(server.player_name);
            play(&config, &url, name).await?;
        }
        Commands::Export { results, out } => {
            let raw = tokio::fs::read_to_string(&results).await?;
            let results: Vec<GameResult> = serde_json::from_str(&raw)?;

            let mut config = config;
            if let Some(out) = out {
                let export = config.export.get_or_insert_with(ExportConfig::default);
                export.dir = Some(out.display().to_string());
            }
            let pipeline = ExportPipeline::from_config(&config)?;
            let report = pipeline.export(results).await?;
            println!(
                "Saved {} of {} images to {}",
                report.archived,
                report.requested,
                report.path.display()
            );
            if !report.failed.is_empty() {
                println!("Skipped: {:?}", report.failed);
            }
        }
        Commands::Config { action } => match action {
            ConfigAction::Show => {
                let json = serde_json::to_string_pretty(&config)?;
                println!("{json}");
            }
            ConfigAction::Validate => {
                let (warnings, errors) = config.validate();
                for w in &warnings {
                    println!("warning: {w}");
                }
                for e in &errors {
                    println!("error: {e}");
                }
                if !errors.is_empty() {
                    anyhow::bail!("{} config error(s) in {}", errors.len(), config_path.display());
                }
                println!("Config OK: {}", config_path.display());
            }
        },
    }

    Ok(())
}

const HELP: &str = "commands: start | next | title <text> | topic <text> | name <text> | export | quit";

async fn play(config: &Config, url: &str, name: Option<String>) -> anyhow::Result<()> {
    tracing::info!(%url, "Joining room");
    let guard = GameClient::connect(url).await?;
    let store = guard.store();

    if let Some(name) = name {
        if store.wait_joined().await {
            store.change_name(name);
        } else {
            tracing::warn!("Join failed before a player id arrived, keeping default name");
        }
    }

    let (route_tx, mut routes) = mpsc::unbounded_channel();
    let (reveal_tx, mut reveals) = mpsc::unbounded_channel();
    let navigation = NavigationDriver::spawn(&store, route_tx);
    let reveal = RevealSequencer::spawn(&store, config.reveal_interval(), reveal_tx);
    let pipeline = Arc::new(ExportPipeline::from_config(config)?);

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    println!("{HELP}");

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => break,
            Some(route) = routes.recv() => {
                println!("-> {}", route.path());
                if route == Route::Results {
                    let session = store.snapshot();
                    match gallery_prompt(&session) {
                        GalleryPrompt::ShowResultsButton => println!("Type `next` to show results"),
                        GalleryPrompt::WaitingForHost => println!("Waiting for the host to show results"),
                        GalleryPrompt::Gallery => {}
                    }
                }
            }
            Some(event) = reveals.recv() => match event {
                RevealEvent::Revealed { ordinal, result } => {
                    println!("[{ordinal}] {}: \"{}\" {}", result.player_name, result.title, result.img);
                    if let Some(actions) = gallery_actions(&store.snapshot(), ordinal) {
                        let mut offered = Vec::new();
                        if actions.download {
                            offered.push("export");
                        }
                        if actions.request_next {
                            offered.push("next");
                        }
                        if actions.new_game {
                            offered.push("start");
                        }
                        if !offered.is_empty() {
                            println!("    available: {}", offered.join(", "));
                        }
                    }
                }
                RevealEvent::Reset => println!("(gallery cleared)"),
            },
            line = lines.next_line() => {
                let Some(line) = line? else { break };
                let (cmd, arg) = line.trim().split_once(' ').unwrap_or((line.trim(), ""));
                let arg = arg.trim();
                let sent = match cmd {
                    "" => continue,
                    "quit" | "exit" => break,
                    "start" => store.start_game(),
                    "next" => store.request_next_result(),
                    "name" => store.change_name(arg),
                    "topic" => store.submit_subject(arg),
                    "title" => match store.snapshot().my_id {
                        Some(me) => store.submit_title(arg, me),
                        None => false,
                    },
                    "export" => {
                        let pipeline = pipeline.clone();
                        let session = store.snapshot();
                        tokio::spawn(async move {
                            match pipeline.export_session(&session).await {
                                Ok(report) => println!(
                                    "Saved {} images to {}",
                                    report.archived,
                                    report.path.display()
                                ),
                                Err(e) => tracing::error!(error = %e, "Export failed"),
                            }
                        });
                        true
                    }
                    _ => {
                        println!("{HELP}");
                        continue;
                    }
                };
                if !sent {
                    println!("`{cmd}` is not available right now");
                }
            }
        }
    }

    guard.close().await;
    navigation.abort();
    reveal.abort();
    tracing::info!("Left room");
    Ok(())
}
