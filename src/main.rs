//! edgefull - Pointer-driven fullscreen and edge navigation
//!
//! Keeps a browser window in fullscreen, reveals the chrome when the pointer
//! reaches the top of the page, and navigates history from the side edges.

mod channel;
mod config;
mod controller;
mod detector;
mod network;
mod protocol;
mod sim;

use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use channel::{Channel, LoopbackTransport, Transport};
use config::Config;
use controller::PROTECTED_PREFIXES;
use detector::EdgeDetector;
use network::{ControllerServer, ServerEvent, TcpTransport};
use sim::{LogSurface, SimWorld, Trace};

/// History the simulated tab starts with
const DEFAULT_HISTORY: &[&str] = &["https://example.com/", "https://example.com/article"];

/// edgefull - Pointer-driven fullscreen and edge navigation
#[derive(Parser)]
#[command(name = "edgefull")]
#[command(version = "0.1.0")]
#[command(about = "Fullscreen browsing driven by pointer position", long_about = None)]
struct Cli {
    /// Path to configuration file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Serve a controller over TCP, backed by a virtual browser
    Controller {
        /// Port to listen on
        #[arg(short, long)]
        port: Option<u16>,

        /// History of the virtual tab, oldest first
        #[arg(long = "url")]
        history: Vec<String>,
    },

    /// Replay a pointer trace through a detector
    Simulate {
        /// JSON trace file
        trace: PathBuf,

        /// Talk to a running controller instead of an in-process one
        #[arg(long)]
        connect: bool,

        /// Controller port when connecting
        #[arg(short, long)]
        port: Option<u16>,

        /// History of the virtual tab, oldest first
        #[arg(long = "url")]
        history: Vec<String>,
    },

    /// Check whether an address is a protected context
    CheckUrl {
        url: String,
    },

    /// Show current configuration
    Config {
        /// Generate sample configuration
        #[arg(long)]
        generate: bool,

        /// Write the generated (or current) config to this path
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Show build and protocol information
    Info,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Load configuration
    let config = if let Some(config_path) = &cli.config {
        Config::load(config_path)?
    } else {
        Config::load_default().unwrap_or_default()
    };

    // Initialize logging
    let filter = if cli.verbose || config.general.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };

    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(filter)
        .init();

    match cli.command {
        Commands::Controller { port, history } => {
            run_controller(config, port, history).await?;
        }
        Commands::Simulate {
            trace,
            connect,
            port,
            history,
        } => {
            run_simulation(config, trace, connect, port, history).await?;
        }
        Commands::CheckUrl { url } => {
            let policy = config.policy.protected_contexts();
            if policy.is_protected(&url) {
                println!("{}: protected", url);
            } else {
                println!("{}: allowed", url);
            }
        }
        Commands::Config { generate, output } => {
            if generate {
                let sample = config::generate_sample_config()?;
                if let Some(path) = output {
                    std::fs::write(&path, &sample)?;
                    println!("Configuration written to: {}", path.display());
                } else {
                    println!("{}", sample);
                }
            } else if let Some(path) = output {
                config.save(&path)?;
                println!("Configuration written to: {}", path.display());
            } else {
                println!("{}", toml::to_string_pretty(&config)?);
            }
        }
        Commands::Info => {
            print_info(&config);
        }
    }

    Ok(())
}

fn history_or_default(history: &[String]) -> Vec<&str> {
    if history.is_empty() {
        DEFAULT_HISTORY.to_vec()
    } else {
        history.iter().map(String::as_str).collect()
    }
}

/// Run the controller server
async fn run_controller(config: Config, port: Option<u16>, history: Vec<String>) -> anyhow::Result<()> {
    let world = SimWorld::new(&history_or_default(&history))?;
    let controller = world.controller(config.policy.protected_contexts());

    let mut net_config = config.controller.network_config();
    if let Some(port) = port {
        net_config.port = port;
    }

    let mut server = ControllerServer::new(net_config, controller);
    let mut event_rx = server
        .take_event_receiver()
        .ok_or_else(|| anyhow::anyhow!("event receiver already taken"))?;
    let local_addr = server.start().await?;

    println!("\n========================================");
    println!("  edgefull Controller Running");
    println!("========================================");
    println!("  Address: {}", local_addr);
    println!("  Window: {} / Tab: {}", world.window_id, world.tab_id);
    println!("========================================");
    println!("\nPress Ctrl+C to stop.\n");

    loop {
        tokio::select! {
            Some(event) = event_rx.recv() => {
                match event {
                    ServerEvent::Started { bind_addr } => {
                        tracing::info!("Accepting detectors on {}", bind_addr);
                    }
                    ServerEvent::ClientConnected { addr, client_id } => {
                        println!("+ Detector connected: {} ({})", client_id, addr);
                    }
                    ServerEvent::ClientDisconnected { addr, reason } => {
                        println!("- Detector disconnected: {} ({})", addr, reason);
                        if let Some(state) = world.host.window_state(world.window_id) {
                            println!("  Window state: {}", state);
                        }
                    }
                    ServerEvent::Error { message } => {
                        tracing::error!("Controller error: {}", message);
                    }
                    _ => {}
                }
            }
            _ = tokio::signal::ctrl_c() => {
                println!("\nShutting down...");
                break;
            }
        }
    }

    server.stop().await?;
    tracing::info!("Controller stopped");

    Ok(())
}

/// Replay a trace through a detector attached to a simulated page
async fn run_simulation(
    config: Config,
    trace_path: PathBuf,
    connect: bool,
    port: Option<u16>,
    history: Vec<String>,
) -> anyhow::Result<()> {
    let trace = Trace::load(&trace_path)?;
    let world = SimWorld::new(&history_or_default(&history))?;
    let policy = config.policy.protected_contexts();

    // Held for the whole replay; the loopback transport only keeps a weak reference
    let local_controller = world.controller(policy.clone());

    let transport: Arc<dyn Transport> = if connect {
        let mut net_config = config.controller.network_config();
        if let Some(port) = port {
            net_config.port = port;
        }
        tracing::info!("Using controller at {}", net_config.address());
        Arc::new(TcpTransport::new(net_config).with_client_id(config.client_id()))
    } else {
        Arc::new(LoopbackTransport::new(&local_controller))
    };
    let channel = Channel::new(transport, config.channel.retry_policy());
    if connect {
        tracing::warn!(
            "Edge availability follows the local tab history; navigation performed by the remote controller is not reflected"
        );
    }

    let page = world.page();
    let mut detector = EdgeDetector::attach(
        config.detector.detector_config(),
        config.detector.initial_settings(),
        channel,
        Box::new(page.clone()),
        Box::new(LogSurface),
        &policy,
    )?;
    detector.start()?;
    let (handle, task) = detector::spawn(detector);

    tracing::info!(
        "Replaying {} steps ({:?} of waiting)",
        trace.steps.len(),
        trace.duration()
    );
    sim::replay(&trace, &handle, &page).await?;
    drop(handle);
    task.await?;

    if connect {
        println!("Replay finished; window state is held by the controller");
    } else {
        let state = world
            .host
            .window_state(world.window_id)
            .map(|s| s.to_string())
            .unwrap_or_else(|| "unknown".to_string());
        let url = world.host.current_url(world.tab_id).unwrap_or_default();
        println!("Replay finished: window {}, tab at {}", state, url);
    }

    Ok(())
}

/// Print build and protocol information
fn print_info(config: &Config) {
    println!("edgefull Information");
    println!("====================\n");

    println!("Protocol Version: {}", protocol::PROTOCOL_VERSION);
    println!("Default Port: {}", protocol::DEFAULT_PORT);
    println!("Controller: {}", config.controller.network_config().address());

    println!("\nProtected prefixes:");
    for prefix in PROTECTED_PREFIXES {
        println!("  - {}", prefix);
    }
    for prefix in &config.policy.extra_protected_prefixes {
        println!("  - {} (configured)", prefix);
    }
}
