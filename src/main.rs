//! Quago simulator CLI
//!
//! Drives the SDK with synthetic engine input for local testing.

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use rand::Rng;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;
use quago_sdk::{
    id::generate_id, key_action, mouse_button, BiometricType, DisplayInfo, Flavor, LogLevel,
    RuntimeConfig, Sdk, Settings, VERSION,
};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "quago-sim")]
#[command(author = "Quago")]
#[command(version = VERSION)]
#[command(about = "Feed synthetic input through the Quago SDK", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a number of segments filled with synthetic input
    Simulate {
        /// Application token reported with every segment
        #[arg(long)]
        token: String,

        /// Build flavor (development, production, authentic or unauthentic)
        #[arg(long, default_value = "development")]
        flavor: Flavor,

        /// SDK log level
        #[arg(long, default_value = "debug")]
        log_level: LogLevel,

        /// Number of segments to run
        #[arg(long, default_value = "3")]
        segments: u32,

        /// Mouse gestures dispatched per segment
        #[arg(long, default_value = "20")]
        events: u32,

        /// Maximum segments the SDK will deliver
        #[arg(long)]
        max_segments: Option<u32>,

        /// Post segments to the endpoint instead of printing them
        #[arg(long)]
        send: bool,
    },

    /// Print a freshly generated session id
    SessionId,

    /// Show runtime configuration
    Config,

    /// Write a default runtime configuration file
    InitConfig {
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
}

/// Keys bound during a simulation run.
const BINDINGS: [(&str, i32); 4] = [("up", 87), ("left", 65), ("down", 83), ("right", 68)];

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Simulate {
            token,
            flavor,
            log_level,
            segments,
            events,
            max_segments,
            send,
        } => cmd_simulate(
            &token,
            flavor,
            log_level,
            segments,
            events,
            max_segments,
            send,
        ),
        Commands::SessionId => {
            println!("{}", generate_id());
            Ok(())
        }
        Commands::Config => cmd_config(),
        Commands::InitConfig { force } => cmd_init_config(force),
    }
}

fn cmd_simulate(
    token: &str,
    flavor: Flavor,
    log_level: LogLevel,
    segments: u32,
    events: u32,
    max_segments: Option<u32>,
    send: bool,
) -> Result<()> {
    println!("Quago simulator v{VERSION}");
    println!();

    let runtime = RuntimeConfig::load().unwrap_or_else(|e| {
        eprintln!("Warning: Could not read runtime config: {e}");
        RuntimeConfig::default()
    });

    let delivered = Arc::new(AtomicUsize::new(0));
    let mut builder = Settings::builder(token, flavor)
        .log_level(log_level)
        .max_segments(max_segments)
        .manual_motion_dispatcher(true)
        .manual_keys_dispatcher(true)
        .network(runtime.network.clone())
        .tracking(runtime.tracking);
    if send {
        println!("Delivery: {}", runtime.network.url);
    } else {
        println!("Delivery: stdout");
        let counter = delivered.clone();
        builder = builder.callback(move |headers: &str, payload: &str| {
            let n = counter.fetch_add(1, Ordering::SeqCst) + 1;
            println!("--- segment #{n} ---");
            println!("headers: {headers}");
            println!("payload: {payload}");
        });
    }
    let settings = builder.build().context("invalid settings")?;
    let sdk = Sdk::new(settings).context("failed to start SDK")?;

    println!("Session ID: {}", sdk.session_id());
    println!("Press Ctrl+C to stop");
    println!();

    let running = Arc::new(AtomicBool::new(true));
    ctrlc_handler(running.clone())?;

    sdk.update_display(DisplayInfo {
        screen_width: 1920,
        screen_height: 1080,
        app_width: 1280,
        app_height: 720,
        window_x: 320,
        window_y: 180,
        refresh_rate: 60,
        dpi: 96.0,
        full_screen: false,
    });
    for (name, key_code) in BINDINGS {
        sdk.bind_key(Some(name), key_code);
    }
    sdk.on_focus(true);

    let mut rng = rand::rng();
    for segment in 1..=segments {
        if !running.load(Ordering::SeqCst) {
            break;
        }
        sdk.begin_segment(&format!("sim-{segment}"));
        sdk.set_key_value("run", &segment.to_string());

        for _ in 0..events {
            if !running.load(Ordering::SeqCst) {
                break;
            }
            let (x, y) = (rng.random_range(0.0..1280.0), rng.random_range(0.0..720.0));
            sdk.dispatch_motion(BiometricType::MotionDown, x, y, mouse_button::LEFT);
            for step in 1..=3 {
                let offset = step as f32 * 4.0;
                sdk.dispatch_motion(
                    BiometricType::MotionMove,
                    x + offset,
                    y + offset,
                    mouse_button::LEFT,
                );
            }
            sdk.dispatch_motion(BiometricType::MotionUp, x + 12.0, y + 12.0, mouse_button::LEFT);

            let (_, key_code) = BINDINGS[rng.random_range(0..BINDINGS.len())];
            sdk.dispatch_key(key_action::DOWN, key_code);
            thread::sleep(Duration::from_millis(rng.random_range(5..25)));
            sdk.dispatch_key(key_action::UP, key_code);
        }

        sdk.end_segment();
        thread::sleep(Duration::from_millis(50));
    }

    sdk.on_stop();
    if send {
        // Give the network module a chance to post the last segments.
        thread::sleep(Duration::from_secs(2));
    }
    sdk.release();

    println!();
    if !send {
        println!("Segments printed: {}", delivered.load(Ordering::SeqCst));
    }
    println!("{}", sdk.stats().summary());
    Ok(())
}

fn cmd_config() -> Result<()> {
    let config = RuntimeConfig::load().context("failed to load runtime config")?;

    println!("Configuration");
    println!("=============");
    println!();
    println!("Config file: {:?}", RuntimeConfig::config_path());
    println!();
    println!("{}", serde_json::to_string_pretty(&config)?);
    Ok(())
}

fn cmd_init_config(force: bool) -> Result<()> {
    let path = RuntimeConfig::config_path();
    if path.exists() && !force {
        bail!("{} already exists, use --force to overwrite", path.display());
    }
    RuntimeConfig::default()
        .save_to(&path)
        .context("failed to write runtime config")?;
    println!("Wrote default configuration to {path:?}");
    Ok(())
}

/// Set up Ctrl+C handler.
fn ctrlc_handler(running: Arc<AtomicBool>) -> Result<()> {
    ctrlc::set_handler(move || {
        running.store(false, Ordering::SeqCst);
    })
    .context("Error setting Ctrl+C handler")
}
