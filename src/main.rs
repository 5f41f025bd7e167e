// src/main.rs - Roaster host entry point
use std::path::Path;

use clap::Parser;

use roasty_rs::config::Config;
use roasty_rs::profile::ProfileCurve;
use roasty_rs::session::RoastSession;

/// Temperature-controlled roaster loop host.
#[derive(Parser, Debug)]
#[command(name = "roaster-host", version)]
struct Cli {
    /// Configuration file
    #[arg(long, default_value = "roaster.toml")]
    config: String,

    /// Verbose (debug-level) logging
    #[arg(long)]
    verbose: bool,

    /// Simulate temperature readings instead of reading hardware
    #[arg(long)]
    simulate: bool,

    /// Don't run the meter reader child
    #[arg(long)]
    nodmm: bool,

    /// Smooth temperature over N samples
    #[arg(long, value_name = "N")]
    smooth: Option<usize>,

    /// Virtual-time speedup multiplier
    #[arg(long, value_name = "X")]
    speedup: Option<f64>,

    /// Preload a target profile CSV
    #[arg(long, value_name = "FILE")]
    profile: Option<String>,

    /// Power controller serial device
    #[arg(long, value_name = "DEV")]
    pcontrol: Option<String>,

    /// Secondary probe serial device
    #[arg(long, value_name = "DEV")]
    temp2: Option<String>,

    /// Manual target temperature; 0 follows the profile
    #[arg(long, value_name = "DEGC")]
    setpoint: Option<f64>,

    /// Plot time bound, minutes (display only)
    #[arg(long, value_name = "MIN")]
    maxtime: Option<f64>,

    /// Plot temperature bound, degrees C (display only)
    #[arg(long, value_name = "DEGC")]
    maxtemp: Option<f64>,
}

/// Command-line switches win over the config file.
fn apply_cli(config: &mut Config, cli: &Cli) {
    if cli.simulate {
        config.source.simulate = true;
        config.source.use_dmm = false;
    }
    if cli.nodmm {
        config.source.use_dmm = false;
    }
    if let Some(n) = cli.smooth {
        config.roaster.smoothing_window = n;
    }
    if let Some(x) = cli.speedup {
        config.roaster.time_speedup = x;
    }
    if let Some(path) = &cli.profile {
        config.control.profile = Some(path.clone());
    }
    if let Some(dev) = &cli.pcontrol {
        config.power.port = Some(dev.clone());
    }
    if let Some(dev) = &cli.temp2 {
        config.source.probe_port = Some(dev.clone());
    }
    if let Some(setpoint) = cli.setpoint {
        config.control.setpoint = setpoint;
    }
    if let Some(minutes) = cli.maxtime {
        config.roaster.max_time = minutes;
    }
    if let Some(celsius) = cli.maxtemp {
        config.roaster.max_temp = celsius;
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync + 'static>> {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_max_level(if cli.verbose {
            tracing::Level::DEBUG
        } else {
            tracing::Level::INFO
        })
        .init();

    tracing::info!("starting roaster host");

    let mut config = if Path::new(&cli.config).exists() {
        Config::load(&cli.config).map_err(|e| {
            tracing::error!("failed to load config from '{}': {e}", cli.config);
            Box::new(e) as Box<dyn std::error::Error + Send + Sync + 'static>
        })?
    } else {
        tracing::info!("no config file at '{}', using defaults", cli.config);
        Config::default()
    };
    apply_cli(&mut config, &cli);
    config.validate()?;

    tracing::info!(
        algorithm = ?config.control.algorithm,
        smoothing_window = config.roaster.smoothing_window,
        speedup = config.roaster.time_speedup,
        simulate = config.source.simulate,
        "configuration ready"
    );

    let profile = match &config.control.profile {
        Some(path) => {
            let curve = ProfileCurve::load(path)?;
            tracing::info!(%path, points = curve.points().len(), "loaded target profile");
            Some(curve)
        }
        None => None,
    };

    let tick_period = config.tick_period();
    let mut session = RoastSession::new(config, profile);
    session.connect_hardware()?;
    session.start()?;

    let mut interval = tokio::time::interval(tick_period);
    interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("shutdown requested");
                break;
            }
            _ = interval.tick() => {
                if let Err(e) = session.tick().await {
                    tracing::error!("tick failed: {e}");
                }
            }
        }
    }

    session.shutdown().await?;
    Ok(())
}
