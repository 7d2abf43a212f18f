//! # xiaomi-ff
//!
//! Rumble support for the Xiaomi Bluetooth game controller.
//!
//! Opens the controller over hidraw, attaches a rumble session, plays a short
//! startup pulse and keeps the session alive until Ctrl+C.
//!
//! # Usage
//!
//! ```bash
//! xiaomi-ff [config.toml]
//! ```
//!
//! Expected output:
//! ```text
//! INFO xiaomi_ff: xiaomi-ff v0.1.0 starting...
//! INFO xiaomi_ff::device::hidraw: Opened controller at /dev/hidraw4
//! INFO xiaomi_ff::input: hid-xiaomiff: rumble capability registered
//! INFO xiaomi_ff::device::session: Rumble enabled on status report 0x20
//! ```

use anyhow::Result;
use tokio::time::{sleep, Duration};
use tracing::{info, warn};

use xiaomi_ff::config::Config;
use xiaomi_ff::device::{DeviceSession, HidapiTransport, DRIVER_NAME};
use xiaomi_ff::ff::RumbleEffect;
use xiaomi_ff::input::DirectInput;

/// Configuration path from the command line, if any
fn config_path(mut args: impl Iterator<Item = String>) -> Option<String> {
    args.nth(1)
}

#[tokio::main]
async fn main() -> Result<()> {
    let config = match config_path(std::env::args()) {
        Some(path) => Config::load(&path)?,
        None => Config::default(),
    };

    // Initialize logging
    let level: tracing::Level = config.logging.level.parse()?;
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env().add_directive(level.into()),
        )
        .init();

    info!("xiaomi-ff v{} starting...", env!("CARGO_PKG_VERSION"));

    let transport = HidapiTransport::open(&config.device)?;
    let input = DirectInput::new(DRIVER_NAME);
    let session = DeviceSession::attach(transport, input, config.session_options()).await?;

    if config.startup.pulse_ms > 0 {
        let pulse = RumbleEffect::new(config.startup.pulse_weak, config.startup.pulse_strong);
        if session.input().rumble(pulse) {
            sleep(Duration::from_millis(config.startup.pulse_ms)).await;
            session.input().rumble(RumbleEffect::stop());
        } else {
            warn!("Rumble capability missing, skipping startup pulse");
        }
    }

    info!("Press Ctrl+C to exit");
    tokio::signal::ctrl_c().await?;
    info!("Received Ctrl+C, shutting down...");

    session.detach().await;
    Ok(())
}
