//! Audio Receiver Application
//!
//! Joins a multicast group and plays the received PCM stream on the default
//! output device.

use anyhow::Result;
use std::time::Duration;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use multicast_audio_streamer::{
    audio::device::{list_devices, DeviceSelector},
    config::{AppConfig, Direction, LatencyProfile, SessionConfig},
    session::Session,
};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting Multicast Audio Receiver");

    let app_config = AppConfig::load_default()?;

    // Positional overrides: [group] [port] [profile]
    let mut args = std::env::args().skip(1);
    let mut network = app_config.network.clone();
    if let Some(group) = args.next() {
        network.group = group.parse().expect("Invalid multicast group address");
    }
    if let Some(port) = args.next() {
        network.port = port.parse().expect("Invalid port");
    }
    let profile: LatencyProfile = args
        .next()
        .map(|p| p.parse().expect("Invalid latency profile"))
        .unwrap_or_default();

    // List available output devices
    println!("\n=== Available Output Devices ===");
    for device in list_devices() {
        if device.is_output {
            let default_marker = if device.is_default { " [DEFAULT]" } else { "" };
            println!("  {}{}", device.name, default_marker);
        }
    }
    println!();

    let config = SessionConfig {
        direction: Direction::Receive,
        stream: profile.stream_config(app_config.stream.channels),
        network,
    };
    tracing::info!(
        group = %config.network.group,
        port = config.network.port,
        frame_size = config.stream.frame_size,
        sample_rate = config.stream.sample_rate,
        "receiver configuration; sender must use identical stream settings"
    );

    let session = Session::new(config);
    session.start(&DeviceSelector::Default)?;

    tracing::info!("Listening - press Ctrl+C to stop");

    // The 100 ms snapshot feed drives a 1 s console line
    let stats_rx = session.subscribe();
    let mut ticker = tokio::time::interval(Duration::from_secs(1));
    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => break,
            _ = ticker.tick() => {
                if let Some(fault) = session.take_fault() {
                    tracing::error!("session ended: {fault}");
                    break;
                }
                let mut latest = None;
                while let Ok(snapshot) = stats_rx.try_recv() {
                    latest = Some(snapshot);
                }
                if let Some(stats) = latest {
                    tracing::info!(
                        "{} packets ({:.1}/s), {:.1}% loss, ~{:.1} ms latency, buffer {}/{}, level {:.0}%",
                        stats.packets_transferred,
                        stats.packets_per_sec,
                        stats.loss_rate * 100.0,
                        stats.estimated_latency_ms,
                        stats.buffer_level,
                        stats.buffer_capacity,
                        stats.peak_amplitude * 100.0
                    );
                }
            }
        }
    }

    session.stop();
    let stats = session.stats();
    tracing::info!(
        "Final: {} packets in {:.1}s, {:.1}% loss",
        stats.packets_transferred,
        stats.elapsed.as_secs_f64(),
        stats.loss_rate * 100.0
    );

    Ok(())
}
