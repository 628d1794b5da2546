use std::sync::Arc;

use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use undertone::config::Config;
use undertone::kernel::event::{Event, UserCommand};
use undertone::kernel::playback::LogSink;
use undertone::sampler::SamplerPipeline;
use undertone::services::{MusicService, VisionService};
use undertone::Reactor;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let config = Config::from_env()?;
    info!("undertone booting");

    let (events_tx, events_rx) = mpsc::channel(100);
    let (notify_tx, mut notify_rx) = mpsc::channel(100);

    let analyzer = Arc::new(VisionService::new(&config));
    let generator = Arc::new(MusicService::new(&config));
    let mut reactor = Reactor::new(
        events_rx,
        events_tx.clone(),
        notify_tx,
        analyzer,
        generator,
        LogSink::new(),
    );

    let shutdown = CancellationToken::new();
    let sampler = SamplerPipeline::new(events_tx.clone(), shutdown.clone())
        .with_interval(config.sample_interval);
    std::thread::spawn(move || sampler.run());

    // Operator console: one command per line. An embedding shell would send
    // the same events through the channel instead.
    let console_tx = events_tx.clone();
    tokio::spawn(async move {
        let mut lines = BufReader::new(tokio::io::stdin()).lines();
        while let Ok(Some(line)) = lines.next_line().await {
            let line = line.trim().to_string();
            let event = match line.as_str() {
                "" => continue,
                "gen" => Event::Command(UserCommand::Generate),
                "back" => Event::Command(UserCommand::Back),
                "next" => Event::Command(UserCommand::Forward),
                "play" | "pause" => Event::Command(UserCommand::PlayPause),
                other => {
                    if let Some(rest) = other.strip_prefix("ended ") {
                        match rest.trim().parse::<u64>() {
                            Ok(epoch) => Event::TrackEnded { epoch },
                            Err(_) => {
                                warn!("usage: ended <epoch>");
                                continue;
                            }
                        }
                    } else if let Some(rest) = other.strip_prefix("prefs ") {
                        match serde_json::from_str(rest) {
                            Ok(prefs) => Event::PrefsChanged(prefs),
                            Err(err) => {
                                warn!(%err, "invalid preferences JSON");
                                continue;
                            }
                        }
                    } else {
                        warn!(command = other, "unknown console command");
                        continue;
                    }
                }
            };
            if console_tx.send(event).await.is_err() {
                break;
            }
        }
    });

    // Notification printer: the UI boundary in headless runs.
    tokio::spawn(async move {
        while let Some(note) = notify_rx.recv().await {
            match serde_json::to_string(&note) {
                Ok(json) => println!("{json}"),
                Err(err) => warn!(%err, "notification serialization failed"),
            }
        }
    });

    tokio::select! {
        _ = reactor.run() => {}
        _ = tokio::signal::ctrl_c() => {
            info!("shutting down");
            shutdown.cancel();
        }
    }
    Ok(())
}
