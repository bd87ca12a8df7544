//! Renewal demo against in-process fakes.
//!
//! Run with: cargo run -p renewal-demo -- [seconds]
//!
//! Negotiates a stream whose sessions live for 35 seconds, so with the
//! default 30 second margin a renewal happens every 5 seconds. Stops
//! after the given number of seconds (default 20) or on Ctrl-C.

use std::{sync::Arc, time::Duration};

use anyhow::Context;
use camlink_core::{
    EventLog, StreamConfig, SystemClock,
    testing::{FakeConnector, FakeMedia, FakeMediaEngine, FakeSessionApi},
};
use camlink_session::{SessionOptions, StreamSession};
use futures::StreamExt;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

const DEMO_URL: &str = "nest:?client_id=demo&client_secret=demo-secret&refresh_token=demo-refresh&project_id=demo-project&device_id=demo-camera";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let run_for = match std::env::args().nth(1) {
        Some(arg) => Duration::from_secs(arg.parse().context("seconds must be a number")?),
        None => Duration::from_secs(20),
    };

    let config = StreamConfig::from_url(DEMO_URL)?;
    let clock = Arc::new(SystemClock);
    let api = FakeSessionApi::new(clock.clone()).auto_renew(Duration::from_secs(35));
    let connector = FakeConnector::new(api);
    let engine = FakeMediaEngine::new(FakeMedia::new());
    let events = Arc::new(EventLog::new());

    let options = SessionOptions::default()
        .with_clock(clock)
        .with_sink(events.clone());
    let stream = StreamSession::connect_with(&config, &connector, &engine, options).await?;
    tracing::info!("Negotiated medias: {}", serde_json::to_string(&stream.medias())?);

    let mut feed = events.history_plus_stream();
    tokio::spawn(async move {
        while let Some(event) = feed.next().await {
            match serde_json::to_string(&event) {
                Ok(line) => println!("{line}"),
                Err(e) => tracing::error!("Failed to encode event: {e}"),
            }
        }
    });

    stream.start().await?;

    tokio::select! {
        () = tokio::time::sleep(run_for) => {}
        res = tokio::signal::ctrl_c() => res?,
    }

    stream.stop().await?;
    tracing::info!("Final state: {}", serde_json::to_string(&stream.renewal_state())?);
    Ok(())
}
