#![allow(dead_code)]

use std::sync::Arc;

use camlink_core::{
    EventLog, OfferAnswer, SessionGrant, StreamConfig, TokioClock,
    testing::{FAKE_ANSWER, FakeConnector, FakeMedia, FakeMediaEngine, FakeSessionApi},
};
use camlink_session::{SessionOptions, StreamSession};
use chrono::{DateTime, TimeDelta, TimeZone, Utc};

pub type FakeStream = StreamSession<FakeSessionApi, FakeMedia>;

pub fn t0() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap()
}

pub fn at(secs: i64) -> DateTime<Utc> {
    t0() + TimeDelta::seconds(secs)
}

pub fn config() -> StreamConfig {
    StreamConfig {
        client_id: "client".into(),
        client_secret: "secret".into(),
        refresh_token: "refresh".into(),
        project_id: "p1".into(),
        device_id: "d1".into(),
    }
}

pub fn answer(session_id: &str, expires_at: DateTime<Utc>) -> Result<OfferAnswer, camlink_core::ApiError> {
    Ok(OfferAnswer::new(
        FAKE_ANSWER,
        SessionGrant::new(session_id, expires_at),
    ))
}

pub fn grant(session_id: &str, expires_at: DateTime<Utc>) -> Result<SessionGrant, camlink_core::ApiError> {
    Ok(SessionGrant::new(session_id, expires_at))
}

/// Fakes wired to a clock anchored at [`t0`] on tokio's paused time.
pub struct Harness {
    pub clock: Arc<TokioClock>,
    pub api: FakeSessionApi,
    pub connector: FakeConnector,
    pub media: FakeMedia,
    pub engine: FakeMediaEngine,
    pub events: Arc<EventLog>,
}

impl Harness {
    pub fn new() -> Self {
        Self::with_media(FakeMedia::new())
    }

    pub fn with_media(media: FakeMedia) -> Self {
        let clock = Arc::new(TokioClock::starting_at(t0()));
        let api = FakeSessionApi::new(clock.clone());
        Self {
            connector: FakeConnector::new(api.clone()),
            engine: FakeMediaEngine::new(media.clone()),
            clock,
            api,
            media,
            events: Arc::new(EventLog::new()),
        }
    }

    pub fn options(&self) -> SessionOptions {
        SessionOptions::default()
            .with_clock(self.clock.clone())
            .with_sink(self.events.clone())
    }

    pub async fn connect(&self) -> Result<FakeStream, camlink_session::StreamError> {
        self.connect_config(&config()).await
    }

    pub async fn connect_config(
        &self,
        config: &StreamConfig,
    ) -> Result<FakeStream, camlink_session::StreamError> {
        StreamSession::connect_with(config, &self.connector, &self.engine, self.options()).await
    }
}
