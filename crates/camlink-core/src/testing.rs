//! In-process fakes of the session API and the media connection.
//!
//! Both fakes are cheap to clone and share their state, so a test can keep
//! a handle while the session manager owns another.

use std::{
    collections::VecDeque,
    sync::{
        Arc, Mutex,
        atomic::{AtomicBool, AtomicUsize, Ordering},
    },
    time::Duration,
};

use async_trait::async_trait;
use chrono::{DateTime, TimeDelta, Utc};
use serde_json::json;
use tokio::sync::Notify;

use crate::{
    ApiConnector, ApiError, Clock, Codec, Credentials, Media, MediaConnection, MediaEngine,
    MediaError, MediaKind, OfferAnswer, SessionApi, SessionGrant,
};

/// Answer description returned by [`FakeSessionApi`] when no exchange
/// response is scripted.
pub const FAKE_ANSWER: &str = "v=0\r\ns=fake-answer\r\n";

/// A recorded `extend_session` call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtendCall {
    pub scope: String,
    pub target: String,
    pub session_id: String,
    /// Clock time when the call was made.
    pub at: DateTime<Utc>,
}

#[derive(Default)]
struct ApiState {
    exchanges: Vec<String>,
    exchange_replies: VecDeque<Result<OfferAnswer, ApiError>>,
    extensions: Vec<ExtendCall>,
    extension_replies: VecDeque<Result<SessionGrant, ApiError>>,
    auto_lifetime: Option<TimeDelta>,
    issued: usize,
}

struct ApiInner {
    clock: Arc<dyn Clock>,
    state: Mutex<ApiState>,
    latency: Mutex<Duration>,
    notify: Notify,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

/// Scripted session API.
///
/// Replies are consumed in order. With nothing scripted, `exchange_offer`
/// and `extend_session` either mint a grant (after
/// [`auto_renew`](Self::auto_renew)) or fail with a transport error.
#[derive(Clone)]
pub struct FakeSessionApi {
    inner: Arc<ApiInner>,
}

impl FakeSessionApi {
    #[must_use]
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            inner: Arc::new(ApiInner {
                clock,
                state: Mutex::new(ApiState::default()),
                latency: Mutex::new(Duration::ZERO),
                notify: Notify::new(),
                in_flight: AtomicUsize::new(0),
                max_in_flight: AtomicUsize::new(0),
            }),
        }
    }

    /// Mint grants that live for `lifetime` when no reply is scripted.
    #[must_use]
    pub fn auto_renew(self, lifetime: Duration) -> Self {
        self.state().auto_lifetime = TimeDelta::from_std(lifetime).ok();
        self
    }

    /// Delay every extension reply by `latency` (tokio time).
    pub fn set_extension_latency(&self, latency: Duration) {
        *self.inner.latency.lock().unwrap() = latency;
    }

    pub fn push_exchange(&self, reply: Result<OfferAnswer, ApiError>) {
        self.state().exchange_replies.push_back(reply);
    }

    pub fn push_extension(&self, reply: Result<SessionGrant, ApiError>) {
        self.state().extension_replies.push_back(reply);
    }

    /// Offers received so far.
    #[must_use]
    pub fn exchanges(&self) -> Vec<String> {
        self.state().exchanges.clone()
    }

    /// Extension calls received so far.
    #[must_use]
    pub fn extensions(&self) -> Vec<ExtendCall> {
        self.state().extensions.clone()
    }

    /// Highest number of extension calls observed in flight at once.
    #[must_use]
    pub fn max_in_flight(&self) -> usize {
        self.inner.max_in_flight.load(Ordering::SeqCst)
    }

    /// Wait until at least `count` extension calls were made.
    pub async fn wait_for_extensions(&self, count: usize) -> Vec<ExtendCall> {
        loop {
            let notified = self.inner.notify.notified();
            {
                let state = self.state();
                if state.extensions.len() >= count {
                    return state.extensions.clone();
                }
            }
            notified.await;
        }
    }

    fn state(&self) -> std::sync::MutexGuard<'_, ApiState> {
        self.inner.state.lock().unwrap()
    }

    fn mint(&self, state: &mut ApiState) -> Option<SessionGrant> {
        let lifetime = state.auto_lifetime?;
        state.issued += 1;
        Some(SessionGrant::new(
            format!("fake-session-{}", state.issued),
            self.inner.clock.now() + lifetime,
        ))
    }
}

#[async_trait]
impl SessionApi for FakeSessionApi {
    async fn exchange_offer(
        &self,
        _scope: &str,
        _target: &str,
        offer: &str,
    ) -> Result<OfferAnswer, ApiError> {
        let mut state = self.state();
        state.exchanges.push(offer.to_owned());
        if let Some(reply) = state.exchange_replies.pop_front() {
            return reply;
        }
        self.mint(&mut state)
            .map(|grant| OfferAnswer::new(FAKE_ANSWER, grant))
            .ok_or_else(|| ApiError::Transport("no scripted exchange reply".into()))
    }

    async fn extend_session(
        &self,
        scope: &str,
        target: &str,
        session_id: &str,
    ) -> Result<SessionGrant, ApiError> {
        let running = self.inner.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.inner.max_in_flight.fetch_max(running, Ordering::SeqCst);

        self.state().extensions.push(ExtendCall {
            scope: scope.to_owned(),
            target: target.to_owned(),
            session_id: session_id.to_owned(),
            at: self.inner.clock.now(),
        });
        self.inner.notify.notify_waiters();

        let latency = *self.inner.latency.lock().unwrap();
        if !latency.is_zero() {
            tokio::time::sleep(latency).await;
        }

        let reply = {
            let mut state = self.state();
            match state.extension_replies.pop_front() {
                Some(reply) => reply,
                None => self
                    .mint(&mut state)
                    .ok_or_else(|| ApiError::Transport("no scripted extension reply".into())),
            }
        };
        self.inner.in_flight.fetch_sub(1, Ordering::SeqCst);
        reply
    }
}

/// Connector handing out a shared [`FakeSessionApi`].
#[derive(Clone)]
pub struct FakeConnector {
    api: FakeSessionApi,
    reject: Option<ApiError>,
    connects: Arc<AtomicUsize>,
}

impl FakeConnector {
    #[must_use]
    pub fn new(api: FakeSessionApi) -> Self {
        Self {
            api,
            reject: None,
            connects: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Fail every `connect` with `error`.
    #[must_use]
    pub fn rejecting(mut self, error: ApiError) -> Self {
        self.reject = Some(error);
        self
    }

    /// Number of `connect` calls.
    #[must_use]
    pub fn connects(&self) -> usize {
        self.connects.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ApiConnector for FakeConnector {
    type Api = FakeSessionApi;

    async fn connect(&self, credentials: &Credentials) -> Result<Self::Api, ApiError> {
        self.connects.fetch_add(1, Ordering::SeqCst);
        if let Some(error) = &self.reject {
            return Err(error.clone());
        }
        if credentials.client_id.is_empty() {
            return Err(ApiError::Auth("empty client id".into()));
        }
        Ok(self.api.clone())
    }
}

/// Which step of a [`FakeMedia`] should fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FakeFailure {
    Offer,
    Answer,
    Start,
}

/// Track handle produced by [`FakeMedia`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FakeTrack {
    pub kind: MediaKind,
    pub codec: Codec,
}

#[derive(Default)]
struct MediaState {
    offered: Vec<Media>,
    negotiated: Vec<Media>,
    attached: Vec<FakeTrack>,
    failure: Option<FakeFailure>,
}

#[derive(Default)]
struct MediaInner {
    state: Mutex<MediaState>,
    started: AtomicBool,
    stops: AtomicUsize,
}

/// Media connection that negotiates H264 video and Opus audio.
#[derive(Clone, Default)]
pub struct FakeMedia {
    inner: Arc<MediaInner>,
}

impl FakeMedia {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Make `step` fail.
    #[must_use]
    pub fn failing(self, step: FakeFailure) -> Self {
        self.state().failure = Some(step);
        self
    }

    #[must_use]
    pub fn is_started(&self) -> bool {
        self.inner.started.load(Ordering::SeqCst)
    }

    /// Number of `stop` calls.
    #[must_use]
    pub fn stops(&self) -> usize {
        self.inner.stops.load(Ordering::SeqCst)
    }

    /// Medias passed to `create_complete_offer`.
    #[must_use]
    pub fn offered(&self) -> Vec<Media> {
        self.state().offered.clone()
    }

    /// Tracks attached through `add_track`.
    #[must_use]
    pub fn attached(&self) -> Vec<FakeTrack> {
        self.state().attached.clone()
    }

    fn state(&self) -> std::sync::MutexGuard<'_, MediaState> {
        self.inner.state.lock().unwrap()
    }

    fn fails_at(&self, step: FakeFailure) -> bool {
        self.state().failure == Some(step)
    }
}

fn negotiate(offered: &[Media]) -> Vec<Media> {
    offered
        .iter()
        .cloned()
        .map(|mut media| {
            media.codecs = match media.kind {
                MediaKind::Audio => vec![Codec::new("opus", 48_000).with_channels(2)],
                MediaKind::Video => vec![Codec::new("H264", 90_000)],
                MediaKind::App => Vec::new(),
            };
            media
        })
        .collect()
}

#[async_trait]
impl MediaConnection for FakeMedia {
    type Track = FakeTrack;

    async fn create_complete_offer(&self, medias: &[Media]) -> Result<String, MediaError> {
        if self.fails_at(FakeFailure::Offer) {
            return Err(MediaError::Transport("no usable interfaces".into()));
        }
        self.state().offered = medias.to_vec();
        let sections: Vec<String> = medias
            .iter()
            .map(|m| serde_json::to_string(m).unwrap_or_default())
            .collect();
        Ok(format!("v=0\r\ns=fake-offer\r\n{}", sections.join("\r\n")))
    }

    async fn set_answer(&self, answer: &str) -> Result<(), MediaError> {
        if self.fails_at(FakeFailure::Answer) || answer.is_empty() {
            return Err(MediaError::InvalidAnswer("answer does not match offer".into()));
        }
        let mut state = self.state();
        state.negotiated = negotiate(&state.offered);
        Ok(())
    }

    async fn start(&self) -> Result<(), MediaError> {
        if self.fails_at(FakeFailure::Start) {
            return Err(MediaError::Internal("transport closed".into()));
        }
        self.inner.started.store(true, Ordering::SeqCst);
        Ok(())
    }

    async fn stop(&self) -> Result<(), MediaError> {
        self.inner.stops.fetch_add(1, Ordering::SeqCst);
        self.inner.started.store(false, Ordering::SeqCst);
        Ok(())
    }

    fn medias(&self) -> Vec<Media> {
        self.state().negotiated.clone()
    }

    fn get_track(&self, media: &Media, codec: &Codec) -> Result<Self::Track, MediaError> {
        let state = self.state();
        state
            .negotiated
            .iter()
            .filter(|m| m.kind == media.kind)
            .find_map(|m| m.find_codec(codec))
            .map(|codec| FakeTrack {
                kind: media.kind,
                codec: codec.clone(),
            })
            .ok_or_else(|| MediaError::TrackNotFound(format!("{:?}/{}", media.kind, codec.name)))
    }

    fn add_track(&self, media: &Media, codec: &Codec, track: Self::Track) -> Result<(), MediaError> {
        if media.kind != track.kind || !codec.matches(&track.codec) {
            return Err(MediaError::TrackNotFound(format!(
                "{:?}/{} does not carry {:?}/{}",
                media.kind, codec.name, track.kind, track.codec.name
            )));
        }
        self.state().attached.push(track);
        Ok(())
    }

    fn snapshot(&self) -> serde_json::Value {
        let state = self.state();
        json!({
            "type": "fake",
            "started": self.is_started(),
            "medias": state.negotiated,
            "attached": state.attached.len(),
        })
    }
}

/// Engine that hands out clones of one [`FakeMedia`].
#[derive(Clone)]
pub struct FakeMediaEngine {
    connection: FakeMedia,
    fail: bool,
    created: Arc<AtomicUsize>,
}

impl FakeMediaEngine {
    #[must_use]
    pub fn new(connection: FakeMedia) -> Self {
        Self {
            connection,
            fail: false,
            created: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Fail every `new_connection`.
    #[must_use]
    pub fn failing(mut self) -> Self {
        self.fail = true;
        self
    }

    /// Number of connections created.
    #[must_use]
    pub fn created(&self) -> usize {
        self.created.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl MediaEngine for FakeMediaEngine {
    type Connection = FakeMedia;

    async fn new_connection(&self) -> Result<Self::Connection, MediaError> {
        if self.fail {
            return Err(MediaError::Transport("cannot bind socket".into()));
        }
        self.created.fetch_add(1, Ordering::SeqCst);
        Ok(self.connection.clone())
    }
}
