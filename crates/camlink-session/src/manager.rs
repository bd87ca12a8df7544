//! Session manager for negotiating and renewing a live stream.

use std::{sync::Arc, time::Duration};

use camlink_core::{
    ApiConnector, Clock, Codec, Media, MediaConnection, MediaEngine, NoopSink, RenewalSink,
    Session, SessionApi, StreamConfig, SystemClock, default_medias,
};
use tokio::sync::{Mutex, RwLock, watch};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::{
    RenewalSchedule, RenewalState, StreamError,
    renewal::{self, RenewalContext, RenewalHandle},
};

/// Tunables for a [`StreamSession`].
#[derive(Clone)]
pub struct SessionOptions {
    schedule: RenewalSchedule,
    clock: Arc<dyn Clock>,
    sink: Arc<dyn RenewalSink>,
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self {
            schedule: RenewalSchedule::default(),
            clock: Arc::new(SystemClock),
            sink: Arc::new(NoopSink),
        }
    }
}

impl SessionOptions {
    /// Renew this long before expiry instead of the default 30 seconds.
    #[must_use]
    pub fn with_safety_margin(mut self, margin: Duration) -> Self {
        self.schedule = RenewalSchedule::new(margin);
        self
    }

    /// Use `clock` to schedule renewals.
    #[must_use]
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Report renewal events to `sink`.
    #[must_use]
    pub fn with_sink(mut self, sink: Arc<dyn RenewalSink>) -> Self {
        self.sink = sink;
        self
    }
}

enum Lifecycle {
    Ready,
    Running(RenewalHandle),
    Stopped,
}

/// A negotiated stream that keeps itself alive.
///
/// Created by [`connect`](Self::connect), which performs the whole
/// offer/answer handshake. [`start`](Self::start) begins media flow and
/// the renewal loop; [`stop`](Self::stop) ends both. The remote service is
/// never told the stream ended: it drops the session once it expires.
pub struct StreamSession<A, M>
where
    A: SessionApi,
    M: MediaConnection,
{
    id: Uuid,
    api: Arc<A>,
    connection: M,
    session: Arc<RwLock<Session>>,
    options: SessionOptions,
    state: Arc<watch::Sender<RenewalState>>,
    lifecycle: Mutex<Lifecycle>,
}

impl<A, M> StreamSession<A, M>
where
    A: SessionApi,
    M: MediaConnection,
{
    /// Negotiate a new stream with default options.
    ///
    /// # Errors
    /// Returns error if the configuration is invalid or any handshake step
    /// fails. No media connection is left running on failure.
    pub async fn connect<C, E>(
        config: &StreamConfig,
        connector: &C,
        engine: &E,
    ) -> Result<Self, StreamError>
    where
        C: ApiConnector<Api = A>,
        E: MediaEngine<Connection = M>,
    {
        Self::connect_with(config, connector, engine, SessionOptions::default()).await
    }

    /// Negotiate a new stream.
    ///
    /// # Errors
    /// Returns error if the configuration is invalid or any handshake step
    /// fails. No media connection is left running on failure.
    pub async fn connect_with<C, E>(
        config: &StreamConfig,
        connector: &C,
        engine: &E,
        options: SessionOptions,
    ) -> Result<Self, StreamError>
    where
        C: ApiConnector<Api = A>,
        E: MediaEngine<Connection = M>,
    {
        config.validate()?;

        let id = Uuid::new_v4();
        let (scope, target) = (config.project_id.as_str(), config.device_id.as_str());
        debug!(stream = %id, scope, target, "Connecting stream");

        let api = connector.connect(&config.credentials()).await?;
        let connection = engine
            .new_connection()
            .await
            .map_err(StreamError::Negotiation)?;

        let clock = options.clock.as_ref();
        let session = match negotiate(&api, &connection, scope, target, clock).await {
            Ok(session) => session,
            Err(err) => {
                warn!(stream = %id, "Handshake failed: {err}");
                if let Err(e) = connection.stop().await {
                    warn!(stream = %id, "Failed to stop media connection: {e}");
                }
                return Err(err);
            }
        };

        info!(
            stream = %id,
            session_id = %session.session_id,
            expires_at = %session.expires_at,
            "Stream negotiated"
        );

        Ok(Self {
            id,
            api: Arc::new(api),
            connection,
            session: Arc::new(RwLock::new(session)),
            options,
            state: Arc::new(watch::Sender::new(RenewalState::Idle)),
            lifecycle: Mutex::new(Lifecycle::Ready),
        })
    }

    /// Start media flow and the renewal loop.
    ///
    /// # Errors
    /// Returns error if already started, already stopped, or if the media
    /// connection fails to start. In the last case the renewal loop is
    /// cancelled again.
    pub async fn start(&self) -> Result<(), StreamError> {
        let mut lifecycle = self.lifecycle.lock().await;
        match *lifecycle {
            Lifecycle::Ready => {}
            Lifecycle::Running(_) => return Err(StreamError::AlreadyStarted),
            Lifecycle::Stopped => return Err(StreamError::Stopped),
        }

        let handle = renewal::spawn(RenewalContext {
            id: self.id,
            api: Arc::clone(&self.api),
            session: Arc::clone(&self.session),
            schedule: self.options.schedule,
            clock: Arc::clone(&self.options.clock),
            sink: Arc::clone(&self.options.sink),
            state: Arc::clone(&self.state),
        });

        if let Err(e) = self.connection.start().await {
            handle.cancel().await;
            return Err(StreamError::Media(e));
        }

        *lifecycle = Lifecycle::Running(handle);
        info!(stream = %self.id, "Stream started");
        Ok(())
    }

    /// Cancel renewal and stop the media connection.
    ///
    /// Safe to call without [`start`](Self::start) and more than once.
    /// Once this returns no renewal is pending or in flight.
    ///
    /// # Errors
    /// Returns error if the media connection fails to stop.
    pub async fn stop(&self) -> Result<(), StreamError> {
        let previous = std::mem::replace(&mut *self.lifecycle.lock().await, Lifecycle::Stopped);
        if let Lifecycle::Running(handle) = previous {
            handle.cancel().await;
        }

        self.connection.stop().await.map_err(StreamError::Media)?;
        info!(stream = %self.id, "Stream stopped");
        Ok(())
    }

    /// Snapshot of the current session.
    pub async fn session(&self) -> Session {
        self.session.read().await.clone()
    }

    /// Current renewal state.
    #[must_use]
    pub fn renewal_state(&self) -> RenewalState {
        *self.state.borrow()
    }

    /// Subscribe to renewal state changes.
    #[must_use]
    pub fn watch_renewal(&self) -> watch::Receiver<RenewalState> {
        self.state.subscribe()
    }

    /// Identifier used to correlate this stream's log lines.
    #[must_use]
    pub const fn id(&self) -> Uuid {
        self.id
    }

    /// Negotiated media sections.
    #[must_use]
    pub fn medias(&self) -> Vec<Media> {
        self.connection.medias()
    }

    /// Obtain the track for a media section and codec.
    ///
    /// # Errors
    /// Returns error if the connection has no such track.
    pub fn get_track(&self, media: &Media, codec: &Codec) -> Result<M::Track, StreamError> {
        self.connection
            .get_track(media, codec)
            .map_err(StreamError::Media)
    }

    /// Attach a track to a media section and codec.
    ///
    /// # Errors
    /// Returns error if the connection rejects the track.
    pub fn add_track(&self, media: &Media, codec: &Codec, track: M::Track) -> Result<(), StreamError> {
        self.connection
            .add_track(media, codec, track)
            .map_err(StreamError::Media)
    }

    /// Diagnostic view of the media connection.
    #[must_use]
    pub fn snapshot(&self) -> serde_json::Value {
        self.connection.snapshot()
    }
}

async fn negotiate<A, M>(
    api: &A,
    connection: &M,
    scope: &str,
    target: &str,
    clock: &dyn Clock,
) -> Result<Session, StreamError>
where
    A: SessionApi,
    M: MediaConnection,
{
    let offer = connection
        .create_complete_offer(&default_medias())
        .await
        .map_err(StreamError::Negotiation)?;

    let reply = api.exchange_offer(scope, target, &offer).await?;
    if reply.grant.session_id.is_empty() {
        return Err(StreamError::RemoteSession("empty session id".into()));
    }
    if reply.grant.expires_at <= clock.now() {
        return Err(StreamError::RemoteSession(format!(
            "session already expired at {}",
            reply.grant.expires_at
        )));
    }

    connection
        .set_answer(&reply.answer)
        .await
        .map_err(StreamError::Negotiation)?;

    Ok(Session::new(scope, target, reply.grant))
}
