use crate::direction::Direction;
use crate::error::{Error, ErrorKind, NotFoundKind};
use crate::media_session::{MediaSession, MediaSessionConfig, MediaSessionObserver, NullObserver};
use crate::negotiator::Negotiator;
use crate::port_allocator::{PortAllocator, PortPair, PortRange};
use crate::sdp_codec::LocalCapabilities;
use crate::statistics::Statistics;
use media_sdp::SessionDescription;
use std::collections::HashMap;
use std::net::IpAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;

/// Consumer-supplied sink for manager-level lifecycle and media events.
/// Invoked synchronously; implementations must not block and must not
/// call back into the manager that is invoking them.
pub trait EventHandler: Send + Sync {
    fn on_session_created(&self, _session_id: &str) {}
    fn on_session_updated(&self, _session_id: &str) {}
    fn on_session_closed(&self, _session_id: &str) {}
    fn on_session_error(&self, _session_id: &str, _error: &ErrorKind) {}
    fn on_media_received(&self, _session_id: &str, _bytes: &[u8], _media_tag: &str) {}
    fn on_sdp_negotiated(&self, _session_id: &str, _local_sdp: &str, _remote_sdp: &str) {}
}

pub struct NullEventHandler;
impl EventHandler for NullEventHandler {}

/// Fixed configuration for a [`SessionManager`].
#[derive(Debug, Clone)]
pub struct ManagerConfig {
    pub host: IpAddr,
    pub port_range: PortRange,
    pub max_sessions: usize,
    pub cleanup_interval: Duration,
    pub session_timeout: Duration,
    pub default_ptime_ms: u32,
    pub strict_answer: bool,
    pub codec_names: Vec<&'static str>,
    pub dtmf_enabled: bool,
    pub dtmf_payload_type: Option<u8>,
    pub rtcp_enabled: bool,
    pub rtcp_interval: Duration,
}

impl ManagerConfig {
    pub fn local_capabilities(&self) -> LocalCapabilities {
        let dtmf_payload_type = self.dtmf_enabled.then(|| self.dtmf_payload_type).flatten();
        LocalCapabilities::from_names(&self.codec_names, dtmf_payload_type)
    }
}

impl Default for ManagerConfig {
    fn default() -> Self {
        ManagerConfig {
            host: IpAddr::V4(std::net::Ipv4Addr::new(127, 0, 0, 1)),
            port_range: PortRange::new(10_000, 20_000).expect("default range satisfies PortRange::new"),
            max_sessions: 100,
            cleanup_interval: Duration::from_secs(5 * 60),
            session_timeout: Duration::from_secs(30 * 60),
            default_ptime_ms: 20,
            strict_answer: true,
            codec_names: vec!["PCMU", "PCMA", "G722"],
            dtmf_enabled: true,
            dtmf_payload_type: Some(101),
            rtcp_enabled: true,
            rtcp_interval: Duration::from_secs(5),
        }
    }
}

struct ManagedSession {
    media_session: Arc<MediaSession>,
    negotiator: Mutex<Negotiator>,
    port_pair: PortPair,
}

/// Owns the set of active [`MediaSession`]s keyed by session id,
/// coordinates port allocation and SDP negotiation, and evicts idle
/// sessions on a background tick.
pub struct SessionManager {
    config: ManagerConfig,
    sessions: Mutex<HashMap<String, Arc<ManagedSession>>>,
    port_allocator: Arc<PortAllocator>,
    event_handler: Arc<dyn EventHandler>,
    eviction_task: Mutex<Option<JoinHandle<()>>>,
}

impl SessionManager {
    pub fn new(config: ManagerConfig, event_handler: Arc<dyn EventHandler>) -> Arc<Self> {
        let port_allocator = Arc::new(PortAllocator::new(config.port_range));

        let manager = Arc::new(SessionManager {
            config,
            sessions: Mutex::new(HashMap::new()),
            port_allocator,
            event_handler,
            eviction_task: Mutex::new(None),
        });

        let eviction_handle = manager.clone().spawn_eviction_task();
        *manager.eviction_task.try_lock().expect("freshly constructed, uncontended") = Some(eviction_handle);

        manager
    }

    /// Enforces capacity and session id uniqueness, allocates a port pair,
    /// and instantiates a `MediaSession` with a `"primary"` RTP stream bound
    /// to it. The session starts `Idle`.
    pub async fn create_session(
        &self,
        session_id: impl Into<String>,
        direction: Direction,
    ) -> Result<Arc<MediaSession>, Error> {
        let session_id = session_id.into();
        let mut sessions = self.sessions.lock().await;

        if sessions.len() >= self.config.max_sessions {
            return Err(Error::new(ErrorKind::CapacityExceeded {
                max_sessions: self.config.max_sessions,
            }));
        }
        if sessions.contains_key(&session_id) {
            return Err(Error::new(ErrorKind::DuplicateSessionId(session_id)));
        }

        let port_pair = self
            .port_allocator
            .allocate_pair()
            .map_err(|kind| Error::with_session(session_id.clone(), kind))?;

        let (media_session, negotiator) = self
            .build_media_session(&session_id, port_pair, direction)
            .await
            .map_err(|e| {
                let _ = self.port_allocator.release_pair(port_pair);
                e
            })?;

        let managed = Arc::new(ManagedSession {
            media_session: media_session.clone(),
            negotiator: Mutex::new(negotiator),
            port_pair,
        });

        sessions.insert(session_id.clone(), managed);
        drop(sessions);

        self.event_handler.on_session_created(&session_id);
        Ok(media_session)
    }

    /// Convenience combining session creation with ingestion of a remote
    /// offer: parses `offer_sdp`, creates a new session, and feeds the
    /// parsed offer to its negotiator. `create_answer` can then be called
    /// to produce the answer. On any failure no session is left behind and
    /// no port pair is leaked.
    pub async fn create_session_from_sdp(
        &self,
        session_id: impl Into<String>,
        direction: Direction,
        offer_sdp: &str,
    ) -> Result<Arc<MediaSession>, Error> {
        let session_id = session_id.into();
        let offer = media_sdp::parse(offer_sdp).map_err(|e| Error::with_session(session_id.clone(), e))?;

        let media_session = self.create_session(session_id.clone(), direction).await?;

        let managed = self.managed(&session_id).await?;
        let mut negotiator = managed.negotiator.lock().await;
        let result = negotiator.process_offer(offer);
        drop(negotiator);

        if let Err(err) = result {
            self.event_handler.on_session_error(&session_id, &err.kind);
            let _ = self.close_session(&session_id).await;
            return Err(err);
        }

        Ok(media_session)
    }

    async fn build_media_session(
        &self,
        session_id: &str,
        port_pair: PortPair,
        direction: Direction,
    ) -> Result<(Arc<MediaSession>, Negotiator), Error> {
        let transport = Arc::new(
            crate::transport::Transport::new(&self.config.host.to_string(), port_pair.rtp)
                .await
                .map_err(|kind| Error::with_session(session_id.to_owned(), kind))?,
        );
        let rtcp_transport = Arc::new(
            crate::transport::Transport::new(&self.config.host.to_string(), port_pair.rtcp)
                .await
                .map_err(|kind| Error::with_session(session_id.to_owned(), kind))?,
        );

        let codec = self
            .config
            .codec_names
            .first()
            .and_then(|name| crate::codec::by_name(name))
            .unwrap_or(crate::codec::PCMU);

        let dtmf_payload_type = self.config.dtmf_payload_type.unwrap_or_default();

        let session_config = MediaSessionConfig {
            session_id: session_id.to_owned(),
            direction,
            payload_type: codec.static_pt.expect("configured codec has a static payload type"),
            clock_rate: codec.clock_rate,
            ptime_ms: self.config.default_ptime_ms,
            dtmf_enabled: self.config.dtmf_enabled,
            dtmf: media_rtp::DtmfConfig {
                payload_type: dtmf_payload_type,
                ..media_rtp::DtmfConfig::default()
            },
            rtcp_enabled: self.config.rtcp_enabled,
            rtcp_interval: self.config.rtcp_interval,
            ..MediaSessionConfig::default()
        };

        let observer: Arc<dyn MediaSessionObserver> = Arc::new(NullObserver);
        let media_session = Arc::new(MediaSession::new(session_config, transport, rtcp_transport, observer));

        let negotiator = Negotiator::new(
            self.config.host,
            self.config.local_capabilities(),
            self.config.default_ptime_ms,
            self.config.strict_answer,
        );

        Ok((media_session, negotiator))
    }

    /// Resolves the peer's RTP/RTCP socket addresses from a session
    /// description's first media line, falling back to the session-level
    /// `c=` when the media line doesn't carry its own.
    fn remote_addrs(
        session_id: &str,
        sdp: &SessionDescription,
    ) -> Result<(std::net::SocketAddr, std::net::SocketAddr), Error> {
        let media = sdp.media_descriptions.first().ok_or_else(|| {
            Error::with_session(
                session_id.to_owned(),
                ErrorKind::SdpParse(media_sdp::ParseSessionDescriptionError::MissingField("m")),
            )
        })?;

        let address = media.connection.or(sdp.connection).ok_or_else(|| {
            Error::with_session(
                session_id.to_owned(),
                ErrorKind::SdpParse(media_sdp::ParseSessionDescriptionError::MissingField("c")),
            )
        })?.address;

        let rtp_port = media.media.port;
        let rtcp_port = media.rtcp.map(|r| r.port).unwrap_or(rtp_port + 1);

        Ok((
            std::net::SocketAddr::new(address, rtp_port),
            std::net::SocketAddr::new(address, rtcp_port),
        ))
    }

    async fn managed(&self, session_id: &str) -> Result<Arc<ManagedSession>, Error> {
        self.sessions
            .lock()
            .await
            .get(session_id)
            .cloned()
            .ok_or_else(|| Error::with_session(session_id.to_owned(), ErrorKind::NotFound(NotFoundKind::Session)))
    }

    pub async fn create_offer(&self, session_id: &str, direction: Direction) -> Result<SessionDescription, Error> {
        let managed = self.managed(session_id).await?;
        let mut negotiator = managed.negotiator.lock().await;
        negotiator.create_offer(managed.port_pair.rtp, Some(managed.port_pair.rtcp), direction)
    }

    pub async fn create_answer(
        &self,
        session_id: &str,
        remote_offer: SessionDescription,
    ) -> Result<SessionDescription, Error> {
        let managed = self.managed(session_id).await?;
        let remote_sdp_text = remote_offer.to_string();

        let mut negotiator = managed.negotiator.lock().await;
        if let Err(err) = negotiator.process_offer(remote_offer) {
            drop(negotiator);
            self.event_handler.on_session_error(session_id, &err.kind);
            return Err(err);
        }
        let answer = match negotiator.create_answer(managed.port_pair.rtp, Some(managed.port_pair.rtcp)) {
            Ok(answer) => answer,
            Err(err) => {
                drop(negotiator);
                self.event_handler.on_session_error(session_id, &err.kind);
                return Err(err);
            }
        };
        let negotiated = negotiator.negotiated().expect("create_answer succeeded");
        let remote = Self::remote_addrs(session_id, negotiator.remote().expect("RemoteOffer implies remote is set"));
        drop(negotiator);

        managed.media_session.set_direction(negotiated.direction).await?;
        managed.media_session.set_payload_type(negotiated.payload_type).await?;
        managed.media_session.set_ptime(negotiated.ptime_ms).await?;
        if let Ok((rtp, rtcp)) = remote {
            managed.media_session.set_remote(rtp, rtcp);
        }

        self.event_handler
            .on_sdp_negotiated(session_id, &answer.to_string(), &remote_sdp_text);
        Ok(answer)
    }

    /// Feeds a remote answer into a session previously offered via
    /// [`Self::create_offer`].
    pub async fn update_session(&self, session_id: &str, remote_answer: SessionDescription) -> Result<(), Error> {
        let managed = self.managed(session_id).await?;
        let remote_sdp_text = remote_answer.to_string();
        let remote = Self::remote_addrs(session_id, &remote_answer);

        let mut negotiator = managed.negotiator.lock().await;
        if let Err(err) = negotiator.process_answer(remote_answer) {
            drop(negotiator);
            self.event_handler.on_session_error(session_id, &err.kind);
            return Err(err);
        }
        let negotiated = negotiator.negotiated().expect("process_answer succeeded");
        drop(negotiator);

        managed.media_session.set_direction(negotiated.direction).await?;
        managed.media_session.set_payload_type(negotiated.payload_type).await?;
        managed.media_session.set_ptime(negotiated.ptime_ms).await?;
        if let Ok((rtp, rtcp)) = remote {
            managed.media_session.set_remote(rtp, rtcp);
        }

        self.event_handler.on_sdp_negotiated(session_id, "", &remote_sdp_text);
        self.event_handler.on_session_updated(session_id);
        Ok(())
    }

    pub async fn get_session(&self, session_id: &str) -> Result<Arc<MediaSession>, Error> {
        Ok(self.managed(session_id).await?.media_session.clone())
    }

    pub async fn list_sessions(&self) -> Vec<String> {
        self.sessions.lock().await.keys().cloned().collect()
    }

    /// Ports currently held by any session, for diagnostics and tests.
    pub fn used_ports(&self) -> Vec<u16> {
        self.port_allocator.used()
    }

    pub async fn session_statistics(&self, session_id: &str) -> Result<Statistics, Error> {
        Ok(self.managed(session_id).await?.media_session.statistics().await)
    }

    pub async fn negotiation_state(&self, session_id: &str) -> Result<crate::negotiator::NegotiationState, Error> {
        Ok(self.managed(session_id).await?.negotiator.lock().await.state())
    }

    /// Stops the session, releases its port pair, removes it from the map,
    /// and fires `on_session_closed`.
    pub async fn close_session(&self, session_id: &str) -> Result<(), Error> {
        let managed = self
            .sessions
            .lock()
            .await
            .remove(session_id)
            .ok_or_else(|| Error::with_session(session_id.to_owned(), ErrorKind::NotFound(NotFoundKind::Session)))?;

        managed.media_session.stop().await;
        let _ = self.port_allocator.release_pair(managed.port_pair);

        self.event_handler.on_session_closed(session_id);
        Ok(())
    }

    fn spawn_eviction_task(self: Arc<Self>) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(self.config.cleanup_interval);
            interval.tick().await; // first tick fires immediately; skip it

            loop {
                interval.tick().await;
                self.evict_idle_sessions().await;
            }
        })
    }

    async fn evict_idle_sessions(&self) {
        let now = std::time::Instant::now();
        let timeout = self.config.session_timeout;

        let idle: Vec<String> = {
            let sessions = self.sessions.lock().await;
            let mut idle = Vec::new();
            for (id, managed) in sessions.iter() {
                let stats = managed.media_session.statistics().await;
                if now.duration_since(stats.last_activity) > timeout {
                    idle.push(id.clone());
                }
            }
            idle
        };

        for id in idle {
            if self.close_session(&id).await.is_ok() {
                log::info!("evicted idle session {id}");
            }
        }
    }

    /// Stops the eviction task, closes every session, and resets the port
    /// allocator.
    pub async fn stop_all(&self) {
        if let Some(task) = self.eviction_task.lock().await.take() {
            task.abort();
        }

        let ids: Vec<String> = self.sessions.lock().await.keys().cloned().collect();
        for id in ids {
            let _ = self.close_session(&id).await;
        }

        self.port_allocator.reset();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::Ipv4Addr;

    fn config(min: u16, max: u16) -> ManagerConfig {
        ManagerConfig {
            host: IpAddr::V4(Ipv4Addr::new(127, 0, 0, 1)),
            port_range: PortRange::new(min, max).unwrap(),
            max_sessions: 2,
            cleanup_interval: Duration::from_secs(300),
            session_timeout: Duration::from_secs(1800),
            default_ptime_ms: 20,
            strict_answer: true,
            codec_names: vec!["PCMU", "PCMA"],
            dtmf_enabled: true,
            dtmf_payload_type: Some(101),
            rtcp_enabled: false,
            rtcp_interval: Duration::from_secs(5),
        }
    }

    #[tokio::test]
    async fn create_session_enforces_capacity_and_uniqueness() {
        let manager = SessionManager::new(config(21000, 21020), Arc::new(NullEventHandler));

        manager.create_session("a", Direction::SendRecv).await.unwrap();

        assert!(matches!(
            manager.create_session("a", Direction::SendRecv).await,
            Err(Error { kind: ErrorKind::DuplicateSessionId(_), .. })
        ));

        manager.create_session("b", Direction::SendRecv).await.unwrap();
        assert!(matches!(
            manager.create_session("c", Direction::SendRecv).await,
            Err(Error { kind: ErrorKind::CapacityExceeded { .. }, .. })
        ));

        manager.stop_all().await;
    }

    #[tokio::test]
    async fn offer_answer_round_trip_negotiates_and_updates_sessions() {
        let manager_a = SessionManager::new(config(21100, 21120), Arc::new(NullEventHandler));
        let manager_b = SessionManager::new(config(21200, 21220), Arc::new(NullEventHandler));

        manager_a.create_session("call-1", Direction::SendRecv).await.unwrap();
        manager_b.create_session("call-1", Direction::SendRecv).await.unwrap();

        let offer = manager_a.create_offer("call-1", Direction::SendRecv).await.unwrap();
        let answer = manager_b.create_answer("call-1", offer).await.unwrap();
        manager_a.update_session("call-1", answer).await.unwrap();

        let session_a = manager_a.get_session("call-1").await.unwrap();
        assert_eq!(session_a.statistics().await.audio_packets_sent, 0);

        manager_a.stop_all().await;
        manager_b.stop_all().await;
    }

    #[tokio::test]
    async fn close_session_releases_its_ports() {
        let manager = SessionManager::new(config(21300, 21320), Arc::new(NullEventHandler));
        manager.create_session("a", Direction::SendRecv).await.unwrap();

        assert!(!manager.port_allocator.used().is_empty());
        manager.close_session("a").await.unwrap();
        assert!(manager.port_allocator.used().is_empty());

        manager.stop_all().await;
    }

    #[tokio::test]
    async fn closing_unknown_session_is_not_found() {
        let manager = SessionManager::new(config(21400, 21420), Arc::new(NullEventHandler));
        assert!(matches!(
            manager.close_session("ghost").await,
            Err(Error { kind: ErrorKind::NotFound(NotFoundKind::Session), .. })
        ));
        manager.stop_all().await;
    }
}
