pub mod in_memory;

use log::{debug, warn};
use shared::error::{ConnectionError, Error, Result};
use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex};

use crate::configuration::EndpointConfiguration;
use crate::event::LifecycleEventKind;
use crate::event::bus::{Observer, observer};
use crate::session::EndpointSession;
use crate::session::state::TerminationReason;

/// Opaque reference to an endpoint owned by a [`PipelineResource`].
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub struct EndpointHandle(pub u64);

impl fmt::Display for EndpointHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "endpoint-{}", self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EndpointKind {
    /// Serves the media it is fed to HTTP clients at a public url.
    HttpGet,
    /// Reads media from `uri` and feeds the endpoints it is connected to.
    Player { uri: String },
}

impl EndpointKind {
    pub fn is_source(&self) -> bool {
        matches!(self, EndpointKind::Player { .. })
    }

    pub fn is_sink(&self) -> bool {
        matches!(self, EndpointKind::HttpGet)
    }
}

impl fmt::Display for EndpointKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EndpointKind::HttpGet => write!(f, "http-get"),
            EndpointKind::Player { .. } => write!(f, "player"),
        }
    }
}

/// Construction parameters handed to the pipeline along with the kind.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct EndpointParams {
    pub terminate_on_eos: bool,
}

/// Owner of endpoint construction and connection topology.
///
/// Implementations are shared between threads; every method takes `&self`.
pub trait PipelineResource: Send + Sync {
    fn create_endpoint(&self, kind: &EndpointKind, params: &EndpointParams)
    -> Result<EndpointHandle>;

    /// Routes the media of `source` into `sink`.
    fn connect(
        &self,
        source: EndpointHandle,
        sink: EndpointHandle,
    ) -> std::result::Result<(), ConnectionError>;

    /// Tears the endpoint down. Unknown handles are ignored.
    fn release(&self, handle: EndpointHandle);

    /// Returns the url clients use to reach a transport-exposed endpoint.
    fn public_url(&self, handle: EndpointHandle) -> Result<String>;
}

/// An endpoint handle paired with the session running on it.
#[derive(Clone)]
pub struct Endpoint {
    handle: EndpointHandle,
    kind: EndpointKind,
    session: Arc<EndpointSession>,
}

impl Endpoint {
    pub fn handle(&self) -> EndpointHandle {
        self.handle
    }

    pub fn kind(&self) -> &EndpointKind {
        &self.kind
    }

    pub fn session(&self) -> &Arc<EndpointSession> {
        &self.session
    }
}

/// MediaPipeline creates endpoints through a [`PipelineResource`] and keeps
/// each one's [`EndpointSession`] in step with it.
///
/// Releasing an endpoint closes its session, a failed connection terminates
/// the live sessions involved, and the end of a source's stream is forwarded
/// to the sinks it feeds.
pub struct MediaPipeline<P: PipelineResource> {
    resource: P,
    endpoints: Mutex<HashMap<EndpointHandle, Endpoint>>,
    /// End of stream forwarders registered on sources, by (source, sink).
    forwarders: Mutex<HashMap<(EndpointHandle, EndpointHandle), Observer>>,
}

impl<P: PipelineResource> MediaPipeline<P> {
    pub fn new(resource: P) -> Self {
        Self {
            resource,
            endpoints: Mutex::new(HashMap::new()),
            forwarders: Mutex::new(HashMap::new()),
        }
    }

    pub fn resource(&self) -> &P {
        &self.resource
    }

    pub fn create_endpoint(
        &self,
        kind: EndpointKind,
        config: &EndpointConfiguration,
    ) -> Result<Endpoint> {
        let params = EndpointParams {
            terminate_on_eos: config.terminate_on_eos(),
        };
        let handle = self.resource.create_endpoint(&kind, &params)?;
        let session = Arc::new(EndpointSession::with_configuration(
            format!("{kind}/{handle}"),
            config,
        ));

        let endpoint = Endpoint {
            handle,
            kind,
            session,
        };
        self.endpoints.lock()?.insert(handle, endpoint.clone());
        debug!("created {} endpoint {handle}", endpoint.kind);

        Ok(endpoint)
    }

    pub fn endpoint(&self, handle: EndpointHandle) -> Result<Endpoint> {
        self.endpoints
            .lock()?
            .get(&handle)
            .cloned()
            .ok_or_else(|| Error::ErrEndpointNotFound(handle.to_string()))
    }

    /// Connects `source` to `sink`.
    ///
    /// A rejected connection terminates both sessions with
    /// [`TerminationReason::Error`] if they are live, and is returned as
    /// [`Error::Connection`]. Connecting the same pair again forwards end of
    /// stream only once.
    pub fn connect(&self, source: &Endpoint, sink: &Endpoint) -> Result<()> {
        if let Err(err) = self.resource.connect(source.handle, sink.handle) {
            warn!("connecting {} to {} failed: {err}", source.handle, sink.handle);
            for endpoint in [source, sink] {
                if !endpoint.session.state().is_live() {
                    continue;
                }
                if let Err(abort_err) = endpoint.session.abort(TerminationReason::Error) {
                    debug!("{} not terminated: {abort_err}", endpoint.handle);
                }
            }
            return Err(err.into());
        }

        let mut forwarders = self.forwarders.lock()?;
        if forwarders.contains_key(&(source.handle, sink.handle)) {
            return Ok(());
        }

        let downstream = Arc::downgrade(&sink.session);
        let forwarder = observer(move |_| {
            let Some(sink) = downstream.upgrade() else {
                return Ok(());
            };
            if let Err(err) = sink.notify_end_of_stream() {
                debug!("end of stream not forwarded to {}: {err}", sink.name());
            }
            Ok(())
        });
        source
            .session
            .register_observer(LifecycleEventKind::EndOfStream, forwarder.clone());
        forwarders.insert((source.handle, sink.handle), forwarder);

        Ok(())
    }

    /// Releases the endpoint and closes its session.
    pub fn release(&self, handle: EndpointHandle) -> Result<()> {
        let endpoint = self
            .endpoints
            .lock()?
            .remove(&handle)
            .ok_or_else(|| Error::ErrEndpointNotFound(handle.to_string()))?;

        self.drop_forwarders(handle)?;
        self.resource.release(handle);
        endpoint.session.close();
        debug!("released endpoint {handle}");

        Ok(())
    }

    /// Releases every endpoint still owned by this pipeline.
    pub fn close(&self) -> Result<()> {
        self.forwarders.lock()?.clear();
        let endpoints: Vec<Endpoint> = self.endpoints.lock()?.drain().map(|(_, e)| e).collect();
        for endpoint in endpoints {
            self.resource.release(endpoint.handle);
            endpoint.session.close();
        }
        Ok(())
    }

    // Unregisters the forwarders `handle` takes part in from the sources
    // that are still around.
    fn drop_forwarders(&self, handle: EndpointHandle) -> Result<()> {
        let mut dropped = vec![];
        self.forwarders.lock()?.retain(|&(source, sink), forwarder| {
            if source == handle || sink == handle {
                dropped.push((source, forwarder.clone()));
                false
            } else {
                true
            }
        });

        let endpoints = self.endpoints.lock()?;
        for (source, forwarder) in dropped {
            if let Some(endpoint) = endpoints.get(&source) {
                endpoint
                    .session
                    .unregister_observer(LifecycleEventKind::EndOfStream, &forwarder);
            }
        }
        Ok(())
    }

    pub fn public_url(&self, handle: EndpointHandle) -> Result<String> {
        let url = self.resource.public_url(handle)?;
        if url.is_empty() {
            return Err(Error::ErrEmptyPublicUrl(handle.to_string()));
        }
        Ok(url)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::event::LifecycleEvent;
    use crate::pipeline::in_memory::InMemoryPipeline;
    use crate::session::state::EndpointSessionState;

    /// Accepts everything, serves an empty url and refuses connections.
    #[derive(Default)]
    struct FaultyPipeline {
        next: Mutex<u64>,
    }

    impl PipelineResource for FaultyPipeline {
        fn create_endpoint(&self, _: &EndpointKind, _: &EndpointParams) -> Result<EndpointHandle> {
            let mut next = self.next.lock()?;
            *next += 1;
            Ok(EndpointHandle(*next))
        }

        fn connect(
            &self,
            _source: EndpointHandle,
            _sink: EndpointHandle,
        ) -> std::result::Result<(), ConnectionError> {
            Err(ConnectionError::RelayCredentialsRejected(
                "turn:example.com".to_owned(),
            ))
        }

        fn release(&self, _handle: EndpointHandle) {}

        fn public_url(&self, _handle: EndpointHandle) -> Result<String> {
            Ok(String::new())
        }
    }

    fn player() -> EndpointKind {
        EndpointKind::Player {
            uri: "http://files.example.com/video.webm".to_owned(),
        }
    }

    #[test]
    fn test_empty_public_url_is_collaborator_fault() -> Result<()> {
        let pipeline = MediaPipeline::new(FaultyPipeline::default());
        let http =
            pipeline.create_endpoint(EndpointKind::HttpGet, &EndpointConfiguration::default())?;

        assert_eq!(
            pipeline.public_url(http.handle()),
            Err(Error::ErrEmptyPublicUrl(http.handle().to_string()))
        );

        Ok(())
    }

    #[test]
    fn test_connect_failure_terminates_live_sessions() -> Result<()> {
        let pipeline = MediaPipeline::new(FaultyPipeline::default());
        let config = EndpointConfiguration::default();
        let source = pipeline.create_endpoint(player(), &config)?;
        let sink = pipeline.create_endpoint(EndpointKind::HttpGet, &config)?;

        let reasons = Arc::new(Mutex::new(vec![]));
        {
            let reasons = Arc::clone(&reasons);
            source.session().register_observer(
                LifecycleEventKind::SessionTerminated,
                observer(move |event: &LifecycleEvent| {
                    reasons.lock().unwrap().push(event.reason());
                    Ok(())
                }),
            );
        }

        source.session().notify_started()?;
        let err = pipeline
            .connect(&source, &sink)
            .expect_err("connection refused");
        assert_eq!(
            err,
            Error::Connection(ConnectionError::RelayCredentialsRejected(
                "turn:example.com".to_owned()
            ))
        );

        assert_eq!(source.session().state(), EndpointSessionState::Terminated);
        assert_eq!(*reasons.lock().unwrap(), vec![Some(TerminationReason::Error)]);
        // never started, so nothing to terminate
        assert_eq!(sink.session().state(), EndpointSessionState::Idle);

        Ok(())
    }

    #[test]
    fn test_connect_failure_returns_connection_error() -> Result<()> {
        let pipeline = MediaPipeline::new(FaultyPipeline::default());
        let config = EndpointConfiguration::default();
        let source = pipeline.create_endpoint(player(), &config)?;
        let sink = pipeline.create_endpoint(EndpointKind::HttpGet, &config)?;

        // a source already done and a sink still starting
        source.session().notify_started()?;
        source.session().notify_data_flowing()?;
        source.session().notify_terminated(TerminationReason::Normal)?;
        sink.session().notify_started()?;

        let err = pipeline
            .connect(&source, &sink)
            .expect_err("connection refused");
        assert!(matches!(
            err,
            Error::Connection(ConnectionError::RelayCredentialsRejected(_))
        ));
        assert_eq!(sink.session().state(), EndpointSessionState::Terminated);

        Ok(())
    }

    #[test]
    fn test_end_of_stream_forwarded_once_per_connection() -> Result<()> {
        let pipeline = MediaPipeline::new(InMemoryPipeline::new("127.0.0.1", 8888));
        let config = EndpointConfiguration::default();
        let source = pipeline.create_endpoint(player(), &config)?;
        let sink = pipeline.create_endpoint(EndpointKind::HttpGet, &config)?;

        pipeline.connect(&source, &sink)?;
        pipeline.connect(&source, &sink)?;
        assert_eq!(
            source.session().observer_count(LifecycleEventKind::EndOfStream),
            1
        );

        sink.session().notify_started()?;
        source.session().notify_started()?;
        source.session().notify_end_of_stream()?;
        assert_eq!(sink.session().state(), EndpointSessionState::Ending);

        pipeline.release(sink.handle())?;
        assert_eq!(
            source.session().observer_count(LifecycleEventKind::EndOfStream),
            0
        );

        Ok(())
    }

    #[test]
    fn test_release_closes_session() -> Result<()> {
        let pipeline = MediaPipeline::new(FaultyPipeline::default());
        let http =
            pipeline.create_endpoint(EndpointKind::HttpGet, &EndpointConfiguration::default())?;
        http.session().notify_started()?;

        pipeline.release(http.handle())?;
        assert_eq!(http.session().state(), EndpointSessionState::Terminated);
        assert!(http.session().is_closed());
        assert_eq!(
            pipeline.endpoint(http.handle()).err(),
            Some(Error::ErrEndpointNotFound(http.handle().to_string()))
        );
        assert_eq!(
            pipeline.release(http.handle()),
            Err(Error::ErrEndpointNotFound(http.handle().to_string()))
        );

        Ok(())
    }

    #[test]
    fn test_close_releases_every_endpoint() -> Result<()> {
        let pipeline = MediaPipeline::new(FaultyPipeline::default());
        let config = EndpointConfiguration::default();
        let endpoints = vec![
            pipeline.create_endpoint(player(), &config)?,
            pipeline.create_endpoint(EndpointKind::HttpGet, &config)?,
        ];

        pipeline.close()?;
        for endpoint in endpoints {
            assert!(endpoint.session().is_closed(), "testCase: {}", endpoint.kind());
        }

        Ok(())
    }
}
