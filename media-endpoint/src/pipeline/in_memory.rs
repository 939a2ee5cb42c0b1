use log::trace;
use shared::error::{ConnectionError, Error, Result};
use shared::util::math_rand_alpha_number;
use std::collections::{HashMap, HashSet};
use std::sync::Mutex;

use super::{EndpointHandle, EndpointKind, EndpointParams, PipelineResource};

const PIPELINE_ID_LEN: usize = 16;

#[derive(Default)]
struct Topology {
    next_handle: u64,
    endpoints: HashMap<EndpointHandle, EndpointKind>,
    released: HashSet<EndpointHandle>,
    connections: HashSet<(EndpointHandle, EndpointHandle)>,
}

impl Topology {
    fn lookup(
        &self,
        handle: EndpointHandle,
    ) -> std::result::Result<&EndpointKind, ConnectionError> {
        match self.endpoints.get(&handle) {
            Some(kind) => Ok(kind),
            None if self.released.contains(&handle) => {
                Err(ConnectionError::Released(handle.to_string()))
            }
            None => Err(ConnectionError::UnknownEndpoint(handle.to_string())),
        }
    }
}

/// A [`PipelineResource`] that only keeps track of endpoints and their
/// connections. No media moves; the transport is expected to drive the
/// sessions.
pub struct InMemoryPipeline {
    id: String,
    host: String,
    port: u16,
    topology: Mutex<Topology>,
}

impl InMemoryPipeline {
    /// Creates a pipeline whose HTTP endpoints are served from `host:port`.
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            id: math_rand_alpha_number(PIPELINE_ID_LEN),
            host: host.into(),
            port,
            topology: Mutex::new(Topology::default()),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn is_connected(&self, source: EndpointHandle, sink: EndpointHandle) -> bool {
        self.topology
            .lock()
            .map(|t| t.connections.contains(&(source, sink)))
            .unwrap_or(false)
    }

    pub fn endpoint_count(&self) -> usize {
        self.topology.lock().map(|t| t.endpoints.len()).unwrap_or(0)
    }
}

impl PipelineResource for InMemoryPipeline {
    fn create_endpoint(
        &self,
        kind: &EndpointKind,
        params: &EndpointParams,
    ) -> Result<EndpointHandle> {
        if let EndpointKind::Player { uri } = kind {
            if uri.is_empty() {
                return Err(Error::ErrInvalidUrl);
            }
        }

        let mut topology = self.topology.lock()?;
        topology.next_handle += 1;
        let handle = EndpointHandle(topology.next_handle);
        topology.endpoints.insert(handle, kind.clone());
        trace!(
            "pipeline {}: {kind} {handle} (terminate_on_eos={})",
            self.id, params.terminate_on_eos
        );

        Ok(handle)
    }

    fn connect(
        &self,
        source: EndpointHandle,
        sink: EndpointHandle,
    ) -> std::result::Result<(), ConnectionError> {
        let mut topology = self
            .topology
            .lock()
            .map_err(|err| ConnectionError::Other(err.to_string()))?;

        let source_kind = topology.lookup(source)?;
        let sink_kind = topology.lookup(sink)?;
        if source == sink || !source_kind.is_source() || !sink_kind.is_sink() {
            return Err(ConnectionError::Incompatible {
                source_endpoint: format!("{source_kind} {source}"),
                sink_endpoint: format!("{sink_kind} {sink}"),
            });
        }

        topology.connections.insert((source, sink));
        trace!("pipeline {}: {source} -> {sink}", self.id);
        Ok(())
    }

    fn release(&self, handle: EndpointHandle) {
        let Ok(mut topology) = self.topology.lock() else {
            return;
        };
        if topology.endpoints.remove(&handle).is_some() {
            topology.released.insert(handle);
            topology
                .connections
                .retain(|(source, sink)| *source != handle && *sink != handle);
        }
    }

    fn public_url(&self, handle: EndpointHandle) -> Result<String> {
        let topology = self.topology.lock()?;
        match topology.endpoints.get(&handle) {
            Some(EndpointKind::HttpGet) => Ok(format!(
                "http://{}:{}/{}/{}",
                self.host, self.port, self.id, handle.0
            )),
            Some(kind) => Err(Error::Other(format!("{kind} {handle} serves no public url"))),
            None if topology.released.contains(&handle) => {
                Err(Error::ErrEndpointReleased(handle.to_string()))
            }
            None => Err(Error::ErrEndpointNotFound(handle.to_string())),
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn player() -> EndpointKind {
        EndpointKind::Player {
            uri: "http://files.example.com/video.webm".to_owned(),
        }
    }

    #[test]
    fn test_public_url() -> Result<()> {
        let pipeline = InMemoryPipeline::new("127.0.0.1", 8888);
        let http = pipeline.create_endpoint(&EndpointKind::HttpGet, &EndpointParams::default())?;
        let source = pipeline.create_endpoint(&player(), &EndpointParams::default())?;

        assert_eq!(
            pipeline.public_url(http)?,
            format!("http://127.0.0.1:8888/{}/{}", pipeline.id(), http.0)
        );
        assert!(pipeline.public_url(source).is_err());

        pipeline.release(http);
        assert_eq!(
            pipeline.public_url(http),
            Err(Error::ErrEndpointReleased(http.to_string()))
        );
        assert_eq!(
            pipeline.public_url(EndpointHandle(42)),
            Err(Error::ErrEndpointNotFound("endpoint-42".to_owned()))
        );

        Ok(())
    }

    #[test]
    fn test_player_requires_uri() {
        let pipeline = InMemoryPipeline::new("127.0.0.1", 8888);
        let result = pipeline.create_endpoint(
            &EndpointKind::Player { uri: String::new() },
            &EndpointParams::default(),
        );
        assert_eq!(result, Err(Error::ErrInvalidUrl));
        assert_eq!(pipeline.endpoint_count(), 0);
    }

    #[test]
    fn test_connect() -> Result<()> {
        let pipeline = InMemoryPipeline::new("127.0.0.1", 8888);
        let params = EndpointParams::default();
        let source = pipeline.create_endpoint(&player(), &params)?;
        let sink = pipeline.create_endpoint(&EndpointKind::HttpGet, &params)?;
        let other = pipeline.create_endpoint(&EndpointKind::HttpGet, &params)?;
        pipeline.release(other);

        let tests = vec![
            (source, sink, Ok(())),
            (source, sink, Ok(())),
            (
                sink,
                source,
                Err(ConnectionError::Incompatible {
                    source_endpoint: format!("http-get {sink}"),
                    sink_endpoint: format!("player {source}"),
                }),
            ),
            (
                source,
                source,
                Err(ConnectionError::Incompatible {
                    source_endpoint: format!("player {source}"),
                    sink_endpoint: format!("player {source}"),
                }),
            ),
            (
                source,
                EndpointHandle(99),
                Err(ConnectionError::UnknownEndpoint("endpoint-99".to_owned())),
            ),
            (
                source,
                other,
                Err(ConnectionError::Released(other.to_string())),
            ),
        ];

        for (from, to, expected) in tests {
            assert_eq!(pipeline.connect(from, to), expected, "testCase: {from} -> {to}");
        }
        assert!(pipeline.is_connected(source, sink));

        pipeline.release(sink);
        assert!(!pipeline.is_connected(source, sink));
        assert_eq!(pipeline.endpoint_count(), 1);

        Ok(())
    }
}
