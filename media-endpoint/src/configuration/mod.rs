use ice::candidate::{CandidateDescriptor, CandidateType};
use ice::classifier::classify;
use ice::relay::{IceServer, RelayConfig};
use log::debug;
use shared::error::{Error, Result};
use std::sync::Arc;

use crate::event::bus::{DiagnosticSink, LogDiagnosticSink};

/// An EndpointConfiguration defines how an endpoint establishes connectivity
/// and how its sessions behave.
/// Configurations may be set up once and reused across multiple endpoints.
/// Configurations are treated as readonly.
#[derive(Clone)]
pub struct EndpointConfiguration {
    /// ice_servers defines a slice describing servers available to be used by
    /// ICE, such as STUN and TURN servers.
    pub(crate) ice_servers: Vec<IceServer>,

    /// candidate_type selects which candidates the endpoint uses; `Any`
    /// accepts every type.
    pub(crate) candidate_type: CandidateType,

    /// terminate_on_eos ends the session as soon as the source is exhausted.
    pub(crate) terminate_on_eos: bool,

    /// diagnostic_sink receives observer failures.
    pub(crate) diagnostic_sink: Arc<dyn DiagnosticSink>,
}

impl Default for EndpointConfiguration {
    fn default() -> Self {
        EndpointConfigurationBuilder::new().build()
    }
}

impl EndpointConfiguration {
    pub fn ice_servers(&self) -> &[IceServer] {
        &self.ice_servers
    }

    pub fn candidate_type(&self) -> CandidateType {
        self.candidate_type
    }

    pub fn terminate_on_eos(&self) -> bool {
        self.terminate_on_eos
    }

    pub fn diagnostic_sink(&self) -> Arc<dyn DiagnosticSink> {
        Arc::clone(&self.diagnostic_sink)
    }

    /// Returns the relay configuration of the first TURN server configured.
    pub fn relay_config(&self) -> Result<Option<RelayConfig>> {
        for ice_server in &self.ice_servers {
            if let Some(relay) = ice_server.relay_config()? {
                return Ok(Some(relay));
            }
        }
        Ok(None)
    }

    /// Returns the directive to push to the transport before connectivity
    /// checks start, if the configured candidate type needs one.
    pub fn connectivity_directive(&self) -> Result<Option<String>> {
        if !self.candidate_type.needs_relay_config() {
            return Ok(None);
        }

        match self.relay_config()? {
            Some(relay) => Ok(Some(relay.directive())),
            None => Err(Error::ErrNoRelayServer),
        }
    }

    /// Classifies `candidate` and reports whether this endpoint uses it.
    pub fn accepts_candidate(&self, candidate: &CandidateDescriptor) -> Result<bool> {
        let candidate_type = classify(candidate)?;
        let accepted = self.candidate_type.accepts(candidate_type);
        if !accepted {
            debug!(
                "dropping {candidate_type} candidate {candidate}, endpoint uses {}",
                self.candidate_type
            );
        }
        Ok(accepted)
    }
}

pub struct EndpointConfigurationBuilder {
    ice_servers: Vec<IceServer>,
    candidate_type: CandidateType,
    terminate_on_eos: bool,
    diagnostic_sink: Arc<dyn DiagnosticSink>,
}

impl Default for EndpointConfigurationBuilder {
    fn default() -> Self {
        Self {
            ice_servers: vec![],
            candidate_type: CandidateType::Any,
            terminate_on_eos: false,
            diagnostic_sink: Arc::new(LogDiagnosticSink),
        }
    }
}

impl EndpointConfigurationBuilder {
    pub fn new() -> Self {
        EndpointConfigurationBuilder::default()
    }

    pub fn with_ice_servers(mut self, ice_servers: Vec<IceServer>) -> Self {
        self.ice_servers = ice_servers;
        self
    }

    pub fn with_candidate_type(mut self, candidate_type: CandidateType) -> Self {
        self.candidate_type = candidate_type;
        self
    }

    pub fn with_terminate_on_eos(mut self, terminate_on_eos: bool) -> Self {
        self.terminate_on_eos = terminate_on_eos;
        self
    }

    pub fn with_diagnostic_sink(mut self, diagnostic_sink: Arc<dyn DiagnosticSink>) -> Self {
        self.diagnostic_sink = diagnostic_sink;
        self
    }

    pub fn build(self) -> EndpointConfiguration {
        EndpointConfiguration {
            ice_servers: self.ice_servers,
            candidate_type: self.candidate_type,
            terminate_on_eos: self.terminate_on_eos,
            diagnostic_sink: self.diagnostic_sink,
        }
    }
}
