use serde::{Deserialize, Serialize};
use shared::error::*;

use crate::candidate::CandidateType;
use crate::classifier::configuration_directive;
use crate::url::Url;

/// The credential triple needed to use a TURN relay.
///
/// All three fields are non-empty; [`RelayConfig::new`] refuses anything else.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelayConfig {
    server_url: String,
    username: String,
    password: String,
}

impl RelayConfig {
    pub fn new(
        server_url: impl Into<String>,
        username: impl Into<String>,
        password: impl Into<String>,
    ) -> Result<Self> {
        let server_url = server_url.into();
        let username = username.into();
        let password = password.into();

        if server_url.is_empty() {
            return Err(Error::ErrNoRelayServer);
        }
        if !Url::parse_url(&server_url)?.is_turn() {
            return Err(Error::ErrSchemeType);
        }
        match (username.is_empty(), password.is_empty()) {
            (true, true) => return Err(Error::ErrNoTurnCredentials),
            (true, false) | (false, true) => return Err(Error::ErrTurnCredentials),
            (false, false) => {}
        }

        Ok(Self {
            server_url,
            username,
            password,
        })
    }

    pub fn server_url(&self) -> &str {
        &self.server_url
    }

    pub fn username(&self) -> &str {
        &self.username
    }

    pub fn password(&self) -> &str {
        &self.password
    }

    /// Returns the directive the transport runs to install this relay.
    pub fn directive(&self) -> String {
        configuration_directive(
            CandidateType::Relay,
            &self.server_url,
            &self.username,
            &self.password,
        )
        .unwrap_or_default()
    }
}

/// IceServer describes a single STUN and TURN server that can be used by
/// the ICE agent to establish a connection with a peer.
#[derive(Default, Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct IceServer {
    pub urls: Vec<String>,
    pub username: String,
    pub credential: String,
}

impl IceServer {
    pub fn validate(&self) -> Result<()> {
        self.urls()?;
        Ok(())
    }

    /// Parses every url, requiring credentials for TURN urls.
    pub fn urls(&self) -> Result<Vec<Url>> {
        let mut urls = vec![];

        for url_str in &self.urls {
            let url = Url::parse_url(url_str)?;
            if url.is_turn() && (self.username.is_empty() || self.credential.is_empty()) {
                return Err(Error::ErrNoTurnCredentials);
            }
            urls.push(url);
        }

        Ok(urls)
    }

    /// Returns the relay configuration of the first TURN url, if any.
    pub fn relay_config(&self) -> Result<Option<RelayConfig>> {
        for (raw, url) in self.urls.iter().zip(self.urls()?) {
            if url.is_turn() {
                return RelayConfig::new(
                    raw.as_str(),
                    self.username.as_str(),
                    self.credential.as_str(),
                )
                .map(Some);
            }
        }
        Ok(None)
    }
}
