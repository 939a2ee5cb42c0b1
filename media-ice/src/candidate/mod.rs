
use serde::{Deserialize, Serialize};
use shared::error::*;
use std::fmt;
use std::str::FromStr;

const CANDIDATE_TYPE_HOST_STR: &str = "host";
const CANDIDATE_TYPE_SRFLX_STR: &str = "srflx";
const CANDIDATE_TYPE_RELAY_STR: &str = "relay";
const CANDIDATE_TYPE_ALL_STR: &str = "all";

/// Prefix carried by the `a=candidate` attribute value when it comes
/// straight from a browser.
pub(crate) const CANDIDATE_PREFIX: &str = "candidate:";

/// Represents the type of candidate `CandidateType` enum.
///
/// `Any` never describes a gathered candidate. It only appears where a set
/// of candidate types is selected, e.g. as the filter of an endpoint that
/// accepts every path.
#[derive(Default, Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CandidateType {
    #[serde(rename = "host")]
    Host,
    #[serde(rename = "srflx")]
    ServerReflexive,
    #[serde(rename = "relay")]
    Relay,
    #[default]
    #[serde(rename = "all")]
    Any,
}

impl CandidateType {
    /// Canonical lowercase label used in logs and towards the transport.
    pub const fn label(self) -> &'static str {
        match self {
            CandidateType::Host => CANDIDATE_TYPE_HOST_STR,
            CandidateType::ServerReflexive => CANDIDATE_TYPE_SRFLX_STR,
            CandidateType::Relay => CANDIDATE_TYPE_RELAY_STR,
            CandidateType::Any => CANDIDATE_TYPE_ALL_STR,
        }
    }

    /// Reports whether a candidate of type `other` passes this type used
    /// as a filter.
    pub fn accepts(self, other: CandidateType) -> bool {
        self == CandidateType::Any || self == other
    }

    /// Relay paths need TURN credentials pushed to the transport.
    pub fn needs_relay_config(self) -> bool {
        matches!(self, CandidateType::Relay)
    }
}

// String makes CandidateType printable
impl fmt::Display for CandidateType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.label())
    }
}

impl FromStr for CandidateType {
    type Err = Error;

    fn from_str(raw: &str) -> Result<Self> {
        match raw {
            CANDIDATE_TYPE_HOST_STR => Ok(CandidateType::Host),
            CANDIDATE_TYPE_SRFLX_STR => Ok(CandidateType::ServerReflexive),
            CANDIDATE_TYPE_RELAY_STR => Ok(CandidateType::Relay),
            CANDIDATE_TYPE_ALL_STR => Ok(CandidateType::Any),
            _ => Err(Error::ErrUnknownCandidateType),
        }
    }
}

/// Convey transport addresses related to the candidate, useful for diagnostics and other purposes.
#[derive(PartialEq, Eq, Debug, Clone)]
pub struct CandidateRelatedAddress {
    pub address: String,
    pub port: u16,
}

// String makes CandidateRelatedAddress printable
impl fmt::Display for CandidateRelatedAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, " related {}:{}", self.address, self.port)
    }
}

/// A discovered candidate as the transport reports it.
///
/// `typ` keeps the raw type token (`host`, `srflx`, `prflx`, `relay`); turning
/// it into a [`CandidateType`] is the classifier's job.
#[derive(Default, PartialEq, Eq, Debug, Clone)]
pub struct CandidateDescriptor {
    pub foundation: String,
    pub component: u16,
    pub protocol: String,
    pub priority: u32,
    pub address: String,
    pub port: u16,
    pub typ: String,
    pub related_address: Option<CandidateRelatedAddress>,
    pub tcp_type: Option<String>,

    /// The STUN or TURN server the candidate was gathered from, if any.
    pub url: Option<String>,
}

impl CandidateDescriptor {
    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.url = Some(url.into());
        self
    }

    /// Returns the string representation of the candidate attribute.
    pub fn marshal(&self) -> String {
        let mut val = format!(
            "{} {} {} {} {} {} typ {}",
            self.foundation,
            self.component,
            self.protocol,
            self.priority,
            self.address,
            self.port,
            self.typ
        );

        if let Some(tcp_type) = &self.tcp_type {
            val += format!(" tcptype {tcp_type}").as_str();
        }

        if let Some(related_address) = &self.related_address {
            val += format!(
                " raddr {} rport {}",
                related_address.address, related_address.port,
            )
            .as_str();
        }

        val
    }
}

impl fmt::Display for CandidateDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {} {}:{}",
            self.protocol, self.typ, self.address, self.port
        )?;
        if let Some(related_address) = &self.related_address {
            write!(f, "{related_address}")?;
        }
        Ok(())
    }
}

/// Creates a CandidateDescriptor from its string representation.
pub fn unmarshal_candidate(raw: &str) -> Result<CandidateDescriptor> {
    let raw = raw.trim();
    let raw = raw.strip_prefix(CANDIDATE_PREFIX).unwrap_or(raw);

    let split: Vec<&str> = raw.split_whitespace().collect();
    if split.len() < 8 {
        return Err(Error::ErrAttributeTooShortIceCandidate);
    }

    if split[6] != "typ" {
        return Err(Error::ErrParseType);
    }

    let mut candidate = CandidateDescriptor {
        foundation: split[0].to_owned(),
        component: split[1].parse()?,
        protocol: split[2].to_lowercase(),
        priority: split[3].parse()?,
        address: split[4].to_owned(),
        port: split[5].parse()?,
        typ: split[7].to_owned(),
        ..Default::default()
    };

    // Extensions come as key/value pairs; unknown keys (generation, ufrag,
    // network-id, ...) are skipped.
    let mut i = 8;
    while i + 1 < split.len() {
        match split[i] {
            "raddr" => {
                if split.len() < i + 4 || split[i + 2] != "rport" {
                    return Err(Error::ErrParseRelatedAddr);
                }
                candidate.related_address = Some(CandidateRelatedAddress {
                    address: split[i + 1].to_owned(),
                    port: split[i + 3].parse()?,
                });
                i += 4;
            }
            "tcptype" => {
                candidate.tcp_type = Some(split[i + 1].to_owned());
                i += 2;
            }
            _ => i += 2,
        }
    }

    Ok(candidate)
}
