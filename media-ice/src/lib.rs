#![warn(rust_2018_idioms)]

pub mod candidate;
pub mod classifier;
pub mod relay;
pub mod url;

pub use candidate::{CandidateDescriptor, CandidateType, unmarshal_candidate};
pub use classifier::{classify, classify_raw, configuration_directive};
pub use relay::{IceServer, RelayConfig};
