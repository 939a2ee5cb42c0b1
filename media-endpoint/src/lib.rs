//! # media-endpoint
//!
//! Session lifecycle of media endpoints and the glue between an endpoint,
//! the pipeline that owns it and the transport that serves it.
//!
//! An [`EndpointSession`] moves through `Idle → Starting → Active → Ending →
//! Terminated` as the transport reports what it sees, and announces the
//! milestones (`SessionStarted`, `EndOfStream`, `SessionTerminated`) to the
//! observers registered for them. Delivery is synchronous, ordered and
//! isolates failing observers.
//!
//! ```no_run
//! use media_endpoint::{EndpointConfiguration, EndpointKind, InMemoryPipeline, MediaPipeline};
//! use media_endpoint::event::LifecycleEventKind;
//! use media_endpoint::event::bus::observer;
//!
//! # fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let pipeline = MediaPipeline::new(InMemoryPipeline::new("127.0.0.1", 8888));
//! let config = EndpointConfiguration::default();
//!
//! let player = pipeline.create_endpoint(
//!     EndpointKind::Player { uri: "http://files.example.com/video.webm".to_owned() },
//!     &config,
//! )?;
//! let http = pipeline.create_endpoint(EndpointKind::HttpGet, &config)?;
//! pipeline.connect(&player, &http)?;
//!
//! http.session().register_observer(
//!     LifecycleEventKind::EndOfStream,
//!     observer(|event| {
//!         println!("{event}");
//!         Ok(())
//!     }),
//! );
//!
//! println!("serving at {}", pipeline.public_url(http.handle())?);
//! # Ok(())
//! # }
//! ```

#![warn(rust_2018_idioms)]

pub mod configuration;
pub mod event;
pub mod pipeline;
pub mod session;
pub mod transport;

pub use configuration::{EndpointConfiguration, EndpointConfigurationBuilder};
pub use event::{LifecycleEvent, LifecycleEventKind, SessionId};
pub use pipeline::in_memory::InMemoryPipeline;
pub use pipeline::{
    Endpoint, EndpointHandle, EndpointKind, EndpointParams, MediaPipeline, PipelineResource,
};
pub use session::EndpointSession;
pub use session::state::{EndpointSessionState, TerminationReason};
pub use transport::{EndpointTransportHandler, TransportCommand, TransportEvent};
