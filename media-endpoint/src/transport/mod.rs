use ice::candidate::CandidateDescriptor;
use log::{debug, warn};
use shared::error::{Error, Result};
use std::collections::VecDeque;
use std::fmt;
use std::sync::{Arc, Mutex};
use std::time::Instant;

use crate::configuration::EndpointConfiguration;
use crate::event::bus::{Observer, observer};
use crate::event::{LifecycleEvent, LifecycleEventKind};
use crate::session::EndpointSession;
use crate::session::state::TerminationReason;

const LIFECYCLE_EVENT_KINDS: [LifecycleEventKind; 3] = [
    LifecycleEventKind::SessionStarted,
    LifecycleEventKind::EndOfStream,
    LifecycleEventKind::SessionTerminated,
];

/// What the transport under an endpoint observed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportEvent {
    /// A client reached the endpoint, e.g. the first HTTP request.
    RequestArrived,
    /// The first media bytes went through.
    DataFlowing,
    /// The upstream source has nothing more to send.
    SourceExhausted,
    /// The client went away.
    ConnectionLost,
    /// The transport finished its exchange.
    Closed,
    Failed(String),
}

impl fmt::Display for TransportEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransportEvent::RequestArrived => write!(f, "request-arrived"),
            TransportEvent::DataFlowing => write!(f, "data-flowing"),
            TransportEvent::SourceExhausted => write!(f, "source-exhausted"),
            TransportEvent::ConnectionLost => write!(f, "connection-lost"),
            TransportEvent::Closed => write!(f, "closed"),
            TransportEvent::Failed(reason) => write!(f, "failed: {reason}"),
        }
    }
}

/// Output for the transport to carry out.
#[derive(Debug, Clone, PartialEq)]
pub enum TransportCommand {
    /// Relay configuration to apply before connectivity checks start.
    Directive(String),
    /// A local candidate allowed by the endpoint's candidate type.
    Advertise(CandidateDescriptor),
}

/// EndpointTransportHandler feeds transport observations into an
/// [`EndpointSession`] and hands back lifecycle events and the commands the
/// transport should carry out.
pub struct EndpointTransportHandler {
    session: Arc<EndpointSession>,
    config: EndpointConfiguration,
    observer: Observer,
    event_outs: Arc<Mutex<VecDeque<LifecycleEvent>>>,
    write_outs: VecDeque<TransportCommand>,
    closed: bool,
}

impl EndpointTransportHandler {
    pub fn new(session: Arc<EndpointSession>, config: EndpointConfiguration) -> Result<Self> {
        let mut write_outs = VecDeque::new();
        if let Some(directive) = config.connectivity_directive()? {
            write_outs.push_back(TransportCommand::Directive(directive));
        }

        let event_outs = Arc::new(Mutex::new(VecDeque::new()));
        let observer = {
            let event_outs = Arc::clone(&event_outs);
            observer(move |event: &LifecycleEvent| {
                let mut event_outs = event_outs.lock().map_err(|err| err.to_string())?;
                event_outs.push_back(event.clone());
                Ok(())
            })
        };
        for kind in LIFECYCLE_EVENT_KINDS {
            session.register_observer(kind, observer.clone());
        }

        Ok(Self {
            session,
            config,
            observer,
            event_outs,
            write_outs,
            closed: false,
        })
    }

    pub fn name(&self) -> &'static str {
        "EndpointTransportHandler"
    }

    pub fn session(&self) -> &Arc<EndpointSession> {
        &self.session
    }
}

impl sansio::Protocol<TransportEvent, CandidateDescriptor, ()> for EndpointTransportHandler {
    type Rout = ();
    type Wout = TransportCommand;
    type Eout = LifecycleEvent;
    type Error = Error;
    type Time = Instant;

    fn handle_read(&mut self, msg: TransportEvent) -> Result<()> {
        debug!("endpoint {}: transport {msg}", self.session.name());
        match msg {
            TransportEvent::RequestArrived => self.session.notify_started(),
            TransportEvent::DataFlowing => self.session.notify_data_flowing(),
            TransportEvent::SourceExhausted => self.session.notify_end_of_stream(),
            TransportEvent::ConnectionLost => {
                self.session.abort(TerminationReason::ClientDisconnected)
            }
            TransportEvent::Closed => self.session.abort(TerminationReason::Normal),
            TransportEvent::Failed(reason) => {
                warn!("endpoint {}: transport failed: {reason}", self.session.name());
                self.session.abort(TerminationReason::Error)
            }
        }
    }

    fn poll_read(&mut self) -> Option<Self::Rout> {
        None
    }

    /// Queues a gathered local candidate for advertisement, unless the
    /// endpoint's candidate type filters it out.
    fn handle_write(&mut self, candidate: CandidateDescriptor) -> Result<()> {
        if self.config.accepts_candidate(&candidate)? {
            self.write_outs.push_back(TransportCommand::Advertise(candidate));
        }
        Ok(())
    }

    fn poll_write(&mut self) -> Option<Self::Wout> {
        self.write_outs.pop_front()
    }

    fn handle_event(&mut self, _evt: ()) -> Result<()> {
        Ok(())
    }

    fn poll_event(&mut self) -> Option<Self::Eout> {
        self.event_outs.lock().ok()?.pop_front()
    }

    fn handle_timeout(&mut self, _now: Instant) -> Result<()> {
        Ok(())
    }

    fn poll_timeout(&mut self) -> Option<Self::Time> {
        None
    }

    /// Releases the session. Events emitted up to here stay pollable.
    fn close(&mut self) -> Result<()> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;

        self.session.release();
        for kind in LIFECYCLE_EVENT_KINDS {
            self.session.unregister_observer(kind, &self.observer);
        }
        Ok(())
    }
}
