
pub mod state;

use log::{debug, trace};
use shared::error::{Error, Result};
use std::collections::VecDeque;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::thread;

use crate::configuration::EndpointConfiguration;
use crate::event::bus::{Dispatch, EventBus, Observer};
use crate::event::{LifecycleEvent, LifecycleEventKind, SessionId};
use state::{EndpointSessionState, TerminationReason};

struct SessionInner {
    state: EndpointSessionState,
    session_id: SessionId,
    /// Set once the owning endpoint is released; no further activation.
    closed: bool,
    bus: EventBus,
    /// Events already snapshotted against their observers, in emission order.
    pending: VecDeque<Dispatch>,
    dispatching: bool,
}

impl SessionInner {
    fn move_to(&mut self, name: &str, next: EndpointSessionState) {
        debug!(
            "endpoint {name}: session {} {} -> {next}",
            self.session_id, self.state
        );
        self.state = next;
    }

    fn emit(&mut self, event: LifecycleEvent) {
        let dispatch = self.bus.dispatch(event);
        self.pending.push_back(dispatch);
    }

    // Queues `SessionTerminated{Released}` for a live session.
    fn terminate(&mut self, name: &str) {
        match self.state {
            EndpointSessionState::Terminated => {}
            EndpointSessionState::Idle => {
                self.move_to(name, EndpointSessionState::Terminated);
            }
            _ => {
                self.move_to(name, EndpointSessionState::Terminated);
                let event = LifecycleEvent::session_terminated(
                    self.session_id.clone(),
                    TerminationReason::Released,
                );
                self.emit(event);
            }
        }
    }
}

/// Lifecycle state machine of the media session running on one endpoint.
///
/// The transport integration drives it through the `notify_*` calls; callers
/// on any thread may `release()` it. State changes are serialized by an
/// internal lock. Observers run after the lock is dropped, one event at a
/// time and in emission order, so an observer may call back into the same
/// session. When several threads emit concurrently, the thread already
/// delivering also delivers the events queued by the others, so a call made
/// while another thread is dispatching may return before its own event has
/// reached the observers.
pub struct EndpointSession {
    name: String,
    terminate_on_eos: bool,
    inner: Mutex<SessionInner>,
}

impl EndpointSession {
    pub fn new(name: impl Into<String>) -> Self {
        EndpointSession::with_configuration(name, &EndpointConfiguration::default())
    }

    pub fn with_configuration(name: impl Into<String>, config: &EndpointConfiguration) -> Self {
        Self {
            name: name.into(),
            terminate_on_eos: config.terminate_on_eos(),
            inner: Mutex::new(SessionInner {
                state: EndpointSessionState::Idle,
                session_id: SessionId::generate(),
                closed: false,
                bus: EventBus::new(config.diagnostic_sink()),
                pending: VecDeque::new(),
                dispatching: false,
            }),
        }
    }

    // Nothing panics while the lock is held, and observers run unlocked, so
    // a poisoned lock still guards a consistent machine.
    fn lock(&self) -> MutexGuard<'_, SessionInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn state(&self) -> EndpointSessionState {
        self.lock().state
    }

    /// Returns the id of the current (or last) activation.
    pub fn session_id(&self) -> SessionId {
        self.lock().session_id.clone()
    }

    pub fn is_closed(&self) -> bool {
        self.lock().closed
    }

    /// Registers `observer` for `kind`. Registering the same observer twice
    /// for a kind keeps one entry.
    pub fn register_observer(&self, kind: LifecycleEventKind, observer: Observer) {
        if !self.lock().bus.register(kind, observer) {
            trace!("endpoint {}: observer already registered for {kind}", self.name);
        }
    }

    /// Unregisters `observer` for `kind`; unknown observers are ignored.
    pub fn unregister_observer(&self, kind: LifecycleEventKind, observer: &Observer) {
        self.lock().bus.unregister(kind, observer);
    }

    pub fn observer_count(&self, kind: LifecycleEventKind) -> usize {
        self.lock().bus.observer_count(kind)
    }

    /// First inbound activity: `Idle → Starting`, emitting `SessionStarted`.
    ///
    /// On a terminated session this starts a new activation with a fresh
    /// session id, unless the endpoint has been released.
    pub fn notify_started(&self) -> Result<()> {
        {
            let mut inner = self.lock();
            match inner.state {
                EndpointSessionState::Idle => {}
                EndpointSessionState::Terminated if inner.closed => {
                    return Err(Error::ErrEndpointReleased(self.name.clone()));
                }
                EndpointSessionState::Terminated => {
                    inner.session_id = SessionId::generate();
                    inner.state = EndpointSessionState::Idle;
                }
                state => return Err(invalid_transition(state, "notify_started")),
            }

            inner.move_to(&self.name, EndpointSessionState::Starting);
            let event = LifecycleEvent::session_started(inner.session_id.clone());
            inner.emit(event);
        }

        self.drain();
        Ok(())
    }

    /// First bytes exchanged: `Starting → Active`. Emits nothing.
    pub fn notify_data_flowing(&self) -> Result<()> {
        let mut inner = self.lock();
        match inner.state {
            EndpointSessionState::Starting => {
                inner.move_to(&self.name, EndpointSessionState::Active);
                Ok(())
            }
            state => Err(invalid_transition(state, "notify_data_flowing")),
        }
    }

    /// Upstream exhausted: `Active → Ending`, emitting `EndOfStream`.
    ///
    /// A session still `Starting` passes through `Active`, since a source can
    /// only run dry after it produced. With `terminate_on_eos` the session
    /// then terminates normally.
    pub fn notify_end_of_stream(&self) -> Result<()> {
        {
            let mut inner = self.lock();
            match inner.state {
                EndpointSessionState::Starting => {
                    inner.move_to(&self.name, EndpointSessionState::Active);
                }
                EndpointSessionState::Active => {}
                state => return Err(invalid_transition(state, "notify_end_of_stream")),
            }

            inner.move_to(&self.name, EndpointSessionState::Ending);
            let event = LifecycleEvent::end_of_stream(inner.session_id.clone());
            inner.emit(event);

            if self.terminate_on_eos {
                inner.move_to(&self.name, EndpointSessionState::Terminated);
                let event = LifecycleEvent::session_terminated(
                    inner.session_id.clone(),
                    TerminationReason::Normal,
                );
                inner.emit(event);
            }
        }

        self.drain();
        Ok(())
    }

    /// Ends an active session: `Active | Ending → Terminated`, emitting
    /// `SessionTerminated{reason}`. A session still `Starting` can only be
    /// ended by [`release`](Self::release).
    pub fn notify_terminated(&self, reason: TerminationReason) -> Result<()> {
        {
            let mut inner = self.lock();
            match inner.state {
                EndpointSessionState::Active | EndpointSessionState::Ending => {}
                state => return Err(invalid_transition(state, "notify_terminated")),
            }

            inner.move_to(&self.name, EndpointSessionState::Terminated);
            let event = LifecycleEvent::session_terminated(inner.session_id.clone(), reason);
            inner.emit(event);
        }

        self.drain();
        Ok(())
    }

    /// Ends a live session on behalf of the transport or the pipeline.
    ///
    /// A session still `Starting` passes through `Active`, as for end of
    /// stream, so `reason` is kept instead of becoming `Released`.
    pub(crate) fn abort(&self, reason: TerminationReason) -> Result<()> {
        {
            let mut inner = self.lock();
            match inner.state {
                EndpointSessionState::Starting => {
                    inner.move_to(&self.name, EndpointSessionState::Active);
                }
                EndpointSessionState::Active | EndpointSessionState::Ending => {}
                state => return Err(invalid_transition(state, "abort")),
            }

            inner.move_to(&self.name, EndpointSessionState::Terminated);
            let event = LifecycleEvent::session_terminated(inner.session_id.clone(), reason);
            inner.emit(event);
        }

        self.drain();
        Ok(())
    }

    /// Forces the session to `Terminated`.
    ///
    /// A live session emits `SessionTerminated{Released}`; an idle one never
    /// announced itself and terminates silently. Releasing a terminated
    /// session does nothing.
    pub fn release(&self) {
        self.lock().terminate(&self.name);
        self.drain();
    }

    /// Endpoint teardown: releases the session, then drops every observer
    /// and refuses later activations, all under one lock acquisition.
    pub(crate) fn close(&self) {
        {
            let mut inner = self.lock();
            inner.terminate(&self.name);
            inner.closed = true;
            inner.bus.clear();
        }
        self.drain();
    }

    fn drain(&self) {
        {
            let mut inner = self.lock();
            if inner.dispatching {
                return;
            }
            inner.dispatching = true;
        }

        let _guard = DispatchGuard(self);
        loop {
            let next = {
                let mut inner = self.lock();
                let next = inner.pending.pop_front();
                if next.is_none() {
                    inner.dispatching = false;
                }
                next
            };

            match next {
                Some(dispatch) => {
                    dispatch.deliver();
                }
                None => return,
            }
        }
    }
}

// Hands dispatching back if delivery unwinds, so later emissions still drain.
struct DispatchGuard<'a>(&'a EndpointSession);

impl Drop for DispatchGuard<'_> {
    fn drop(&mut self) {
        if thread::panicking() {
            self.0.lock().dispatching = false;
        }
    }
}

fn invalid_transition(state: EndpointSessionState, operation: &'static str) -> Error {
    Error::InvalidTransition {
        state: state.to_string(),
        operation,
    }
}
