//! Session worker thread
//!
//! Tag operations block, so the session runs on its own thread. Requests and
//! tag presentations arrive through one channel and are handled strictly in
//! order.

use std::fmt;
use std::thread::{self, JoinHandle};

use crossbeam_channel::{Receiver, Sender, unbounded};
use nfc_access_tag::TagTransport;
use tracing::{debug, info, warn};

use crate::error::WorkerError;
use crate::event::{SessionEventReceiver, SessionEventSender, session_event_channel};
use crate::request::PendingRequest;
use crate::session::TagSession;

/// Messages accepted by the worker
pub enum SessionCommand {
    /// Make a request pending
    Submit(PendingRequest),
    /// A tag entered the field
    TagPresent(Box<dyn TagTransport>),
    /// Drop the pending request
    Cancel,
    /// Add an event subscriber
    Subscribe(SessionEventSender),
    /// Stop the worker
    Shutdown,
}

impl fmt::Debug for SessionCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Submit(request) => f.debug_tuple("Submit").field(&request.kind()).finish(),
            Self::TagPresent(tag) => f.debug_tuple("TagPresent").field(tag).finish(),
            Self::Cancel => f.write_str("Cancel"),
            Self::Subscribe(_) => f.write_str("Subscribe"),
            Self::Shutdown => f.write_str("Shutdown"),
        }
    }
}

/// Owns a [`TagSession`] on a background thread
#[derive(Debug)]
pub struct SessionWorker {
    sender: Sender<SessionCommand>,
    handle: Option<JoinHandle<TagSession>>,
}

impl SessionWorker {
    /// Move `session` onto a new worker thread
    pub fn spawn(session: TagSession) -> Result<Self, WorkerError> {
        let (sender, receiver) = unbounded();
        let handle = thread::Builder::new()
            .name("tag-session".into())
            .spawn(move || run(session, &receiver))
            .map_err(|e| WorkerError::Spawn(e.to_string()))?;

        Ok(Self {
            sender,
            handle: Some(handle),
        })
    }

    /// Sender for feeding the worker from another thread, such as a reader monitor
    pub fn commands(&self) -> Sender<SessionCommand> {
        self.sender.clone()
    }

    /// Receive every event emitted from now on
    pub fn subscribe(&self) -> Result<SessionEventReceiver, WorkerError> {
        let (sender, receiver) = session_event_channel();
        self.send(SessionCommand::Subscribe(sender))?;
        Ok(receiver)
    }

    /// Make `request` the pending request
    pub fn submit(&self, request: impl Into<PendingRequest>) -> Result<(), WorkerError> {
        self.send(SessionCommand::Submit(request.into()))
    }

    /// Drop the pending request
    pub fn cancel(&self) -> Result<(), WorkerError> {
        self.send(SessionCommand::Cancel)
    }

    /// Hand a presented tag to the session
    pub fn tag_present(&self, tag: Box<dyn TagTransport>) -> Result<(), WorkerError> {
        self.send(SessionCommand::TagPresent(tag))
    }

    /// Stop the worker and take the session back
    pub fn shutdown(mut self) -> Result<TagSession, WorkerError> {
        self.stop()
    }

    fn send(&self, command: SessionCommand) -> Result<(), WorkerError> {
        self.sender.send(command).map_err(|_| WorkerError::Stopped)
    }

    fn stop(&mut self) -> Result<TagSession, WorkerError> {
        let handle = self.handle.take().ok_or(WorkerError::Stopped)?;
        // The thread may already be gone; joining still reports how it ended
        let _ = self.sender.send(SessionCommand::Shutdown);
        handle.join().map_err(|_| WorkerError::Stopped)
    }
}

impl Drop for SessionWorker {
    fn drop(&mut self) {
        if self.handle.is_some() {
            if let Err(e) = self.stop() {
                warn!(error = %e, "Session worker did not stop cleanly");
            }
        }
    }
}

fn run(mut session: TagSession, receiver: &Receiver<SessionCommand>) -> TagSession {
    info!("Session worker started");
    for command in receiver {
        debug!(?command, "Session command");
        match command {
            SessionCommand::Submit(request) => {
                session.submit(request);
            }
            SessionCommand::TagPresent(mut tag) => {
                session.on_tag_present(&mut *tag);
            }
            SessionCommand::Cancel => {
                session.cancel();
            }
            SessionCommand::Subscribe(sender) => session.add_subscriber(sender),
            SessionCommand::Shutdown => break,
        }
    }
    info!("Session worker stopped");
    session
}
