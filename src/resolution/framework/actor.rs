//! Resolver actors: addressable handles, mailboxes and the run loop.
//!
//! Each resolver runs as its own tokio task that drains an unbounded
//! mailbox one message at a time. Handlers are synchronous, so a resolver
//! never observes two messages concurrently and owns its state outright.

use std::any::Any;
use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::error::ResolutionError;
use crate::resolution::resolver::ResolverKind;

use super::ResolutionResult;
use super::request::Request;
use super::resolver::Resolver;
use super::response::Response;

/// Identifies a resolver within one registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ResolverId(pub(crate) u64);

impl fmt::Display for ResolverId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

// ---------------------------------------------------------------------------
// Messages
// ---------------------------------------------------------------------------

/// Everything a resolver mailbox carries.
#[derive(Debug)]
pub enum Message {
    Request { request: Request, iteration: u32 },
    Response { response: Response, iteration: u32 },
}

/// What the root resolver and failing actors report to the session.
#[derive(Debug)]
pub enum SessionEvent {
    Response { response: Response, iteration: u32 },
    Failed(ResolutionError),
}

// ---------------------------------------------------------------------------
// ResolverRef
// ---------------------------------------------------------------------------

/// A cheap, clonable address of a running resolver.
///
/// Equality, hashing and ordering go by id only.
#[derive(Clone)]
pub struct ResolverRef {
    id: ResolverId,
    name: Arc<str>,
    mailbox: mpsc::UnboundedSender<Message>,
}

impl ResolverRef {
    pub(crate) fn new(id: ResolverId, name: &str, mailbox: mpsc::UnboundedSender<Message>) -> Self {
        Self {
            id,
            name: Arc::from(name),
            mailbox,
        }
    }

    pub fn id(&self) -> ResolverId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Post a message. Fails only if the resolver has stopped.
    pub(crate) fn tell(&self, message: Message) -> ResolutionResult<()> {
        self.mailbox
            .send(message)
            .map_err(|_| ResolutionError::ActorTerminated {
                resolver: self.name.to_string(),
            })
    }
}

impl PartialEq for ResolverRef {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for ResolverRef {}

impl Hash for ResolverRef {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

impl PartialOrd for ResolverRef {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for ResolverRef {
    fn cmp(&self, other: &Self) -> Ordering {
        self.id.cmp(&other.id)
    }
}

impl fmt::Debug for ResolverRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.name, self.id)
    }
}

impl fmt::Display for ResolverRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}

// ---------------------------------------------------------------------------
// Run loop
// ---------------------------------------------------------------------------

/// Drain `mailbox` into `resolver` until the mailbox closes or a handler
/// fails. A failure is reported to the session and stops this actor.
pub(crate) async fn run(
    mut resolver: ResolverKind,
    this: ResolverRef,
    mut mailbox: mpsc::UnboundedReceiver<Message>,
    events: mpsc::UnboundedSender<SessionEvent>,
) {
    while let Some(message) = mailbox.recv().await {
        let outcome = match message {
            Message::Request { request, iteration } => {
                tracing::trace!(resolver = %this, iteration, %request, "request");
                resolver.receive_request(request, iteration)
            }
            Message::Response {
                response: Response::Answer(answer),
                iteration,
            } => {
                tracing::trace!(resolver = %this, iteration, %answer, "answer");
                resolver.receive_answer(answer, iteration)
            }
            Message::Response {
                response: Response::Exhausted(exhausted),
                iteration,
            } => {
                tracing::trace!(resolver = %this, iteration, "exhausted");
                resolver.receive_exhausted(exhausted, iteration)
            }
        };

        if let Err(error) = outcome {
            tracing::error!(resolver = %this, %error, "resolver failed, stopping");
            let _ = events.send(SessionEvent::Failed(ResolutionError::ActorFailed {
                resolver: this.name().to_string(),
                source: Box::new(error),
            }));
            break;
        }
    }
}

/// Wait for a resolver task and report it to the session if it panicked.
/// Aborted tasks end silently.
pub(crate) async fn watch(task: JoinHandle<()>, resolver: String, events: mpsc::UnboundedSender<SessionEvent>) {
    let Err(error) = task.await else {
        return;
    };
    if !error.is_panic() {
        return;
    }
    let message = panic_message(error.into_panic());
    tracing::error!(resolver = %resolver, %message, "resolver panicked");
    let _ = events.send(SessionEvent::Failed(ResolutionError::ActorFailed {
        resolver,
        source: Box::new(ResolutionError::Panicked { message }),
    }));
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    match payload.downcast::<String>() {
        Ok(message) => *message,
        Err(payload) => match payload.downcast::<&'static str>() {
            Ok(message) => (*message).to_string(),
            Err(_) => "non-string panic payload".to_string(),
        },
    }
}
