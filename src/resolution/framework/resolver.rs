//! The resolver protocol and the state every resolver shares.
//!
//! A resolver receives three kinds of message: a request for its next
//! answer, an answer from a resolver it asked, and an exhaustion notice from
//! a resolver it asked. The default methods of [`Resolver`] implement the
//! bookkeeping common to every kind (producer lifecycle, routing, the
//! try-answer loop); each kind supplies how a producer is built and how
//! downstream answers are combined.

use std::collections::HashMap;
use std::sync::Arc;

use crate::concept::ConceptMap;
use crate::error::ResolutionError;
use crate::registry::ResolverRegistry;
use crate::resolution::answer::Derivation;

use super::ResolutionResult;
use super::actor::{Message, ResolverRef};
use super::producer::ResponseProducer;
use super::request::Request;
use super::response::{Answer, Exhausted, Response};

// ---------------------------------------------------------------------------
// ResolverCore
// ---------------------------------------------------------------------------

/// Where answers to a downstream request belong.
#[derive(Debug, Clone)]
pub struct Route {
    /// The request this resolver was serving when it asked downstream.
    pub upstream: Request,
    /// Plan position the downstream request was issued for.
    pub step: usize,
}

/// Identity, routing table and producers of one resolver.
pub struct ResolverCore {
    this: ResolverRef,
    registry: Arc<ResolverRegistry>,
    producers: HashMap<Request, ResponseProducer>,
    routes: HashMap<Request, Route>,
}

impl ResolverCore {
    pub fn new(this: ResolverRef, registry: Arc<ResolverRegistry>) -> Self {
        Self {
            this,
            registry,
            producers: HashMap::new(),
            routes: HashMap::new(),
        }
    }

    pub fn this(&self) -> &ResolverRef {
        &self.this
    }

    pub fn name(&self) -> &str {
        self.this.name()
    }

    pub fn registry(&self) -> &Arc<ResolverRegistry> {
        &self.registry
    }

    /// Remember that answers to `downstream` belong to `upstream` at `step`.
    pub fn register_downstream(&mut self, downstream: &Request, upstream: &Request, step: usize) {
        self.routes.insert(
            downstream.clone(),
            Route {
                upstream: upstream.clone(),
                step,
            },
        );
    }

    /// The upstream request a downstream response answers.
    pub fn route(&self, downstream: &Request) -> ResolutionResult<Route> {
        self.routes
            .get(downstream)
            .cloned()
            .ok_or_else(|| ResolutionError::UnroutedResponse {
                resolver: self.name().to_string(),
            })
    }

    /// Send `request` to its receiver.
    pub fn request_from_downstream(&self, request: Request, iteration: u32) -> ResolutionResult<()> {
        tracing::trace!(
            resolver = %self.this,
            downstream = %request.receiver(),
            iteration,
            "asking downstream"
        );
        request.receiver().clone().tell(Message::Request { request, iteration })
    }

    /// Reply to whoever sent the response's source request. The root
    /// request has no sender; its replies go to the session.
    pub fn respond_to_upstream(&self, response: Response, iteration: u32) -> ResolutionResult<()> {
        match response.source_request().sender() {
            Some(sender) => sender
                .clone()
                .tell(Message::Response { response, iteration }),
            None => self.registry.report(response, iteration),
        }
    }

    pub fn producer_iteration(&self, request: &Request) -> Option<u32> {
        self.producers.get(request).map(ResponseProducer::iteration)
    }

    pub fn producer_mut(&mut self, request: &Request) -> ResolutionResult<&mut ResponseProducer> {
        let name = self.this.name();
        self.producers
            .get_mut(request)
            .ok_or_else(|| ResolutionError::UnroutedResponse {
                resolver: name.to_string(),
            })
    }

    pub fn insert_producer(&mut self, request: Request, producer: ResponseProducer) {
        self.producers.insert(request, producer);
    }

    pub fn take_producer(&mut self, request: &Request) -> ResolutionResult<ResponseProducer> {
        self.producers
            .remove(request)
            .ok_or_else(|| ResolutionError::UnroutedResponse {
                resolver: self.this.name().to_string(),
            })
    }
}

// ---------------------------------------------------------------------------
// Resolver
// ---------------------------------------------------------------------------

/// The message-handling contract of every resolver kind.
pub trait Resolver: Send {
    fn core(&self) -> &ResolverCore;

    fn core_mut(&mut self) -> &mut ResolverCore;

    /// Label carried by answers this resolver emits.
    fn label(&self) -> Arc<str>;

    /// Register the downstream resolvers this resolver plans over. Called
    /// before every request; implementations do the work once.
    fn initialise_downstream(&mut self) -> ResolutionResult<()>;

    /// A producer for a request seen for the first time.
    fn create_producer(&mut self, request: &Request, iteration: u32) -> ResolutionResult<ResponseProducer>;

    /// A producer for a request seen before, now at a later iteration.
    fn reiterate_producer(
        &mut self,
        request: &Request,
        previous: ResponseProducer,
        iteration: u32,
    ) -> ResolutionResult<ResponseProducer>;

    /// Combine an answer from a downstream resolver.
    fn receive_answer(&mut self, answer: Answer, iteration: u32) -> ResolutionResult<()>;

    /// Provenance of a candidate pulled from the base cursor.
    fn base_provenance(&self, _local: &ConceptMap) -> (bool, Derivation) {
        (false, Derivation::default())
    }

    /// Serve one request for the next answer.
    ///
    /// A request from an older iteration than the producer it maps to is
    /// answered with exhaustion straight away.
    fn receive_request(&mut self, request: Request, iteration: u32) -> ResolutionResult<()> {
        self.initialise_downstream()?;
        match self.core().producer_iteration(&request) {
            None => {
                let producer = self.create_producer(&request, iteration)?;
                self.core_mut().insert_producer(request.clone(), producer);
            }
            Some(current) if iteration > current => {
                tracing::debug!(
                    resolver = %self.core().this(),
                    from = current,
                    to = iteration,
                    "reiterating producer"
                );
                let previous = self.core_mut().take_producer(&request)?;
                let producer = self.reiterate_producer(&request, previous, iteration)?;
                self.core_mut().insert_producer(request.clone(), producer);
            }
            Some(current) if iteration < current => {
                tracing::trace!(
                    resolver = %self.core().this(),
                    current,
                    iteration,
                    "stale request"
                );
                return self
                    .core()
                    .respond_to_upstream(Response::exhausted(request), iteration);
            }
            Some(_) => {}
        }
        self.try_answer(&request, iteration)
    }

    /// A downstream request has no more answers this iteration.
    fn receive_exhausted(&mut self, exhausted: Exhausted, iteration: u32) -> ResolutionResult<()> {
        let to_downstream = exhausted.source_request();
        let route = self.core().route(to_downstream)?;
        self.core_mut()
            .producer_mut(&route.upstream)?
            .remove_downstream(to_downstream);
        self.try_answer(&route.upstream, iteration)
    }

    /// Emit the next answer for `from_upstream`, ask a downstream resolver
    /// for more, or report exhaustion. Exactly one of the three happens.
    fn try_answer(&mut self, from_upstream: &Request, iteration: u32) -> ResolutionResult<()> {
        loop {
            let producer = self.core_mut().producer_mut(from_upstream)?;
            let Some(candidate) = producer.next_base() else {
                break;
            };
            let Some(local) = from_upstream.bindings().aggregate_with(&candidate) else {
                continue;
            };
            if !producer.record_produced(local.clone()) {
                continue;
            }
            let Some(upstream) = from_upstream.bindings().to_upstream(&local) else {
                continue;
            };
            let (inferred, derivation) = self.base_provenance(&local);
            let answer = Answer::new(
                from_upstream.clone(),
                upstream,
                self.label(),
                derivation,
                self.core().this().clone(),
                inferred,
            );
            return self
                .core()
                .respond_to_upstream(Response::Answer(answer), iteration);
        }

        match self.core_mut().producer_mut(from_upstream)?.next_downstream() {
            Some(downstream) => self.core().request_from_downstream(downstream, iteration),
            None => self
                .core()
                .respond_to_upstream(Response::exhausted(from_upstream.clone()), iteration),
        }
    }
}
