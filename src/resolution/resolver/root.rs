//! Root resolver: the entry point of one query.

use std::sync::Arc;

use crate::pattern::Conjunction;
use crate::resolution::framework::ResolutionResult;
use crate::resolution::framework::producer::ResponseProducer;
use crate::resolution::framework::request::Request;
use crate::resolution::framework::resolver::{Resolver, ResolverCore};
use crate::resolution::framework::response::{Answer, Response};

use super::join::{Join, JoinOutcome};

/// Joins the query conjunction and reports complete answers to the session.
///
/// Unlike inner resolvers, the root keeps the answers it has produced across
/// iterations, so every iteration reports only answers not seen before.
pub struct RootResolver {
    join: Join,
}

impl RootResolver {
    pub fn new(core: ResolverCore, conjunction: Conjunction) -> Self {
        let label: Arc<str> = Arc::from(conjunction.to_string());
        Self {
            join: Join::new(core, conjunction, label),
        }
    }
}

impl Resolver for RootResolver {
    fn core(&self) -> &ResolverCore {
        &self.join.core
    }

    fn core_mut(&mut self) -> &mut ResolverCore {
        &mut self.join.core
    }

    fn label(&self) -> Arc<str> {
        self.join.label()
    }

    fn initialise_downstream(&mut self) -> ResolutionResult<()> {
        self.join.initialise();
        Ok(())
    }

    fn create_producer(&mut self, request: &Request, iteration: u32) -> ResolutionResult<ResponseProducer> {
        self.join.producer(request, iteration, None, true)
    }

    fn reiterate_producer(
        &mut self,
        request: &Request,
        previous: ResponseProducer,
        iteration: u32,
    ) -> ResolutionResult<ResponseProducer> {
        self.join.producer(request, iteration, Some(previous), true)
    }

    fn receive_answer(&mut self, answer: Answer, iteration: u32) -> ResolutionResult<()> {
        match self.join.combine(answer, iteration)? {
            JoinOutcome::Complete {
                from_upstream,
                bindings,
                derivation,
            } => {
                let inferred = !derivation.is_empty();
                let answer = Answer::new(
                    from_upstream,
                    bindings,
                    self.label(),
                    derivation,
                    self.join.core.this().clone(),
                    inferred,
                );
                self.join
                    .core
                    .respond_to_upstream(Response::Answer(answer), iteration)
            }
            JoinOutcome::Forwarded => Ok(()),
            JoinOutcome::Retry(from_upstream) => self.try_answer(&from_upstream, iteration),
        }
    }
}
