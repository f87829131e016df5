//! Retrievable resolver: stored facts only.

use std::sync::Arc;

use crate::error::ResolutionError;
use crate::pattern::Retrievable;
use crate::resolution::framework::ResolutionResult;
use crate::resolution::framework::producer::ResponseProducer;
use crate::resolution::framework::request::Request;
use crate::resolution::framework::resolver::{Resolver, ResolverCore};
use crate::resolution::framework::response::Answer;
use crate::traversal::TraversalEngine;

/// Answers a group of atoms no rule concludes, straight from the traversal
/// engine. It never asks another resolver.
pub struct RetrievableResolver {
    core: ResolverCore,
    retrievable: Retrievable,
    label: Arc<str>,
    traversal: Arc<dyn TraversalEngine>,
}

impl RetrievableResolver {
    pub fn new(core: ResolverCore, retrievable: Retrievable, traversal: Arc<dyn TraversalEngine>) -> Self {
        let label: Arc<str> = Arc::from(retrievable.to_string());
        Self {
            core,
            retrievable,
            label,
            traversal,
        }
    }

    fn cursor(&self, request: &Request) -> crate::traversal::BaseCursor {
        self.traversal
            .query(self.retrievable.conjunction(), request.bindings().local())
    }
}

impl Resolver for RetrievableResolver {
    fn core(&self) -> &ResolverCore {
        &self.core
    }

    fn core_mut(&mut self) -> &mut ResolverCore {
        &mut self.core
    }

    fn label(&self) -> Arc<str> {
        Arc::clone(&self.label)
    }

    fn initialise_downstream(&mut self) -> ResolutionResult<()> {
        Ok(())
    }

    fn create_producer(&mut self, request: &Request, iteration: u32) -> ResolutionResult<ResponseProducer> {
        Ok(ResponseProducer::new(self.cursor(request), iteration))
    }

    fn reiterate_producer(
        &mut self,
        request: &Request,
        previous: ResponseProducer,
        iteration: u32,
    ) -> ResolutionResult<ResponseProducer> {
        previous.next_iteration(self.core.name(), self.cursor(request), iteration, false)
    }

    fn receive_answer(&mut self, _answer: Answer, _iteration: u32) -> ResolutionResult<()> {
        Err(ResolutionError::UnroutedResponse {
            resolver: self.core.name().to_string(),
        })
    }
}
