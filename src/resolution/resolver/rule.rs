//! Rule resolver: answers a rule's head by joining its body.

use std::sync::Arc;

use crate::pattern::Rule;
use crate::resolution::framework::ResolutionResult;
use crate::resolution::framework::producer::ResponseProducer;
use crate::resolution::framework::request::Request;
use crate::resolution::framework::resolver::{Resolver, ResolverCore};
use crate::resolution::framework::response::{Answer, Response};

use super::join::{Join, JoinOutcome};

/// Serves requests from concludable resolvers whose pattern unifies with
/// this rule's head.
///
/// Requests carry only the head constants the unifier pins, so each complete
/// body answer is projected onto the head and translated into the
/// concludable's variables unfiltered. Every answer it emits is inferred.
pub struct RuleResolver {
    join: Join,
}

impl RuleResolver {
    pub fn new(core: ResolverCore, rule: Arc<Rule>) -> Self {
        let label: Arc<str> = Arc::from(rule.name());
        Self {
            join: Join::new(core, rule.when().clone(), label),
        }
    }
}

impl Resolver for RuleResolver {
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
        self.join.producer(request, iteration, None, false)
    }

    fn reiterate_producer(
        &mut self,
        request: &Request,
        previous: ResponseProducer,
        iteration: u32,
    ) -> ResolutionResult<ResponseProducer> {
        self.join.producer(request, iteration, Some(previous), false)
    }

    fn receive_answer(&mut self, answer: Answer, iteration: u32) -> ResolutionResult<()> {
        match self.join.combine(answer, iteration)? {
            JoinOutcome::Complete {
                from_upstream,
                bindings,
                derivation,
            } => {
                let answer = Answer::new(
                    from_upstream,
                    bindings,
                    self.label(),
                    derivation,
                    self.join.core.this().clone(),
                    true,
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
