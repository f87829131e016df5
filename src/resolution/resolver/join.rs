//! Sequential join over a conjunction's resolvables.
//!
//! Root and rule resolvers both answer a conjunction by asking its
//! resolvables one after another: an answer from step `i` extends the
//! accumulated binding and becomes the request for step `i + 1`; an answer
//! from the last step is a complete answer for the conjunction.

use std::sync::Arc;

use crate::concept::ConceptMap;
use crate::error::ResolutionError;
use crate::pattern::Conjunction;
use crate::resolution::answer::{Bindings, Derivation};
use crate::resolution::framework::ResolutionResult;
use crate::resolution::framework::actor::ResolverRef;
use crate::resolution::framework::producer::ResponseProducer;
use crate::resolution::framework::request::Request;
use crate::resolution::framework::resolver::ResolverCore;
use crate::resolution::framework::response::Answer;
use crate::resolution::mapping::Mapping;
use crate::traversal::empty_cursor;

/// One planned resolvable and the mapping into its resolver's variables.
#[derive(Debug, Clone)]
pub struct PlanStep {
    pub resolver: ResolverRef,
    pub mapping: Arc<Mapping>,
}

/// What became of a downstream answer.
#[derive(Debug)]
pub enum JoinOutcome {
    /// A new complete answer, already in the upstream requester's variables.
    Complete {
        from_upstream: Request,
        bindings: ConceptMap,
        derivation: Derivation,
    },
    /// The answer was passed on to the next step.
    Forwarded,
    /// Nothing to emit; the upstream request still wants an answer.
    Retry(Request),
}

/// Join state shared by root and rule resolvers.
pub struct Join {
    pub core: ResolverCore,
    conjunction: Conjunction,
    label: Arc<str>,
    plan: Option<Vec<PlanStep>>,
}

impl Join {
    pub fn new(core: ResolverCore, conjunction: Conjunction, label: Arc<str>) -> Self {
        Self {
            core,
            conjunction,
            label,
            plan: None,
        }
    }

    pub fn label(&self) -> Arc<str> {
        Arc::clone(&self.label)
    }

    /// Plan the conjunction and register one resolver per resolvable.
    /// Only the first call does any work.
    pub fn initialise(&mut self) {
        if self.plan.is_some() {
            return;
        }
        let registry = Arc::clone(self.core.registry());
        let plan: Vec<PlanStep> = self
            .conjunction
            .resolvables(registry.rules().as_ref())
            .iter()
            .map(|resolvable| {
                let (resolver, mapping) = registry.register_resolvable(resolvable);
                PlanStep {
                    resolver,
                    mapping: Arc::new(mapping),
                }
            })
            .collect();
        tracing::debug!(
            resolver = %self.core.this(),
            steps = plan.len(),
            plan = %plan.iter().map(|s| s.resolver.name()).collect::<Vec<_>>().join(", "),
            "planned conjunction"
        );
        self.plan = Some(plan);
    }

    pub fn plan(&self) -> &[PlanStep] {
        self.plan.as_deref().unwrap_or(&[])
    }

    /// A producer whose only pending request is the first plan step.
    pub fn producer(
        &mut self,
        request: &Request,
        iteration: u32,
        previous: Option<ResponseProducer>,
        retain_produced: bool,
    ) -> ResolutionResult<ResponseProducer> {
        let mut producer = match previous {
            None => ResponseProducer::new(empty_cursor(), iteration),
            Some(previous) => {
                previous.next_iteration(self.core.name(), empty_cursor(), iteration, retain_produced)?
            }
        };
        if !self.plan().is_empty() {
            let local = request.bindings().local().clone();
            if let Some(first) = self.step_request(request, 0, local, Derivation::default())? {
                producer.add_downstream(first);
            }
        }
        Ok(producer)
    }

    /// The request for plan step `step`, or `None` if the accumulated
    /// binding contradicts that step's constants.
    fn step_request(
        &mut self,
        from_upstream: &Request,
        step: usize,
        accumulated: ConceptMap,
        derivation: Derivation,
    ) -> ResolutionResult<Option<Request>> {
        let plan_len = self.plan().len();
        let Some(next) = self.plan().get(step) else {
            return Err(ResolutionError::PlanExhausted {
                resolver: self.core.name().to_string(),
                step,
                plan_len,
            });
        };
        let Some(bindings) = Bindings::to_downstream(accumulated, Arc::clone(&next.mapping)) else {
            return Ok(None);
        };
        let request = Request::downstream(from_upstream, next.resolver.clone(), bindings, derivation);
        self.core.register_downstream(&request, from_upstream, step);
        Ok(Some(request))
    }

    /// Fold a downstream answer into the join.
    pub fn combine(&mut self, answer: Answer, iteration: u32) -> ResolutionResult<JoinOutcome> {
        let route = self.core.route(answer.source_request())?;
        let accumulated = answer.bindings().clone();
        let mut derivation = answer.source_request().derivation().clone();
        if answer.is_inferred() {
            let producer = answer.producer().clone();
            derivation = derivation.with_answer(&producer, Arc::new(answer));
        }

        if route.step + 1 == self.plan().len() {
            let producer = self.core.producer_mut(&route.upstream)?;
            if !producer.record_produced(accumulated.clone()) {
                return Ok(JoinOutcome::Retry(route.upstream));
            }
            return Ok(match route.upstream.bindings().to_upstream(&accumulated) {
                Some(bindings) => JoinOutcome::Complete {
                    from_upstream: route.upstream,
                    bindings,
                    derivation,
                },
                None => JoinOutcome::Retry(route.upstream),
            });
        }

        match self.step_request(&route.upstream, route.step + 1, accumulated, derivation)? {
            Some(next) => {
                self.core
                    .producer_mut(&route.upstream)?
                    .add_downstream(next.clone());
                self.core.request_from_downstream(next, iteration)?;
                Ok(JoinOutcome::Forwarded)
            }
            None => Ok(JoinOutcome::Retry(route.upstream)),
        }
    }
}
