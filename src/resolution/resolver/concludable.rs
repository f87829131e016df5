//! Concludable resolver: stored facts plus whatever rules can conclude.

use std::collections::BTreeMap;
use std::sync::Arc;

use crate::concept::ConceptMap;
use crate::pattern::{Concludable, Conjunction};
use crate::resolution::answer::{Bindings, Derivation};
use crate::resolution::framework::ResolutionResult;
use crate::resolution::framework::actor::ResolverRef;
use crate::resolution::framework::producer::ResponseProducer;
use crate::resolution::framework::request::Request;
use crate::resolution::framework::resolver::{Resolver, ResolverCore};
use crate::resolution::framework::response::{Answer, Response};
use crate::resolution::mapping::Mapping;
use crate::traversal::{BaseCursor, TraversalEngine};

struct RuleStep {
    resolver: ResolverRef,
    unifier: Arc<Mapping>,
}

/// An inferred answer and the iteration it was first derived in.
struct TableEntry {
    iteration: u32,
    answer: Arc<Answer>,
}

/// Answers one atom from stored facts and from every rule whose head
/// unifies with it.
///
/// Rules are asked without the request's binding, so every answer they
/// derive is tabled before it is filtered for the request it arrived on.
/// A request that reaches this resolver again through its own rules (a
/// cycle) is not passed on to the rules; it is served from stored facts and
/// the answers tabled in earlier iterations, whatever its binding.
/// Each iteration can therefore only extend what the previous one found,
/// and the session repeats iterations until nothing new is tabled.
pub struct ConcludableResolver {
    core: ResolverCore,
    concludable: Concludable,
    conjunction: Conjunction,
    label: Arc<str>,
    traversal: Arc<dyn TraversalEngine>,
    rules: Option<Vec<RuleStep>>,
    table: BTreeMap<ConceptMap, TableEntry>,
}

impl ConcludableResolver {
    pub fn new(core: ResolverCore, concludable: Concludable, traversal: Arc<dyn TraversalEngine>) -> Self {
        let label: Arc<str> = Arc::from(concludable.to_string());
        let conjunction = concludable.as_conjunction();
        Self {
            core,
            concludable,
            conjunction,
            label,
            traversal,
            rules: None,
            table: BTreeMap::new(),
        }
    }

    fn build_producer(
        &mut self,
        request: &Request,
        iteration: u32,
        previous: Option<ResponseProducer>,
    ) -> ResolutionResult<ResponseProducer> {
        let local = request.bindings().local();
        let cyclic = request.path().is_cyclic();
        let mut base: BaseCursor = self.traversal.query(&self.conjunction, local);
        if cyclic {
            self.core.registry().record_cycle();
            let tabled: Vec<ConceptMap> = self
                .table
                .iter()
                .filter(|(_, entry)| entry.iteration < iteration)
                .map(|(answer, _)| answer.clone())
                .collect();
            tracing::trace!(
                resolver = %self.core.this(),
                iteration,
                tabled = tabled.len(),
                "cyclic request served from table"
            );
            base = Box::new(base.chain(tabled));
        }

        let mut producer = match previous {
            None => ResponseProducer::new(base, iteration),
            Some(previous) => previous.next_iteration(self.core.name(), base, iteration, false)?,
        };

        if !cyclic {
            for (step, rule) in self.rules.iter().flatten().enumerate() {
                let Some(bindings) = Bindings::unrestricted(local, Arc::clone(&rule.unifier)) else {
                    continue;
                };
                let downstream = Request::downstream(request, rule.resolver.clone(), bindings, Derivation::default());
                self.core.register_downstream(&downstream, request, step);
                producer.add_downstream(downstream);
            }
        }
        Ok(producer)
    }

    fn table_answer(&mut self, local: ConceptMap, iteration: u32, answer: &Arc<Answer>) {
        if self.table.contains_key(&local) {
            return;
        }
        tracing::trace!(resolver = %self.core.this(), iteration, answer = %local, "tabled");
        self.table.insert(
            local,
            TableEntry {
                iteration,
                answer: Arc::clone(answer),
            },
        );
        self.core.registry().record_derivation();
    }
}

impl Resolver for ConcludableResolver {
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
        if self.rules.is_some() {
            return Ok(());
        }
        let registry = Arc::clone(self.core.registry());
        let rules: Vec<RuleStep> = self
            .concludable
            .applicable_rules(registry.rules().as_ref())
            .into_iter()
            .map(|(rule, unifier)| RuleStep {
                resolver: registry.register_rule(&rule),
                unifier: Arc::new(unifier),
            })
            .collect();
        tracing::debug!(resolver = %self.core.this(), rules = rules.len(), "registered rules");
        self.rules = Some(rules);
        Ok(())
    }

    fn create_producer(&mut self, request: &Request, iteration: u32) -> ResolutionResult<ResponseProducer> {
        self.build_producer(request, iteration, None)
    }

    fn reiterate_producer(
        &mut self,
        request: &Request,
        previous: ResponseProducer,
        iteration: u32,
    ) -> ResolutionResult<ResponseProducer> {
        self.build_producer(request, iteration, Some(previous))
    }

    fn receive_answer(&mut self, answer: Answer, iteration: u32) -> ResolutionResult<()> {
        let route = self.core.route(answer.source_request())?;
        let answer = Arc::new(answer);
        self.table_answer(answer.bindings().clone(), iteration, &answer);

        let Some(local) = route.upstream.bindings().aggregate_with(answer.bindings()) else {
            return self.try_answer(&route.upstream, iteration);
        };
        if !self.core.producer_mut(&route.upstream)?.record_produced(local.clone()) {
            return self.try_answer(&route.upstream, iteration);
        }
        let Some(upstream) = route.upstream.bindings().to_upstream(&local) else {
            return self.try_answer(&route.upstream, iteration);
        };

        let derivation = Derivation::default().with_answer(answer.producer(), answer.clone());
        let reply = Answer::new(
            route.upstream,
            upstream,
            self.label(),
            derivation,
            self.core.this().clone(),
            true,
        );
        self.core.respond_to_upstream(Response::Answer(reply), iteration)
    }

    /// Tabled answers are explained by the rule answer that first derived
    /// them; stored facts need no explanation.
    fn base_provenance(&self, local: &ConceptMap) -> (bool, Derivation) {
        let Some(entry) = self.table.get(local) else {
            return (false, Derivation::default());
        };
        if self.traversal.query(&self.conjunction, local).next().is_some() {
            return (false, Derivation::default());
        }
        let derivation = Derivation::default().with_answer(entry.answer.producer(), Arc::clone(&entry.answer));
        (true, derivation)
    }
}
