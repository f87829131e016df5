//! Resolver registry: one resolver per distinct sub-goal.
//!
//! The [`ResolverRegistry`] memoises resolvers in `DashMap`s keyed by the
//! alpha-normalised pattern, so `p(?x, ?y)` and `p(?a, ?b)` share one
//! resolver and callers get back the renaming into its variables. Rule
//! resolvers are keyed by rule name.
//!
//! The registry also owns the session-wide counters used to detect a
//! fixpoint, and the channel root answers are reported on.

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use dashmap::DashMap;
use tokio::runtime::Handle;
use tokio::sync::mpsc;
use tokio::task::AbortHandle;

use crate::error::ResolutionError;
use crate::logic::RuleIndex;
use crate::pattern::{Atom, Conjunction, Resolvable, Rule};
use crate::resolution::framework::ResolutionResult;
use crate::resolution::framework::actor::{self, ResolverId, ResolverRef, SessionEvent};
use crate::resolution::framework::resolver::ResolverCore;
use crate::resolution::framework::response::Response;
use crate::resolution::mapping::Mapping;
use crate::resolution::resolver::{
    ConcludableResolver, ResolverKind, RetrievableResolver, RootResolver, RuleResolver,
};
use crate::traversal::TraversalEngine;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
enum ResolvableKey {
    Concludable(Atom),
    Retrievable(Conjunction),
}

/// Creates, memoises and tears down the resolvers of one resolution.
pub struct ResolverRegistry {
    runtime: Handle,
    traversal: Arc<dyn TraversalEngine>,
    rules: Arc<dyn RuleIndex>,
    /// Canonical pattern → resolver.
    resolvables: DashMap<ResolvableKey, ResolverRef>,
    /// Rule name → rule resolver.
    rule_resolvers: DashMap<String, ResolverRef>,
    tasks: DashMap<ResolverId, AbortHandle>,
    next_id: AtomicU64,
    events: mpsc::UnboundedSender<SessionEvent>,
    /// New inferred answers tabled by concludable resolvers.
    derivations: AtomicU64,
    /// Requests that revisited a concludable already on their path.
    cycles: AtomicU64,
}

impl ResolverRegistry {
    /// A registry that spawns resolvers on the current tokio runtime.
    pub fn new(
        traversal: Arc<dyn TraversalEngine>,
        rules: Arc<dyn RuleIndex>,
        events: mpsc::UnboundedSender<SessionEvent>,
    ) -> ResolutionResult<Arc<Self>> {
        let runtime = Handle::try_current().map_err(|_| ResolutionError::NoRuntime)?;
        Ok(Arc::new(Self {
            runtime,
            traversal,
            rules,
            resolvables: DashMap::new(),
            rule_resolvers: DashMap::new(),
            tasks: DashMap::new(),
            next_id: AtomicU64::new(0),
            events,
            derivations: AtomicU64::new(0),
            cycles: AtomicU64::new(0),
        }))
    }

    pub fn rules(&self) -> &Arc<dyn RuleIndex> {
        &self.rules
    }

    /// A fresh root resolver for `conjunction`. Roots are never shared.
    pub fn register_root(self: &Arc<Self>, conjunction: Conjunction) -> ResolverRef {
        let name = format!("Root({conjunction})");
        self.spawn(&name, |core| ResolverKind::Root(RootResolver::new(core, conjunction)))
    }

    /// The resolver for `resolvable`, and the mapping from the caller's
    /// variables into the resolver's canonical ones.
    pub fn register_resolvable(self: &Arc<Self>, resolvable: &Resolvable) -> (ResolverRef, Mapping) {
        match resolvable {
            Resolvable::Concludable(concludable) => {
                let (canonical, renaming) = concludable.canonical();
                let key = ResolvableKey::Concludable(canonical.atom().clone());
                let resolver = self
                    .resolvables
                    .entry(key)
                    .or_insert_with(|| {
                        let name = format!("Concludable({canonical})");
                        let traversal = Arc::clone(&self.traversal);
                        self.spawn(&name, |core| {
                            ResolverKind::Concludable(ConcludableResolver::new(core, canonical, traversal))
                        })
                    })
                    .clone();
                (resolver, Mapping::rename(&renaming))
            }
            Resolvable::Retrievable(retrievable) => {
                let (canonical, renaming) = retrievable.canonical();
                let key = ResolvableKey::Retrievable(canonical.conjunction().clone());
                let resolver = self
                    .resolvables
                    .entry(key)
                    .or_insert_with(|| {
                        let name = format!("Retrievable({canonical})");
                        let traversal = Arc::clone(&self.traversal);
                        self.spawn(&name, |core| {
                            ResolverKind::Retrievable(RetrievableResolver::new(core, canonical, traversal))
                        })
                    })
                    .clone();
                (resolver, Mapping::rename(&renaming))
            }
        }
    }

    /// The resolver for `rule`, one per rule name.
    pub fn register_rule(self: &Arc<Self>, rule: &Arc<Rule>) -> ResolverRef {
        self.rule_resolvers
            .entry(rule.name().to_string())
            .or_insert_with(|| {
                let name = format!("Rule({})", rule.name());
                let rule = Arc::clone(rule);
                self.spawn(&name, |core| ResolverKind::Rule(RuleResolver::new(core, rule)))
            })
            .clone()
    }

    fn spawn(
        self: &Arc<Self>,
        name: &str,
        build: impl FnOnce(ResolverCore) -> ResolverKind,
    ) -> ResolverRef {
        let id = ResolverId(self.next_id.fetch_add(1, Ordering::Relaxed));
        let (mailbox, inbox) = mpsc::unbounded_channel();
        let this = ResolverRef::new(id, name, mailbox);
        let resolver = build(ResolverCore::new(this.clone(), Arc::clone(self)));
        let task = self
            .runtime
            .spawn(actor::run(resolver, this.clone(), inbox, self.events.clone()));
        self.tasks.insert(id, task.abort_handle());
        self.runtime
            .spawn(actor::watch(task, this.name().to_string(), self.events.clone()));
        tracing::debug!(resolver = %this, id = %id, "spawned resolver");
        this
    }

    /// Deliver a response to the root request to the session.
    pub(crate) fn report(&self, response: Response, iteration: u32) -> ResolutionResult<()> {
        self.events
            .send(SessionEvent::Response { response, iteration })
            .map_err(|_| ResolutionError::SessionClosed)
    }

    pub(crate) fn record_derivation(&self) {
        self.derivations.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_cycle(&self) {
        self.cycles.fetch_add(1, Ordering::Relaxed);
    }

    /// Inferred answers tabled so far, across all iterations.
    pub fn derivation_count(&self) -> u64 {
        self.derivations.load(Ordering::Relaxed)
    }

    /// Cyclic requests seen so far, across all iterations.
    pub fn cycle_count(&self) -> u64 {
        self.cycles.load(Ordering::Relaxed)
    }

    /// Number of live resolvers, roots included.
    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    /// Abort every resolver task and forget all resolvers.
    pub fn terminate(&self) {
        for task in self.tasks.iter() {
            task.value().abort();
        }
        self.tasks.clear();
        self.resolvables.clear();
        self.rule_resolvers.clear();
    }
}

impl fmt::Debug for ResolverRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResolverRegistry")
            .field("resolvers", &self.len())
            .field("derivations", &self.derivation_count())
            .field("cycles", &self.cycle_count())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::logic::RuleSet;
    use crate::pattern::Concludable;
    use crate::store::FactStore;

    fn registry(rules: &str) -> Arc<ResolverRegistry> {
        let (events, _) = mpsc::unbounded_channel();
        ResolverRegistry::new(
            Arc::new(FactStore::new()),
            Arc::new(RuleSet::parse(rules).unwrap()),
            events,
        )
        .unwrap()
    }

    fn concludable(s: &str) -> Resolvable {
        Resolvable::Concludable(Concludable::new(Atom::parse(s).unwrap()))
    }

    #[tokio::test]
    async fn alpha_equivalent_patterns_share_a_resolver() {
        let registry = registry("r: q(?x, ?y) :- p(?x, ?y)");
        let (first, _) = registry.register_resolvable(&concludable("q(?a, ?b)"));
        let (second, mapping) = registry.register_resolvable(&concludable("q(?c, ?d)"));
        assert_eq!(first, second);
        assert_eq!(registry.len(), 1);

        let local = mapping
            .transform(&crate::concept::ConceptMap::new().with("c", "k"))
            .unwrap();
        assert_eq!(local, crate::concept::ConceptMap::new().with("v0", "k"));
        registry.terminate();
    }

    #[tokio::test]
    async fn distinct_patterns_get_distinct_resolvers() {
        let registry = registry("r: q(?x, ?y) :- p(?x, ?y)");
        let (a, _) = registry.register_resolvable(&concludable("q(?a, ?b)"));
        let (b, _) = registry.register_resolvable(&concludable("q(?a, ?a)"));
        assert_ne!(a, b);
        assert_eq!(registry.len(), 2);
        registry.terminate();
        assert!(registry.is_empty());
    }

    #[tokio::test]
    async fn rule_resolvers_are_keyed_by_name() {
        let registry = registry("r: q(?x) :- p(?x)");
        let rule = Arc::new(Rule::parse("r: q(?x) :- p(?x)").unwrap());
        let a = registry.register_rule(&rule);
        let b = registry.register_rule(&rule);
        assert_eq!(a, b);
        assert_eq!(a.name(), "Rule(r)");
        registry.terminate();
    }

    #[test]
    fn registry_needs_a_runtime() {
        let (events, _) = mpsc::unbounded_channel();
        let err = ResolverRegistry::new(
            Arc::new(FactStore::new()),
            Arc::new(RuleSet::new()),
            events,
        )
        .unwrap_err();
        assert!(matches!(err, ResolutionError::NoRuntime));
    }
}
