//! Variable mappings between a requester and the resolver it asks.
//!
//! A plain renaming (conjunction variable to canonical resolver variable) is
//! the common case. Unifying a concludable with a rule head additionally
//! carries constants across: a concludable constant becomes a requirement on
//! a head variable, and a head constant fixes a concludable variable in
//! every answer the rule sends back.

use std::collections::{BTreeMap, BTreeSet};

use crate::concept::{Concept, ConceptMap, Variable};
use crate::pattern::{Atom, Term};

#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct Mapping {
    /// Upstream variable to the downstream variables it is identified with.
    forward: BTreeMap<Variable, BTreeSet<Variable>>,
    /// Downstream variables pinned by an upstream constant.
    required: BTreeMap<Variable, Concept>,
    /// Upstream variables pinned by a downstream constant.
    fixed: BTreeMap<Variable, Concept>,
}

impl Mapping {
    /// A one-to-one renaming from upstream to downstream variables.
    pub fn rename(renaming: &BTreeMap<Variable, Variable>) -> Self {
        let forward = renaming
            .iter()
            .map(|(up, down)| (up.clone(), BTreeSet::from([down.clone()])))
            .collect();
        Self {
            forward,
            ..Self::default()
        }
    }

    /// Unify an upstream atom with a downstream atom (typically a
    /// concludable with a rule head). Returns `None` if they cannot match.
    pub fn unify(upstream: &Atom, downstream: &Atom) -> Option<Self> {
        if upstream.predicate != downstream.predicate || upstream.arity() != downstream.arity() {
            return None;
        }
        let mut mapping = Self::default();
        for (up, down) in upstream.terms.iter().zip(&downstream.terms) {
            match (up, down) {
                (Term::Variable(u), Term::Variable(d)) => {
                    mapping.forward.entry(u.clone()).or_default().insert(d.clone());
                }
                (Term::Variable(u), Term::Concept(c)) => {
                    if mapping.fixed.insert(u.clone(), c.clone()).is_some_and(|prev| prev != *c) {
                        return None;
                    }
                }
                (Term::Concept(c), Term::Variable(d)) => {
                    if mapping.required.insert(d.clone(), c.clone()).is_some_and(|prev| prev != *c) {
                        return None;
                    }
                }
                (Term::Concept(a), Term::Concept(b)) if a != b => return None,
                (Term::Concept(_), Term::Concept(_)) => {}
            }
        }
        // Constraints that can never be met, e.g. q(a, b) against q(?x, ?x).
        mapping.transform(&ConceptMap::new())?;
        Some(mapping)
    }

    /// Translate an upstream binding into downstream variables.
    ///
    /// Only the upstream variables the mapping knows about are carried over.
    /// `None` means the binding contradicts the mapping's constants.
    pub fn transform(&self, upstream: &ConceptMap) -> Option<ConceptMap> {
        let mut downstream = ConceptMap::new();
        for (variable, concept) in &self.required {
            if !downstream.bind(variable.clone(), concept.clone()) {
                return None;
            }
        }
        for (variable, concept) in &self.fixed {
            if upstream.get(variable).is_some_and(|bound| bound != concept) {
                return None;
            }
        }
        for (up, downs) in &self.forward {
            if let Some(concept) = upstream.get(up) {
                for down in downs {
                    if !downstream.bind(down.clone(), concept.clone()) {
                        return None;
                    }
                }
            }
        }
        Some(downstream)
    }

    /// Translate a downstream answer back into upstream variables.
    ///
    /// `None` means the answer binds identified variables to different
    /// concepts, so it does not satisfy the upstream pattern.
    pub fn untransform(&self, downstream: &ConceptMap) -> Option<ConceptMap> {
        let mut upstream = ConceptMap::new();
        for (variable, concept) in &self.fixed {
            upstream.bind(variable.clone(), concept.clone());
        }
        for (up, downs) in &self.forward {
            let mut value: Option<&Concept> = None;
            for concept in downs.iter().filter_map(|d| downstream.get(d)) {
                match value {
                    Some(seen) if seen != concept => return None,
                    _ => value = Some(concept),
                }
            }
            if let Some(concept) = value {
                if !upstream.bind(up.clone(), concept.clone()) {
                    return None;
                }
            }
        }
        Some(upstream)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn atom(s: &str) -> Atom {
        Atom::parse(s).unwrap()
    }

    #[test]
    fn renaming_round_trips() {
        let renaming = BTreeMap::from([
            (Variable::new("x"), Variable::new("v0")),
            (Variable::new("y"), Variable::new("v1")),
        ]);
        let mapping = Mapping::rename(&renaming);
        let up = ConceptMap::new().with("x", "a").with("w", "ignored");
        let down = mapping.transform(&up).unwrap();
        assert_eq!(down, ConceptMap::new().with("v0", "a"));

        let answer = down.with("v1", "b");
        assert_eq!(
            mapping.untransform(&answer).unwrap(),
            ConceptMap::new().with("x", "a").with("y", "b")
        );
    }

    #[test]
    fn unify_carries_constants_both_ways() {
        // concludable q(a, ?v0) against head q(?x, ?y) and q(?x, c)
        let mapping = Mapping::unify(&atom("q(a, ?v0)"), &atom("q(?x, ?y)")).unwrap();
        assert_eq!(
            mapping.transform(&ConceptMap::new()).unwrap(),
            ConceptMap::new().with("x", "a")
        );

        let mapping = Mapping::unify(&atom("q(?v0, ?v1)"), &atom("q(?x, c)")).unwrap();
        let back = mapping
            .untransform(&ConceptMap::new().with("x", "a"))
            .unwrap();
        assert_eq!(back, ConceptMap::new().with("v0", "a").with("v1", "c"));
        assert!(mapping.transform(&ConceptMap::new().with("v1", "d")).is_none());
    }

    #[test]
    fn unify_rejects_incompatible_atoms() {
        assert!(Mapping::unify(&atom("q(a)"), &atom("q(b)")).is_none());
        assert!(Mapping::unify(&atom("q(a)"), &atom("p(?x)")).is_none());
        assert!(Mapping::unify(&atom("q(a, b)"), &atom("q(?x, ?x)")).is_none());
    }

    #[test]
    fn repeated_upstream_variable_filters_answers() {
        let mapping = Mapping::unify(&atom("q(?v0, ?v0)"), &atom("q(?x, ?y)")).unwrap();
        let same = ConceptMap::new().with("x", "a").with("y", "a");
        let different = ConceptMap::new().with("x", "a").with("y", "b");
        assert_eq!(
            mapping.untransform(&same).unwrap(),
            ConceptMap::new().with("v0", "a")
        );
        assert!(mapping.untransform(&different).is_none());
    }
}
