//! Bindings pushed down with a request, and the provenance attached to
//! answers flowing back up.

use std::collections::BTreeMap;
use std::sync::Arc;

use crate::concept::ConceptMap;

use super::framework::actor::ResolverRef;
use super::framework::response::Answer;
use super::mapping::Mapping;

// ---------------------------------------------------------------------------
// Bindings
// ---------------------------------------------------------------------------

/// The binding a request carries, tagged with its direction.
///
/// `Initial` is a binding already expressed in the receiver's variables
/// (the root request). `ToDownstream` remembers the sender's binding and the
/// mapping that produced the receiver's view, so answers can be translated
/// back and merged on the way up.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Bindings {
    Initial(ConceptMap),
    ToDownstream {
        upstream: ConceptMap,
        mapping: Arc<Mapping>,
        downstream: ConceptMap,
    },
}

impl Bindings {
    pub fn initial(map: ConceptMap) -> Self {
        Self::Initial(map)
    }

    /// Push `upstream` down through `mapping`. `None` if the binding
    /// contradicts the mapping's constants.
    pub fn to_downstream(upstream: ConceptMap, mapping: Arc<Mapping>) -> Option<Self> {
        let downstream = mapping.transform(&upstream)?;
        Some(Self::ToDownstream {
            upstream,
            mapping,
            downstream,
        })
    }

    /// Like [`to_downstream`](Self::to_downstream), but the receiver only
    /// sees the mapping's own constants and its answers come back unfiltered.
    /// The sender applies `upstream` itself. `None` if `upstream` already
    /// contradicts the mapping's constants.
    pub fn unrestricted(upstream: &ConceptMap, mapping: Arc<Mapping>) -> Option<Self> {
        mapping.transform(upstream)?;
        Self::to_downstream(ConceptMap::new(), mapping)
    }

    /// The binding in the receiver's own variables.
    pub fn local(&self) -> &ConceptMap {
        match self {
            Self::Initial(map) => map,
            Self::ToDownstream { downstream, .. } => downstream,
        }
    }

    /// Merge a candidate found by the receiver with its local binding.
    pub fn aggregate_with(&self, found: &ConceptMap) -> Option<ConceptMap> {
        self.local().merge(found)
    }

    /// Translate a complete local answer into the sender's variables and
    /// merge it with the sender's binding.
    pub fn to_upstream(&self, local: &ConceptMap) -> Option<ConceptMap> {
        match self {
            Self::Initial(map) => map.merge(local),
            Self::ToDownstream {
                upstream, mapping, ..
            } => upstream.merge(&mapping.untransform(local)?),
        }
    }
}

// ---------------------------------------------------------------------------
// Derivation
// ---------------------------------------------------------------------------

/// Which resolvers contributed which answers to an inferred answer.
///
/// Derivations are values: extending one returns a new derivation and never
/// touches the original, so answers in flight never share mutable state.
#[derive(Debug, Clone, Default)]
pub struct Derivation {
    answers: BTreeMap<ResolverRef, Vec<Arc<Answer>>>,
}

impl Derivation {
    pub fn new() -> Self {
        Self::default()
    }

    /// A copy of this derivation that also records `answer` from `producer`.
    pub fn with_answer(&self, producer: &ResolverRef, answer: Arc<Answer>) -> Self {
        let mut answers = self.answers.clone();
        answers.entry(producer.clone()).or_default().push(answer);
        Self { answers }
    }

    /// Union of both derivations; entries from `other` follow those of `self`.
    pub fn merge(&self, other: &Derivation) -> Self {
        let mut answers = self.answers.clone();
        for (producer, contributed) in &other.answers {
            answers
                .entry(producer.clone())
                .or_default()
                .extend(contributed.iter().cloned());
        }
        Self { answers }
    }

    pub fn iter(&self) -> impl Iterator<Item = (&ResolverRef, &Arc<Answer>)> {
        self.answers
            .iter()
            .flat_map(|(producer, answers)| answers.iter().map(move |a| (producer, a)))
    }

    /// Total number of recorded answers.
    pub fn len(&self) -> usize {
        self.answers.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.answers.is_empty()
    }
}
