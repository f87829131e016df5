//! Concept values and variable bindings.
//!
//! A [`ConceptMap`] is the unit every resolver exchanges: an assignment of
//! [`Concept`]s to the [`Variable`]s of a pattern. Maps are ordered so they
//! hash and compare structurally, which lets them serve directly as
//! deduplication keys and as part of request identity.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

/// A named pattern variable (written `?name` in the text syntax).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Variable(Arc<str>);

impl Variable {
    pub fn new(name: impl AsRef<str>) -> Self {
        Self(Arc::from(name.as_ref()))
    }

    pub fn name(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Variable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "?{}", self.0)
    }
}

/// A concrete value a variable can be bound to.
///
/// Concepts are identified by their label; two concepts with the same label
/// are the same concept.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Concept(Arc<str>);

impl Concept {
    pub fn new(label: impl AsRef<str>) -> Self {
        Self(Arc::from(label.as_ref()))
    }

    pub fn label(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Concept {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Concept {
    fn from(label: &str) -> Self {
        Self::new(label)
    }
}

/// An assignment of concepts to variables.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ConceptMap(BTreeMap<Variable, Concept>);

impl ConceptMap {
    pub fn new() -> Self {
        Self(BTreeMap::new())
    }

    pub fn get(&self, variable: &Variable) -> Option<&Concept> {
        self.0.get(variable)
    }

    pub fn contains(&self, variable: &Variable) -> bool {
        self.0.contains_key(variable)
    }

    /// Bind `variable`, returning `false` if it is already bound to a
    /// different concept (the map is left unchanged in that case).
    pub fn bind(&mut self, variable: Variable, concept: Concept) -> bool {
        match self.0.get(&variable) {
            Some(existing) => *existing == concept,
            None => {
                self.0.insert(variable, concept);
                true
            }
        }
    }

    /// Builder-style [`bind`](Self::bind) that overwrites silently.
    pub fn with(mut self, variable: impl AsRef<str>, concept: impl AsRef<str>) -> Self {
        self.0
            .insert(Variable::new(variable), Concept::new(concept));
        self
    }

    /// Union of two maps, or `None` if they disagree on a shared variable.
    pub fn merge(&self, other: &ConceptMap) -> Option<ConceptMap> {
        let (mut merged, smaller) = if self.len() >= other.len() {
            (self.clone(), other)
        } else {
            (other.clone(), self)
        };
        for (variable, concept) in smaller.iter() {
            if !merged.bind(variable.clone(), concept.clone()) {
                return None;
            }
        }
        Some(merged)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&Variable, &Concept)> {
        self.0.iter()
    }

    pub fn variables(&self) -> impl Iterator<Item = &Variable> {
        self.0.keys()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl FromIterator<(Variable, Concept)> for ConceptMap {
    fn from_iter<I: IntoIterator<Item = (Variable, Concept)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl fmt::Display for ConceptMap {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("{")?;
        for (i, (variable, concept)) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{variable}={concept}")?;
        }
        f.write_str("}")
    }
}
