//! In-memory fact store.
//!
//! Facts are indexed by predicate in a `DashMap`. Each predicate keeps its
//! rows behind an `Arc` so a query can snapshot them cheaply and hand out a
//! cursor that keeps working while new facts are committed.

use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use dashmap::DashMap;

use crate::concept::{Concept, ConceptMap};
use crate::error::{ReasonerResult, StoreError};
use crate::pattern::{Atom, Conjunction};
use crate::traversal::{BaseCursor, TraversalEngine};

/// Result type for store operations.
pub type StoreResult<T> = std::result::Result<T, StoreError>;

// ---------------------------------------------------------------------------
// Fact
// ---------------------------------------------------------------------------

/// A ground atom, either stored or inferred by a rule.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Fact {
    pub predicate: Arc<str>,
    pub arguments: Vec<Concept>,
    /// Inferred facts are derived on demand and may never be committed.
    pub inferred: bool,
}

impl Fact {
    pub fn stored(predicate: impl AsRef<str>, arguments: Vec<Concept>) -> Self {
        Self {
            predicate: Arc::from(predicate.as_ref()),
            arguments,
            inferred: false,
        }
    }

    /// Instantiate `atom` under `binding`.
    pub fn from_atom(atom: &Atom, binding: &ConceptMap, inferred: bool) -> StoreResult<Self> {
        Ok(Self {
            predicate: Arc::clone(&atom.predicate),
            arguments: atom.instantiate(binding)?,
            inferred,
        })
    }

    /// Parse a ground atom such as `edge(a, b)` as a stored fact.
    pub fn parse(s: &str) -> ReasonerResult<Self> {
        let atom = Atom::parse(s)?;
        Ok(Self::from_atom(&atom, &ConceptMap::new(), false)?)
    }
}

impl fmt::Display for Fact {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}(", self.predicate)?;
        for (i, arg) in self.arguments.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{arg}")?;
        }
        f.write_str(")")
    }
}

// ---------------------------------------------------------------------------
// FactStore
// ---------------------------------------------------------------------------

#[derive(Default)]
struct PredicateFacts {
    rows: Arc<Vec<Vec<Concept>>>,
    seen: HashSet<Vec<Concept>>,
}

/// Stored facts, indexed by predicate.
#[derive(Default)]
pub struct FactStore {
    by_predicate: DashMap<Arc<str>, PredicateFacts>,
    fact_count: AtomicUsize,
}

impl FactStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse one ground atom per non-empty line; `#` starts a comment line.
    pub fn parse(text: &str) -> ReasonerResult<Self> {
        let store = Self::new();
        for line in text.lines().map(str::trim) {
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            store.commit(&Fact::parse(line)?)?;
        }
        Ok(store)
    }

    /// Persist a stored fact. Returns `false` if it was already present.
    ///
    /// Committing an inferred fact is an illegal operation.
    pub fn commit(&self, fact: &Fact) -> StoreResult<bool> {
        if fact.inferred {
            return Err(StoreError::IllegalOperation {
                fact: fact.to_string(),
            });
        }
        let mut entry = self
            .by_predicate
            .entry(Arc::clone(&fact.predicate))
            .or_default();
        if !entry.seen.insert(fact.arguments.clone()) {
            return Ok(false);
        }
        Arc::make_mut(&mut entry.rows).push(fact.arguments.clone());
        self.fact_count.fetch_add(1, Ordering::Relaxed);
        Ok(true)
    }

    pub fn contains(&self, fact: &Fact) -> bool {
        self.by_predicate
            .get(&fact.predicate)
            .is_some_and(|p| p.seen.contains(&fact.arguments))
    }

    /// Number of stored facts.
    pub fn len(&self) -> usize {
        self.fact_count.load(Ordering::Relaxed)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn snapshot(&self, predicate: &str) -> Arc<Vec<Vec<Concept>>> {
        self.by_predicate
            .get(predicate)
            .map(|p| Arc::clone(&p.rows))
            .unwrap_or_default()
    }
}

impl TraversalEngine for FactStore {
    fn query(&self, conjunction: &Conjunction, partial: &ConceptMap) -> BaseCursor {
        let atoms = conjunction.atoms().to_vec();
        let rows = atoms.iter().map(|a| self.snapshot(&a.predicate)).collect();
        Box::new(Matches {
            atoms,
            rows,
            stack: vec![Frame {
                binding: partial.clone(),
                next_row: 0,
            }],
        })
    }
}

// ---------------------------------------------------------------------------
// Matches: depth-first join over snapshotted rows
// ---------------------------------------------------------------------------

struct Frame {
    binding: ConceptMap,
    next_row: usize,
}

struct Matches {
    atoms: Vec<Atom>,
    rows: Vec<Arc<Vec<Vec<Concept>>>>,
    /// One frame per atom currently being matched.
    stack: Vec<Frame>,
}

impl Iterator for Matches {
    type Item = ConceptMap;

    fn next(&mut self) -> Option<ConceptMap> {
        while !self.stack.is_empty() {
            let level = self.stack.len() - 1;
            let frame = &mut self.stack[level];
            let Some(row) = self.rows[level].get(frame.next_row) else {
                self.stack.pop();
                continue;
            };
            frame.next_row += 1;
            if let Some(binding) = self.atoms[level].match_arguments(row, &frame.binding) {
                if level + 1 == self.atoms.len() {
                    return Some(binding);
                }
                self.stack.push(Frame {
                    binding,
                    next_row: 0,
                });
            }
        }
        None
    }
}
