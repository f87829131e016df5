//! Immutable query patterns: atoms, conjunctions, concludables, retrievables
//! and rules.
//!
//! Patterns are parsed once and never mutated. The resolver network only
//! reads them, so they are freely shared behind `Arc`.

pub mod conjunction;
pub mod rule;

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::concept::{Concept, ConceptMap, Variable};
use crate::error::{PatternError, StoreError};

pub use conjunction::{Concludable, Conjunction, Resolvable, Retrievable};
pub use rule::Rule;

// ---------------------------------------------------------------------------
// Term
// ---------------------------------------------------------------------------

/// A position in an atom: either a variable or a concrete concept.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Term {
    Variable(Variable),
    Concept(Concept),
}

impl Term {
    /// Parse a term from a token. Variables start with `?`; anything else
    /// is a concept label.
    pub fn parse(token: &str) -> Result<Self, PatternError> {
        let token = token.trim();
        if token.is_empty() {
            return Err(PatternError::Parse {
                input: token.to_string(),
                message: "empty term".into(),
            });
        }
        match token.strip_prefix('?') {
            Some("") => Err(PatternError::Parse {
                input: token.to_string(),
                message: "variable needs a name after '?'".into(),
            }),
            Some(name) => Ok(Self::Variable(Variable::new(name))),
            None => Ok(Self::Concept(Concept::new(token))),
        }
    }

    pub fn as_variable(&self) -> Option<&Variable> {
        match self {
            Self::Variable(v) => Some(v),
            Self::Concept(_) => None,
        }
    }
}

impl fmt::Display for Term {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Variable(v) => write!(f, "{v}"),
            Self::Concept(c) => write!(f, "{c}"),
        }
    }
}

// ---------------------------------------------------------------------------
// Atom
// ---------------------------------------------------------------------------

/// A single predicate applied to terms, e.g. `edge(?x, b)`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Atom {
    pub predicate: Arc<str>,
    pub terms: Vec<Term>,
}

impl Atom {
    pub fn new(predicate: impl AsRef<str>, terms: Vec<Term>) -> Self {
        Self {
            predicate: Arc::from(predicate.as_ref()),
            terms,
        }
    }

    /// Parse an atom from `predicate(term, ...)` syntax.
    pub fn parse(s: &str) -> Result<Self, PatternError> {
        let s = s.trim();
        let parse_err = |message: &str| PatternError::Parse {
            input: s.to_string(),
            message: message.to_string(),
        };
        let (predicate, rest) = s.split_once('(').ok_or_else(|| parse_err("missing '('"))?;
        let args = rest
            .strip_suffix(')')
            .ok_or_else(|| parse_err("missing closing ')'"))?;
        let predicate = predicate.trim();
        if predicate.is_empty() || predicate.contains(|c: char| c.is_whitespace() || c == '?') {
            return Err(parse_err("invalid predicate name"));
        }
        let terms = if args.trim().is_empty() {
            Vec::new()
        } else {
            args.split(',').map(Term::parse).collect::<Result<_, _>>()?
        };
        Ok(Self::new(predicate, terms))
    }

    pub fn arity(&self) -> usize {
        self.terms.len()
    }

    /// Distinct variables in order of first appearance.
    pub fn variables(&self) -> Vec<Variable> {
        let mut seen = Vec::new();
        for v in self.terms.iter().filter_map(Term::as_variable) {
            if !seen.contains(v) {
                seen.push(v.clone());
            }
        }
        seen
    }

    /// Match this atom against a stored fact's arguments, extending `partial`.
    pub fn match_arguments(&self, arguments: &[Concept], partial: &ConceptMap) -> Option<ConceptMap> {
        if arguments.len() != self.terms.len() {
            return None;
        }
        let mut binding = partial.clone();
        for (term, value) in self.terms.iter().zip(arguments) {
            match term {
                Term::Concept(c) if c != value => return None,
                Term::Concept(_) => {}
                Term::Variable(v) => {
                    if !binding.bind(v.clone(), value.clone()) {
                        return None;
                    }
                }
            }
        }
        Some(binding)
    }

    /// Substitute a binding into the atom, producing fact arguments.
    pub fn instantiate(&self, binding: &ConceptMap) -> Result<Vec<Concept>, StoreError> {
        self.terms
            .iter()
            .map(|term| match term {
                Term::Concept(c) => Ok(c.clone()),
                Term::Variable(v) => binding.get(v).cloned().ok_or_else(|| {
                    StoreError::UnboundVariable {
                        atom: self.to_string(),
                        variable: v.name().to_string(),
                    }
                }),
            })
            .collect()
    }

    /// Rename variables; unmapped variables are kept.
    pub fn rename(&self, renaming: &BTreeMap<Variable, Variable>) -> Atom {
        let terms = self
            .terms
            .iter()
            .map(|term| match term {
                Term::Variable(v) => Term::Variable(renaming.get(v).cloned().unwrap_or_else(|| v.clone())),
                Term::Concept(c) => Term::Concept(c.clone()),
            })
            .collect();
        Atom {
            predicate: Arc::clone(&self.predicate),
            terms,
        }
    }
}

impl fmt::Display for Atom {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}(", self.predicate)?;
        for (i, term) in self.terms.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{term}")?;
        }
        f.write_str(")")
    }
}

/// Rename the variables of `atoms` to `v0, v1, ...` in order of first
/// appearance. Alpha-equivalent patterns get identical canonical forms.
pub(crate) fn canonicalize(atoms: &[Atom]) -> (Vec<Atom>, BTreeMap<Variable, Variable>) {
    let mut renaming = BTreeMap::new();
    for atom in atoms {
        for v in atom.variables() {
            let next = renaming.len();
            renaming
                .entry(v)
                .or_insert_with(|| Variable::new(format!("v{next}")));
        }
    }
    let canonical = atoms.iter().map(|a| a.rename(&renaming)).collect();
    (canonical, renaming)
}

/// Split on `sep` outside parentheses.
pub(crate) fn split_top_level(s: &str, sep: char) -> Vec<&str> {
    let mut parts = Vec::new();
    let mut depth = 0i32;
    let mut start = 0;
    for (i, c) in s.char_indices() {
        match c {
            '(' => depth += 1,
            ')' => depth -= 1,
            c if c == sep && depth == 0 => {
                parts.push(&s[start..i]);
                start = i + c.len_utf8();
            }
            _ => {}
        }
    }
    parts.push(&s[start..]);
    parts
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_atom_with_variables_and_concepts() {
        let atom = Atom::parse("edge(?x, b)").unwrap();
        assert_eq!(&*atom.predicate, "edge");
        assert_eq!(atom.terms[0], Term::Variable(Variable::new("x")));
        assert_eq!(atom.terms[1], Term::Concept(Concept::new("b")));
        assert_eq!(atom.to_string(), "edge(?x, b)");
    }

    #[test]
    fn parse_rejects_malformed_atoms() {
        assert!(Atom::parse("edge ?x b").is_err());
        assert!(Atom::parse("edge(?x, b").is_err());
        assert!(Atom::parse("(?x)").is_err());
        assert!(Atom::parse("edge(?, b)").is_err());
    }

    #[test]
    fn match_arguments_respects_repeated_variables() {
        let atom = Atom::parse("edge(?x, ?x)").unwrap();
        let loops = [Concept::new("a"), Concept::new("a")];
        let plain = [Concept::new("a"), Concept::new("b")];
        assert!(atom.match_arguments(&loops, &ConceptMap::new()).is_some());
        assert!(atom.match_arguments(&plain, &ConceptMap::new()).is_none());
    }

    #[test]
    fn canonical_forms_are_alpha_equivalent() {
        let (a, _) = canonicalize(&[Atom::parse("q(?x, ?z)").unwrap()]);
        let (b, renaming) = canonicalize(&[Atom::parse("q(?z, ?y)").unwrap()]);
        assert_eq!(a, b);
        assert_eq!(renaming[&Variable::new("z")], Variable::new("v0"));
    }

    #[test]
    fn instantiate_requires_bound_variables() {
        let atom = Atom::parse("edge(?x, ?y)").unwrap();
        let binding = ConceptMap::new().with("x", "a");
        assert!(atom.instantiate(&binding).is_err());
        let binding = binding.with("y", "b");
        assert_eq!(atom.instantiate(&binding).unwrap().len(), 2);
    }
}
