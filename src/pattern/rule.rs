//! Inference rules: `when` conjunction implies `then` atom.
//!
//! Rules are data, not code. They can be constructed programmatically or
//! parsed from the text form `name: head(?x) :- body(?x), other(?x, ?y)`.

use std::fmt;

use crate::error::PatternError;

use super::{Atom, Conjunction};

/// A single Horn rule.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Rule {
    name: String,
    when: Conjunction,
    then: Atom,
}

impl Rule {
    /// Build a rule, checking that every head variable is bound by the body.
    pub fn new(name: impl Into<String>, when: Conjunction, then: Atom) -> Result<Self, PatternError> {
        let name = name.into();
        let body_vars = when.variables();
        if let Some(unbound) = then.variables().into_iter().find(|v| !body_vars.contains(v)) {
            return Err(PatternError::UnsafeRule {
                rule: name,
                variable: unbound.name().to_string(),
            });
        }
        Ok(Self { name, when, then })
    }

    /// Parse `name: head :- body`.
    pub fn parse(s: &str) -> Result<Self, PatternError> {
        let s = s.trim();
        let parse_err = |message: &str| PatternError::Parse {
            input: s.to_string(),
            message: message.to_string(),
        };
        let (name, clause) = s
            .split_once(':')
            .filter(|(_, rest)| !rest.starts_with('-'))
            .ok_or_else(|| parse_err("rule needs a name, e.g. `name: head :- body`"))?;
        let (head, body) = clause
            .split_once(":-")
            .ok_or_else(|| parse_err("missing ':-' between head and body"))?;
        let name = name.trim();
        if name.is_empty() {
            return Err(parse_err("empty rule name"));
        }
        let then = Atom::parse(head)?;
        let when = Conjunction::parse(body).map_err(|e| match e {
            PatternError::EmptyConjunction => PatternError::EmptyBody {
                rule: name.to_string(),
            },
            other => other,
        })?;
        Self::new(name, when, then)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn when(&self) -> &Conjunction {
        &self.when
    }

    pub fn then(&self) -> &Atom {
        &self.then
    }
}

impl fmt::Display for Rule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {} :- {}", self.name, self.then, self.when)
    }
}
