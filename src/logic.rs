//! Rule storage and rule-to-concludable indexing.
//!
//! The resolver network only asks one question of the rule layer: which
//! rules might conclude facts matching this concludable? [`RuleIndex`] is
//! that seam; [`RuleSet`] is the in-memory implementation, indexed by head
//! predicate.

use std::collections::HashMap;
use std::sync::Arc;

use crate::error::PatternError;
use crate::pattern::{Concludable, Rule};

/// Given a concludable, returns the rules that may produce matching facts.
///
/// Implementations may over-approximate; callers unify each candidate's head
/// against the concludable and drop those that do not unify.
pub trait RuleIndex: Send + Sync {
    fn applicable_rules(&self, concludable: &Concludable) -> Vec<Arc<Rule>>;
}

/// An in-memory collection of rules indexed by head predicate.
#[derive(Debug, Clone, Default)]
pub struct RuleSet {
    rules: Vec<Arc<Rule>>,
    by_head: HashMap<Arc<str>, Vec<usize>>,
}

impl RuleSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse one rule per non-empty line; `#` starts a comment line.
    pub fn parse(text: &str) -> Result<Self, PatternError> {
        let mut set = Self::new();
        for line in text.lines().map(str::trim) {
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            set.add(Rule::parse(line)?)?;
        }
        Ok(set)
    }

    pub fn add(&mut self, rule: Rule) -> Result<(), PatternError> {
        if self.rules.iter().any(|r| r.name() == rule.name()) {
            return Err(PatternError::DuplicateRule {
                rule: rule.name().to_string(),
            });
        }
        let index = self.rules.len();
        self.by_head
            .entry(Arc::clone(&rule.then().predicate))
            .or_default()
            .push(index);
        self.rules.push(Arc::new(rule));
        Ok(())
    }

    pub fn rules(&self) -> &[Arc<Rule>] {
        &self.rules
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}

impl RuleIndex for RuleSet {
    fn applicable_rules(&self, concludable: &Concludable) -> Vec<Arc<Rule>> {
        let atom = concludable.atom();
        self.by_head
            .get(&atom.predicate)
            .into_iter()
            .flatten()
            .map(|&i| &self.rules[i])
            .filter(|rule| rule.then().arity() == atom.arity())
            .cloned()
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pattern::Atom;

    #[test]
    fn index_by_head_predicate_and_arity() {
        let set = RuleSet::parse(
            "# family rules\n\
             parent: parent(?x, ?y) :- mother(?x, ?y)\n\
             parent2: parent(?x, ?y) :- father(?x, ?y)\n\
             person: person(?x) :- parent(?x, ?y)\n",
        )
        .unwrap();
        assert_eq!(set.len(), 3);

        let query = Concludable::new(Atom::parse("parent(?a, ?b)").unwrap());
        assert_eq!(set.applicable_rules(&query).len(), 2);

        let wrong_arity = Concludable::new(Atom::parse("parent(?a)").unwrap());
        assert!(set.applicable_rules(&wrong_arity).is_empty());
    }

    #[test]
    fn duplicate_rule_names_are_rejected() {
        let mut set = RuleSet::new();
        set.add(Rule::parse("r: q(?x) :- p(?x)").unwrap()).unwrap();
        let err = set.add(Rule::parse("r: s(?x) :- p(?x)").unwrap()).unwrap_err();
        assert!(matches!(err, PatternError::DuplicateRule { .. }));
    }
}
