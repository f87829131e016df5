//! JSON program files: facts, rules and a query in one document.
//!
//! ```json
//! {
//!   "facts": ["edge(a, b)", "edge(b, c)"],
//!   "rules": ["reach: path(?x, ?y) :- edge(?x, ?y)"],
//!   "query": "path(a, ?y)"
//! }
//! ```

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::concept::ConceptMap;
use crate::error::{ConfigError, ReasonerResult};
use crate::logic::RuleSet;
use crate::pattern::{Conjunction, Rule};
use crate::resolution::Answer;
use crate::store::{Fact, FactStore};

/// A complete reasoning problem.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Program {
    #[serde(default)]
    pub facts: Vec<String>,
    #[serde(default)]
    pub rules: Vec<String>,
    pub query: String,
}

impl Program {
    pub fn from_json_str(content: &str) -> Result<Self, ConfigError> {
        serde_json::from_str(content).map_err(|e| ConfigError::Program {
            message: e.to_string(),
        })
    }

    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::Io {
            path: path.display().to_string(),
            source: e,
        })?;
        Self::from_json_str(&content)
    }

    /// Parse every fact into a fresh store.
    pub fn fact_store(&self) -> ReasonerResult<FactStore> {
        let store = FactStore::new();
        for fact in &self.facts {
            store.commit(&Fact::parse(fact)?)?;
        }
        Ok(store)
    }

    pub fn rule_set(&self) -> ReasonerResult<RuleSet> {
        let mut rules = RuleSet::new();
        for rule in &self.rules {
            rules.add(Rule::parse(rule)?)?;
        }
        Ok(rules)
    }

    pub fn conjunction(&self) -> ReasonerResult<Conjunction> {
        Ok(Conjunction::parse(&self.query)?)
    }
}

/// One answer as printed by the CLI in JSON mode.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnswerRecord {
    pub iteration: u32,
    pub bindings: ConceptMap,
    pub inferred: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub explanation: Option<String>,
}

impl AnswerRecord {
    pub fn new(iteration: u32, answer: &Answer, explain: bool) -> Self {
        Self {
            iteration,
            bindings: answer.bindings().clone(),
            inferred: answer.is_inferred(),
            explanation: explain.then(|| answer.explain()),
        }
    }
}
