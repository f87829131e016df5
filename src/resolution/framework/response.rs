//! Replies a resolver sends back to whoever asked it.

use std::fmt;
use std::sync::Arc;

use crate::concept::ConceptMap;
use crate::resolution::answer::Derivation;

use super::actor::ResolverRef;
use super::request::Request;

/// The reply to exactly one [`Request`].
#[derive(Debug, Clone)]
pub enum Response {
    Answer(Answer),
    Exhausted(Exhausted),
}

impl Response {
    pub fn exhausted(source_request: Request) -> Self {
        Self::Exhausted(Exhausted { source_request })
    }

    pub fn source_request(&self) -> &Request {
        match self {
            Self::Answer(answer) => &answer.source_request,
            Self::Exhausted(exhausted) => &exhausted.source_request,
        }
    }
}

// ---------------------------------------------------------------------------
// Answer
// ---------------------------------------------------------------------------

/// A binding that satisfies the source request, with its provenance.
///
/// `bindings` are expressed in the variables of the request's sender, ready
/// to be merged into its own state.
#[derive(Debug, Clone)]
pub struct Answer {
    source_request: Request,
    bindings: ConceptMap,
    conjunction_label: Arc<str>,
    derivation: Derivation,
    producer: ResolverRef,
    inferred: bool,
}

impl Answer {
    pub fn new(
        source_request: Request,
        bindings: ConceptMap,
        conjunction_label: Arc<str>,
        derivation: Derivation,
        producer: ResolverRef,
        inferred: bool,
    ) -> Self {
        Self {
            source_request,
            bindings,
            conjunction_label,
            derivation,
            producer,
            inferred,
        }
    }

    pub fn source_request(&self) -> &Request {
        &self.source_request
    }

    pub fn bindings(&self) -> &ConceptMap {
        &self.bindings
    }

    pub fn into_bindings(self) -> ConceptMap {
        self.bindings
    }

    /// Label of the pattern that produced this answer, e.g. a rule name.
    pub fn conjunction_label(&self) -> &str {
        &self.conjunction_label
    }

    pub fn derivation(&self) -> &Derivation {
        &self.derivation
    }

    pub fn producer(&self) -> &ResolverRef {
        &self.producer
    }

    /// `true` if some rule contributed to this answer.
    pub fn is_inferred(&self) -> bool {
        self.inferred
    }

    /// A readable derivation tree, one contributing answer per line.
    pub fn explain(&self) -> String {
        let mut out = String::new();
        self.explain_into(&mut out, 0);
        out
    }

    fn explain_into(&self, out: &mut String, depth: usize) {
        let indent = "  ".repeat(depth);
        let kind = if self.inferred { "inferred" } else { "stored" };
        out.push_str(&format!(
            "{indent}{} [{}] {kind} by {}\n",
            self.bindings, self.conjunction_label, self.producer
        ));
        for (_, contributed) in self.derivation.iter() {
            contributed.explain_into(out, depth + 1);
        }
    }
}

impl fmt::Display for Answer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.bindings)
    }
}

// ---------------------------------------------------------------------------
// Exhausted
// ---------------------------------------------------------------------------

/// No further answers exist for the source request in this iteration.
#[derive(Debug, Clone)]
pub struct Exhausted {
    source_request: Request,
}

impl Exhausted {
    pub fn source_request(&self) -> &Request {
        &self.source_request
    }
}
