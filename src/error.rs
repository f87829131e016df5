//! Rich diagnostic error types for the akh-resolve reasoner.
//!
//! Each subsystem defines its own error type with miette `#[diagnostic]` derives,
//! providing error codes, help text, and source chains so users know exactly what
//! went wrong and how to fix it.

use miette::Diagnostic;
use thiserror::Error;

/// Top-level error type for the reasoner.
///
/// Each variant wraps a subsystem-specific error, preserving the full diagnostic
/// chain (error codes, help text) through to the user.
#[derive(Debug, Error, Diagnostic)]
pub enum ReasonerError {
    #[error(transparent)]
    #[diagnostic(transparent)]
    Pattern(#[from] PatternError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Resolution(#[from] ResolutionError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Config(#[from] ConfigError),
}

// ---------------------------------------------------------------------------
// Pattern errors
// ---------------------------------------------------------------------------

#[derive(Debug, Error, Diagnostic)]
pub enum PatternError {
    #[error("cannot parse '{input}': {message}")]
    #[diagnostic(
        code(akh::pattern::parse),
        help(
            "Atoms are written as `predicate(term, term, ...)`. Variables start \
             with '?', everything else is a concept label. Rules are written as \
             `name: head(?x) :- body(?x), other(?x)`."
        )
    )]
    Parse { input: String, message: String },

    #[error("rule '{rule}' has an empty body")]
    #[diagnostic(
        code(akh::pattern::empty_body),
        help("A rule needs at least one body atom to derive anything from.")
    )]
    EmptyBody { rule: String },

    #[error("rule '{rule}' concludes variable ?{variable} that its body never binds")]
    #[diagnostic(
        code(akh::pattern::unsafe_rule),
        help(
            "Every variable in the rule head must also appear in the body, \
             otherwise derived answers would contain unbound values."
        )
    )]
    UnsafeRule { rule: String, variable: String },

    #[error("duplicate rule name '{rule}'")]
    #[diagnostic(
        code(akh::pattern::duplicate_rule),
        help("Rule names identify rule resolvers and must be unique within a rule set.")
    )]
    DuplicateRule { rule: String },

    #[error("empty conjunction")]
    #[diagnostic(
        code(akh::pattern::empty_conjunction),
        help("A query must contain at least one atom.")
    )]
    EmptyConjunction,
}

// ---------------------------------------------------------------------------
// Store errors
// ---------------------------------------------------------------------------

#[derive(Debug, Error, Diagnostic)]
pub enum StoreError {
    #[error("illegal operation: cannot commit inferred fact {fact}")]
    #[diagnostic(
        code(akh::store::illegal_operation),
        help(
            "Inferred facts exist only for the lifetime of a resolution and are \
             re-derived on demand. Insert the fact as a stored fact instead if it \
             should become part of the knowledge base."
        )
    )]
    IllegalOperation { fact: String },

    #[error("cannot instantiate {atom}: variable ?{variable} is unbound")]
    #[diagnostic(
        code(akh::store::unbound_variable),
        help("Only fully bound atoms can become facts. Check the answer's variables.")
    )]
    UnboundVariable { atom: String, variable: String },
}

// ---------------------------------------------------------------------------
// Resolution errors
// ---------------------------------------------------------------------------

#[derive(Debug, Error, Diagnostic)]
pub enum ResolutionError {
    #[error("{resolver}: cannot reiterate from iteration {previous} to {requested}")]
    #[diagnostic(
        code(akh::resolution::non_increasing_iteration),
        help(
            "Iterations must strictly increase. This is a bug in the resolver \
             network; please file a report with the query that triggered it."
        )
    )]
    NonIncreasingIteration {
        resolver: String,
        previous: u32,
        requested: u32,
    },

    #[error("{resolver}: no planned downstream after step {step} of {plan_len}")]
    #[diagnostic(
        code(akh::resolution::plan_exhausted),
        help("The join plan was asked for a step past its end. This is a resolver bug.")
    )]
    PlanExhausted {
        resolver: String,
        step: usize,
        plan_len: usize,
    },

    #[error("{resolver}: received a response for a request it never sent")]
    #[diagnostic(
        code(akh::resolution::unrouted_response),
        help("Responses must answer a request recorded by the receiving resolver.")
    )]
    UnroutedResponse { resolver: String },

    #[error("{resolver} is no longer running")]
    #[diagnostic(
        code(akh::resolution::actor_terminated),
        help(
            "A resolver mailbox was closed while messages were still addressed to \
             it. The resolution was cancelled or another resolver failed first."
        )
    )]
    ActorTerminated { resolver: String },

    #[error("resolver {resolver} failed")]
    #[diagnostic(
        code(akh::resolution::actor_failed),
        help("The resolution was cancelled. The underlying error is shown below.")
    )]
    ActorFailed {
        resolver: String,
        #[source]
        source: Box<ResolutionError>,
    },

    #[error("panicked: {message}")]
    #[diagnostic(
        code(akh::resolution::panicked),
        help(
            "A resolver, or the traversal engine or rule index it called, panicked. \
             The resolution was cancelled."
        )
    )]
    Panicked { message: String },

    #[error("no fixpoint after {max_iterations} iterations")]
    #[diagnostic(
        code(akh::resolution::iteration_limit),
        help("Increase `max_iterations` in the reasoner configuration.")
    )]
    IterationLimit { max_iterations: u32 },

    #[error("no response within {timeout_ms}ms during iteration {iteration}")]
    #[diagnostic(
        code(akh::resolution::timeout),
        help("Raise or unset `answer_timeout_ms` in the reasoner configuration.")
    )]
    Timeout { iteration: u32, timeout_ms: u64 },

    #[error("no tokio runtime available to host resolvers")]
    #[diagnostic(
        code(akh::resolution::no_runtime),
        help("Call `Reasoner::resolve` from within a tokio runtime.")
    )]
    NoRuntime,

    #[error("resolution session closed unexpectedly")]
    #[diagnostic(
        code(akh::resolution::session_closed),
        help("Every resolver stopped before replying to the root request.")
    )]
    SessionClosed,
}

// ---------------------------------------------------------------------------
// Config errors
// ---------------------------------------------------------------------------

#[derive(Debug, Error, Diagnostic)]
pub enum ConfigError {
    #[error("cannot read {path}: {source}")]
    #[diagnostic(
        code(akh::config::io),
        help("Check that the file exists and is readable.")
    )]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid TOML configuration: {message}")]
    #[diagnostic(
        code(akh::config::toml),
        help("See `ReasonerConfig` for the accepted keys.")
    )]
    Toml { message: String },

    #[error("invalid program file: {message}")]
    #[diagnostic(
        code(akh::config::program),
        help("A program is a JSON object with `facts`, `rules` and `query` fields.")
    )]
    Program { message: String },

    #[error("invalid configuration: {message}")]
    #[diagnostic(code(akh::config::invalid))]
    Invalid { message: String },
}

/// Result type alias for reasoner operations.
pub type ReasonerResult<T> = std::result::Result<T, ReasonerError>;
