//! Rule-based reasoning as a network of resolver actors.
//!
//! A query is answered by a tree of resolvers, one per distinct sub-goal:
//!
//! - the **root** joins the query's resolvables and reports to the session,
//! - a **concludable** answers one atom from stored facts and from rules,
//! - a **rule** joins its body and projects answers onto its head,
//! - a **retrievable** answers rule-free atoms from stored facts.
//!
//! Resolvers exchange [`Request`]s and [`Response`]s. Every request is
//! answered with exactly one response: an [`Answer`] or an
//! [`Exhausted`](framework::response::Exhausted). Recursion through rules is
//! bounded by cycle detection on the request path plus iteration: each
//! iteration replays the query with the inferred answers tabled by the
//! previous one, until nothing new is derived.
//!
//! ```
//! use std::sync::Arc;
//! use akh_resolve::logic::RuleSet;
//! use akh_resolve::pattern::Conjunction;
//! use akh_resolve::resolution::Reasoner;
//! use akh_resolve::store::FactStore;
//!
//! # fn main() -> akh_resolve::error::ReasonerResult<()> {
//! # let runtime = tokio::runtime::Runtime::new().expect("tokio runtime");
//! let facts = FactStore::parse("edge(a, b)\nedge(b, c)\nedge(c, d)")?;
//! let rules = RuleSet::parse(
//!     "base: path(?x, ?y) :- edge(?x, ?y)\n\
//!      step: path(?x, ?z) :- edge(?x, ?y), path(?y, ?z)",
//! )?;
//! let reasoner = Reasoner::new(Arc::new(facts), Arc::new(rules));
//! let query = Conjunction::parse("path(a, ?y)")?;
//! let answers = runtime.block_on(reasoner.answers(query))?;
//! assert_eq!(answers.len(), 3);
//! # Ok(())
//! # }
//! ```

pub mod answer;
pub mod framework;
pub mod mapping;
pub mod resolver;
pub mod session;

pub use answer::{Bindings, Derivation};
pub use framework::actor::{ResolverId, ResolverRef};
pub use framework::request::{Request, ResolutionPath};
pub use framework::response::{Answer, Response};
pub use mapping::Mapping;
pub use session::{IterationReport, Reasoner, Resolution};
