// thiserror's #[error("...{field}...")] format strings reference struct fields,
// but the compiler doesn't see through the derive macro and reports false positives.
#![allow(unused_assignments)]

//! # akh-resolve
//!
//! Rule-based reasoning over a store of facts, driven by a network of
//! resolver actors.
//!
//! ## Architecture
//!
//! - **Patterns** (`pattern`): atoms, conjunctions, rules and the resolvables a conjunction splits into
//! - **Storage** (`store`, `traversal`): stored facts behind the `TraversalEngine` seam
//! - **Rules** (`logic`): rule sets behind the `RuleIndex` seam
//! - **Resolution** (`resolution`): resolver actors, request/response protocol, iteration to fixpoint
//! - **Registry** (`registry`): one memoised resolver per distinct sub-goal
//!
//! ## Library usage
//!
//! ```no_run
//! use std::sync::Arc;
//! use akh_resolve::logic::RuleSet;
//! use akh_resolve::pattern::Conjunction;
//! use akh_resolve::resolution::Reasoner;
//! use akh_resolve::store::FactStore;
//!
//! # async fn run() -> akh_resolve::error::ReasonerResult<()> {
//! let facts = FactStore::parse("parent(ann, bob)\nparent(bob, cid)")?;
//! let rules = RuleSet::parse("gp: grandparent(?x, ?z) :- parent(?x, ?y), parent(?y, ?z)")?;
//! let reasoner = Reasoner::new(Arc::new(facts), Arc::new(rules));
//!
//! let mut resolution = reasoner.resolve(Conjunction::parse("grandparent(?who, cid)")?)?;
//! while let Some(answer) = resolution.next_answer().await? {
//!     println!("{answer}");
//!     print!("{}", answer.explain());
//! }
//! # Ok(())
//! # }
//! ```

pub mod concept;
pub mod config;
pub mod error;
pub mod logic;
pub mod pattern;
pub mod program;
pub mod registry;
pub mod resolution;
pub mod store;
pub mod traversal;
