//! The traversal seam between the reasoner and graph storage.
//!
//! Resolvers never look at storage directly. They ask a [`TraversalEngine`]
//! for the stored matches of a conjunction under a partial binding and pull
//! from the returned cursor one answer at a time.

use crate::concept::ConceptMap;
use crate::pattern::Conjunction;

/// A lazy sequence of stored matches.
///
/// A cursor is consumed once. Asking the engine again for the same
/// conjunction yields a fresh cursor over the same stored facts.
pub type BaseCursor = Box<dyn Iterator<Item = ConceptMap> + Send>;

/// Produces stored matches for a conjunction.
pub trait TraversalEngine: Send + Sync {
    /// Matches of `conjunction` consistent with `partial`. Every returned map
    /// extends `partial` and binds all variables of the conjunction.
    fn query(&self, conjunction: &Conjunction, partial: &ConceptMap) -> BaseCursor;
}

/// A cursor with nothing in it.
pub fn empty_cursor() -> BaseCursor {
    Box::new(std::iter::empty())
}
