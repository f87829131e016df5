//! Requests and the resolver paths they travel along.

use std::fmt;
use std::hash::{Hash, Hasher};

use crate::concept::ConceptMap;
use crate::resolution::answer::{Bindings, Derivation};

use super::actor::{ResolverId, ResolverRef};

// ---------------------------------------------------------------------------
// ResolutionPath
// ---------------------------------------------------------------------------

/// The resolvers a request has travelled through, from the root to its
/// receiver inclusive.
///
/// Every hop except the last also records the bindings the resolver at that
/// hop was asked with. Two requests therefore share a path only if their
/// entire upstream chains agree, which keeps request identities unique per
/// requester even when two requesters push down the same local binding.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ResolutionPath {
    resolvers: Vec<ResolverRef>,
    asked_with: Vec<Bindings>,
}

impl ResolutionPath {
    /// A path that starts and ends at `root`.
    pub fn root(root: ResolverRef) -> Self {
        Self {
            resolvers: vec![root],
            asked_with: Vec::new(),
        }
    }

    /// This path extended by one hop to `next`.
    pub fn append(&self, next: ResolverRef, asked_with: Bindings) -> Self {
        let mut resolvers = self.resolvers.clone();
        resolvers.push(next);
        let mut bindings = self.asked_with.clone();
        bindings.push(asked_with);
        Self {
            resolvers,
            asked_with: bindings,
        }
    }

    pub fn receiver(&self) -> &ResolverRef {
        // A path always holds at least its root.
        &self.resolvers[self.resolvers.len() - 1]
    }

    /// The resolver that sent the request, or `None` for the root request.
    pub fn sender(&self) -> Option<&ResolverRef> {
        self.resolvers.len().checked_sub(2).map(|i| &self.resolvers[i])
    }

    /// `true` if the receiver already appears earlier on the path.
    pub fn is_cyclic(&self) -> bool {
        let receiver = self.receiver().id();
        self.upstream_contains(receiver)
    }

    /// `true` if `id` appears on the path before the receiver.
    pub fn upstream_contains(&self, id: ResolverId) -> bool {
        self.resolvers[..self.resolvers.len() - 1]
            .iter()
            .any(|r| r.id() == id)
    }

    pub fn resolvers(&self) -> &[ResolverRef] {
        &self.resolvers
    }

    pub fn len(&self) -> usize {
        self.resolvers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.resolvers.is_empty()
    }
}

impl fmt::Display for ResolutionPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, resolver) in self.resolvers.iter().enumerate() {
            if i > 0 {
                f.write_str(" -> ")?;
            }
            write!(f, "{resolver}")?;
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Request
// ---------------------------------------------------------------------------

/// A demand for the next answer of a resolver under some bindings.
///
/// Identity is the path plus the bindings. The derivation rides along so a
/// join can extend it step by step, but two requests that differ only in
/// derivation are the same request.
#[derive(Debug, Clone)]
pub struct Request {
    path: ResolutionPath,
    bindings: Bindings,
    derivation: Derivation,
}

impl Request {
    /// The request a session sends to its root resolver.
    pub fn root(root: ResolverRef, bindings: ConceptMap) -> Self {
        Self {
            path: ResolutionPath::root(root),
            bindings: Bindings::initial(bindings),
            derivation: Derivation::default(),
        }
    }

    /// A request from the receiver of `from_upstream` to `receiver`.
    pub fn downstream(
        from_upstream: &Request,
        receiver: ResolverRef,
        bindings: Bindings,
        derivation: Derivation,
    ) -> Self {
        Self {
            path: from_upstream
                .path
                .append(receiver, from_upstream.bindings.clone()),
            bindings,
            derivation,
        }
    }

    pub fn path(&self) -> &ResolutionPath {
        &self.path
    }

    pub fn sender(&self) -> Option<&ResolverRef> {
        self.path.sender()
    }

    pub fn receiver(&self) -> &ResolverRef {
        self.path.receiver()
    }

    pub fn bindings(&self) -> &Bindings {
        &self.bindings
    }

    pub fn derivation(&self) -> &Derivation {
        &self.derivation
    }
}

impl PartialEq for Request {
    fn eq(&self, other: &Self) -> bool {
        self.path == other.path && self.bindings == other.bindings
    }
}

impl Eq for Request {}

impl Hash for Request {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.path.hash(state);
        self.bindings.hash(state);
    }
}

impl fmt::Display for Request {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.path, self.bindings.local())
    }
}
