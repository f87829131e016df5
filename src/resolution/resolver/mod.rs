//! The concrete resolver kinds.
//!
//! | Kind | Serves | Asks |
//! |------|--------|------|
//! | [`RootResolver`] | the session | one resolver per resolvable of the query |
//! | [`ConcludableResolver`] | joins | rule resolvers (unless the request is cyclic) |
//! | [`RuleResolver`] | concludables | one resolver per resolvable of the rule body |
//! | [`RetrievableResolver`] | joins | nobody |

pub mod concludable;
pub mod join;
pub mod retrievable;
pub mod root;
pub mod rule;

use std::sync::Arc;

use crate::concept::ConceptMap;
use crate::resolution::answer::Derivation;
use crate::resolution::framework::ResolutionResult;
use crate::resolution::framework::producer::ResponseProducer;
use crate::resolution::framework::request::Request;
use crate::resolution::framework::resolver::{Resolver, ResolverCore};
use crate::resolution::framework::response::Answer;

pub use concludable::ConcludableResolver;
pub use retrievable::RetrievableResolver;
pub use root::RootResolver;
pub use rule::RuleResolver;

/// Any resolver an actor can host.
pub enum ResolverKind {
    Root(RootResolver),
    Concludable(ConcludableResolver),
    Retrievable(RetrievableResolver),
    Rule(RuleResolver),
}

macro_rules! dispatch {
    ($self:ident, $r:ident => $body:expr) => {
        match $self {
            ResolverKind::Root($r) => $body,
            ResolverKind::Concludable($r) => $body,
            ResolverKind::Retrievable($r) => $body,
            ResolverKind::Rule($r) => $body,
        }
    };
}

impl Resolver for ResolverKind {
    fn core(&self) -> &ResolverCore {
        dispatch!(self, r => r.core())
    }

    fn core_mut(&mut self) -> &mut ResolverCore {
        dispatch!(self, r => r.core_mut())
    }

    fn label(&self) -> Arc<str> {
        dispatch!(self, r => r.label())
    }

    fn initialise_downstream(&mut self) -> ResolutionResult<()> {
        dispatch!(self, r => r.initialise_downstream())
    }

    fn create_producer(&mut self, request: &Request, iteration: u32) -> ResolutionResult<ResponseProducer> {
        dispatch!(self, r => r.create_producer(request, iteration))
    }

    fn reiterate_producer(
        &mut self,
        request: &Request,
        previous: ResponseProducer,
        iteration: u32,
    ) -> ResolutionResult<ResponseProducer> {
        dispatch!(self, r => r.reiterate_producer(request, previous, iteration))
    }

    fn receive_answer(&mut self, answer: Answer, iteration: u32) -> ResolutionResult<()> {
        dispatch!(self, r => r.receive_answer(answer, iteration))
    }

    fn base_provenance(&self, local: &ConceptMap) -> (bool, Derivation) {
        dispatch!(self, r => r.base_provenance(local))
    }
}
