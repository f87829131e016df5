//! Per-request answer generation state.

use std::collections::{HashSet, VecDeque};
use std::fmt;

use crate::concept::ConceptMap;
use crate::error::ResolutionError;
use crate::traversal::BaseCursor;

use super::ResolutionResult;
use super::request::Request;

/// Everything a resolver remembers about one upstream request.
///
/// A producer lives for one iteration. When the same request arrives with a
/// higher iteration, [`next_iteration`](Self::next_iteration) replaces it
/// with a fresh one.
pub struct ResponseProducer {
    iteration: u32,
    base: BaseCursor,
    base_drained: bool,
    produced: HashSet<ConceptMap>,
    downstream: VecDeque<Request>,
}

impl ResponseProducer {
    pub fn new(base: BaseCursor, iteration: u32) -> Self {
        Self {
            iteration,
            base,
            base_drained: false,
            produced: HashSet::new(),
            downstream: VecDeque::new(),
        }
    }

    pub fn iteration(&self) -> u32 {
        self.iteration
    }

    /// The next candidate from the base cursor, if any remain.
    pub fn next_base(&mut self) -> Option<ConceptMap> {
        if self.base_drained {
            return None;
        }
        let next = self.base.next();
        self.base_drained = next.is_none();
        next
    }

    pub fn has_produced(&self, answer: &ConceptMap) -> bool {
        self.produced.contains(answer)
    }

    /// Record `answer` as emitted. Returns `false` if it already was.
    pub fn record_produced(&mut self, answer: ConceptMap) -> bool {
        self.produced.insert(answer)
    }

    /// Queue a downstream request; a request already queued is not added twice.
    pub fn add_downstream(&mut self, request: Request) {
        if !self.downstream.contains(&request) {
            self.downstream.push_back(request);
        }
    }

    /// Drop a downstream request that reported exhaustion.
    pub fn remove_downstream(&mut self, request: &Request) -> bool {
        match self.downstream.iter().position(|r| r == request) {
            Some(index) => {
                self.downstream.remove(index);
                true
            }
            None => false,
        }
    }

    /// The next downstream request to ask. The queue rotates so repeated
    /// calls visit every pending request in turn.
    pub fn next_downstream(&mut self) -> Option<Request> {
        let request = self.downstream.pop_front()?;
        self.downstream.push_back(request.clone());
        Some(request)
    }

    /// A producer for a strictly later iteration.
    ///
    /// The new producer starts from `base` with no pending downstream
    /// requests. Answers produced so far carry over only if
    /// `retain_produced` is set.
    pub fn next_iteration(
        self,
        resolver: &str,
        base: BaseCursor,
        iteration: u32,
        retain_produced: bool,
    ) -> ResolutionResult<Self> {
        if iteration <= self.iteration {
            return Err(ResolutionError::NonIncreasingIteration {
                resolver: resolver.to_string(),
                previous: self.iteration,
                requested: iteration,
            });
        }
        let mut next = Self::new(base, iteration);
        if retain_produced {
            next.produced = self.produced;
        }
        Ok(next)
    }
}

impl fmt::Debug for ResponseProducer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResponseProducer")
            .field("iteration", &self.iteration)
            .field("base_drained", &self.base_drained)
            .field("produced", &self.produced.len())
            .field("downstream", &self.downstream.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::traversal::empty_cursor;

    fn cursor(maps: Vec<ConceptMap>) -> BaseCursor {
        Box::new(maps.into_iter())
    }

    #[test]
    fn base_cursor_is_drained_once() {
        let mut producer = ResponseProducer::new(cursor(vec![ConceptMap::new().with("x", "a")]), 0);
        assert!(producer.next_base().is_some());
        assert!(producer.next_base().is_none());
        assert!(producer.next_base().is_none());
    }

    #[test]
    fn produced_set_deduplicates() {
        let mut producer = ResponseProducer::new(empty_cursor(), 0);
        let answer = ConceptMap::new().with("x", "a");
        assert!(producer.record_produced(answer.clone()));
        assert!(!producer.record_produced(answer.clone()));
        assert!(producer.has_produced(&answer));
    }

    #[test]
    fn next_iteration_must_increase() {
        let producer = ResponseProducer::new(empty_cursor(), 2);
        let err = producer
            .next_iteration("Rule(r)", empty_cursor(), 2, false)
            .unwrap_err();
        assert!(matches!(
            err,
            ResolutionError::NonIncreasingIteration {
                previous: 2,
                requested: 2,
                ..
            }
        ));
    }

    #[test]
    fn next_iteration_carries_produced_only_when_asked() {
        let answer = ConceptMap::new().with("x", "a");

        let mut producer = ResponseProducer::new(empty_cursor(), 0);
        producer.record_produced(answer.clone());
        let retained = producer.next_iteration("root", empty_cursor(), 1, true).unwrap();
        assert!(retained.has_produced(&answer));
        assert_eq!(retained.iteration(), 1);

        let mut producer = ResponseProducer::new(empty_cursor(), 0);
        producer.record_produced(answer.clone());
        let reset = producer.next_iteration("inner", empty_cursor(), 1, false).unwrap();
        assert!(!reset.has_produced(&answer));
    }
}
