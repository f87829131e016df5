//! Driving a resolution: iterations, fixpoint detection and teardown.
//!
//! A [`Resolution`] owns the resolver network for one query. It repeatedly
//! asks the root resolver for its next answer until the root reports
//! exhaustion; that ends one iteration. Iterations repeat until an
//! iteration tables no new inferred answer (or the query never recursed),
//! at which point the answer set is complete.

use std::sync::Arc;

use tokio::sync::mpsc;

use crate::concept::ConceptMap;
use crate::config::ReasonerConfig;
use crate::error::{ReasonerResult, ResolutionError};
use crate::logic::RuleIndex;
use crate::pattern::Conjunction;
use crate::registry::ResolverRegistry;
use crate::traversal::TraversalEngine;

use super::framework::ResolutionResult;
use super::framework::actor::{Message, ResolverRef, SessionEvent};
use super::framework::request::Request;
use super::framework::response::{Answer, Response};

// ---------------------------------------------------------------------------
// Reasoner
// ---------------------------------------------------------------------------

/// Entry point: answers conjunctions over a traversal engine and a rule set.
#[derive(Clone)]
pub struct Reasoner {
    traversal: Arc<dyn TraversalEngine>,
    rules: Arc<dyn RuleIndex>,
    config: ReasonerConfig,
}

impl Reasoner {
    pub fn new(traversal: Arc<dyn TraversalEngine>, rules: Arc<dyn RuleIndex>) -> Self {
        Self {
            traversal,
            rules,
            config: ReasonerConfig::default(),
        }
    }

    pub fn with_config(mut self, config: ReasonerConfig) -> Self {
        self.config = config;
        self
    }

    pub fn config(&self) -> &ReasonerConfig {
        &self.config
    }

    /// Build the resolver network for `conjunction`.
    ///
    /// Must be called from within a tokio runtime; resolvers are spawned
    /// on it. Nothing is asked until the returned [`Resolution`] is driven.
    pub fn resolve(&self, conjunction: Conjunction) -> ReasonerResult<Resolution> {
        self.config.validate()?;
        let (sink, events) = mpsc::unbounded_channel();
        let registry = ResolverRegistry::new(Arc::clone(&self.traversal), Arc::clone(&self.rules), sink)?;
        tracing::info!(query = %conjunction, "resolving");
        let root = registry.register_root(conjunction);
        let request = Request::root(root.clone(), ConceptMap::new());
        Ok(Resolution {
            registry,
            root,
            request,
            events,
            config: self.config.clone(),
            iteration: 0,
            state: State::Idle,
            derivations_before: 0,
        })
    }

    /// Every answer to `conjunction`, once the fixpoint is reached.
    pub async fn answers(&self, conjunction: Conjunction) -> ReasonerResult<Vec<ConceptMap>> {
        let answers = self.resolve(conjunction)?.collect().await?;
        Ok(answers.into_iter().map(Answer::into_bindings).collect())
    }
}

impl std::fmt::Debug for Reasoner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Reasoner")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

// ---------------------------------------------------------------------------
// Resolution
// ---------------------------------------------------------------------------

/// The answers one iteration added.
#[derive(Debug)]
pub struct IterationReport {
    pub iteration: u32,
    /// Answers first reported in this iteration.
    pub answers: Vec<Answer>,
    /// No later iteration can add anything.
    pub fixpoint: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Idle,
    Iterating,
    Done,
}

/// What one step of driving the root produced.
enum Pulled {
    Answer(Answer),
    IterationEnd { fixpoint: bool },
    Done,
}

/// A running resolution. Dropping it stops every resolver it spawned.
pub struct Resolution {
    registry: Arc<ResolverRegistry>,
    root: ResolverRef,
    request: Request,
    events: mpsc::UnboundedReceiver<SessionEvent>,
    config: ReasonerConfig,
    iteration: u32,
    state: State,
    derivations_before: u64,
}

impl Resolution {
    /// The iteration currently running, or the next one to run.
    pub fn iteration(&self) -> u32 {
        self.iteration
    }

    /// `true` once the fixpoint was reached or the session failed.
    pub fn is_done(&self) -> bool {
        self.state == State::Done
    }

    pub fn registry(&self) -> &Arc<ResolverRegistry> {
        &self.registry
    }

    /// Run one full iteration. `None` once the fixpoint has been reported.
    pub async fn next_iteration(&mut self) -> ReasonerResult<Option<IterationReport>> {
        let iteration = self.iteration;
        let mut answers = Vec::new();
        loop {
            match self.pull().await? {
                Pulled::Answer(answer) => answers.push(answer),
                Pulled::IterationEnd { fixpoint } => {
                    return Ok(Some(IterationReport {
                        iteration,
                        answers,
                        fixpoint,
                    }));
                }
                Pulled::Done => return Ok(None),
            }
        }
    }

    /// The next new answer, crossing iteration boundaries as needed.
    pub async fn next_answer(&mut self) -> ReasonerResult<Option<Answer>> {
        loop {
            match self.pull().await? {
                Pulled::Answer(answer) => return Ok(Some(answer)),
                Pulled::IterationEnd { .. } => continue,
                Pulled::Done => return Ok(None),
            }
        }
    }

    /// Drive to the fixpoint and return every answer in discovery order.
    pub async fn collect(mut self) -> ReasonerResult<Vec<Answer>> {
        let mut all = Vec::new();
        while let Some(answer) = self.next_answer().await? {
            all.push(answer);
        }
        Ok(all)
    }

    async fn pull(&mut self) -> ReasonerResult<Pulled> {
        match self.step().await {
            Ok(pulled) => Ok(pulled),
            Err(error) => {
                self.finish();
                Err(error.into())
            }
        }
    }

    async fn step(&mut self) -> ResolutionResult<Pulled> {
        match self.state {
            State::Done => return Ok(Pulled::Done),
            State::Idle => {
                if self.iteration >= self.config.max_iterations {
                    return Err(ResolutionError::IterationLimit {
                        max_iterations: self.config.max_iterations,
                    });
                }
                self.derivations_before = self.registry.derivation_count();
                self.state = State::Iterating;
                tracing::info!(iteration = self.iteration, "iteration started");
            }
            State::Iterating => {}
        }

        self.root.tell(Message::Request {
            request: self.request.clone(),
            iteration: self.iteration,
        })?;
        match self.next_response().await? {
            Response::Answer(answer) => Ok(Pulled::Answer(answer)),
            Response::Exhausted(_) => {
                let derived = self.registry.derivation_count() - self.derivations_before;
                let fixpoint = self.registry.cycle_count() == 0 || derived == 0;
                tracing::info!(
                    iteration = self.iteration,
                    derived,
                    fixpoint,
                    "iteration complete"
                );
                self.iteration += 1;
                if fixpoint {
                    self.finish();
                } else {
                    self.state = State::Idle;
                }
                Ok(Pulled::IterationEnd { fixpoint })
            }
        }
    }

    async fn next_response(&mut self) -> ResolutionResult<Response> {
        let event = match self.config.answer_timeout() {
            Some(limit) => tokio::time::timeout(limit, self.events.recv())
                .await
                .map_err(|_| ResolutionError::Timeout {
                    iteration: self.iteration,
                    timeout_ms: limit.as_millis() as u64,
                })?,
            None => self.events.recv().await,
        };
        match event {
            Some(SessionEvent::Response { response, .. }) => Ok(response),
            Some(SessionEvent::Failed(error)) => Err(error),
            None => Err(ResolutionError::SessionClosed),
        }
    }

    fn finish(&mut self) {
        self.state = State::Done;
        self.registry.terminate();
    }
}

impl Drop for Resolution {
    fn drop(&mut self) {
        self.registry.terminate();
    }
}

impl std::fmt::Debug for Resolution {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Resolution")
            .field("root", &self.root)
            .field("iteration", &self.iteration)
            .field("state", &self.state)
            .finish()
    }
}
