//! End-to-end resolution tests.
//!
//! These drive full resolver networks through the public `Reasoner` API:
//! plain retrieval, non-recursive rules, recursive rules that need several
//! iterations, provenance of inferred answers, and failure surfacing.

use std::collections::{BTreeSet, HashSet};
use std::sync::Arc;
use std::time::Duration;

use akh_resolve::concept::ConceptMap;
use akh_resolve::config::ReasonerConfig;
use akh_resolve::error::{ReasonerError, ResolutionError, StoreError};
use akh_resolve::logic::RuleSet;
use akh_resolve::pattern::{Atom, Conjunction};
use akh_resolve::resolution::{Answer, Reasoner};
use akh_resolve::store::{Fact, FactStore};
use akh_resolve::traversal::{BaseCursor, TraversalEngine, empty_cursor};

fn reasoner(facts: &str, rules: &str) -> Reasoner {
    Reasoner::new(
        Arc::new(FactStore::parse(facts).unwrap()),
        Arc::new(RuleSet::parse(rules).unwrap()),
    )
}

fn query(s: &str) -> Conjunction {
    Conjunction::parse(s).unwrap()
}

fn pairs(answers: &[Answer]) -> BTreeSet<(String, String)> {
    answers
        .iter()
        .map(|a| {
            let b = a.bindings();
            let get = |v: &str| {
                b.iter()
                    .find(|(var, _)| var.name() == v)
                    .map(|(_, c)| c.label().to_string())
                    .unwrap()
            };
            (get("x"), get("y"))
        })
        .collect()
}

fn set(items: &[(&str, &str)]) -> BTreeSet<(String, String)> {
    items
        .iter()
        .map(|(a, b)| (a.to_string(), b.to_string()))
        .collect()
}

const CHAIN: &str = "q(a, b)\nq(b, c)\nq(c, d)";
const TRANSITIVE: &str = "trans: q(?x, ?y) :- q(?x, ?z), q(?z, ?y)";

// ---------------------------------------------------------------------------
// Retrieval without rules
// ---------------------------------------------------------------------------

#[tokio::test]
async fn stored_facts_are_answered_exactly_once() {
    let reasoner = reasoner("p(a)\np(b)\nr(c)", "");
    let mut resolution = reasoner.resolve(query("p(?x)")).unwrap();

    let report = resolution.next_iteration().await.unwrap().unwrap();
    assert_eq!(report.iteration, 0);
    assert!(report.fixpoint);
    assert_eq!(report.answers.len(), 2);
    assert!(report.answers.iter().all(|a| !a.is_inferred()));

    let distinct: HashSet<_> = report.answers.iter().map(|a| a.bindings().clone()).collect();
    assert_eq!(distinct.len(), 2);
    assert!(distinct.contains(&ConceptMap::new().with("x", "a")));

    assert!(resolution.next_iteration().await.unwrap().is_none());
    assert!(resolution.is_done());
}

#[tokio::test]
async fn joins_across_retrievables() {
    let reasoner = reasoner("edge(a, b)\nedge(b, c)\nedge(c, d)\nlabel(c, red)", "");
    let answers = reasoner
        .answers(query("edge(?x, ?y), edge(?y, ?z), label(?z, red)"))
        .await
        .unwrap();
    assert_eq!(
        answers,
        vec![ConceptMap::new().with("x", "a").with("y", "b").with("z", "c")]
    );
}

#[tokio::test]
async fn no_matches_yields_no_answers() {
    let reasoner = reasoner("p(a)", "");
    let answers = reasoner.answers(query("p(z)")).await.unwrap();
    assert!(answers.is_empty());
}

// ---------------------------------------------------------------------------
// Non-recursive rules
// ---------------------------------------------------------------------------

#[tokio::test]
async fn single_rule_answers_through_its_body() {
    let reasoner = reasoner("p(a)\np(b)", "r: q(?x) :- p(?x)");
    let mut resolution = reasoner.resolve(query("q(?x)")).unwrap();

    let report = resolution.next_iteration().await.unwrap().unwrap();
    assert!(report.fixpoint, "a query without recursion completes in one iteration");
    assert_eq!(report.answers.len(), 2);
    assert!(report.answers.iter().all(Answer::is_inferred));
    assert_eq!(resolution.registry().cycle_count(), 0);

    // Root ← Concludable(q) ← Rule(r): the rule's answer is recorded under
    // the concludable's answer.
    let answer = &report.answers[0];
    let (concludable, via) = answer.derivation().iter().next().unwrap();
    assert_eq!(concludable.name(), "Concludable(q(?v0))");
    let (rule, _) = via.derivation().iter().next().unwrap();
    assert_eq!(rule.name(), "Rule(r)");
    assert!(answer.explain().contains("[r] inferred"));
}

#[tokio::test]
async fn constants_flow_into_rules_and_back() {
    let reasoner = reasoner(
        "parent(ann, bob)\nparent(bob, cid)\nparent(bob, dan)\nparent(eve, fay)",
        "gp: grandparent(?x, ?z) :- parent(?x, ?y), parent(?y, ?z)",
    );
    let answers = reasoner.answers(query("grandparent(ann, ?who)")).await.unwrap();
    let who: BTreeSet<_> = answers
        .iter()
        .map(|a| a.iter().next().unwrap().1.label().to_string())
        .collect();
    assert_eq!(who, BTreeSet::from(["cid".to_string(), "dan".to_string()]));
}

#[tokio::test]
async fn rule_head_constants_filter_answers() {
    let reasoner = reasoner("likes(ann, tea)\nlikes(bob, coffee)", "tea: drinker(?x, tea) :- likes(?x, tea)");
    let answers = reasoner.answers(query("drinker(?x, ?what)")).await.unwrap();
    assert_eq!(
        answers,
        vec![ConceptMap::new().with("what", "tea").with("x", "ann")]
    );
}

#[tokio::test]
async fn stored_and_inferred_answers_are_merged() {
    let reasoner = reasoner("q(a)\np(a)\np(b)", "r: q(?x) :- p(?x)");
    let answers = reasoner.resolve(query("q(?x)")).unwrap().collect().await.unwrap();
    assert_eq!(answers.len(), 2, "q(a) is both stored and inferred but reported once");
}

// ---------------------------------------------------------------------------
// Recursive rules
// ---------------------------------------------------------------------------

#[tokio::test]
async fn transitive_closure_grows_per_iteration() {
    let reasoner = reasoner(CHAIN, TRANSITIVE);
    let mut resolution = reasoner.resolve(query("q(?x, ?y)")).unwrap();

    let first = resolution.next_iteration().await.unwrap().unwrap();
    assert_eq!(first.iteration, 0);
    assert!(!first.fixpoint);
    assert_eq!(
        pairs(&first.answers),
        set(&[("a", "b"), ("b", "c"), ("c", "d"), ("a", "c"), ("b", "d")])
    );

    let second = resolution.next_iteration().await.unwrap().unwrap();
    assert_eq!(second.iteration, 1);
    assert!(!second.fixpoint);
    assert_eq!(pairs(&second.answers), set(&[("a", "d")]));

    let third = resolution.next_iteration().await.unwrap().unwrap();
    assert_eq!(third.iteration, 2);
    assert!(third.fixpoint);
    assert!(third.answers.is_empty());

    assert!(resolution.next_iteration().await.unwrap().is_none());
    assert!(resolution.registry().cycle_count() > 0);
}

#[tokio::test]
async fn recursion_over_cyclic_data_terminates() {
    let reasoner = reasoner("q(a, b)\nq(b, c)\nq(c, a)", TRANSITIVE);
    let answers = reasoner.resolve(query("q(?x, ?y)")).unwrap().collect().await.unwrap();
    let found = pairs(&answers);
    assert_eq!(found.len(), 9, "every node reaches every node");
    assert_eq!(answers.len(), 9, "no answer is reported twice");
}

#[tokio::test]
async fn left_recursive_path_with_bound_start() {
    let reasoner = reasoner(
        "edge(a, b)\nedge(b, c)\nedge(c, d)\nedge(x, y)",
        "base: path(?x, ?y) :- edge(?x, ?y)\n\
         step: path(?x, ?z) :- path(?x, ?y), edge(?y, ?z)",
    );
    let answers = reasoner.answers(query("path(a, ?to)")).await.unwrap();
    let reached: BTreeSet<_> = answers
        .iter()
        .map(|a| a.iter().next().unwrap().1.label().to_string())
        .collect();
    assert_eq!(
        reached,
        BTreeSet::from(["b".to_string(), "c".to_string(), "d".to_string()])
    );
}

#[tokio::test]
async fn right_recursive_reach_with_bound_start() {
    let reasoner = reasoner(
        "edge(a, b)\nedge(b, c)\nedge(c, d)\nedge(x, y)",
        "base: reach(?x, ?y) :- edge(?x, ?y)\n\
         step: reach(?x, ?y) :- edge(?x, ?z), reach(?z, ?y)",
    );
    let mut resolution = reasoner.resolve(query("reach(a, ?y)")).unwrap();
    let mut per_iteration = Vec::new();
    while let Some(report) = resolution.next_iteration().await.unwrap() {
        let reached: BTreeSet<_> = report
            .answers
            .iter()
            .map(|a| a.bindings().iter().next().unwrap().1.label().to_string())
            .collect();
        assert_eq!(reached.len(), report.answers.len(), "no answer is reported twice");
        per_iteration.push(reached);
    }

    // b and c are found in the first pass; d needs reach(b, ?y) to learn
    // reach(c, d) from a cyclic request first.
    assert_eq!(per_iteration[0], BTreeSet::from(["b".to_string(), "c".to_string()]));
    assert_eq!(per_iteration[1], BTreeSet::from(["d".to_string()]));
    let all: BTreeSet<_> = per_iteration.into_iter().flatten().collect();
    assert_eq!(
        all,
        BTreeSet::from(["b".to_string(), "c".to_string(), "d".to_string()])
    );
}

#[tokio::test]
async fn streaming_answers_cross_iterations() {
    let reasoner = reasoner(CHAIN, TRANSITIVE);
    let mut resolution = reasoner.resolve(query("q(?x, ?y)")).unwrap();
    let mut seen = Vec::new();
    while let Some(answer) = resolution.next_answer().await.unwrap() {
        seen.push(answer);
    }
    assert_eq!(seen.len(), 6);
    assert_eq!(resolution.iteration(), 3);
}

#[tokio::test]
async fn inferred_answer_explains_its_rule_chain() {
    let reasoner = reasoner(CHAIN, TRANSITIVE);
    let answers = reasoner.resolve(query("q(?x, ?y)")).unwrap().collect().await.unwrap();
    let ad = answers
        .iter()
        .find(|a| a.bindings() == &ConceptMap::new().with("x", "a").with("y", "d"))
        .unwrap();
    assert!(ad.is_inferred());

    let (concludable, via_concludable) = ad.derivation().iter().next().unwrap();
    assert_eq!(concludable.name(), "Concludable(q(?v0, ?v1))");
    assert!(via_concludable.is_inferred());

    let (rule, from_rule) = via_concludable.derivation().iter().next().unwrap();
    assert_eq!(rule.name(), "Rule(trans)");
    assert_eq!(from_rule.producer(), rule);
    // a→d needs a derived step (a→c or b→d), recorded in the rule answer.
    assert!(!from_rule.derivation().is_empty());
    assert!(from_rule.derivation().iter().all(|(_, a)| a.is_inferred()));

    let stored = answers
        .iter()
        .find(|a| a.bindings() == &ConceptMap::new().with("x", "a").with("y", "b"))
        .unwrap();
    assert!(!stored.is_inferred());
    assert!(stored.derivation().is_empty());
}

// ---------------------------------------------------------------------------
// Shared resolvers
// ---------------------------------------------------------------------------

#[tokio::test]
async fn one_concludable_serves_both_join_steps() {
    let reasoner = reasoner(
        "edge(a, b)\nedge(b, c)\nedge(c, d)\nedge(b, e)",
        "l: link(?x, ?y) :- edge(?x, ?y)",
    );
    let mut resolution = reasoner.resolve(query("link(?a, ?b), link(?b, ?c)")).unwrap();
    let report = resolution.next_iteration().await.unwrap().unwrap();
    assert!(report.fixpoint);

    let label = |a: &Answer, v: &str| {
        a.bindings()
            .iter()
            .find(|(var, _)| var.name() == v)
            .map(|(_, c)| c.label().to_string())
            .unwrap()
    };
    let mut found: Vec<_> = report
        .answers
        .iter()
        .map(|a| format!("{}{}{}", label(a, "a"), label(a, "b"), label(a, "c")))
        .collect();
    found.sort();
    assert_eq!(found, vec!["abc", "abe", "bcd"]);
}

#[tokio::test]
async fn one_retrievable_answers_every_rule_that_asks() {
    let reasoner = reasoner(
        "edge(a, b)\nedge(b, c)",
        "src: source(?x) :- edge(?x, ?y)\n\
         dst: target(?y) :- edge(?x, ?y)",
    );
    let answers = reasoner.answers(query("source(?n), target(?n)")).await.unwrap();
    assert_eq!(answers, vec![ConceptMap::new().with("n", "b")]);

    let sources = reasoner.answers(query("source(?n)")).await.unwrap();
    let targets = reasoner.answers(query("target(?n)")).await.unwrap();
    assert_eq!(sources.len(), 2);
    assert_eq!(targets.len(), 2);
}

// ---------------------------------------------------------------------------
// Limits, failures and storage
// ---------------------------------------------------------------------------

#[tokio::test]
async fn iteration_limit_is_an_error() {
    let reasoner = reasoner(CHAIN, TRANSITIVE).with_config(ReasonerConfig {
        max_iterations: 1,
        ..ReasonerConfig::default()
    });
    let mut resolution = reasoner.resolve(query("q(?x, ?y)")).unwrap();
    assert!(resolution.next_iteration().await.unwrap().is_some());
    let err = resolution.next_iteration().await.unwrap_err();
    assert!(matches!(
        err,
        ReasonerError::Resolution(ResolutionError::IterationLimit { max_iterations: 1 })
    ));
    assert!(resolution.is_done());
}

/// A traversal engine that dies the moment it is queried.
struct Broken;

impl TraversalEngine for Broken {
    fn query(&self, _: &Conjunction, _: &ConceptMap) -> BaseCursor {
        panic!("storage unavailable");
    }
}

#[tokio::test]
async fn panicking_storage_fails_the_resolution() {
    let reasoner = Reasoner::new(Arc::new(Broken), Arc::new(RuleSet::new()));
    let mut resolution = reasoner.resolve(query("p(?x)")).unwrap();
    let err = tokio::time::timeout(Duration::from_secs(5), resolution.next_answer())
        .await
        .expect("a panicking resolver must not leave the session waiting")
        .unwrap_err();
    match err {
        ReasonerError::Resolution(ResolutionError::ActorFailed { resolver, source }) => {
            assert!(resolver.starts_with("Retrievable("));
            assert!(source.to_string().contains("storage unavailable"));
        }
        other => panic!("expected an actor failure, got {other:?}"),
    }
    assert!(resolution.is_done());
    assert!(resolution.registry().is_empty());
}

/// A traversal engine that takes far longer than the reply timeout.
struct Slow;

impl TraversalEngine for Slow {
    fn query(&self, _: &Conjunction, _: &ConceptMap) -> BaseCursor {
        std::thread::sleep(Duration::from_millis(1500));
        empty_cursor()
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn slow_storage_times_out() {
    let reasoner = Reasoner::new(Arc::new(Slow), Arc::new(RuleSet::new())).with_config(ReasonerConfig {
        answer_timeout_ms: Some(200),
        ..ReasonerConfig::default()
    });
    let mut resolution = reasoner.resolve(query("p(?x)")).unwrap();
    let err = resolution.next_answer().await.unwrap_err();
    assert!(matches!(
        err,
        ReasonerError::Resolution(ResolutionError::Timeout { iteration: 0, .. })
    ));
    assert!(resolution.is_done());
    assert!(resolution.registry().is_empty());
}

#[test]
fn resolving_needs_a_runtime() {
    let reasoner = reasoner("p(a)", "");
    let err = reasoner.resolve(query("p(?x)")).unwrap_err();
    assert!(matches!(err, ReasonerError::Resolution(ResolutionError::NoRuntime)));
}

#[tokio::test]
async fn inferred_facts_cannot_be_committed() {
    let store = Arc::new(FactStore::parse(CHAIN).unwrap());
    let reasoner = Reasoner::new(store.clone(), Arc::new(RuleSet::parse(TRANSITIVE).unwrap()));
    let answers = reasoner.resolve(query("q(?x, ?y)")).unwrap().collect().await.unwrap();
    assert_eq!(store.len(), 3, "resolution never writes to the store");

    let head = Atom::parse("q(?x, ?y)").unwrap();
    let inferred = answers.iter().find(|a| a.is_inferred()).unwrap();
    let fact = Fact::from_atom(&head, inferred.bindings(), true).unwrap();
    assert!(matches!(
        store.commit(&fact),
        Err(StoreError::IllegalOperation { .. })
    ));
    assert_eq!(store.len(), 3);
}
