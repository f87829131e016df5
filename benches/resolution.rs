//! Benchmarks for resolving recursive and non-recursive queries.

use std::sync::Arc;

use criterion::{BenchmarkId, Criterion, black_box, criterion_group, criterion_main};

use akh_resolve::logic::RuleSet;
use akh_resolve::pattern::Conjunction;
use akh_resolve::resolution::Reasoner;
use akh_resolve::store::{Fact, FactStore};

fn chain(len: usize) -> FactStore {
    let store = FactStore::new();
    for i in 0..len {
        let fact = Fact::parse(&format!("edge(n{i}, n{})", i + 1)).unwrap();
        store.commit(&fact).unwrap();
    }
    store
}

fn runtime() -> tokio::runtime::Runtime {
    tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .unwrap()
}

fn bench_transitive_closure(c: &mut Criterion) {
    let rt = runtime();
    let rules = Arc::new(
        RuleSet::parse(
            "base: path(?x, ?y) :- edge(?x, ?y)\n\
             step: path(?x, ?z) :- edge(?x, ?y), path(?y, ?z)",
        )
        .unwrap(),
    );
    let query = Conjunction::parse("path(n0, ?y)").unwrap();

    let mut group = c.benchmark_group("transitive_closure");
    for len in [4usize, 8, 16] {
        let reasoner = Reasoner::new(Arc::new(chain(len)), rules.clone());
        group.bench_with_input(BenchmarkId::from_parameter(len), &len, |bench, _| {
            bench.iter(|| {
                let answers = rt.block_on(reasoner.answers(query.clone())).unwrap();
                black_box(answers)
            })
        });
    }
    group.finish();
}

fn bench_join(c: &mut Criterion) {
    let rt = runtime();
    let reasoner = Reasoner::new(Arc::new(chain(64)), Arc::new(RuleSet::new()));
    let query = Conjunction::parse("edge(?a, ?b), edge(?b, ?c)").unwrap();

    c.bench_function("two_step_join_64", |bench| {
        bench.iter(|| black_box(rt.block_on(reasoner.answers(query.clone())).unwrap()))
    });
}

criterion_group!(benches, bench_transitive_closure, bench_join);
criterion_main!(benches);
