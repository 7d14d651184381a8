//! Toggle-all benchmarks
//!
//! Measures the pure reducer against a full stimulus (propagation, one
//! render pass per click, outbound flush) for growing collections.
//!
//! Run with: `cargo bench --bench toggle_all`

#![allow(missing_docs)] // Benchmarks don't need extensive docs
#![allow(clippy::unwrap_used)] // Benchmarks can unwrap during setup

use convergent_core::attribute::EntityId;
use convergent_core::reducer::Reducer;
use convergent_runtime::Runtime;
use convergent_testing::mocks::{MemoryStorage, NullRenderer, SequentialIds};
use criterion::{BenchmarkId, Criterion, Throughput, black_box, criterion_group, criterion_main};
use std::rc::Rc;
use todomvc::{
    AppConfig, ListAction, ListReducer, ListState, Todo, TodoApp, TodoCollection, TodoEnvironment,
    TodoId,
};

const SIZES: [usize; 3] = [10, 100, 1_000];

fn collection(size: usize) -> TodoCollection {
    (0..size)
        .map(|n| Todo::new(TodoId::new(format!("todo{n}")), format!("item {n}")))
        .collect()
}

fn app(size: usize) -> TodoApp {
    let runtime = Runtime::new(NullRenderer, MemoryStorage::new());
    let env = TodoEnvironment::new(Rc::new(SequentialIds::new("todo")), AppConfig::default());
    let mut app = TodoApp::mount(runtime, env).unwrap();
    for n in 0..size {
        app.submit_new_todo(&format!("item {n}")).unwrap();
    }
    app
}

/// Reducer only: copy-on-write update of every record
fn benchmark_reducer(c: &mut Criterion) {
    let mut group = c.benchmark_group("toggle_all_reducer");

    for size in SIZES {
        group.throughput(Throughput::Elements(size as u64));
        let todos = collection(size);
        group.bench_with_input(BenchmarkId::from_parameter(size), &todos, |b, todos| {
            b.iter(|| {
                let mut state = ListState {
                    list: EntityId::new("todo-list"),
                    todos: todos.clone(),
                };
                black_box(ListReducer.reduce(&mut state, ListAction::ToggleAll(true), &()));
            });
        });
    }

    group.finish();
}

/// Whole stimulus: every handle updates and the list renders once
fn benchmark_stimulus(c: &mut Criterion) {
    let mut group = c.benchmark_group("toggle_all_stimulus");
    group.sample_size(20);

    for size in SIZES {
        group.throughput(Throughput::Elements(size as u64));
        let mut app = app(size);
        group.bench_function(BenchmarkId::from_parameter(size), |b| {
            b.iter(|| app.toggle_all().unwrap());
        });
    }

    group.finish();
}

criterion_group!(benches, benchmark_reducer, benchmark_stimulus);
criterion_main!(benches);
