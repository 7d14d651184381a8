//! End-to-end tests: user interactions against a mounted application.

#![allow(clippy::unwrap_used)]

use convergent_core::attribute::EntityId;
use convergent_core::effect::Outbound;
use convergent_core::error::ConvergenceError;
use convergent_core::value::Value;
use convergent_runtime::{Runtime, RuntimeConfig, RuntimeError};
use convergent_testing::helpers::init_tracing;
use convergent_testing::mocks::{FailingStorage, MemoryStorage, RecordingRenderer, SequentialIds};
use std::rc::Rc;
use todomvc::types::attr;
use todomvc::{AppConfig, Filter, TodoApp, TodoEnvironment, TodoId};

struct Harness {
    app: TodoApp,
    renderer: RecordingRenderer,
    storage: MemoryStorage,
}

fn env() -> TodoEnvironment {
    TodoEnvironment::new(Rc::new(SequentialIds::new("todo")), AppConfig::default())
}

fn mount_with(storage: MemoryStorage, config: RuntimeConfig) -> Harness {
    init_tracing();
    let renderer = RecordingRenderer::new();
    let runtime = Runtime::with_config(renderer.clone(), storage.clone(), config);
    let app = TodoApp::mount(runtime, env()).unwrap();
    Harness {
        app,
        renderer,
        storage,
    }
}

fn mount() -> Harness {
    mount_with(MemoryStorage::new(), RuntimeConfig::default())
}

fn list() -> EntityId {
    EntityId::new("todo-list")
}

fn titles(app: &TodoApp) -> Vec<String> {
    app.visible_titles()
}

#[test]
fn buy_milk_scenario() {
    let Harness { mut app, .. } = mount();

    let milk = app.submit_new_todo("Buy milk").unwrap().unwrap();
    assert_eq!(app.todos().len(), 1);
    assert_eq!(app.items_left(), 1);

    app.toggle(&milk).unwrap();
    assert_eq!(app.items_left(), 0);
    assert!(app.todos().all_complete());
    assert!(app.toggle_all_checked());
    assert!(app.clear_visible());

    app.clear_completed().unwrap();
    assert_eq!(app.todos().len(), 0);
    assert!(!app.footer_visible());
    assert!(!app.main_visible());
    assert!(!app.has_handle(&milk));
}

#[test]
fn filter_views_scenario() {
    let Harness { mut app, renderer, .. } = mount();

    let a = app.submit_new_todo("A").unwrap().unwrap();
    app.submit_new_todo("B").unwrap();
    app.toggle(&a).unwrap();

    app.activate_view("active").unwrap();
    assert_eq!(titles(&app), vec!["B"]);

    app.activate_view("completed").unwrap();
    assert_eq!(titles(&app), vec!["A"]);

    app.activate_view("all").unwrap();
    assert_eq!(titles(&app), vec!["A", "B"]);

    assert_eq!(
        renderer.last_children(&list()),
        Some(vec![EntityId::new("todo1"), EntityId::new("todo2")])
    );
    assert_eq!(
        renderer.titles(),
        vec!["TODOMVC-all", "TODOMVC-active", "TODOMVC-completed", "TODOMVC-all"]
    );
}

#[test]
fn routes_select_views() {
    let Harness { mut app, .. } = mount();
    app.submit_new_todo("A").unwrap();

    assert_eq!(app.navigate("/completed").unwrap(), Filter::Completed);
    assert!(titles(&app).is_empty());

    assert_eq!(app.navigate("/").unwrap(), Filter::All);
    assert_eq!(app.navigate("/bogus").unwrap(), Filter::All);
    assert_eq!(app.filter(), Filter::All);
    assert_eq!(titles(&app), vec!["A"]);
}

#[test]
fn toggle_all_republishes_once_per_click() {
    let Harness {
        mut app, renderer, ..
    } = mount_with(MemoryStorage::new(), RuntimeConfig::default().with_coalescing(false));
    for title in ["A", "B", "C"] {
        app.submit_new_todo(title).unwrap();
    }

    renderer.clear();
    app.toggle_all().unwrap();
    assert_eq!(renderer.render_passes(&list()), 1);
    assert!(app.todos().all_complete());
    assert!(app.toggle_all_checked());

    renderer.clear();
    app.toggle_all().unwrap();
    assert_eq!(renderer.render_passes(&list()), 1);
    assert_eq!(app.todos().items_left(), 3);
    assert!(!app.toggle_all_checked());
}

#[test]
fn toggle_all_completes_a_mixed_list() {
    let Harness { mut app, .. } = mount();
    let a = app.submit_new_todo("A").unwrap().unwrap();
    app.submit_new_todo("B").unwrap();
    app.toggle(&a).unwrap();
    assert!(!app.toggle_all_checked());

    app.toggle_all().unwrap();

    assert!(app.todos().all_complete());
    assert!(app.toggle_all_checked());
}

#[test]
fn clear_completed_destroys_exactly_the_completed_handles() {
    let Harness {
        mut app, renderer, ..
    } = mount();
    let ids: Vec<TodoId> = ["A", "B", "C", "D", "E"]
        .into_iter()
        .map(|title| app.submit_new_todo(title).unwrap().unwrap())
        .collect();
    app.toggle(&ids[1]).unwrap();
    app.toggle(&ids[3]).unwrap();

    renderer.clear();
    app.clear_completed().unwrap();

    let removed = renderer
        .commands()
        .into_iter()
        .filter(|c| matches!(c, Outbound::Remove(_)))
        .count();
    assert_eq!(removed, 2);
    assert_eq!(app.handle_count(), 3);
    assert_eq!(titles(&app), vec!["A", "C", "E"]);
    assert!(app.todos().iter().all(|todo| !todo.is_completed()));
    assert!(!app.clear_visible());
}

#[test]
fn rename_to_whitespace_deletes_the_item() {
    let Harness { mut app, .. } = mount();
    let a = app.submit_new_todo("A").unwrap().unwrap();
    app.submit_new_todo("B").unwrap();

    app.begin_edit(&a).unwrap();
    app.type_draft(&a, "   ").unwrap();
    app.commit_edit(&a).unwrap();

    assert!(!app.has_handle(&a));
    assert_eq!(titles(&app), vec!["B"]);
    assert_eq!(app.items_left(), 1);
}

#[test]
fn rename_commits_trimmed_title() {
    let Harness { mut app, renderer, .. } = mount();
    let a = app.submit_new_todo("A").unwrap().unwrap();

    app.begin_edit(&a).unwrap();
    assert!(renderer.received(&Outbound::Focus(EntityId::new("todo1-edit"))));
    app.type_draft(&a, "  Apples ").unwrap();
    app.commit_edit(&a).unwrap();

    assert_eq!(titles(&app), vec!["Apples"]);
    assert!(!app.is_editing(&a));
    assert_eq!(
        renderer.projected(&a.entity(), attr::LABEL),
        Some(Value::from("Apples"))
    );
}

#[test]
fn escape_reverts_without_touching_the_collection() {
    let Harness { mut app, renderer, .. } = mount();
    let a = app.submit_new_todo("A").unwrap().unwrap();
    let before = app.todos();

    app.begin_edit(&a).unwrap();
    app.type_draft(&a, "Something else").unwrap();
    app.cancel_edit(&a).unwrap();

    assert_eq!(app.todos(), before);
    assert!(!app.is_editing(&a));
    assert_eq!(
        renderer.projected(&EntityId::new("todo1-edit"), attr::VALUE),
        Some(Value::from("A"))
    );
    assert!(renderer.received(&Outbound::Detach {
        parent: a.entity(),
        child: EntityId::new("todo1-edit"),
    }));
}

#[test]
fn todos_survive_a_remount() {
    let Harness {
        mut app, storage, ..
    } = mount();
    let a = app.submit_new_todo("A").unwrap().unwrap();
    app.submit_new_todo("B").unwrap();
    app.toggle(&a).unwrap();
    assert!(storage.get(&list(), attr::TODOS_LIST).is_some());

    let Harness { app: restored, .. } = mount_with(storage, RuntimeConfig::default());

    assert_eq!(restored.todos(), app.todos());
    assert_eq!(titles(&restored), vec!["A", "B"]);
    assert_eq!(restored.handle_count(), 2);
    assert_eq!(restored.items_left(), 1);
    assert!(restored.footer_visible());
}

#[test]
fn seeded_remount_draws_unused_ids() {
    init_tracing();
    let storage = MemoryStorage::new();
    let config = AppConfig::default().with_id_seed(7);
    let seeded_mount = || {
        let runtime = Runtime::new(RecordingRenderer::new(), storage.clone());
        TodoApp::mount(runtime, TodoEnvironment::from_config(config.clone())).unwrap()
    };

    let mut app = seeded_mount();
    let a = app.submit_new_todo("A").unwrap().unwrap();

    let mut restored = seeded_mount();
    let b = restored.submit_new_todo("B").unwrap().unwrap();

    assert_ne!(a, b);
    assert_eq!(restored.todos().len(), 2);
    assert_eq!(titles(&restored), vec!["A", "B"]);
    assert_eq!(restored.handle_count(), 2);
    assert!(restored.health().status.is_healthy());
}

#[test]
fn malformed_saved_collection_fails_mount() {
    init_tracing();
    let storage = MemoryStorage::new().with_entry(
        "todo-list",
        attr::TODOS_LIST,
        Value::List(im::vector![Value::object([("id", Value::from("x"))])]),
    );
    let runtime = Runtime::new(RecordingRenderer::new(), storage);

    let error = TodoApp::mount(runtime, env()).unwrap_err();

    assert!(matches!(
        error.violation(),
        Some(ConvergenceError::MissingField { field: "title" })
    ));
}

#[test]
fn persistence_can_be_disabled() {
    init_tracing();
    let storage = MemoryStorage::new();
    let runtime = Runtime::new(RecordingRenderer::new(), storage.clone());
    let env = TodoEnvironment::new(
        Rc::new(SequentialIds::new("todo")),
        AppConfig::default().with_persistence(false),
    );
    let mut app = TodoApp::mount(runtime, env).unwrap();

    app.submit_new_todo("A").unwrap();

    assert_eq!(storage.save_count(), 0);
}

#[test]
fn failing_storage_degrades_without_rollback() {
    init_tracing();
    let runtime = Runtime::new(RecordingRenderer::new(), FailingStorage);
    let mut app = TodoApp::mount(runtime, env()).unwrap();

    app.submit_new_todo("A").unwrap();

    assert_eq!(titles(&app), vec!["A"]);
    assert!(app.health().status.is_degraded());
    assert!(app.stats().storage_failures > 0);
}

#[test]
fn aborted_stimulus_leaves_no_trace() {
    let Harness {
        mut app, renderer, ..
    } = mount_with(MemoryStorage::new(), RuntimeConfig::default().with_max_chain_depth(3));
    renderer.clear();
    let bindings = app.graph().binding_count();

    let result = app.submit_new_todo("A");

    assert!(matches!(
        result,
        Err(RuntimeError::Aborted {
            source: ConvergenceError::ChainTooDeep { limit: 3 },
            ..
        })
    ));
    assert!(app.todos().is_empty());
    assert_eq!(app.handle_count(), 0);
    assert_eq!(app.graph().binding_count(), bindings);
    assert!(renderer.commands().is_empty());
    assert!(app.health().status.is_degraded());
    assert_eq!(app.stats().rollbacks, 1);
}

#[test]
fn unknown_todo_is_rejected() {
    let Harness { mut app, .. } = mount();
    app.submit_new_todo("A").unwrap();

    let result = app.begin_edit(&TodoId::from("nope"));

    assert!(matches!(
        result.unwrap_err().violation(),
        Some(ConvergenceError::UnknownEntity(_))
    ));
    assert_eq!(titles(&app), vec!["A"]);

    app.submit_new_todo("B").unwrap();
    assert!(app.health().status.is_healthy());
}
