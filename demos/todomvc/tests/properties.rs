//! Property tests: invariants that hold after any sequence of interactions.

#![allow(clippy::unwrap_used)]

use convergent_runtime::Runtime;
use convergent_testing::mocks::{MemoryStorage, RecordingRenderer, SequentialIds};
use convergent_testing::properties::{arb_blank, arb_flags, arb_title};
use proptest::prelude::*;
use std::rc::Rc;
use todomvc::{AppConfig, Filter, TodoApp, TodoEnvironment, TodoId};

#[derive(Clone, Debug)]
enum Interaction {
    Add(String),
    Toggle(usize),
    Delete(usize),
    Rename(usize, String),
    ToggleAll,
    Clear,
    View(Filter),
}

fn arb_interaction() -> impl Strategy<Value = Interaction> {
    prop_oneof![
        3 => arb_title().prop_map(Interaction::Add),
        2 => any::<usize>().prop_map(Interaction::Toggle),
        1 => any::<usize>().prop_map(Interaction::Delete),
        1 => (any::<usize>(), arb_title()).prop_map(|(i, t)| Interaction::Rename(i, t)),
        1 => Just(Interaction::ToggleAll),
        1 => Just(Interaction::Clear),
        1 => prop::sample::select(Filter::ALL.to_vec()).prop_map(Interaction::View),
    ]
}

fn mount() -> TodoApp {
    let runtime = Runtime::new(RecordingRenderer::new(), MemoryStorage::new());
    let env = TodoEnvironment::new(Rc::new(SequentialIds::new("todo")), AppConfig::default());
    TodoApp::mount(runtime, env).unwrap()
}

fn id_at(app: &TodoApp, index: usize) -> Option<TodoId> {
    let todos = app.todos();
    if todos.is_empty() {
        return None;
    }
    todos.iter().nth(index % todos.len()).map(|todo| todo.id().clone())
}

fn perform(app: &mut TodoApp, interaction: &Interaction) {
    match interaction {
        Interaction::Add(title) => {
            app.submit_new_todo(title).unwrap();
        },
        Interaction::Toggle(i) => {
            if let Some(id) = id_at(app, *i) {
                app.toggle(&id).unwrap();
            }
        },
        Interaction::Delete(i) => {
            if let Some(id) = id_at(app, *i) {
                app.delete(&id).unwrap();
            }
        },
        Interaction::Rename(i, title) => {
            if let Some(id) = id_at(app, *i) {
                app.begin_edit(&id).unwrap();
                app.type_draft(&id, title).unwrap();
                app.commit_edit(&id).unwrap();
            }
        },
        Interaction::ToggleAll => app.toggle_all().unwrap(),
        Interaction::Clear => app.clear_completed().unwrap(),
        Interaction::View(filter) => {
            app.activate_view(filter.label()).unwrap();
        },
    }
}

fn check_derived_state(app: &TodoApp) -> Result<(), TestCaseError> {
    let todos = app.todos();
    prop_assert_eq!(todos.items_left() + todos.completed_count(), todos.len());
    prop_assert_eq!(app.items_left(), todos.items_left());
    prop_assert_eq!(app.toggle_all_checked(), todos.all_complete());
    prop_assert_eq!(app.clear_visible(), todos.completed_count() > 0);
    prop_assert_eq!(app.footer_visible(), !todos.is_empty());
    prop_assert_eq!(app.main_visible(), !todos.is_empty());
    prop_assert_eq!(app.handle_count(), todos.len());

    let filter = app.filter();
    let expected: Vec<String> = todos
        .iter()
        .filter(|todo| filter.displays(todo))
        .map(|todo| todo.title().to_string())
        .collect();
    prop_assert_eq!(app.visible_titles(), expected);
    Ok(())
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn derived_state_tracks_the_collection(
        interactions in prop::collection::vec(arb_interaction(), 1..24)
    ) {
        let mut app = mount();
        for interaction in &interactions {
            perform(&mut app, interaction);
            check_derived_state(&app)?;
        }
        prop_assert!(app.health().status.is_healthy());
    }

    #[test]
    fn deletes_preserve_relative_order(
        titles in prop::collection::vec(arb_title(), 1..10),
        doomed in prop::collection::vec(any::<bool>(), 10)
    ) {
        let mut app = mount();
        let ids: Vec<TodoId> = titles
            .iter()
            .map(|title| app.submit_new_todo(title).unwrap().unwrap())
            .collect();

        let mut expected = Vec::new();
        for (index, id) in ids.iter().enumerate() {
            if doomed[index] {
                app.delete(id).unwrap();
            } else {
                expected.push(titles[index].trim().to_string());
            }
        }

        prop_assert_eq!(app.visible_titles(), expected);
        prop_assert_eq!(app.handle_count(), app.todos().len());
    }

    #[test]
    fn toggle_all_twice_restores_an_active_list(count in 1_usize..8) {
        let mut app = mount();
        for n in 0..count {
            app.submit_new_todo(&format!("item {n}")).unwrap();
        }
        let before = app.todos();

        app.toggle_all().unwrap();
        prop_assert!(app.todos().all_complete());
        app.toggle_all().unwrap();

        prop_assert_eq!(app.todos(), before);
    }

    #[test]
    fn clear_completed_keeps_exactly_the_active_items(flags in arb_flags(10)) {
        let mut app = mount();
        for (n, completed) in flags.iter().enumerate() {
            let id = app.submit_new_todo(&format!("item {n}")).unwrap().unwrap();
            if *completed {
                app.toggle(&id).unwrap();
            }
        }
        let active = flags.iter().filter(|completed| !**completed).count();

        app.clear_completed().unwrap();

        prop_assert_eq!(app.todos().len(), active);
        prop_assert_eq!(app.handle_count(), active);
        prop_assert_eq!(app.todos().completed_count(), 0);
    }

    #[test]
    fn blank_input_never_creates_todos(
        titles in prop::collection::vec(arb_title(), 0..4),
        blanks in prop::collection::vec(arb_blank(), 1..4)
    ) {
        let mut app = mount();
        for title in &titles {
            app.submit_new_todo(title).unwrap();
        }
        let before = app.todos();

        for blank in &blanks {
            prop_assert_eq!(app.submit_new_todo(blank).unwrap(), None);
        }

        prop_assert_eq!(app.todos(), before);
    }
}
