//! Command-line walkthrough of the TodoMVC core.
//!
//! Runs a scripted session and prints what a renderer would show after each
//! interaction. Set `RUST_LOG` to watch the graph converge, and
//! `TODOMVC_STORE=<file>` to keep the todos between runs.

use anyhow::Context;
use convergent_core::attribute::EntityId;
use convergent_core::effect::Outbound;
use convergent_core::environment::{Renderer, Storage};
use convergent_core::error::StorageError;
use convergent_core::value::Value;
use convergent_runtime::{Runtime, RuntimeConfig};
use convergent_runtime::metrics::MetricsExporter;
use std::collections::BTreeMap;
use std::path::PathBuf;
use todomvc::{AppConfig, TodoApp, TodoEnvironment};
use tracing_subscriber::EnvFilter;

/// Prints list and title changes
struct ConsoleRenderer;

impl Renderer for ConsoleRenderer {
    fn apply(&mut self, command: Outbound) {
        match command {
            Outbound::SetTitle(title) => println!("  title → {title}"),
            Outbound::SetChildren { children, .. } => {
                let ids: Vec<&str> = children.iter().map(EntityId::as_str).collect();
                println!("  list  → [{}]", ids.join(", "));
            },
            other => tracing::trace!(kind = other.kind(), "Render command"),
        }
    }
}

/// Key-value storage kept in a JSON file, or in memory without a path
struct JsonFileStorage {
    path: Option<PathBuf>,
    slots: BTreeMap<String, Value>,
}

impl JsonFileStorage {
    fn open(path: Option<PathBuf>) -> anyhow::Result<Self> {
        let slots = match &path {
            Some(path) if path.exists() => {
                let text = std::fs::read_to_string(path)
                    .with_context(|| format!("reading {}", path.display()))?;
                serde_json::from_str(&text).with_context(|| format!("parsing {}", path.display()))?
            },
            _ => BTreeMap::new(),
        };
        Ok(Self { path, slots })
    }

    fn key(entity: &EntityId, name: &str) -> String {
        format!("{entity}/{name}")
    }
}

impl Storage for JsonFileStorage {
    fn load(&self, entity: &EntityId, name: &str) -> Result<Option<Value>, StorageError> {
        Ok(self.slots.get(&Self::key(entity, name)).cloned())
    }

    fn save(&mut self, entity: &EntityId, name: &str, value: &Value) -> Result<(), StorageError> {
        let key = Self::key(entity, name);
        self.slots.insert(key.clone(), value.clone());
        let Some(path) = &self.path else {
            return Ok(());
        };
        let failed = |reason: String| StorageError::WriteFailed {
            key: key.clone(),
            reason,
        };
        let text = serde_json::to_string_pretty(&self.slots).map_err(|e| failed(e.to_string()))?;
        std::fs::write(path, text).map_err(|e| failed(e.to_string()))
    }
}

fn step(title: &str) {
    println!("\n{title}");
}

fn print_todos(app: &TodoApp) {
    for todo in app.todos().iter() {
        let status = if todo.is_completed() { "✓" } else { " " };
        println!("  [{status}] {}", todo.title());
    }
    println!(
        "  {} item(s) left, filter '{}', clear button {}",
        app.items_left(),
        app.filter(),
        if app.clear_visible() { "shown" } else { "hidden" }
    );
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("todomvc=debug,convergent_runtime=debug")),
        )
        .init();

    let mut exporter = MetricsExporter::new();
    exporter.install().context("installing metrics recorder")?;

    let storage = JsonFileStorage::open(std::env::var("TODOMVC_STORE").ok().map(PathBuf::from))?;
    let runtime = Runtime::with_config(ConsoleRenderer, storage, RuntimeConfig::from_env());
    let env = TodoEnvironment::from_config(AppConfig::from_env());

    println!("=== TodoMVC ===");
    step("Mounting...");
    let mut app = TodoApp::mount(runtime, env)?;
    if !app.todos().is_empty() {
        println!("  restored {} todo(s)", app.todos().len());
    }

    step("Adding todos...");
    let milk = app.submit_new_todo("Buy milk")?;
    let docs = app.submit_new_todo("  Write documentation ")?;
    app.submit_new_todo("   ")?;
    print_todos(&app);

    if let Some(milk) = &milk {
        step("Completing 'Buy milk'...");
        app.toggle(milk)?;
        print_todos(&app);
    }

    if let Some(docs) = &docs {
        step("Renaming 'Write documentation'...");
        app.begin_edit(docs)?;
        app.type_draft(docs, "Write the README ")?;
        app.commit_edit(docs)?;
        print_todos(&app);
    }

    step("Showing active todos...");
    app.navigate("/active")?;
    println!("  visible: {:?}", app.visible_titles());

    step("Clearing completed...");
    app.clear_completed()?;
    app.navigate("/")?;
    print_todos(&app);

    let health = app.health();
    println!("\nRuntime {}: {:?}", health.status, health.metadata);
    if let Some(metrics) = exporter.render() {
        println!("\n--- metrics ---\n{metrics}");
    }
    Ok(())
}
