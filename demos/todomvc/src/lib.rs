//! TodoMVC state core built on the Convergent reactive graph.
//!
//! The application keeps its state as attributes on page entities and lets
//! watchers converge everything else:
//!
//! - The list entity owns the collection; every change creates or updates one
//!   item handle per record and triggers a render pass
//! - Item handles run a small edit state machine (`ItemReducer`)
//! - Counters, footer, main section and toggle-all derive from the collection
//! - Filter views and routes select which records are rendered
//!
//! Rendering and storage are adapters; the core only emits `Outbound`
//! commands after each interaction has converged.
//!
//! # Quick Start
//!
//! ```
//! use convergent_runtime::Runtime;
//! use convergent_testing::mocks::{MemoryStorage, RecordingRenderer};
//! use todomvc::{AppConfig, TodoApp, TodoEnvironment};
//!
//! # fn main() -> Result<(), convergent_runtime::RuntimeError> {
//! let runtime = Runtime::new(RecordingRenderer::new(), MemoryStorage::new());
//! let env = TodoEnvironment::from_config(AppConfig::default().with_id_seed(1));
//! let mut app = TodoApp::mount(runtime, env)?;
//!
//! let milk = app.submit_new_todo("Buy milk")?.expect("created");
//! app.submit_new_todo("Write docs")?;
//! app.toggle(&milk)?;
//!
//! assert_eq!(app.items_left(), 1);
//! app.activate_view("active")?;
//! assert_eq!(app.visible_titles(), vec!["Write docs".to_string()]);
//! # Ok(())
//! # }
//! ```

pub mod app;
pub mod collection;
pub mod config;
pub mod environment;
pub mod filter;
pub mod input;
pub mod item;
pub mod list;
pub mod render;
pub mod types;

// Re-export commonly used types
pub use app::TodoApp;
pub use collection::{CollectionDraft, TodoCollection};
pub use config::AppConfig;
pub use environment::TodoEnvironment;
pub use filter::{Filter, Routes};
pub use item::{ItemAction, ItemReducer, ItemState};
pub use list::{ListAction, ListReducer, ListState};
pub use types::{AppEntities, Todo, TodoId, TodoSignal};
