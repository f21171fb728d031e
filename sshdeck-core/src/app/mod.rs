//! UI state machine
//!
//! The controller owns the current [`AppState`] and reacts to
//! [`AppEvent`]s from a single queue. Storage and launch work is handed
//! back to the caller as [`Effect::Run`] and executed by a [`TaskRunner`].

mod controller;
mod event;
mod executor;
mod forms;
mod keys;
mod state;
mod widgets;

pub use controller::{ControllerConfig, Notice, NoticeLevel, StateController};
pub use event::{AppEvent, Effect, LaunchReply, Task, TaskKind, TaskReply, Token};
pub use executor::TaskRunner;
pub use keys::Key;
pub use state::{AppState, OrganizationEntry, StateKind, StorageChoice};
pub use widgets::{FieldKind, FormField, FormSignal, FormState, ListSignal, SelectList};
