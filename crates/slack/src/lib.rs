//! Slack interface for the task bot.
//!
//! - `commands` parses and routes `/todo` slash commands.
//! - `events` turns button presses, modal submissions, option requests and
//!   the "Mark as ToDo" shortcut into calls on a service.
//! - `service` is that service: store, caches, completion debouncer and
//!   renderer behind one type.
//! - `blocks` and `pages` build the Block Kit payloads.
//! - `socket` pumps envelopes from a Socket Mode transport into the
//!   dispatcher with reconnect backoff.
//!
//! ```text
//! Socket Mode → EventDispatcher → handlers → TaskBotService → TaskStore
//!                                                  ↓
//!                                   Block Kit cards / modals / options
//! ```

pub mod blocks;
pub mod commands;
pub mod events;
pub mod pages;
pub mod service;
pub mod socket;

pub use service::{CacheStats, TaskBotService};
