//! AI notes pinned under a highlight
//!
//! A note anchor mounts a [`NoteLifecycle`] in the [`NoteRegistry`]. The
//! lifecycle asks the [`CompletionWorker`] for text, types a placeholder
//! while it waits, and only shows the reply once the minimum display time
//! has passed and the placeholder has been fully typed.

pub mod client;
pub mod lifecycle;
pub mod prompt;
pub mod registry;
pub mod reveal;
pub mod worker;

pub use client::{CompletionClient, ProxyClient};
pub use lifecycle::{NoteSettings, NoteView};
pub use registry::NoteRegistry;
pub use worker::{CompletionWorker, RequestTarget};
