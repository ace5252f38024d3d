//! Convo Core crate - shared data model, configuration, errors and notices.
//!
//! Every other Convo crate depends on this one for the conversation/topic/
//! response records, the cross-crate `ConvoError`, the TOML configuration
//! and the notice bus that carries user-visible notifications.

pub mod config;
pub mod confirm;
pub mod draft;
pub mod error;
pub mod events;
pub mod types;

pub use config::ConvoConfig;
pub use confirm::{Confirm, PresetAnswer};
pub use draft::{ConversationDraft, ConversationInsert, NewConversation};
pub use error::{ConvoError, Result};
pub use events::{Notice, NoticeBus, NoticeLevel};
pub use types::*;
