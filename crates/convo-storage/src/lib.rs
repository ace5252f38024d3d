//! Convo Storage crate - document store access and the conversation catalog.
//!
//! Provides the `DocumentStore` seam over the hosted `conversations` and
//! `profiles` collections, a Supabase PostgREST implementation, an in-memory
//! implementation with failure injection, and the catalog that keeps the
//! user's conversation list in sync.

pub mod catalog;
pub mod memory;
pub mod store;
pub mod supabase;

pub use catalog::ConversationCatalog;
pub use memory::{FailPoint, InMemoryStore};
pub use store::DocumentStore;
pub use supabase::{SupabaseClient, SupabaseStore};
