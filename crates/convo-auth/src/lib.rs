//! Convo Auth crate - sign-in, sign-up and the explicit auth session context.
//!
//! Provides:
//! - Credential form validation, run before any remote call
//! - The `AuthProvider` seam with a Supabase GoTrue client and a mock
//! - `SessionContext`, which holds the current auth session and lets views
//!   subscribe to changes until they unsubscribe
//! - `AuthFlow`, which ties the provider, profile creation and notices together

pub mod context;
pub mod flow;
pub mod form;
pub mod provider;
pub mod supabase;

pub use context::{SessionContext, SessionSubscription};
pub use flow::AuthFlow;
pub use form::{AuthForm, AuthMode};
pub use provider::{AuthProvider, AuthSession, AuthUser, MockAuthProvider, SignUpOutcome};
pub use supabase::SupabaseAuth;
