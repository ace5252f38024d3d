//! View routing between the signed-out screen, home, the catalog, the
//! new-conversation form and an open conversation.

use std::fmt;

use convo_core::error::{ConvoError, Result};
use convo_core::types::ConversationId;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum View {
    Unauthenticated,
    /// Recent conversations.
    Home,
    Catalog,
    Form,
    Session(ConversationId),
}

impl fmt::Display for View {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            View::Unauthenticated => write!(f, "signed out"),
            View::Home => write!(f, "home"),
            View::Catalog => write!(f, "conversations"),
            View::Form => write!(f, "new conversation"),
            View::Session(_) => write!(f, "conversation"),
        }
    }
}

/// Current view. Every view except `Unauthenticated` needs a signed-in user.
#[derive(Debug)]
pub struct ViewRouter {
    view: View,
}

impl Default for ViewRouter {
    fn default() -> Self {
        Self::new()
    }
}

impl ViewRouter {
    pub fn new() -> Self {
        Self {
            view: View::Unauthenticated,
        }
    }

    pub fn current(&self) -> View {
        self.view
    }

    /// The conversation shown, if any.
    pub fn open_conversation(&self) -> Option<ConversationId> {
        match self.view {
            View::Session(id) => Some(id),
            _ => None,
        }
    }

    /// React to the auth session appearing or going away. Returns the view
    /// that was left, if the view changed.
    pub fn on_auth_changed(&mut self, authenticated: bool) -> Option<View> {
        let target = match (authenticated, self.view) {
            (false, View::Unauthenticated) => return None,
            (false, _) => View::Unauthenticated,
            (true, View::Unauthenticated) => View::Home,
            (true, _) => return None,
        };
        Some(std::mem::replace(&mut self.view, target))
    }

    /// Move to another signed-in view.
    pub fn navigate(&mut self, target: View) -> Result<View> {
        if self.view == View::Unauthenticated {
            return Err(ConvoError::InvalidState("Please sign in first".to_string()));
        }
        if target == View::Unauthenticated {
            return Err(ConvoError::InvalidState(
                "Sign out to leave the signed-in views".to_string(),
            ));
        }
        tracing::debug!(from = %self.view, to = %target, "Navigate");
        Ok(std::mem::replace(&mut self.view, target))
    }

    /// Return to the home view. Returns the conversation that was open.
    pub fn back_to_home(&mut self) -> Result<Option<ConversationId>> {
        let previous = self.navigate(View::Home)?;
        Ok(match previous {
            View::Session(id) => Some(id),
            _ => None,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    fn signed_in() -> ViewRouter {
        let mut router = ViewRouter::new();
        router.on_auth_changed(true);
        router
    }

    #[test]
    fn test_starts_signed_out() {
        let mut router = ViewRouter::new();
        assert_eq!(router.current(), View::Unauthenticated);
        assert!(router.navigate(View::Catalog).is_err());
        assert!(router.on_auth_changed(false).is_none());
    }

    #[test]
    fn test_sign_in_lands_on_home() {
        let mut router = ViewRouter::new();
        assert_eq!(router.on_auth_changed(true), Some(View::Unauthenticated));
        assert_eq!(router.current(), View::Home);
        // A refreshed session does not move the user.
        router.navigate(View::Catalog).unwrap();
        assert!(router.on_auth_changed(true).is_none());
        assert_eq!(router.current(), View::Catalog);
    }

    #[test]
    fn test_losing_the_session_forces_signed_out() {
        let mut router = signed_in();
        let id = Uuid::new_v4();
        router.navigate(View::Session(id)).unwrap();
        assert_eq!(router.on_auth_changed(false), Some(View::Session(id)));
        assert_eq!(router.current(), View::Unauthenticated);
    }

    #[test]
    fn test_back_to_home_reports_open_conversation() {
        let mut router = signed_in();
        let id = Uuid::new_v4();
        router.navigate(View::Session(id)).unwrap();
        assert_eq!(router.open_conversation(), Some(id));
        assert_eq!(router.back_to_home().unwrap(), Some(id));
        assert_eq!(router.current(), View::Home);
        assert!(router.open_conversation().is_none());

        router.navigate(View::Form).unwrap();
        assert_eq!(router.back_to_home().unwrap(), None);
    }

    #[test]
    fn test_cannot_navigate_to_signed_out() {
        let mut router = signed_in();
        assert!(router.navigate(View::Unauthenticated).is_err());
        assert_eq!(router.current(), View::Home);
    }
}
