//! Interactive terminal shell over the views.
//!
//! Each view accepts its own commands; `help` lists them. While a recording
//! is running every line is treated as recognized speech: plain lines are
//! final segments, `~text` is an interim hypothesis, `/error msg` simulates a
//! recognizer failure and `/stop` ends the recording.

use std::sync::Arc;

use tracing::{debug, info};

use convo_auth::{AuthFlow, AuthForm, SessionSubscription};
use convo_core::config::ConvoConfig;
use convo_core::draft::ConversationDraft;
use convo_core::error::{ConvoError, Result};
use convo_core::events::NoticeBus;
use convo_core::types::{Conversation, ConversationId, Response};
use convo_insight::KeyPointExtractor;
use convo_session::{
    ConversationSession, SessionDevices, SessionState, ShareOutcome, TranscriptFeed,
};
use convo_storage::catalog::RECENT_LIMIT;
use convo_storage::ConversationCatalog;

use crate::router::{View, ViewRouter};
use crate::terminal::Console;

/// Everything the shell drives.
pub struct Services {
    pub auth: AuthFlow,
    pub catalog: ConversationCatalog,
    pub extractor: KeyPointExtractor,
    pub devices: SessionDevices,
    /// Producer side of the recognizer in `devices`.
    pub feed: TranscriptFeed,
    pub notices: NoticeBus,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Flow {
    Continue,
    Quit,
}

pub struct Shell {
    console: Arc<Console>,
    router: ViewRouter,
    auth: AuthFlow,
    auth_changes: SessionSubscription,
    catalog: ConversationCatalog,
    extractor: KeyPointExtractor,
    devices: SessionDevices,
    feed: TranscriptFeed,
    notices: NoticeBus,
    config: ConvoConfig,
    session: Option<ConversationSession>,
    draft: ConversationDraft,
}

impl Shell {
    pub fn new(console: Arc<Console>, services: Services, config: ConvoConfig) -> Self {
        let auth_changes = services.auth.context().subscribe();
        Self {
            console,
            router: ViewRouter::new(),
            auth: services.auth,
            auth_changes,
            catalog: services.catalog,
            extractor: services.extractor,
            devices: services.devices,
            feed: services.feed,
            notices: services.notices,
            config,
            session: None,
            draft: ConversationDraft::new(),
        }
    }

    pub fn view(&self) -> View {
        self.router.current()
    }

    pub fn catalog(&self) -> &ConversationCatalog {
        &self.catalog
    }

    pub fn session(&self) -> Option<&ConversationSession> {
        self.session.as_ref()
    }

    /// Read and execute commands until `quit` or end of input.
    pub async fn run(&mut self) -> Result<()> {
        if let Err(e) = self.auth.context().init().await {
            self.console.say(format!("! {}", user_message(&e)));
        }
        self.sync_auth().await;
        self.render();

        loop {
            let prompt = self.prompt_label();
            let Some(line) = self.console.prompt(&prompt).await else {
                break;
            };
            self.check_expiry().await;
            self.sync_auth().await;

            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            match self.dispatch(line).await {
                Ok(Flow::Quit) => break,
                Ok(Flow::Continue) => {}
                Err(e) => self.console.say(format!("! {}", user_message(&e))),
            }
            self.sync_auth().await;
        }

        self.close_session().await;
        info!("Shell finished");
        Ok(())
    }

    fn prompt_label(&self) -> String {
        match (&self.session, self.router.current()) {
            (Some(s), View::Session(_)) if s.state() == SessionState::Recording => {
                "(recording) ".to_string()
            }
            (_, view) => format!("convo [{}]> ", view),
        }
    }

    // =========================================================================
    // Auth session tracking
    // =========================================================================

    /// Drop a session the provider no longer considers valid.
    async fn check_expiry(&self) {
        let context = self.auth.context();
        if !context.is_authenticated() {
            return;
        }
        if let Ok(None) = context.provider().current_session().await {
            info!("Auth session lost");
            context.set(None);
        }
    }

    async fn sync_auth(&mut self) {
        if !self.auth_changes.has_changed() {
            return;
        }
        let authenticated = matches!(self.auth_changes.changed().await, Some(Some(_)));
        let Some(previous) = self.router.on_auth_changed(authenticated) else {
            return;
        };
        debug!(from = %previous, to = %self.router.current(), "Auth state changed view");
        if authenticated {
            let _ = self.catalog.refresh().await;
        } else {
            self.close_session().await;
            self.catalog.close();
            self.draft = ConversationDraft::new();
            self.console.say("Signed out.");
        }
        self.render();
    }

    // =========================================================================
    // Dispatch
    // =========================================================================

    async fn dispatch(&mut self, line: &str) -> Result<Flow> {
        if self.is_recording() {
            self.transcribe(line).await?;
            return Ok(Flow::Continue);
        }

        let (command, arg) = split_command(line);
        match command {
            "quit" | "exit" => return Ok(Flow::Quit),
            "help" => {
                self.console.say(help_text(self.router.current()));
                return Ok(Flow::Continue);
            }
            _ => {}
        }

        match self.router.current() {
            View::Unauthenticated => self.signed_out_command(command, arg).await?,
            view => {
                if !self.shared_command(command, arg).await? {
                    match view {
                        View::Home | View::Catalog => self.catalog_command(command, arg).await?,
                        View::Form => self.form_command(command, arg).await?,
                        View::Session(_) => self.session_command(command, arg).await?,
                        View::Unauthenticated => {}
                    }
                }
            }
        }
        Ok(Flow::Continue)
    }

    async fn signed_out_command(&mut self, command: &str, arg: &str) -> Result<()> {
        match command {
            "signin" => {
                let password = self.read("Password: ").await?;
                self.auth.sign_in(&AuthForm::sign_in(arg, password)).await?;
            }
            "signup" => {
                let full_name = self.read("Full name: ").await?;
                let password = self.read("Password: ").await?;
                let form = AuthForm::sign_up(full_name, arg, password);
                if self.auth.sign_up(&form).await?.is_none() {
                    self.console
                        .say("Check your email to confirm the account, then sign in.");
                }
            }
            "reset" => self.auth.reset_password(arg).await?,
            other => return Err(unknown(other)),
        }
        Ok(())
    }

    /// Commands available in every signed-in view. Returns whether `command`
    /// was one of them.
    async fn shared_command(&mut self, command: &str, _arg: &str) -> Result<bool> {
        match command {
            "home" | "back" => {
                if self.router.back_to_home()?.is_some() {
                    self.close_session().await;
                    self.catalog.close();
                }
                self.render();
            }
            "list" => {
                self.leave_session().await?;
                self.router.navigate(View::Catalog)?;
                self.render();
            }
            "new" => {
                self.leave_session().await?;
                let owner = self.auth.owner_name().await.unwrap_or_default();
                self.draft = ConversationDraft::for_owner(&owner);
                self.router.navigate(View::Form)?;
                self.render();
            }
            "signout" => {
                // The view follows the auth change even when the remote call failed.
                let result = self.auth.sign_out().await;
                self.sync_auth().await;
                result?;
            }
            _ => return Ok(false),
        }
        Ok(true)
    }

    async fn catalog_command(&mut self, command: &str, arg: &str) -> Result<()> {
        match command {
            "refresh" => {
                self.catalog.refresh().await?;
                self.render();
            }
            "open" => {
                let id = self.pick_conversation(arg)?;
                self.open(id)?;
            }
            "delete" if self.router.current() == View::Catalog => {
                let id = self.pick_conversation(arg)?;
                if self.catalog.delete(id, self.console.as_ref()).await? {
                    self.render();
                }
            }
            other => return Err(unknown(other)),
        }
        Ok(())
    }

    async fn form_command(&mut self, command: &str, arg: &str) -> Result<()> {
        match command {
            "title" => self.draft.title = arg.to_string(),
            "describe" => self.draft.description = arg.to_string(),
            "add" => {
                if !self.draft.add_participant(arg) {
                    return Err(ConvoError::Validation(
                        "Participant name is empty or already added".to_string(),
                    ));
                }
            }
            "remove" => {
                let index = parse_index(arg, self.draft.participants().len())?;
                if !self.draft.remove_participant(index) {
                    return Err(ConvoError::Validation(
                        "The conversation owner cannot be removed".to_string(),
                    ));
                }
            }
            "topic" => {
                if self.draft.add_topic(arg).is_none() {
                    return Err(ConvoError::Validation("Topic text is required".to_string()));
                }
            }
            "untopic" => {
                let index = parse_index(arg, self.draft.topics().len())?;
                let id = self.draft.topics()[index].id;
                self.draft.remove_topic(id);
            }
            "when" => {
                let mut parts = arg.split_whitespace();
                self.draft.schedule(parts.next(), parts.next());
            }
            "show" => {}
            "create" => {
                let conversation = self.draft.build()?;
                let user = self
                    .auth
                    .context()
                    .user()
                    .ok_or_else(|| ConvoError::Auth("Please sign in first".to_string()))?;
                self.catalog.create(user.id, &conversation).await?;
                self.draft.clear();
                self.router.navigate(View::Home)?;
                self.render();
                return Ok(());
            }
            "cancel" => {
                self.draft.clear();
                self.router.navigate(View::Home)?;
                self.render();
                return Ok(());
            }
            other => return Err(unknown(other)),
        }
        self.console.say(render_draft(&self.draft));
        Ok(())
    }

    async fn session_command(&mut self, command: &str, arg: &str) -> Result<()> {
        let session = self
            .session
            .as_mut()
            .ok_or_else(|| ConvoError::InvalidState("No conversation is open".to_string()))?;
        let mut changed = false;

        match command {
            "show" | "topics" => {}
            "topic" => {
                let index = parse_index(arg, session.conversation().topics.len())?;
                let id = session.conversation().topics[index].id;
                session.select_topic(id)?;
            }
            "untopic" => session.clear_topic()?,
            "speaker" => session.select_speaker(arg)?,
            "to" => {
                session.toggle_recipient(arg)?;
            }
            "everyone" => session.clear_recipients(),
            "say" => session.set_compose(arg),
            "record" => {
                session.start_recording().await?;
                self.console
                    .say("Speak by typing lines; ~text is interim, /stop ends the recording.");
                return Ok(());
            }
            "save" => {
                session.save_response().await?;
                changed = true;
            }
            "delete" => {
                let topic = session.selected_topic().ok_or_else(|| {
                    ConvoError::Validation("Please select a topic first".to_string())
                })?;
                let responses = session.topic_responses(topic);
                let index = parse_index(arg, responses.len())?;
                let id = responses[index].id;
                changed = session.delete_response(id, self.console.as_ref()).await?;
            }
            "summary" => {
                let summary = session.summary().ok_or_else(|| {
                    ConvoError::Validation("Please select a topic first".to_string())
                })?;
                self.console.say(summary.to_text());
                return Ok(());
            }
            "share" => {
                match session.share_summary().await? {
                    ShareOutcome::Shared => self.console.say("Summary shared."),
                    ShareOutcome::Copied => self.console.say("Summary copied."),
                }
                return Ok(());
            }
            other => return Err(unknown(other)),
        }

        if changed {
            self.catalog.replace(session.conversation().clone());
        }
        self.console.say(render_session(session));
        Ok(())
    }

    async fn transcribe(&mut self, line: &str) -> Result<()> {
        let Some(session) = self.session.as_mut() else {
            return Ok(());
        };
        if line == "/stop" {
            session.stop_recording().await?;
            self.console.say(render_session(session));
            return Ok(());
        }
        if let Some(message) = line.strip_prefix("/error") {
            self.feed.push_error(message.trim());
        } else if let Some(partial) = line.strip_prefix('~') {
            self.feed.push_interim(partial.trim());
        } else {
            self.feed.push_final(line);
        }
        session.poll_transcript().await;

        if session.state() == SessionState::Recording {
            let interim = session.interim();
            if interim.is_empty() {
                self.console.say(format!("  {}", session.compose()));
            } else {
                self.console
                    .say(format!("  {} [{}]", session.compose(), interim));
            }
        } else {
            self.console.say(render_session(session));
        }
        Ok(())
    }

    // =========================================================================
    // Helpers
    // =========================================================================

    fn is_recording(&self) -> bool {
        self.session
            .as_ref()
            .is_some_and(|s| s.state() == SessionState::Recording)
    }

    async fn read(&self, prompt: &str) -> Result<String> {
        self.console
            .prompt(prompt)
            .await
            .ok_or(ConvoError::Cancelled)
    }

    fn pick_conversation(&self, arg: &str) -> Result<ConversationId> {
        let list = match self.router.current() {
            View::Home => self.catalog.recent(RECENT_LIMIT),
            _ => self.catalog.list(),
        };
        let index = parse_index(arg, list.len())?;
        Ok(list[index].id)
    }

    fn open(&mut self, id: ConversationId) -> Result<()> {
        let conversation = self.catalog.open(id)?.clone();
        self.router.navigate(View::Session(id))?;
        let session = ConversationSession::new(
            conversation,
            self.catalog.store(),
            self.extractor.clone(),
            self.devices.clone(),
            self.notices.clone(),
            self.config.session.clone(),
        );
        self.console.say(render_session(&session));
        self.session = Some(session);
        Ok(())
    }

    async fn leave_session(&mut self) -> Result<()> {
        if self.router.open_conversation().is_some() {
            self.router.back_to_home()?;
            self.close_session().await;
            self.catalog.close();
        }
        Ok(())
    }

    async fn close_session(&mut self) {
        if let Some(session) = self.session.take() {
            let conversation = session.close().await;
            self.catalog.replace(conversation);
        }
    }

    fn render(&self) {
        let text = match self.router.current() {
            View::Unauthenticated => {
                "Sign in with `signin <email>` or create an account with `signup <email>`."
                    .to_string()
            }
            View::Home => render_list("Recent conversations", self.catalog.recent(RECENT_LIMIT)),
            View::Catalog => render_list("All conversations", self.catalog.list()),
            View::Form => render_draft(&self.draft),
            View::Session(_) => match &self.session {
                Some(session) => render_session(session),
                None => String::new(),
            },
        };
        self.console.say(text);
    }
}

// =============================================================================
// Parsing and rendering
// =============================================================================

fn split_command(line: &str) -> (&str, &str) {
    match line.split_once(char::is_whitespace) {
        Some((command, rest)) => (command, rest.trim()),
        None => (line, ""),
    }
}

/// Parse a 1-based list position into an index below `len`.
fn parse_index(arg: &str, len: usize) -> Result<usize> {
    let n: usize = arg
        .trim()
        .parse()
        .map_err(|_| ConvoError::Validation(format!("Expected a number, got '{}'", arg)))?;
    if n == 0 || n > len {
        return Err(ConvoError::Validation(format!("There is no item {}", n)));
    }
    Ok(n - 1)
}

fn unknown(command: &str) -> ConvoError {
    ConvoError::Validation(format!("Unknown command '{}'. Type `help`.", command))
}

/// Text shown for a failed command.
fn user_message(err: &ConvoError) -> String {
    match err {
        ConvoError::Validation(msg)
        | ConvoError::InvalidState(msg)
        | ConvoError::Auth(msg)
        | ConvoError::Storage(msg) => msg.clone(),
        other => other.to_string(),
    }
}

fn help_text(view: View) -> &'static str {
    match view {
        View::Unauthenticated => {
            "signin <email> | signup <email> | reset <email> | quit"
        }
        View::Home => "open <n> | list | new | refresh | signout | quit",
        View::Catalog => "open <n> | delete <n> | refresh | new | home | signout | quit",
        View::Form => {
            "title <text> | describe <text> | add <name> | remove <n> | topic <text> | \
             untopic <n> | when <YYYY-MM-DD> <HH:MM> | show | create | cancel"
        }
        View::Session(_) => {
            "topic <n> | untopic | speaker <name> | to <name> | everyone | say <text> | \
             record | save | delete <n> | summary | share | home"
        }
    }
}

fn render_list(heading: &str, conversations: &[Conversation]) -> String {
    if conversations.is_empty() {
        return format!("{}: none yet. Create one with `new`.", heading);
    }
    let mut out = format!("{}:", heading);
    for (i, c) in conversations.iter().enumerate() {
        out.push_str(&format!(
            "\n  {}. {} ({} participants, {} responses, {})",
            i + 1,
            c.title,
            c.participants.len(),
            c.responses.len(),
            c.created_at.format("%Y-%m-%d")
        ));
    }
    out
}

fn render_draft(draft: &ConversationDraft) -> String {
    let topics: Vec<&str> = draft.topics().iter().map(|t| t.content.as_str()).collect();
    format!(
        "New conversation\n  Title: {}\n  Description: {}\n  Participants: {}\n  Topics: {}\n  When: {}",
        draft.title,
        draft.description,
        draft.participants().join(", "),
        topics.join(", "),
        draft.scheduled_at().unwrap_or_default()
    )
}

fn render_response(index: usize, response: &Response) -> String {
    let mut out = format!(
        "  {}. [{}] {} -> {}: {}",
        index + 1,
        response.timestamp.format("%H:%M"),
        response.speaker,
        response.participants,
        response.content
    );
    for point in &response.key_points {
        out.push_str(&format!("\n       • {}", point));
    }
    out
}

fn render_session(session: &ConversationSession) -> String {
    let conversation = session.conversation();
    let mut out = format!(
        "== {} ==\nParticipants: {}\nTopics:",
        conversation.title,
        conversation.participants.join(", ")
    );
    for (i, entry) in session.topic_entries().iter().enumerate() {
        let marker = if Some(entry.id) == session.selected_topic() {
            '*'
        } else {
            ' '
        };
        out.push_str(&format!(
            "\n {}{}. {} ({})",
            marker,
            i + 1,
            entry.content,
            entry.response_count
        ));
    }

    if let Some(topic) = session.selected_topic() {
        for (i, response) in session.topic_responses(topic).iter().enumerate() {
            out.push('\n');
            out.push_str(&render_response(i, response));
        }
        let rollup = session.rollup();
        if !rollup.is_empty() {
            out.push_str(&format!("\nKey points: {}", rollup.join("; ")));
        }
    }

    let recipients = if session.recipients().is_empty() {
        "everyone".to_string()
    } else {
        session.recipients().join(", ")
    };
    out.push_str(&format!(
        "\nSpeaker: {}  To: {}\nDraft: {}",
        session.speaker().unwrap_or("-"),
        recipients,
        session.compose()
    ));
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use convo_auth::{MockAuthProvider, SessionContext};
    use convo_core::config::AuthConfig;
    use convo_session::{ChannelRecognizer, MemoryClipboard, MemoryRecorder};
    use convo_storage::InMemoryStore;

    use crate::terminal::NoShareSheet;

    fn shell(script: &str) -> (Shell, Arc<InMemoryStore>) {
        let store = Arc::new(InMemoryStore::new());
        let notices = NoticeBus::default();
        let auth = AuthFlow::new(
            SessionContext::new(Arc::new(MockAuthProvider::new())),
            store.clone(),
            notices.clone(),
            AuthConfig::default(),
        );
        let recognizer = ChannelRecognizer::new();
        let feed = recognizer.feed();
        let services = Services {
            auth,
            catalog: ConversationCatalog::new(store.clone(), notices.clone()),
            extractor: KeyPointExtractor::new(None),
            devices: SessionDevices {
                recognizer: Arc::new(recognizer),
                recorder: Arc::new(MemoryRecorder::new()),
                share: Arc::new(NoShareSheet),
                clipboard: Arc::new(MemoryClipboard::new()),
            },
            feed,
            notices,
        };
        let console = Arc::new(Console::scripted(script));
        (Shell::new(console, services, ConvoConfig::default()), store)
    }

    const SIGN_UP: &str = "signup alice@example.com\nAlice Doe\nsecret1\n";

    #[tokio::test]
    async fn test_scripted_meeting() {
        let script = format!(
            "{}{}",
            SIGN_UP,
            "new\n\
             title Quarterly planning\n\
             add Bob\n\
             topic Budget\n\
             create\n\
             open 1\n\
             topic 1\n\
             speaker Bob\n\
             to Alice Doe\n\
             say We agreed to cut costs by 10%\n\
             save\n\
             record\n\
             ~we should\n\
             We should freeze hiring\n\
             /stop\n\
             save\n\
             home\n\
             quit\n"
        );
        let (mut shell, store) = shell(&script);
        shell.run().await.unwrap();

        assert_eq!(shell.view(), View::Home);
        assert!(shell.session().is_none());
        assert!(shell.catalog().open_conversation().is_none());

        let listed = &shell.catalog().list()[0];
        assert_eq!(listed.title, "Quarterly planning");
        assert_eq!(listed.participants, vec!["Alice Doe", "Bob"]);

        let persisted = store.conversation(listed.id).unwrap();
        assert_eq!(persisted.responses, listed.responses);
        let saved: Vec<(&str, &str, &str)> = persisted
            .responses
            .iter()
            .map(|r| (r.speaker.as_str(), r.participants.as_str(), r.content.as_str()))
            .collect();
        assert_eq!(
            saved,
            vec![
                ("Bob", "Alice Doe", "We agreed to cut costs by 10%"),
                ("Bob", "everyone", "We should freeze hiring"),
            ]
        );
    }

    #[tokio::test]
    async fn test_sign_out_returns_to_signed_out_view() {
        let script = format!("{}new\nsignout\nlist\nquit\n", SIGN_UP);
        let (mut shell, _store) = shell(&script);
        shell.run().await.unwrap();
        assert_eq!(shell.view(), View::Unauthenticated);
    }

    #[tokio::test]
    async fn test_end_of_input_ends_the_shell() {
        let (mut shell, store) = shell(SIGN_UP);
        shell.run().await.unwrap();
        assert_eq!(shell.view(), View::Home);
        assert!(store.is_empty());
    }

    #[test]
    fn test_split_command() {
        assert_eq!(split_command("open 2"), ("open", "2"));
        assert_eq!(split_command("say  We agreed  "), ("say", "We agreed"));
        assert_eq!(split_command("save"), ("save", ""));
    }

    #[test]
    fn test_parse_index() {
        assert_eq!(parse_index("1", 3).unwrap(), 0);
        assert_eq!(parse_index(" 3 ", 3).unwrap(), 2);
        assert!(parse_index("0", 3).is_err());
        assert!(parse_index("4", 3).is_err());
        assert!(parse_index("two", 3).is_err());
    }

    #[test]
    fn test_user_message_strips_prefixes() {
        assert_eq!(
            user_message(&ConvoError::Validation("Title is required".into())),
            "Title is required"
        );
        assert_eq!(
            user_message(&ConvoError::Timeout {
                operation: "save response".into(),
                secs: 60
            }),
            "Timed out after 60s: save response"
        );
    }

    #[test]
    fn test_render_list_empty() {
        assert!(render_list("Recent conversations", &[]).contains("none yet"));
    }
}
