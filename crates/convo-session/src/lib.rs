//! Convo Session crate - recording and saving responses against one topic.
//!
//! Provides:
//! - The session state machine (Idle, TopicSelected, Recording, Saving)
//! - Device seams for live transcription, the backup audio recorder, the
//!   native share sheet and the clipboard, with in-memory implementations
//! - `ConversationSession`, which drives speaker/recipient selection,
//!   transcript capture, key-point analysis, persistence, deletion and
//!   summary export

pub mod devices;
pub mod session;
pub mod state;

pub use devices::{
    AudioRecorder, ChannelRecognizer, Clipboard, MemoryClipboard, MemoryRecorder, MockShareSheet,
    SessionDevices, ShareSheet, SpeechRecognizer, TranscriptEvent, TranscriptFeed,
};
pub use session::{ConversationSession, ShareOutcome, TopicEntry};
pub use state::{SessionState, StateMachine};
