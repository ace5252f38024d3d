//! Device seams used by a recording session.
//!
//! Live transcription streams [`TranscriptEvent`]s over an mpsc channel; the
//! backup recorder captures raw audio that nothing consumes yet; summaries
//! leave through a share sheet or the clipboard. Each seam has an in-memory
//! implementation for tests and for the terminal client.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tokio::sync::mpsc;

use convo_core::error::{ConvoError, Result};

const TRANSCRIPT_CHANNEL_CAPACITY: usize = 64;

// =============================================================================
// Traits
// =============================================================================

/// One event from a live speech-to-text stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TranscriptEvent {
    /// A finalized segment; committed to the response.
    Final(String),
    /// A partial hypothesis; shown but never committed.
    Interim(String),
    /// The recognizer failed; recording must stop.
    Error(String),
}

/// Continuous live transcription.
#[async_trait]
pub trait SpeechRecognizer: Send + Sync {
    /// Begin recognition. Events arrive on the returned channel until
    /// [`SpeechRecognizer::stop`] is called.
    async fn start(&self) -> Result<mpsc::Receiver<TranscriptEvent>>;

    async fn stop(&self) -> Result<()>;
}

/// Backup audio capture running alongside transcription.
#[async_trait]
pub trait AudioRecorder: Send + Sync {
    async fn start(&self) -> Result<()>;

    /// Stop and hand back the captured audio.
    async fn stop(&self) -> Result<Vec<u8>>;
}

/// Native share action.
#[async_trait]
pub trait ShareSheet: Send + Sync {
    fn is_available(&self) -> bool;

    async fn share(&self, title: &str, text: &str) -> Result<()>;
}

#[async_trait]
pub trait Clipboard: Send + Sync {
    async fn write_text(&self, text: &str) -> Result<()>;
}

/// Everything a session needs from the device layer.
#[derive(Clone)]
pub struct SessionDevices {
    pub recognizer: Arc<dyn SpeechRecognizer>,
    pub recorder: Arc<dyn AudioRecorder>,
    pub share: Arc<dyn ShareSheet>,
    pub clipboard: Arc<dyn Clipboard>,
}

// =============================================================================
// Channel-backed recognizer
// =============================================================================

type SenderSlot = Arc<Mutex<Option<mpsc::Sender<TranscriptEvent>>>>;

/// Recognizer whose transcript is pushed in through a [`TranscriptFeed`].
#[derive(Debug, Clone, Default)]
pub struct ChannelRecognizer {
    sender: SenderSlot,
    deny: Arc<AtomicBool>,
}

/// Producer side of a [`ChannelRecognizer`]. Pushing while the recognizer is
/// stopped is a no-op.
#[derive(Debug, Clone)]
pub struct TranscriptFeed {
    sender: SenderSlot,
}

impl ChannelRecognizer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn feed(&self) -> TranscriptFeed {
        TranscriptFeed {
            sender: Arc::clone(&self.sender),
        }
    }

    /// Simulate the user refusing microphone access.
    pub fn deny_permission(&self, deny: bool) {
        self.deny.store(deny, Ordering::Relaxed);
    }

    pub fn is_active(&self) -> bool {
        self.sender.lock().map(|s| s.is_some()).unwrap_or(false)
    }
}

impl TranscriptFeed {
    fn send(&self, event: TranscriptEvent) -> bool {
        let sender = self.sender.lock().ok().and_then(|s| s.clone());
        match sender {
            Some(tx) => tx.try_send(event).is_ok(),
            None => false,
        }
    }

    /// Returns `false` when nothing is listening.
    pub fn push_final(&self, text: impl Into<String>) -> bool {
        self.send(TranscriptEvent::Final(text.into()))
    }

    pub fn push_interim(&self, text: impl Into<String>) -> bool {
        self.send(TranscriptEvent::Interim(text.into()))
    }

    pub fn push_error(&self, message: impl Into<String>) -> bool {
        self.send(TranscriptEvent::Error(message.into()))
    }
}

#[async_trait]
impl SpeechRecognizer for ChannelRecognizer {
    async fn start(&self) -> Result<mpsc::Receiver<TranscriptEvent>> {
        if self.deny.load(Ordering::Relaxed) {
            return Err(ConvoError::Device(
                "Speech recognition permission denied".to_string(),
            ));
        }
        let mut slot = self
            .sender
            .lock()
            .map_err(|e| ConvoError::Device(format!("Recognizer lock poisoned: {}", e)))?;
        if slot.is_some() {
            return Err(ConvoError::Device(
                "Speech recognition is already active".to_string(),
            ));
        }
        let (tx, rx) = mpsc::channel(TRANSCRIPT_CHANNEL_CAPACITY);
        *slot = Some(tx);
        tracing::info!("Speech recognition started");
        Ok(rx)
    }

    async fn stop(&self) -> Result<()> {
        let mut slot = self
            .sender
            .lock()
            .map_err(|e| ConvoError::Device(format!("Recognizer lock poisoned: {}", e)))?;
        if slot.take().is_none() {
            return Err(ConvoError::Device(
                "Speech recognition is not active".to_string(),
            ));
        }
        tracing::info!("Speech recognition stopped");
        Ok(())
    }
}

// =============================================================================
// In-memory recorder
// =============================================================================

/// Backup recorder that accumulates pushed bytes while active.
#[derive(Debug, Clone, Default)]
pub struct MemoryRecorder {
    active: Arc<AtomicBool>,
    deny: Arc<AtomicBool>,
    buffer: Arc<Mutex<Vec<u8>>>,
}

impl MemoryRecorder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn deny_permission(&self, deny: bool) {
        self.deny.store(deny, Ordering::Relaxed);
    }

    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::Relaxed)
    }

    /// Append captured audio. Ignored while inactive.
    pub fn push(&self, bytes: &[u8]) {
        if self.is_active() {
            if let Ok(mut buffer) = self.buffer.lock() {
                buffer.extend_from_slice(bytes);
            }
        }
    }
}

#[async_trait]
impl AudioRecorder for MemoryRecorder {
    async fn start(&self) -> Result<()> {
        if self.deny.load(Ordering::Relaxed) {
            return Err(ConvoError::Device("Microphone permission denied".to_string()));
        }
        if self.active.swap(true, Ordering::Relaxed) {
            return Err(ConvoError::Device(
                "Audio recording is already active".to_string(),
            ));
        }
        if let Ok(mut buffer) = self.buffer.lock() {
            buffer.clear();
        }
        tracing::info!("Backup audio recording started");
        Ok(())
    }

    async fn stop(&self) -> Result<Vec<u8>> {
        if !self.active.swap(false, Ordering::Relaxed) {
            return Err(ConvoError::Device("Audio recording is not active".to_string()));
        }
        let data = self
            .buffer
            .lock()
            .map(|mut b| std::mem::take(&mut *b))
            .unwrap_or_default();
        tracing::info!(bytes = data.len(), "Backup audio recording stopped");
        Ok(data)
    }
}

// =============================================================================
// Share sheet and clipboard
// =============================================================================

/// Share sheet that records what was shared.
#[derive(Debug, Default)]
pub struct MockShareSheet {
    available: bool,
    fail: AtomicBool,
    shared: Mutex<Vec<(String, String)>>,
}

impl MockShareSheet {
    pub fn available() -> Self {
        Self {
            available: true,
            ..Self::default()
        }
    }

    /// A platform without a native share action.
    pub fn unavailable() -> Self {
        Self::default()
    }

    pub fn set_failing(&self, fail: bool) {
        self.fail.store(fail, Ordering::Relaxed);
    }

    /// `(title, text)` pairs shared so far.
    pub fn shared(&self) -> Vec<(String, String)> {
        self.shared.lock().map(|s| s.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl ShareSheet for MockShareSheet {
    fn is_available(&self) -> bool {
        self.available
    }

    async fn share(&self, title: &str, text: &str) -> Result<()> {
        if !self.available || self.fail.load(Ordering::Relaxed) {
            return Err(ConvoError::Share("Share action failed".to_string()));
        }
        if let Ok(mut shared) = self.shared.lock() {
            shared.push((title.to_string(), text.to_string()));
        }
        Ok(())
    }
}

/// Clipboard held in memory.
#[derive(Debug, Default)]
pub struct MemoryClipboard {
    contents: Mutex<Option<String>>,
    fail: AtomicBool,
}

impl MemoryClipboard {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_failing(&self, fail: bool) {
        self.fail.store(fail, Ordering::Relaxed);
    }

    pub fn contents(&self) -> Option<String> {
        self.contents.lock().ok().and_then(|c| c.clone())
    }
}

#[async_trait]
impl Clipboard for MemoryClipboard {
    async fn write_text(&self, text: &str) -> Result<()> {
        if self.fail.load(Ordering::Relaxed) {
            return Err(ConvoError::Share("Clipboard write failed".to_string()));
        }
        if let Ok(mut contents) = self.contents.lock() {
            *contents = Some(text.to_string());
        }
        Ok(())
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_channel_recognizer_delivers_events() {
        let recognizer = ChannelRecognizer::new();
        let feed = recognizer.feed();
        assert!(!feed.push_final("dropped"));

        let mut rx = recognizer.start().await.unwrap();
        assert!(recognizer.is_active());
        assert!(feed.push_interim("we agr"));
        assert!(feed.push_final("we agreed"));

        assert_eq!(rx.recv().await, Some(TranscriptEvent::Interim("we agr".into())));
        assert_eq!(rx.recv().await, Some(TranscriptEvent::Final("we agreed".into())));

        recognizer.stop().await.unwrap();
        assert!(!recognizer.is_active());
        assert_eq!(rx.recv().await, None);
    }

    #[tokio::test]
    async fn test_channel_recognizer_double_start_and_stop() {
        let recognizer = ChannelRecognizer::new();
        let _rx = recognizer.start().await.unwrap();
        assert!(recognizer.start().await.is_err());
        recognizer.stop().await.unwrap();
        assert!(recognizer.stop().await.is_err());
    }

    #[tokio::test]
    async fn test_channel_recognizer_denied() {
        let recognizer = ChannelRecognizer::new();
        recognizer.deny_permission(true);
        assert!(matches!(
            recognizer.start().await,
            Err(ConvoError::Device(_))
        ));
        assert!(!recognizer.is_active());
    }

    #[tokio::test]
    async fn test_memory_recorder_collects_while_active() {
        let recorder = MemoryRecorder::new();
        recorder.push(b"ignored");
        recorder.start().await.unwrap();
        recorder.push(b"abc");
        recorder.push(b"def");
        assert_eq!(recorder.stop().await.unwrap(), b"abcdef".to_vec());
        assert!(recorder.stop().await.is_err());
    }

    #[tokio::test]
    async fn test_memory_recorder_denied() {
        let recorder = MemoryRecorder::new();
        recorder.deny_permission(true);
        assert!(recorder.start().await.is_err());
        assert!(!recorder.is_active());
    }

    #[tokio::test]
    async fn test_share_sheet_and_clipboard() {
        let sheet = MockShareSheet::available();
        sheet.share("Meeting Summary", "text").await.unwrap();
        assert_eq!(sheet.shared(), vec![("Meeting Summary".into(), "text".into())]);

        let none = MockShareSheet::unavailable();
        assert!(!none.is_available());
        assert!(none.share("t", "x").await.is_err());

        let clipboard = MemoryClipboard::new();
        clipboard.write_text("copied").await.unwrap();
        assert_eq!(clipboard.contents().as_deref(), Some("copied"));
        clipboard.set_failing(true);
        assert!(clipboard.write_text("again").await.is_err());
        assert_eq!(clipboard.contents().as_deref(), Some("copied"));
    }
}
