//! Observable outputs: chat emitted by the script and engine diagnostics.
//!
//! The engine writes to an [`OutputSink`]. [`StdoutSink`] prints chat the way
//! a viewer's chat log would; [`MemorySink`] records everything for tests and
//! embedders.

use std::time::Duration;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, strum::Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum ChatVolume {
    Whisper,
    Say,
    Shout,
    Region,
    /// `llRegionSayTo` / `llOwnerSay` / `llInstantMessage`
    Direct,
    /// Floating text set with `llSetText`
    Text,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub channel: i32,
    pub speaker_name: String,
    pub speaker_key: String,
    pub text: String,
    pub volume: ChatVolume,
    /// Recipient for directed messages.
    pub target: Option<String>,
    pub sent_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, strum::Display)]
pub enum Severity {
    Warning,
    Error,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, strum::Display)]
#[strum(serialize_all = "snake_case")]
pub enum DiagnosticKind {
    UnknownIdentifier,
    UnknownFunction,
    ArityMismatch,
    TypeMismatch,
    IndexOutOfRange,
    LoopCapExceeded,
    QueueOverflow,
    ListenerLimit,
    AsyncFailure,
    Fatal,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Diagnostic {
    pub severity: Severity,
    pub kind: DiagnosticKind,
    pub message: String,
}

impl Diagnostic {
    pub fn warning(kind: DiagnosticKind, message: impl Into<String>) -> Self {
        Self {
            severity: Severity::Warning,
            kind,
            message: message.into(),
        }
    }

    pub fn error(kind: DiagnosticKind, message: impl Into<String>) -> Self {
        Self {
            severity: Severity::Error,
            kind,
            message: message.into(),
        }
    }
}

pub trait OutputSink: Send + Sync {
    fn deliver(&self, message: &ChatMessage);

    fn report(&self, _diagnostic: &Diagnostic) {}
}

#[derive(Debug, Default)]
pub struct StdoutSink {
    pub show_diagnostics: bool,
}

impl OutputSink for StdoutSink {
    fn deliver(&self, message: &ChatMessage) {
        match message.volume {
            ChatVolume::Text => println!("[text] {}: {}", message.speaker_name, message.text),
            ChatVolume::Direct => println!(
                "[{}] {} -> {}: {}",
                message.channel,
                message.speaker_name,
                message.target.as_deref().unwrap_or("?"),
                message.text
            ),
            _ => println!(
                "[{}] {}: {}",
                message.channel, message.speaker_name, message.text
            ),
        }
    }

    fn report(&self, diagnostic: &Diagnostic) {
        if self.show_diagnostics {
            eprintln!(
                "{} ({}): {}",
                diagnostic.severity, diagnostic.kind, diagnostic.message
            );
        }
    }
}

/// Records every delivery in memory.
#[derive(Debug, Default)]
pub struct MemorySink {
    messages: Mutex<Vec<ChatMessage>>,
    diagnostics: Mutex<Vec<Diagnostic>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn messages(&self) -> Vec<ChatMessage> {
        self.messages.lock().clone()
    }

    /// Texts of public-facing chat, in delivery order.
    pub fn texts(&self) -> Vec<String> {
        self.messages
            .lock()
            .iter()
            .filter(|m| m.volume != ChatVolume::Text)
            .map(|m| m.text.clone())
            .collect()
    }

    pub fn diagnostics(&self) -> Vec<Diagnostic> {
        self.diagnostics.lock().clone()
    }

    /// Polls until at least `count` messages arrived or `timeout` elapses.
    pub async fn wait_for_messages(&self, count: usize, timeout: Duration) -> bool {
        let deadline = tokio::time::Instant::now() + timeout;
        loop {
            if self.messages.lock().len() >= count {
                return true;
            }
            if tokio::time::Instant::now() >= deadline {
                return false;
            }
            tokio::time::sleep(Duration::from_millis(2)).await;
        }
    }
}

impl OutputSink for MemorySink {
    fn deliver(&self, message: &ChatMessage) {
        self.messages.lock().push(message.clone());
    }

    fn report(&self, diagnostic: &Diagnostic) {
        self.diagnostics.lock().push(diagnostic.clone());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn message(text: &str, volume: ChatVolume) -> ChatMessage {
        ChatMessage {
            channel: 0,
            speaker_name: "Object".into(),
            speaker_key: crate::eval::value::NULL_KEY.into(),
            text: text.into(),
            volume,
            target: None,
            sent_at: Utc::now(),
        }
    }

    #[test]
    fn test_memory_sink_records() {
        let sink = MemorySink::new();
        sink.deliver(&message("hi", ChatVolume::Say));
        sink.deliver(&message("label", ChatVolume::Text));
        sink.report(&Diagnostic::warning(DiagnosticKind::UnknownFunction, "llFoo"));
        assert_eq!(sink.texts(), vec!["hi".to_string()]);
        assert_eq!(sink.messages().len(), 2);
        assert_eq!(sink.diagnostics()[0].kind, DiagnosticKind::UnknownFunction);
    }

    #[test]
    fn test_chat_message_json_roundtrip() {
        let original = message("hello", ChatVolume::Shout);
        let json = serde_json::to_string(&original).unwrap();
        assert!(json.contains("\"sent_at\""));
        let loaded: ChatMessage = serde_json::from_str(&json).unwrap();
        assert_eq!(loaded, original);
    }

    #[test]
    fn test_kind_display() {
        assert_eq!(DiagnosticKind::LoopCapExceeded.to_string(), "loop_cap_exceeded");
    }

    #[tokio::test]
    async fn test_wait_for_messages_times_out() {
        let sink = MemorySink::new();
        assert!(!sink.wait_for_messages(1, Duration::from_millis(10)).await);
        sink.deliver(&message("x", ChatVolume::Say));
        assert!(sink.wait_for_messages(1, Duration::from_millis(10)).await);
    }
}
