use crate::keypad::Key;
use crate::typing::TypingState;
use serde::{Deserialize, Serialize};

/// Messages from daemon to clients (JSON-lines over Unix socket).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum DaemonMsg {
    /// Typing state after a transition, plus the text as a display shows it.
    #[serde(rename = "state")]
    State { state: TypingState, rendered: String },
    /// Keypad key currently held down, if any.
    #[serde(rename = "highlight")]
    Highlight { key: Option<Key> },
    /// Status response.
    #[serde(rename = "status")]
    Status {
        version: String,
        debounce_ms: u64,
        devices: usize,
        watchers: usize,
    },
    /// Acknowledgement for commands.
    #[serde(rename = "ack")]
    Ack { ok: bool, message: String },
}

/// Messages from clients to daemon.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ClientMsg {
    /// Subscribe to every state and highlight change.
    #[serde(rename = "watch")]
    Watch,
    /// Raw key-down label ("0"-"9", "*", "#", "Backspace"; others ignored).
    #[serde(rename = "key_down")]
    KeyDown { label: String },
    /// Raw key-up label; only affects the highlight.
    #[serde(rename = "key_up")]
    KeyUp { label: String },
    /// Request the current typing state.
    #[serde(rename = "get_state")]
    GetState,
    /// Request daemon status.
    #[serde(rename = "get_status")]
    GetStatus,
}

/// Serialize a message as a JSON line (with trailing newline).
pub fn encode(msg: &impl Serialize) -> String {
    let mut s = serde_json::to_string(msg).expect("serialize IPC message");
    s.push('\n');
    s
}

/// Deserialize a JSON line. Returns None on empty/whitespace input.
pub fn decode_daemon(line: &str) -> Option<DaemonMsg> {
    let trimmed = line.trim();
    if trimmed.is_empty() {
        return None;
    }
    serde_json::from_str(trimmed).ok()
}

pub fn decode_client(line: &str) -> Option<ClientMsg> {
    let trimmed = line.trim();
    if trimmed.is_empty() {
        return None;
    }
    serde_json::from_str(trimmed).ok()
}
