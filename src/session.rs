use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};

/// Who authored a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Sender {
    User,
    Bot,
}

/// A single chat message. Messages are append-only and never edited.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub sender: Sender,
    pub text: String,
}

/// A named conversation thread with its own ordered message log.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatSession {
    pub id: String,
    pub title: String,
    pub messages: Vec<Message>,
}

/// The whole persisted application state: one blob, last-write-wins.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppState {
    pub api_key: String,
    pub chats: Vec<ChatSession>,
    pub active_chat_id: Option<String>,
}

impl AppState {
    pub fn active_chat(&self) -> Option<&ChatSession> {
        let id = self.active_chat_id.as_deref()?;
        self.chats.iter().find(|c| c.id == id)
    }

    pub fn active_chat_mut(&mut self) -> Option<&mut ChatSession> {
        let id = self.active_chat_id.clone()?;
        self.chats.iter_mut().find(|c| c.id == id)
    }

    pub fn active_index(&self) -> Option<usize> {
        let id = self.active_chat_id.as_deref()?;
        self.chats.iter().position(|c| c.id == id)
    }

    /// Create a new session with a unique id and a default title, and make it
    /// the active one. Returns the new id.
    pub fn create_chat(&mut self) -> String {
        let id = self.generate_chat_id();
        let title = format!("Chat {}", self.chats.len() + 1);
        self.chats.push(ChatSession {
            id: id.clone(),
            title,
            messages: Vec::new(),
        });
        self.active_chat_id = Some(id.clone());
        id
    }

    /// Make the session with the given id active. Unknown ids are a no-op.
    pub fn switch_chat(&mut self, id: &str) -> bool {
        if self.chats.iter().any(|c| c.id == id) {
            self.active_chat_id = Some(id.to_string());
            true
        } else {
            false
        }
    }

    /// Rename a session. The title is trimmed; an empty title is rejected.
    pub fn rename_chat(&mut self, id: &str, title: &str) -> bool {
        let title = title.trim();
        if title.is_empty() {
            return false;
        }
        match self.chats.iter_mut().find(|c| c.id == id) {
            Some(chat) => {
                chat.title = title.to_string();
                true
            }
            None => false,
        }
    }

    /// Delete a session. If it was active, the previous sibling by index
    /// becomes active; deleting the last remaining session leaves no active
    /// session and the caller is expected to create a replacement.
    pub fn delete_chat(&mut self, id: &str) -> bool {
        let Some(idx) = self.chats.iter().position(|c| c.id == id) else {
            return false;
        };
        let was_active = self.active_chat_id.as_deref() == Some(id);
        self.chats.remove(idx);
        if was_active {
            self.active_chat_id = if self.chats.is_empty() {
                None
            } else {
                Some(self.chats[idx.saturating_sub(1)].id.clone())
            };
        }
        true
    }

    /// Append a message to the active session.
    pub fn append_message(&mut self, sender: Sender, text: String) -> bool {
        match self.active_chat_mut() {
            Some(chat) => {
                chat.messages.push(Message { sender, text });
                true
            }
            None => false,
        }
    }

    /// The session list must never be empty while the UI is up.
    pub fn ensure_chat(&mut self) {
        if self.chats.is_empty() {
            self.create_chat();
        }
    }

    // Millisecond timestamp, bumped until unique. Two chats created within
    // the same millisecond get consecutive ids.
    fn generate_chat_id(&self) -> String {
        let mut millis = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis())
            .unwrap_or(0);
        loop {
            let id = millis.to_string();
            if !self.chats.iter().any(|c| c.id == id) {
                return id;
            }
            millis += 1;
        }
    }
}
