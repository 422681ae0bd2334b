use std::fs;
use std::path::PathBuf;

use anyhow::{anyhow, Result};

use crate::session::AppState;

/// File-backed persistence for the whole application state: a single JSON
/// blob, rewritten on every mutation.
pub struct Store {
    path: PathBuf,
}

impl Store {
    /// Store at the default location, `<config_dir>/gemchat/state.json`.
    pub fn new() -> Result<Self> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| anyhow!("could not determine config directory"))?;
        Ok(Self::at(config_dir.join("gemchat").join("state.json")))
    }

    pub fn at(path: PathBuf) -> Self {
        Self { path }
    }

    /// Load the persisted state. An absent or unreadable file yields the
    /// default empty state; malformed content does too, with a warning, so a
    /// damaged state file never blocks startup.
    pub fn load(&self) -> AppState {
        let content = match fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(_) => return AppState::default(),
        };
        match serde_json::from_str(&content) {
            Ok(state) => state,
            Err(err) => {
                tracing::warn!(
                    "ignoring malformed state file {}: {err}",
                    self.path.display()
                );
                AppState::default()
            }
        }
    }

    /// Overwrite the persisted state. Last write wins.
    pub fn save(&self, state: &AppState) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        let content = serde_json::to_string_pretty(state)?;
        fs::write(&self.path, content)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::Sender;

    fn temp_store(dir: &tempfile::TempDir) -> Store {
        Store::at(dir.path().join("state.json"))
    }

    #[test]
    fn load_missing_file_returns_default() {
        let dir = tempfile::tempdir().unwrap();
        let store = temp_store(&dir);

        let state = store.load();
        assert!(state.api_key.is_empty());
        assert!(state.chats.is_empty());
        assert!(state.active_chat_id.is_none());
    }

    #[test]
    fn load_malformed_file_returns_default() {
        let dir = tempfile::tempdir().unwrap();
        let store = temp_store(&dir);
        fs::write(dir.path().join("state.json"), "{not json at all").unwrap();

        let state = store.load();
        assert!(state.chats.is_empty());
    }

    #[test]
    fn save_then_load_round_trips_message_order() {
        let dir = tempfile::tempdir().unwrap();
        let store = temp_store(&dir);

        let mut state = AppState::default();
        state.api_key = "secret".to_string();
        state.create_chat();
        state.append_message(Sender::User, "first".to_string());
        state.append_message(Sender::Bot, "second".to_string());
        state.append_message(Sender::User, "third".to_string());
        store.save(&state).unwrap();

        let loaded = store.load();
        assert_eq!(loaded.api_key, "secret");
        assert_eq!(loaded.active_chat_id, state.active_chat_id);

        let messages = &loaded.active_chat().unwrap().messages;
        let texts: Vec<&str> = messages.iter().map(|m| m.text.as_str()).collect();
        assert_eq!(texts, vec!["first", "second", "third"]);
        assert_eq!(messages[1].sender, Sender::Bot);
    }

    #[test]
    fn save_overwrites_previous_state() {
        let dir = tempfile::tempdir().unwrap();
        let store = temp_store(&dir);

        let mut state = AppState::default();
        state.create_chat();
        state.create_chat();
        store.save(&state).unwrap();

        let id = state.chats[0].id.clone();
        state.delete_chat(&id);
        store.save(&state).unwrap();

        assert_eq!(store.load().chats.len(), 1);
    }
}
