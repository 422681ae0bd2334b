use anyhow::Result;
use ratatui::layout::Rect;
use ratatui::widgets::ListState;
use tokio::task::JoinHandle;

use crate::gemini::GeminiClient;
use crate::session::{AppState, Sender};
use crate::store::Store;
use crate::ui;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FocusPane {
    Sidebar,
    Messages,
    Input,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputMode {
    Normal,
    Editing,
}

/// Owns all application state and the persistence boundary. Every mutation
/// of `state` goes back to the store before the next frame.
pub struct App {
    pub should_quit: bool,
    pub focus: FocusPane,
    pub input_mode: InputMode,

    pub state: AppState,
    store: Store,
    pub client: GeminiClient,

    // Sidebar selection (independent of the active session marker)
    pub sidebar_state: ListState,

    // Prompt input
    pub prompt_input: String,
    pub prompt_cursor: usize,

    // Message pane scroll; height/width are updated during render
    pub chat_scroll: u16,
    pub chat_height: u16,
    pub chat_width: u16,

    // The single in-flight request; sends are serialized on this
    pub pending_reply: Option<JoinHandle<Result<String>>>,
    pub animation_frame: u8,

    // Rename popup
    pub show_rename_input: bool,
    pub rename_input: String,
    pub rename_cursor: usize,
    rename_target: Option<String>,

    // Delete confirmation popup
    pub show_delete_confirm: bool,

    // API key popup
    pub show_key_input: bool,
    pub key_input: String,
    pub key_cursor: usize,

    // Transient footer notice
    pub flash: Option<String>,
    flash_ticks: u8,

    // Panel areas for mouse hit-testing (updated during render)
    pub sidebar_area: Option<Rect>,
    pub chat_area: Option<Rect>,
}

impl App {
    pub fn new(store: Store, client: GeminiClient) -> Self {
        let mut state = store.load();

        // The active id must reference an existing session, and the session
        // list is never empty while the UI is up.
        let active_is_valid = state
            .active_chat_id
            .as_deref()
            .map(|id| state.chats.iter().any(|c| c.id == id))
            .unwrap_or(false);
        if !active_is_valid {
            state.active_chat_id = state.chats.first().map(|c| c.id.clone());
        }
        state.ensure_chat();

        let mut app = Self {
            should_quit: false,
            focus: FocusPane::Input,
            input_mode: InputMode::Editing,

            state,
            store,
            client,

            sidebar_state: ListState::default(),

            prompt_input: String::new(),
            prompt_cursor: 0,

            chat_scroll: 0,
            chat_height: 0,
            chat_width: 0,

            pending_reply: None,
            animation_frame: 0,

            show_rename_input: false,
            rename_input: String::new(),
            rename_cursor: 0,
            rename_target: None,

            show_delete_confirm: false,

            show_key_input: false,
            key_input: String::new(),
            key_cursor: 0,

            flash: None,
            flash_ticks: 0,

            sidebar_area: None,
            chat_area: None,
        };
        app.select_active_in_sidebar();
        app.persist();
        app.scroll_chat_to_bottom();
        app
    }

    pub fn is_sending(&self) -> bool {
        self.pending_reply.is_some()
    }

    /// Write the state back to disk. Failure is non-fatal: the session keeps
    /// running in memory and the user sees a notice.
    pub fn persist(&mut self) {
        if let Err(err) = self.store.save(&self.state) {
            tracing::warn!("could not save state: {err}");
            self.flash("Warning: could not save chat history");
        }
    }

    pub fn flash(&mut self, message: &str) {
        self.flash = Some(message.to_string());
        self.flash_ticks = 12;
    }

    /// Advance animations and expire the flash notice. Driven by the 250ms
    /// tick event.
    pub fn tick(&mut self) {
        if self.is_sending() {
            self.animation_frame = (self.animation_frame + 1) % 3;
        }
        if self.flash_ticks > 0 {
            self.flash_ticks -= 1;
            if self.flash_ticks == 0 {
                self.flash = None;
            }
        }
    }

    // Sidebar

    pub fn selected_chat_id(&self) -> Option<String> {
        self.sidebar_state
            .selected()
            .and_then(|i| self.state.chats.get(i))
            .map(|c| c.id.clone())
    }

    pub fn sidebar_nav_down(&mut self) {
        let len = self.state.chats.len();
        if len > 0 {
            let i = self.sidebar_state.selected().unwrap_or(0);
            self.sidebar_state.select(Some((i + 1).min(len - 1)));
        }
    }

    pub fn sidebar_nav_up(&mut self) {
        let i = self.sidebar_state.selected().unwrap_or(0);
        self.sidebar_state.select(Some(i.saturating_sub(1)));
    }

    pub fn select_active_in_sidebar(&mut self) {
        self.sidebar_state.select(self.state.active_index());
    }

    // Session operations

    pub fn new_chat(&mut self) {
        self.state.create_chat();
        self.persist();
        self.select_active_in_sidebar();
        self.scroll_chat_to_bottom();
    }

    pub fn activate_selected(&mut self) {
        if let Some(id) = self.selected_chat_id() {
            if self.state.switch_chat(&id) {
                self.persist();
                self.scroll_chat_to_bottom();
            }
        }
    }

    pub fn open_rename(&mut self) {
        let Some(id) = self.selected_chat_id() else {
            return;
        };
        if let Some(chat) = self.state.chats.iter().find(|c| c.id == id) {
            // Prefill with the current title, cursor at the end
            self.rename_input = chat.title.clone();
            self.rename_cursor = self.rename_input.chars().count();
            self.rename_target = Some(id);
            self.show_rename_input = true;
        }
    }

    pub fn confirm_rename(&mut self) {
        self.show_rename_input = false;
        let Some(id) = self.rename_target.take() else {
            return;
        };
        if self.state.rename_chat(&id, &self.rename_input) {
            self.persist();
        }
        self.rename_input.clear();
        self.rename_cursor = 0;
    }

    pub fn cancel_rename(&mut self) {
        self.show_rename_input = false;
        self.rename_target = None;
        self.rename_input.clear();
        self.rename_cursor = 0;
    }

    pub fn open_delete_confirm(&mut self) {
        if self.selected_chat_id().is_some() {
            self.show_delete_confirm = true;
        }
    }

    pub fn confirm_delete(&mut self) {
        self.show_delete_confirm = false;
        let Some(id) = self.selected_chat_id() else {
            return;
        };
        self.state.delete_chat(&id);
        // Deleting the last session immediately replaces it
        self.state.ensure_chat();
        self.persist();
        self.select_active_in_sidebar();
        self.scroll_chat_to_bottom();
    }

    pub fn open_key_input(&mut self) {
        self.key_input = self.state.api_key.clone();
        self.key_cursor = self.key_input.chars().count();
        self.show_key_input = true;
    }

    pub fn save_key(&mut self) {
        self.show_key_input = false;
        self.state.api_key = self.key_input.trim().to_string();
        self.key_input.clear();
        self.key_cursor = 0;
        self.persist();
        self.flash("API key saved");
    }

    // Send sequence

    /// Pre-flight for a send: validates the prompt and key, appends the user
    /// message, clears the input, and persists. Returns the prompt to issue,
    /// or `None` when nothing should be sent. Sends are serialized: while a
    /// reply is pending this is a no-op.
    pub fn prepare_send(&mut self) -> Option<String> {
        if self.is_sending() {
            return None;
        }
        let prompt = self.prompt_input.trim().to_string();
        if prompt.is_empty() {
            return None;
        }
        if self.state.api_key.is_empty() {
            self.flash("Set your Gemini API key first (press K)");
            return None;
        }
        if !self.state.append_message(Sender::User, prompt.clone()) {
            return None;
        }
        self.prompt_input.clear();
        self.prompt_cursor = 0;
        self.persist();
        self.scroll_chat_to_bottom();
        Some(prompt)
    }

    /// Completion of a send: the reply, or the failure as an `Error: `
    /// message, lands in the active session as a bot message.
    pub fn finish_send(&mut self, result: Result<String>) {
        let text = match result {
            Ok(reply) => reply,
            Err(err) => format!("Error: {err}"),
        };
        self.state.append_message(Sender::Bot, text);
        self.persist();
        self.scroll_chat_to_bottom();
    }

    // Message pane scrolling

    fn chat_line_total(&self) -> usize {
        let width = if self.chat_width > 0 { self.chat_width } else { 60 };
        ui::chat_lines(
            self.state.active_chat(),
            self.is_sending(),
            self.animation_frame,
            width,
        )
        .len()
    }

    fn max_chat_scroll(&self) -> u16 {
        let height = if self.chat_height > 0 { self.chat_height } else { 20 };
        let total = self.chat_line_total();
        total.saturating_sub(height as usize).min(u16::MAX as usize) as u16
    }

    pub fn scroll_chat_to_bottom(&mut self) {
        self.chat_scroll = self.max_chat_scroll();
    }

    pub fn chat_scroll_down(&mut self, lines: u16) {
        self.chat_scroll = self.chat_scroll.saturating_add(lines).min(self.max_chat_scroll());
    }

    pub fn chat_scroll_up(&mut self, lines: u16) {
        self.chat_scroll = self.chat_scroll.saturating_sub(lines);
    }

    pub fn chat_scroll_half_page(&mut self, down: bool) {
        let half = (if self.chat_height > 0 { self.chat_height } else { 20 }) / 2;
        if down {
            self.chat_scroll_down(half);
        } else {
            self.chat_scroll_up(half);
        }
    }
}
