use anyhow::Result;
use crossterm::event::{KeyCode, KeyEvent, KeyModifiers, MouseEvent, MouseEventKind};
use ratatui::layout::Rect;

use crate::app::{App, FocusPane, InputMode};
use crate::tui::AppEvent;

/// Convert a character index to a byte index for UTF-8 safe string edits
fn char_to_byte_index(s: &str, char_idx: usize) -> usize {
    s.char_indices()
        .nth(char_idx)
        .map(|(i, _)| i)
        .unwrap_or(s.len())
}

/// Cursor-based line editing shared by the prompt and the popup inputs.
/// Returns true when the key was consumed as an edit.
fn edit_text(input: &mut String, cursor: &mut usize, key: KeyEvent) -> bool {
    match key.code {
        KeyCode::Backspace => {
            if *cursor > 0 {
                *cursor -= 1;
                let pos = char_to_byte_index(input, *cursor);
                input.remove(pos);
            }
            true
        }
        KeyCode::Delete => {
            if *cursor < input.chars().count() {
                let pos = char_to_byte_index(input, *cursor);
                input.remove(pos);
            }
            true
        }
        KeyCode::Left => {
            *cursor = cursor.saturating_sub(1);
            true
        }
        KeyCode::Right => {
            *cursor = (*cursor + 1).min(input.chars().count());
            true
        }
        KeyCode::Home => {
            *cursor = 0;
            true
        }
        KeyCode::End => {
            *cursor = input.chars().count();
            true
        }
        KeyCode::Char(c) => {
            let pos = char_to_byte_index(input, *cursor);
            input.insert(pos, c);
            *cursor += 1;
            true
        }
        _ => false,
    }
}

pub fn handle_event(app: &mut App, event: AppEvent) -> Result<()> {
    match event {
        AppEvent::Key(key) => handle_key(app, key),
        AppEvent::Mouse(mouse) => handle_mouse(app, mouse),
        AppEvent::Resize => {}
        AppEvent::Tick => app.tick(),
    }
    Ok(())
}

fn handle_key(app: &mut App, key: KeyEvent) {
    // Ctrl+C quits from anywhere
    if key.code == KeyCode::Char('c') && key.modifiers.contains(KeyModifiers::CONTROL) {
        app.should_quit = true;
        return;
    }

    // Popups capture the keyboard while open
    if app.show_key_input {
        match key.code {
            KeyCode::Esc => {
                app.show_key_input = false;
                app.key_input.clear();
                app.key_cursor = 0;
            }
            KeyCode::Enter => app.save_key(),
            _ => {
                edit_text(&mut app.key_input, &mut app.key_cursor, key);
            }
        }
        return;
    }

    if app.show_rename_input {
        match key.code {
            KeyCode::Esc => app.cancel_rename(),
            KeyCode::Enter => app.confirm_rename(),
            _ => {
                edit_text(&mut app.rename_input, &mut app.rename_cursor, key);
            }
        }
        return;
    }

    if app.show_delete_confirm {
        match key.code {
            KeyCode::Char('y') | KeyCode::Enter => app.confirm_delete(),
            KeyCode::Char('n') | KeyCode::Esc => app.show_delete_confirm = false,
            _ => {}
        }
        return;
    }

    match app.input_mode {
        InputMode::Editing => handle_prompt_editing(app, key),
        InputMode::Normal => handle_normal(app, key),
    }
}

fn handle_prompt_editing(app: &mut App, key: KeyEvent) {
    match key.code {
        KeyCode::Esc => {
            app.input_mode = InputMode::Normal;
        }
        KeyCode::Tab => cycle_focus(app),
        // Enter sends; Shift+Enter inserts a newline into the prompt
        KeyCode::Enter if key.modifiers.contains(KeyModifiers::SHIFT) => {
            let pos = char_to_byte_index(&app.prompt_input, app.prompt_cursor);
            app.prompt_input.insert(pos, '\n');
            app.prompt_cursor += 1;
        }
        KeyCode::Enter => start_send(app),
        _ => {
            edit_text(&mut app.prompt_input, &mut app.prompt_cursor, key);
        }
    }
}

fn handle_normal(app: &mut App, key: KeyEvent) {
    match key.code {
        KeyCode::Char('q') => app.should_quit = true,
        KeyCode::Tab => cycle_focus(app),

        KeyCode::Char('n') => {
            app.new_chat();
            app.focus = FocusPane::Input;
            app.input_mode = InputMode::Editing;
        }
        KeyCode::Char('K') => app.open_key_input(),
        KeyCode::Char('i') | KeyCode::Char('/') => {
            app.focus = FocusPane::Input;
            app.input_mode = InputMode::Editing;
        }

        KeyCode::Char('j') | KeyCode::Down => match app.focus {
            FocusPane::Sidebar => app.sidebar_nav_down(),
            FocusPane::Messages => app.chat_scroll_down(1),
            FocusPane::Input => {}
        },
        KeyCode::Char('k') | KeyCode::Up => match app.focus {
            FocusPane::Sidebar => app.sidebar_nav_up(),
            FocusPane::Messages => app.chat_scroll_up(1),
            FocusPane::Input => {}
        },

        KeyCode::Enter => match app.focus {
            FocusPane::Sidebar => app.activate_selected(),
            FocusPane::Input => app.input_mode = InputMode::Editing,
            FocusPane::Messages => {}
        },

        // Half-page scroll must match before the plain 'd' binding
        KeyCode::Char('d') if key.modifiers.contains(KeyModifiers::CONTROL) => {
            if app.focus == FocusPane::Messages {
                app.chat_scroll_half_page(true);
            }
        }
        KeyCode::Char('u') if key.modifiers.contains(KeyModifiers::CONTROL) => {
            if app.focus == FocusPane::Messages {
                app.chat_scroll_half_page(false);
            }
        }

        KeyCode::Char('r') => {
            if app.focus == FocusPane::Sidebar {
                app.open_rename();
            }
        }
        KeyCode::Char('d') => {
            if app.focus == FocusPane::Sidebar {
                app.open_delete_confirm();
            }
        }

        KeyCode::Char('g') => {
            if app.focus == FocusPane::Messages {
                app.chat_scroll = 0;
            }
        }
        KeyCode::Char('G') => {
            if app.focus == FocusPane::Messages {
                app.scroll_chat_to_bottom();
            }
        }

        _ => {}
    }
}

fn cycle_focus(app: &mut App) {
    app.focus = match app.focus {
        FocusPane::Sidebar => {
            app.input_mode = InputMode::Editing;
            FocusPane::Input
        }
        FocusPane::Input => {
            app.input_mode = InputMode::Normal;
            FocusPane::Messages
        }
        FocusPane::Messages => FocusPane::Sidebar,
    };
}

/// The send sequence: pre-flight through the App (append + persist), then
/// one spawned request. Completion is picked up by the main loop.
fn start_send(app: &mut App) {
    if let Some(prompt) = app.prepare_send() {
        let client = app.client.clone();
        let api_key = app.state.api_key.clone();
        app.pending_reply = Some(tokio::spawn(async move {
            client.generate(&api_key, &prompt).await
        }));
        // The typing indicator just appeared below the last message
        app.scroll_chat_to_bottom();
    }
}

fn point_in_rect(x: u16, y: u16, rect: Rect) -> bool {
    x >= rect.x && x < rect.x + rect.width && y >= rect.y && y < rect.y + rect.height
}

fn handle_mouse(app: &mut App, mouse: MouseEvent) {
    let x = mouse.column;
    let y = mouse.row;

    let in_sidebar = app.sidebar_area.map(|r| point_in_rect(x, y, r)).unwrap_or(false);
    let in_chat = app.chat_area.map(|r| point_in_rect(x, y, r)).unwrap_or(false);

    match mouse.kind {
        MouseEventKind::ScrollDown => {
            if in_sidebar {
                app.sidebar_nav_down();
            } else if in_chat {
                app.chat_scroll_down(3);
            }
        }
        MouseEventKind::ScrollUp => {
            if in_sidebar {
                app.sidebar_nav_up();
            } else if in_chat {
                app.chat_scroll_up(3);
            }
        }
        _ => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gemini::GeminiClient;
    use crate::store::Store;

    fn test_app(dir: &tempfile::TempDir) -> App {
        let store = Store::at(dir.path().join("state.json"));
        App::new(store, GeminiClient::new())
    }

    fn press(code: KeyCode) -> KeyEvent {
        KeyEvent::new(code, KeyModifiers::NONE)
    }

    fn press_shift(code: KeyCode) -> KeyEvent {
        KeyEvent::new(code, KeyModifiers::SHIFT)
    }

    #[test]
    fn typing_inserts_at_cursor() {
        let dir = tempfile::tempdir().unwrap();
        let mut app = test_app(&dir);

        for c in "héllo".chars() {
            handle_key(&mut app, press(KeyCode::Char(c)));
        }
        handle_key(&mut app, press(KeyCode::Left));
        handle_key(&mut app, press(KeyCode::Left));
        handle_key(&mut app, press(KeyCode::Char('x')));

        assert_eq!(app.prompt_input, "hélxlo");
        assert_eq!(app.prompt_cursor, 4);
    }

    #[test]
    fn shift_enter_inserts_newline_instead_of_sending() {
        let dir = tempfile::tempdir().unwrap();
        let mut app = test_app(&dir);
        app.state.api_key = "key".to_string();

        handle_key(&mut app, press(KeyCode::Char('a')));
        handle_key(&mut app, press_shift(KeyCode::Enter));
        handle_key(&mut app, press(KeyCode::Char('b')));

        assert_eq!(app.prompt_input, "a\nb");
        assert!(app.pending_reply.is_none());
        assert!(app.state.active_chat().unwrap().messages.is_empty());
    }

    #[test]
    fn enter_with_blank_prompt_sends_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let mut app = test_app(&dir);
        app.state.api_key = "key".to_string();

        handle_key(&mut app, press(KeyCode::Char(' ')));
        handle_key(&mut app, press(KeyCode::Enter));

        assert!(app.pending_reply.is_none());
        assert!(app.state.active_chat().unwrap().messages.is_empty());
    }

    #[test]
    fn enter_without_key_flashes_and_sends_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let mut app = test_app(&dir);

        handle_key(&mut app, press(KeyCode::Char('h')));
        handle_key(&mut app, press(KeyCode::Enter));

        assert!(app.pending_reply.is_none());
        assert!(app.flash.is_some());
    }

    #[test]
    fn tab_cycles_through_all_panes() {
        let dir = tempfile::tempdir().unwrap();
        let mut app = test_app(&dir);
        assert_eq!(app.focus, FocusPane::Input);

        handle_key(&mut app, press(KeyCode::Tab));
        assert_eq!(app.focus, FocusPane::Messages);
        assert_eq!(app.input_mode, InputMode::Normal);

        handle_key(&mut app, press(KeyCode::Tab));
        assert_eq!(app.focus, FocusPane::Sidebar);

        handle_key(&mut app, press(KeyCode::Tab));
        assert_eq!(app.focus, FocusPane::Input);
        assert_eq!(app.input_mode, InputMode::Editing);
    }

    #[test]
    fn q_in_editing_mode_is_text_not_quit() {
        let dir = tempfile::tempdir().unwrap();
        let mut app = test_app(&dir);

        handle_key(&mut app, press(KeyCode::Char('q')));
        assert!(!app.should_quit);
        assert_eq!(app.prompt_input, "q");
    }

    #[test]
    fn delete_confirm_requires_y() {
        let dir = tempfile::tempdir().unwrap();
        let mut app = test_app(&dir);
        app.focus = FocusPane::Sidebar;
        app.input_mode = InputMode::Normal;
        app.state.append_message(crate::session::Sender::User, "keep?".to_string());

        handle_key(&mut app, press(KeyCode::Char('d')));
        assert!(app.show_delete_confirm);
        handle_key(&mut app, press(KeyCode::Char('n')));
        assert!(!app.show_delete_confirm);
        assert_eq!(app.state.active_chat().unwrap().messages.len(), 1);

        handle_key(&mut app, press(KeyCode::Char('d')));
        handle_key(&mut app, press(KeyCode::Char('y')));
        assert!(app.state.active_chat().unwrap().messages.is_empty());
    }

    #[test]
    fn rename_flow_edits_selected_chat() {
        let dir = tempfile::tempdir().unwrap();
        let mut app = test_app(&dir);
        app.focus = FocusPane::Sidebar;
        app.input_mode = InputMode::Normal;

        handle_key(&mut app, press(KeyCode::Char('r')));
        assert!(app.show_rename_input);

        // Clear the prefilled title, then type a new one
        for _ in 0..app.rename_input.chars().count() {
            handle_key(&mut app, press(KeyCode::Backspace));
        }
        for c in "Errands".chars() {
            handle_key(&mut app, press(KeyCode::Char(c)));
        }
        handle_key(&mut app, press(KeyCode::Enter));

        assert!(!app.show_rename_input);
        assert_eq!(app.state.chats[0].title, "Errands");
    }

    #[test]
    fn new_chat_key_creates_and_focuses_prompt() {
        let dir = tempfile::tempdir().unwrap();
        let mut app = test_app(&dir);
        app.focus = FocusPane::Sidebar;
        app.input_mode = InputMode::Normal;

        handle_key(&mut app, press(KeyCode::Char('n')));
        assert_eq!(app.state.chats.len(), 2);
        assert_eq!(app.focus, FocusPane::Input);
        assert_eq!(app.input_mode, InputMode::Editing);
    }

    #[test]
    fn sidebar_enter_switches_active_chat() {
        let dir = tempfile::tempdir().unwrap();
        let mut app = test_app(&dir);
        app.state.create_chat();
        app.select_active_in_sidebar();
        app.focus = FocusPane::Sidebar;
        app.input_mode = InputMode::Normal;

        handle_key(&mut app, press(KeyCode::Char('k')));
        handle_key(&mut app, press(KeyCode::Enter));

        assert_eq!(
            app.state.active_chat_id.as_deref(),
            Some(app.state.chats[0].id.as_str())
        );
    }
}
