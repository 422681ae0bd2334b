use ratatui::{
    layout::{Constraint, Layout, Rect},
    style::{Color, Modifier, Style, Stylize},
    text::{Line, Span, Text},
    widgets::{Block, Borders, Clear, List, ListItem, Paragraph},
    Frame,
};

use crate::app::{App, FocusPane, InputMode};
use crate::session::{AppState, ChatSession, Sender};

fn user_label_style() -> Style {
    Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD)
}

fn bot_label_style() -> Style {
    Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD)
}

/// Convert `**bold**` markers into styled spans; unbalanced markers are kept
/// as literal text.
pub fn bold_line(text: &str) -> Line<'static> {
    let mut spans: Vec<Span<'static>> = Vec::new();
    let mut rest = text;

    while let Some(start) = rest.find("**") {
        let Some(len) = rest[start + 2..].find("**") else {
            break;
        };
        if start > 0 {
            spans.push(Span::raw(rest[..start].to_string()));
        }
        let bold = &rest[start + 2..start + 2 + len];
        if !bold.is_empty() {
            spans.push(Span::styled(
                bold.to_string(),
                Style::default().add_modifier(Modifier::BOLD),
            ));
        }
        rest = &rest[start + 2 + len + 2..];
    }

    if !rest.is_empty() {
        spans.push(Span::raw(rest.to_string()));
    }
    if spans.is_empty() {
        Line::default()
    } else {
        Line::from(spans)
    }
}

/// Word-wrap a single line of text. A word longer than the width stays on
/// its own line rather than being split.
pub fn wrap_text(text: &str, width: usize) -> Vec<String> {
    let width = width.max(1);
    let mut lines = Vec::new();
    let mut current = String::new();
    let mut current_len = 0;

    for word in text.split_whitespace() {
        let word_len = word.chars().count();
        if current_len == 0 {
            current = word.to_string();
            current_len = word_len;
        } else if current_len + 1 + word_len <= width {
            current.push(' ');
            current.push_str(word);
            current_len += 1 + word_len;
        } else {
            lines.push(std::mem::take(&mut current));
            current = word.to_string();
            current_len = word_len;
        }
    }

    if !current.is_empty() {
        lines.push(current);
    }
    if lines.is_empty() {
        lines.push(String::new());
    }
    lines
}

/// The message pane as pre-wrapped lines: one labelled bubble per message in
/// insertion order, plus the typing indicator while a reply is pending.
/// Pure, so the scroll math and the rendered output always agree.
pub fn chat_lines(
    chat: Option<&ChatSession>,
    sending: bool,
    animation_frame: u8,
    width: u16,
) -> Vec<Line<'static>> {
    let width = width.max(1) as usize;
    let mut lines = Vec::new();

    if let Some(chat) = chat {
        for msg in &chat.messages {
            match msg.sender {
                Sender::User => {
                    lines.push(Line::from(Span::styled("You:", user_label_style())));
                    for raw in msg.text.lines() {
                        for wrapped in wrap_text(raw, width) {
                            lines.push(Line::from(wrapped));
                        }
                    }
                }
                Sender::Bot => {
                    lines.push(Line::from(Span::styled("Gemini:", bot_label_style())));
                    for raw in msg.text.lines() {
                        for wrapped in wrap_text(raw, width) {
                            lines.push(bold_line(&wrapped));
                        }
                    }
                }
            }
            lines.push(Line::default());
        }
    }

    if sending {
        lines.push(Line::from(Span::styled("Gemini:", bot_label_style())));
        let dots = ".".repeat(animation_frame as usize + 1);
        lines.push(Line::from(Span::styled(
            format!("Typing{dots}"),
            Style::default()
                .fg(Color::DarkGray)
                .add_modifier(Modifier::ITALIC),
        )));
    }

    lines
}

/// Sidebar view model: one `(title, is_active)` entry per session, in store
/// order.
pub fn sidebar_items(state: &AppState) -> Vec<(String, bool)> {
    state
        .chats
        .iter()
        .map(|chat| {
            let active = state.active_chat_id.as_deref() == Some(chat.id.as_str());
            (chat.title.clone(), active)
        })
        .collect()
}

/// Single-line rendition of the prompt buffer; embedded newlines show as a
/// return glyph so the cursor math stays one-to-one with characters.
pub fn input_display(input: &str) -> String {
    input.replace('\n', "↵")
}

pub fn render(app: &mut App, frame: &mut Frame) {
    let area = frame.area();

    let [header_area, body_area, footer_area] = Layout::vertical([
        Constraint::Length(1),
        Constraint::Min(0),
        Constraint::Length(1),
    ])
    .areas(area);

    render_header(app, frame, header_area);

    let [sidebar_area, chat_pane] =
        Layout::horizontal([Constraint::Length(28), Constraint::Min(0)]).areas(body_area);
    let [messages_area, input_area] =
        Layout::vertical([Constraint::Min(0), Constraint::Length(3)]).areas(chat_pane);

    render_sidebar(app, frame, sidebar_area);
    render_messages(app, frame, messages_area);
    render_input(app, frame, input_area);
    render_footer(app, frame, footer_area);

    // Popups (at most one at a time)
    if app.show_key_input {
        render_key_popup(app, frame, area);
    } else if app.show_rename_input {
        render_rename_popup(app, frame, area);
    } else if app.show_delete_confirm {
        render_delete_popup(app, frame, area);
    }
}

fn render_header(app: &App, frame: &mut Frame, area: Rect) {
    let title = Line::from(vec![
        Span::styled(" GemChat ", Style::default().fg(Color::Cyan).bold()),
        Span::styled(app.client.model().to_string(), Style::default().fg(Color::DarkGray)),
        Span::raw(" "),
        Span::styled(
            format!("v{}", env!("CARGO_PKG_VERSION")),
            Style::default().fg(Color::DarkGray),
        ),
    ]);
    let header = Paragraph::new(title).style(Style::default().bg(Color::Black));
    frame.render_widget(header, area);
}

fn render_sidebar(app: &mut App, frame: &mut Frame, area: Rect) {
    app.sidebar_area = Some(area);

    let focused = app.focus == FocusPane::Sidebar;
    let border_color = if focused { Color::Cyan } else { Color::DarkGray };

    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(border_color))
        .title(format!(" Chats ({}) ", app.state.chats.len()));

    let items: Vec<ListItem> = sidebar_items(&app.state)
        .into_iter()
        .map(|(title, active)| {
            let marker = if active { "* " } else { "  " };
            let style = if active {
                Style::default().fg(Color::Green).add_modifier(Modifier::BOLD)
            } else {
                Style::default()
            };
            ListItem::new(format!("{marker}{title}")).style(style)
        })
        .collect();

    let list = List::new(items)
        .block(block)
        .highlight_style(
            Style::default()
                .bg(Color::Blue)
                .fg(Color::White)
                .add_modifier(Modifier::BOLD),
        )
        .highlight_symbol("> ");

    frame.render_stateful_widget(list, area, &mut app.sidebar_state);
}

fn render_messages(app: &mut App, frame: &mut Frame, area: Rect) {
    app.chat_area = Some(area);
    app.chat_height = area.height.saturating_sub(2);
    app.chat_width = area.width.saturating_sub(2);

    let focused = app.focus == FocusPane::Messages;
    let border_color = if focused { Color::Cyan } else { Color::DarkGray };

    let title = app
        .state
        .active_chat()
        .map(|c| format!(" {} ", c.title))
        .unwrap_or_else(|| " Messages ".to_string());

    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(border_color))
        .title(title);

    let lines = chat_lines(
        app.state.active_chat(),
        app.is_sending(),
        app.animation_frame,
        app.chat_width,
    );

    // Clamp the scroll after resizes so the last line stays reachable
    let max_scroll = lines
        .len()
        .saturating_sub(app.chat_height as usize)
        .min(u16::MAX as usize) as u16;
    if app.chat_scroll > max_scroll {
        app.chat_scroll = max_scroll;
    }

    let messages = Paragraph::new(Text::from(lines))
        .block(block)
        .scroll((app.chat_scroll, 0));

    frame.render_widget(messages, area);
}

fn render_input(app: &mut App, frame: &mut Frame, area: Rect) {
    let editing = app.focus == FocusPane::Input && app.input_mode == InputMode::Editing;
    let border_color = if editing {
        Color::Yellow
    } else if app.focus == FocusPane::Input {
        Color::Cyan
    } else {
        Color::DarkGray
    };

    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(border_color))
        .title(" Prompt ");

    // Horizontal scrolling keeps the cursor visible in the single-row box
    let inner_width = area.width.saturating_sub(2) as usize;
    let cursor_pos = app.prompt_cursor;
    let scroll_offset = if inner_width == 0 {
        0
    } else if cursor_pos >= inner_width {
        cursor_pos - inner_width + 1
    } else {
        0
    };

    let visible_text: String = input_display(&app.prompt_input)
        .chars()
        .skip(scroll_offset)
        .take(inner_width)
        .collect();

    let input = Paragraph::new(visible_text)
        .style(Style::default().fg(Color::Cyan))
        .block(block);
    frame.render_widget(input, area);

    if editing {
        let cursor_x = (cursor_pos - scroll_offset) as u16;
        frame.set_cursor_position((area.x + cursor_x + 1, area.y + 1));
    }
}

fn render_footer(app: &App, frame: &mut Frame, area: Rect) {
    if let Some(flash) = &app.flash {
        let notice = Paragraph::new(Span::styled(
            format!(" {flash} "),
            Style::default().bg(Color::Yellow).fg(Color::Black),
        ));
        frame.render_widget(notice, area);
        return;
    }

    let key_style = Style::default().bg(Color::DarkGray).fg(Color::White);
    let label_style = Style::default().bg(Color::Black).fg(Color::White);

    let hints: Vec<Span> = match (app.focus, app.input_mode) {
        (FocusPane::Input, InputMode::Editing) => vec![
            Span::styled(" Enter ", key_style),
            Span::styled(" send ", label_style),
            Span::styled(" Shift+Enter ", key_style),
            Span::styled(" newline ", label_style),
            Span::styled(" Esc ", key_style),
            Span::styled(" done ", label_style),
            Span::styled(" Tab ", key_style),
            Span::styled(" focus ", label_style),
        ],
        (FocusPane::Sidebar, _) => vec![
            Span::styled(" j/k ", key_style),
            Span::styled(" nav ", label_style),
            Span::styled(" Enter ", key_style),
            Span::styled(" open ", label_style),
            Span::styled(" n ", key_style),
            Span::styled(" new ", label_style),
            Span::styled(" r ", key_style),
            Span::styled(" rename ", label_style),
            Span::styled(" d ", key_style),
            Span::styled(" delete ", label_style),
            Span::styled(" K ", key_style),
            Span::styled(" api key ", label_style),
            Span::styled(" q ", key_style),
            Span::styled(" quit ", label_style),
        ],
        _ => vec![
            Span::styled(" j/k ", key_style),
            Span::styled(" scroll ", label_style),
            Span::styled(" g/G ", key_style),
            Span::styled(" top/bottom ", label_style),
            Span::styled(" i ", key_style),
            Span::styled(" prompt ", label_style),
            Span::styled(" Tab ", key_style),
            Span::styled(" focus ", label_style),
            Span::styled(" q ", key_style),
            Span::styled(" quit ", label_style),
        ],
    };

    frame.render_widget(Paragraph::new(Line::from(hints)), area);
}

fn centered_rect(width: u16, height: u16, area: Rect) -> Rect {
    let width = width.min(area.width.saturating_sub(4));
    let height = height.min(area.height.saturating_sub(4));
    let x = (area.width.saturating_sub(width)) / 2;
    let y = (area.height.saturating_sub(height)) / 2;
    Rect::new(x, y, width, height)
}

fn render_rename_popup(app: &App, frame: &mut Frame, area: Rect) {
    let popup_area = centered_rect(50, 5, area);
    frame.render_widget(Clear, popup_area);

    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::Yellow))
        .title(" Rename chat ");
    let inner = block.inner(popup_area);
    frame.render_widget(block, popup_area);

    let instructions = Paragraph::new("Enter to save, Esc to cancel")
        .style(Style::default().fg(Color::DarkGray));
    frame.render_widget(instructions, Rect::new(inner.x, inner.y, inner.width, 1));

    let input = Paragraph::new(app.rename_input.as_str())
        .style(Style::default().fg(Color::Cyan));
    let input_area = Rect::new(inner.x, inner.y + 2, inner.width, 1);
    frame.render_widget(input, input_area);

    let cursor_x = app.rename_cursor.min(input_area.width as usize) as u16;
    frame.set_cursor_position((input_area.x + cursor_x, input_area.y));
}

fn render_delete_popup(app: &App, frame: &mut Frame, area: Rect) {
    let title = app
        .selected_chat_id()
        .and_then(|id| {
            app.state
                .chats
                .iter()
                .find(|c| c.id == id)
                .map(|c| c.title.clone())
        })
        .unwrap_or_default();

    let popup_area = centered_rect(50, 5, area);
    frame.render_widget(Clear, popup_area);

    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::Red))
        .title(" Delete chat ");
    let inner = block.inner(popup_area);
    frame.render_widget(block, popup_area);

    let question = Paragraph::new(format!("Delete chat \"{title}\"?"));
    frame.render_widget(question, Rect::new(inner.x, inner.y, inner.width, 1));

    let hint = Paragraph::new("y to delete, n or Esc to cancel")
        .style(Style::default().fg(Color::DarkGray));
    frame.render_widget(hint, Rect::new(inner.x, inner.y + 2, inner.width, 1));
}

fn render_key_popup(app: &App, frame: &mut Frame, area: Rect) {
    let popup_area = centered_rect(60, 7, area);
    frame.render_widget(Clear, popup_area);

    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::Yellow))
        .title(" Gemini API key ");
    let inner = block.inner(popup_area);
    frame.render_widget(block, popup_area);

    let instructions = Paragraph::new("Paste your API key. Enter to save, Esc to cancel.")
        .style(Style::default().fg(Color::DarkGray));
    frame.render_widget(instructions, Rect::new(inner.x, inner.y, inner.width, 1));

    // Mask the key, keeping the last four characters readable
    let char_count = app.key_input.chars().count();
    let display_text = if char_count <= 4 {
        "*".repeat(char_count)
    } else {
        let last_four: String = app.key_input.chars().skip(char_count - 4).collect();
        format!("{}...{last_four}", "*".repeat((char_count - 4).min(20)))
    };

    let input = Paragraph::new(display_text).style(Style::default().fg(Color::Cyan));
    let input_area = Rect::new(inner.x, inner.y + 2, inner.width, 1);
    frame.render_widget(input, input_area);

    let status = Paragraph::new(format!("{char_count} characters"))
        .style(Style::default().fg(Color::DarkGray));
    frame.render_widget(status, Rect::new(inner.x, inner.y + 4, inner.width, 1));
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::AppState;

    fn chat_with(messages: Vec<(Sender, &str)>) -> ChatSession {
        ChatSession {
            id: "1".to_string(),
            title: "Chat 1".to_string(),
            messages: messages
                .into_iter()
                .map(|(sender, text)| crate::session::Message {
                    sender,
                    text: text.to_string(),
                })
                .collect(),
        }
    }

    #[test]
    fn bold_line_styles_marked_span() {
        let line = bold_line("a **b** c");
        assert_eq!(line.spans.len(), 3);
        assert_eq!(line.spans[0].content, "a ");
        assert_eq!(line.spans[1].content, "b");
        assert!(line.spans[1].style.add_modifier.contains(Modifier::BOLD));
        assert_eq!(line.spans[2].content, " c");
    }

    #[test]
    fn bold_line_keeps_unbalanced_marker_literal() {
        let line = bold_line("a **b");
        assert_eq!(line.spans.len(), 1);
        assert_eq!(line.spans[0].content, "a **b");
    }

    #[test]
    fn wrap_text_breaks_at_word_boundaries() {
        let lines = wrap_text("one two three four", 9);
        assert_eq!(lines, vec!["one two", "three", "four"]);
    }

    #[test]
    fn wrap_text_of_empty_line_occupies_one_line() {
        assert_eq!(wrap_text("", 10), vec![String::new()]);
    }

    #[test]
    fn chat_lines_labels_messages_in_order() {
        let chat = chat_with(vec![(Sender::User, "hi"), (Sender::Bot, "hello")]);
        let lines = chat_lines(Some(&chat), false, 0, 40);

        // label, text, blank for each message
        assert_eq!(lines.len(), 6);
        assert_eq!(lines[0].spans[0].content, "You:");
        assert_eq!(lines[1].spans[0].content, "hi");
        assert_eq!(lines[3].spans[0].content, "Gemini:");
        assert_eq!(lines[4].spans[0].content, "hello");
    }

    #[test]
    fn chat_lines_appends_typing_indicator_while_sending() {
        let chat = chat_with(vec![(Sender::User, "hi")]);
        let lines = chat_lines(Some(&chat), true, 2, 40);

        let last = lines.last().unwrap();
        assert_eq!(last.spans[0].content, "Typing...");
    }

    #[test]
    fn chat_lines_without_active_chat_only_shows_indicator_state() {
        assert!(chat_lines(None, false, 0, 40).is_empty());
        assert_eq!(chat_lines(None, true, 0, 40).len(), 2);
    }

    #[test]
    fn sidebar_items_mark_only_the_active_entry() {
        let mut state = AppState::default();
        state.create_chat();
        state.create_chat();
        let first = state.chats[0].id.clone();
        state.switch_chat(&first);

        let items = sidebar_items(&state);
        assert_eq!(items.len(), 2);
        assert!(items[0].1);
        assert!(!items[1].1);
    }

    #[test]
    fn input_display_replaces_newlines_with_glyph() {
        assert_eq!(input_display("a\nb"), "a↵b");
        assert_eq!(input_display("plain"), "plain");
    }
}
