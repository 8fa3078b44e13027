use ratatui::{
    Frame,
    layout::{Constraint, Layout, Rect},
    style::{Color, Modifier, Style, Stylize},
    text::{Line, Span, Text},
    widgets::{Block, Borders, Clear, Gauge, List, ListItem, Paragraph, Wrap},
};
use tasktalk_core::state::{ConversationPhase, Direction, InteractionMode};

use crate::app::{App, EditField, InputMode, Screen};

/// Parse a line of text and convert **bold** markdown to styled spans
fn parse_markdown_line(text: &str) -> Line<'static> {
    let mut spans: Vec<Span<'static>> = Vec::new();
    let mut rest = text;

    while let Some(start) = rest.find("**") {
        let after = &rest[start + 2..];
        let Some(end) = after.find("**") else { break };
        if end == 0 {
            break;
        }
        if start > 0 {
            spans.push(Span::raw(rest[..start].to_string()));
        }
        spans.push(Span::styled(
            after[..end].to_string(),
            Style::default().add_modifier(Modifier::BOLD),
        ));
        rest = &after[end + 2..];
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

/// Rows a set of lines occupies once wrapped to `width`.
fn wrapped_height(lines: &[Line], width: u16) -> u16 {
    if width == 0 {
        return 0;
    }
    lines
        .iter()
        .map(|line| {
            let chars = line.width() as u16;
            chars.div_ceil(width).max(1)
        })
        .fold(0u16, u16::saturating_add)
}

fn popup_area(area: Rect, width: u16, height: u16) -> Rect {
    let width = width.min(area.width.saturating_sub(4));
    let height = height.min(area.height.saturating_sub(2));
    let x = area.x + (area.width.saturating_sub(width)) / 2;
    let y = area.y + (area.height.saturating_sub(height)) / 2;
    Rect::new(x, y, width, height)
}

pub fn render(app: &mut App, frame: &mut Frame) {
    let area = frame.area();

    // Main layout: header, body, status, footer
    let [header_area, body_area, status_area, footer_area] = Layout::vertical([
        Constraint::Length(1),
        Constraint::Min(0),
        Constraint::Length(1),
        Constraint::Length(1),
    ])
    .areas(area);

    render_header(app, frame, header_area);

    match app.screen {
        Screen::Tasks => render_tasks(app, frame, body_area),
        Screen::TaskDetail => render_detail(app, frame, body_area),
        Screen::AddEdit => render_add_edit(app, frame, body_area),
        Screen::Statistics => render_statistics(app, frame, body_area),
        Screen::Chat => render_chat(app, frame, body_area),
    }

    render_status(app, frame, status_area);
    render_footer(app, frame, footer_area);

    if app.screen == Screen::Chat && app.chat.permission_prompt.visible {
        render_permission_dialog(app, frame, area);
    }
}

fn render_header(app: &App, frame: &mut Frame, area: Rect) {
    let screen_title = match app.screen {
        Screen::Tasks => app.task_list.label(),
        Screen::TaskDetail => "Task Details",
        Screen::AddEdit => {
            if app.add_edit.as_ref().is_some_and(|f| f.is_new()) {
                "New Task"
            } else {
                "Edit Task"
            }
        }
        Screen::Statistics => "Statistics",
        Screen::Chat => "English Coach",
    };

    let title = Line::from(vec![
        Span::styled(" tasktalk ", Style::default().fg(Color::Cyan).bold()),
        Span::styled(format!("· {screen_title} "), Style::default().fg(Color::White)),
        Span::styled(
            format!("[{}: {}] ", app.provider.display_name(), app.model),
            Style::default().fg(Color::DarkGray),
        ),
        Span::styled(
            format!("v{}", env!("CARGO_PKG_VERSION")),
            Style::default().fg(Color::DarkGray),
        ),
    ]);

    frame.render_widget(Paragraph::new(title), area);
}

fn render_status(app: &App, frame: &mut Frame, area: Rect) {
    let message = match app.screen {
        Screen::Tasks => app.task_list.snackbar(),
        Screen::TaskDetail => app.detail.as_ref().and_then(|d| d.snackbar()),
        Screen::AddEdit => app.add_edit.as_ref().and_then(|f| f.snackbar()),
        Screen::Chat => app.chat.last_error.as_deref(),
        Screen::Statistics => None,
    };

    let line = match (app.status.as_deref(), message) {
        (Some(error), _) => Span::styled(format!(" {error} "), Style::default().fg(Color::Red)),
        (None, Some(message)) if app.screen == Screen::Chat => {
            Span::styled(format!(" {message} "), Style::default().fg(Color::Red))
        }
        (None, Some(message)) => Span::styled(
            format!(" {message} "),
            Style::default().fg(Color::Black).bg(Color::Green),
        ),
        (None, None) => Span::raw(""),
    };
    frame.render_widget(Paragraph::new(Line::from(line)), area);
}

fn render_footer(app: &App, frame: &mut Frame, area: Rect) {
    let mode_style = match app.input_mode {
        InputMode::Normal => Style::default().bg(Color::Blue).fg(Color::White),
        InputMode::Editing => Style::default().bg(Color::Yellow).fg(Color::Black),
    };

    let mode_text = match app.screen {
        Screen::Tasks | Screen::TaskDetail => " TASKS ",
        Screen::AddEdit => " EDIT ",
        Screen::Statistics => " STATS ",
        Screen::Chat => match app.chat.mode {
            InteractionMode::Text => " CHAT ",
            InteractionMode::Voice => " VOICE ",
        },
    };

    // Key style: dark background with bright text for visibility on both light/dark terminals
    let key_style = Style::default().bg(Color::DarkGray).fg(Color::White);
    let label_style = Style::default().bg(Color::Black).fg(Color::White);

    let pairs: Vec<(&str, &str)> = match (app.screen, app.input_mode) {
        (Screen::Tasks, _) => {
            let mut pairs = vec![
                (" j/k ", " nav "),
                (" Enter ", " open "),
                (" x ", " done "),
            ];
            if app.task_list.add_visible() {
                pairs.push((" a ", " add "));
            }
            pairs.extend([
                (" f ", " filter "),
                (" C ", " clear done "),
                (" s ", " stats "),
                (" c ", " chat "),
                (" q ", " quit "),
            ]);
            pairs
        }
        (Screen::TaskDetail, _) => vec![
            (" x ", " toggle "),
            (" e ", " edit "),
            (" d ", " delete "),
            (" Esc ", " back "),
        ],
        (Screen::AddEdit, _) => vec![
            (" Tab ", " field "),
            (" Enter ", " save "),
            (" Esc ", " cancel "),
        ],
        (Screen::Statistics, _) => vec![(" Esc ", " back "), (" q ", " quit ")],
        (Screen::Chat, InputMode::Editing) => vec![
            (" Enter ", " send "),
            (" C-Space ", " mic "),
            (" Esc ", " stop typing "),
        ],
        (Screen::Chat, InputMode::Normal) => vec![
            (" i ", " type "),
            (" m ", " mic "),
            (" s ", " stop "),
            (" j/k ", " scroll "),
            (" X ", " clear "),
            (" Esc ", " tasks "),
        ],
    };

    let hints = pairs.into_iter().flat_map(|(key, label)| {
        [Span::styled(key, key_style), Span::styled(label, label_style)]
    });

    let footer_content = Line::from(
        vec![Span::styled(mode_text, mode_style), Span::styled(" ", label_style)]
            .into_iter()
            .chain(hints)
            .collect::<Vec<_>>(),
    );

    let footer = Paragraph::new(footer_content).style(Style::default().bg(Color::Black));
    frame.render_widget(footer, area);
}

fn render_tasks(app: &mut App, frame: &mut Frame, area: Rect) {
    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::Cyan))
        .title(format!(" {} ", app.task_list.label()));

    let tasks = app.visible_tasks();
    if tasks.is_empty() {
        let placeholder = Paragraph::new(app.task_list.empty_message())
            .style(Style::default().fg(Color::DarkGray))
            .block(block);
        frame.render_widget(placeholder, area);
        return;
    }

    let items: Vec<ListItem> = tasks
        .iter()
        .map(|task| {
            let (mark, style) = if task.completed {
                ("[x]", Style::default().fg(Color::DarkGray).add_modifier(Modifier::CROSSED_OUT))
            } else {
                ("[ ]", Style::default())
            };
            ListItem::new(format!(" {mark} {} ", task.title_for_list())).style(style)
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

    frame.render_stateful_widget(list, area, &mut app.task_state);
}

fn render_detail(app: &App, frame: &mut Frame, area: Rect) {
    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::Cyan))
        .title(" Task ");

    let Some(detail) = app.detail.as_ref() else {
        frame.render_widget(Paragraph::new("No task selected").block(block), area);
        return;
    };
    let task = detail.task();

    let status = if task.completed {
        Span::styled("[x] completed", Style::default().fg(Color::Green))
    } else {
        Span::styled("[ ] active", Style::default().fg(Color::Yellow))
    };

    let mut lines = vec![
        Line::from(Span::styled(
            task.title.clone(),
            Style::default().add_modifier(Modifier::BOLD),
        )),
        Line::from(status),
        Line::default(),
    ];
    lines.extend(task.description.lines().map(|l| Line::from(l.to_string())));

    let paragraph = Paragraph::new(Text::from(lines))
        .block(block)
        .wrap(Wrap { trim: false });
    frame.render_widget(paragraph, area);
}

fn render_add_edit(app: &App, frame: &mut Frame, area: Rect) {
    let Some(form) = app.add_edit.as_ref() else {
        return;
    };

    let [title_area, description_area] =
        Layout::vertical([Constraint::Length(3), Constraint::Min(3)]).areas(area);

    let field_block = |name: &'static str, active: bool| {
        let color = if active { Color::Yellow } else { Color::DarkGray };
        Block::default()
            .borders(Borders::ALL)
            .border_style(Style::default().fg(color))
            .title(format!(" {name} "))
    };

    let title_active = app.edit_field == EditField::Title;
    frame.render_widget(
        Paragraph::new(form.title.as_str()).block(field_block("Title", title_active)),
        title_area,
    );
    frame.render_widget(
        Paragraph::new(form.description.as_str())
            .wrap(Wrap { trim: false })
            .block(field_block("Description", !title_active)),
        description_area,
    );

    // Cursor at the end of the active field
    if title_active {
        let x = (form.title.chars().count() as u16).min(title_area.width.saturating_sub(3));
        frame.set_cursor_position((title_area.x + 1 + x, title_area.y + 1));
    } else {
        let inner_width = description_area.width.saturating_sub(2).max(1);
        let last = form.description.lines().last().unwrap_or("");
        let row = form.description.lines().count().saturating_sub(1) as u16;
        let col = last.chars().count() as u16;
        frame.set_cursor_position((
            description_area.x + 1 + col % inner_width,
            description_area.y + 1 + row + col / inner_width,
        ));
    }
}

fn render_statistics(app: &App, frame: &mut Frame, area: Rect) {
    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::Cyan))
        .title(" Statistics ");
    let inner = block.inner(area);
    frame.render_widget(block, area);

    let stats = app.statistics.statistics();
    if stats.is_empty {
        frame.render_widget(
            Paragraph::new("You have no tasks.").style(Style::default().fg(Color::DarkGray)),
            inner,
        );
        return;
    }

    let [active_label, active_gauge, _, completed_label, completed_gauge, _] = Layout::vertical([
        Constraint::Length(1),
        Constraint::Length(1),
        Constraint::Length(1),
        Constraint::Length(1),
        Constraint::Length(1),
        Constraint::Min(0),
    ])
    .areas(inner);

    frame.render_widget(
        Paragraph::new(format!("Active tasks: {:.1}%", stats.active_percent)),
        active_label,
    );
    frame.render_widget(
        Gauge::default()
            .gauge_style(Style::default().fg(Color::Yellow))
            .ratio(f64::from(stats.active_percent / 100.0).clamp(0.0, 1.0)),
        active_gauge,
    );
    frame.render_widget(
        Paragraph::new(format!("Completed tasks: {:.1}%", stats.completed_percent)),
        completed_label,
    );
    frame.render_widget(
        Gauge::default()
            .gauge_style(Style::default().fg(Color::Green))
            .ratio(f64::from(stats.completed_percent / 100.0).clamp(0.0, 1.0)),
        completed_gauge,
    );
}

fn render_chat(app: &mut App, frame: &mut Frame, area: Rect) {
    let [chat_area, input_area] =
        Layout::vertical([Constraint::Min(0), Constraint::Length(3)]).areas(area);

    // Store chat area dimensions for scroll calculations (inner size minus borders)
    app.chat_height = chat_area.height.saturating_sub(2);
    app.chat_width = chat_area.width.saturating_sub(2);

    let chat_block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::Cyan))
        .title(format!(" {} ", app.chat.phase.label()));

    let mut lines: Vec<Line> = Vec::new();
    if app.chat.turns.is_empty() && !app.chat_is_busy() {
        lines.push(Line::from(Span::styled(
            "Type a sentence and the coach will correct it. Press m to talk instead.",
            Style::default().fg(Color::DarkGray),
        )));
    }

    for turn in &app.chat.turns {
        match turn.direction {
            Direction::Sent => {
                lines.push(Line::from(Span::styled(
                    "You:",
                    Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD),
                )));
                lines.extend(turn.text.lines().map(|l| Line::from(l.to_string())));
            }
            Direction::Received => {
                lines.push(Line::from(Span::styled(
                    "Coach:",
                    Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD),
                )));
                lines.extend(turn.text.lines().map(parse_markdown_line));
            }
        }
        lines.push(Line::default());
    }

    // Animated ellipsis: cycles through ".", "..", "..."
    let dots = ".".repeat((app.animation_frame as usize) + 1);
    let activity = match app.chat.phase {
        ConversationPhase::Typing => None,
        ConversationPhase::Loading => Some(format!("Thinking{dots}")),
        ConversationPhase::Listening => Some(format!("Listening{dots}")),
        ConversationPhase::Speaking => Some(format!("Speaking{dots}")),
    };
    if let Some(activity) = activity {
        lines.push(Line::from(Span::styled(
            activity,
            Style::default().fg(Color::DarkGray).add_modifier(Modifier::ITALIC),
        )));
    }

    if app.follow_chat {
        app.chat_scroll = app.bottom_scroll(wrapped_height(&lines, app.chat_width));
    }

    let chat = Paragraph::new(Text::from(lines))
        .block(chat_block)
        .wrap(Wrap { trim: true })
        .scroll((app.chat_scroll, 0));
    frame.render_widget(chat, chat_area);

    let editing = app.input_mode == InputMode::Editing;
    let input_color = if !app.chat.input_enabled() {
        Color::DarkGray
    } else if editing {
        Color::Yellow
    } else {
        Color::White
    };
    let input_block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(input_color))
        .title(" Message ");

    // Keep the cursor visible with horizontal scrolling
    let inner_width = input_area.width.saturating_sub(2) as usize;
    let cursor_pos = app.chat_cursor;
    let scroll_offset = if inner_width == 0 || cursor_pos < inner_width {
        0
    } else {
        cursor_pos - inner_width + 1
    };

    let visible_text: String = app
        .chat_input
        .chars()
        .skip(scroll_offset)
        .take(inner_width)
        .collect();

    let input = Paragraph::new(visible_text)
        .style(Style::default().fg(Color::Cyan))
        .block(input_block);
    frame.render_widget(input, input_area);

    if editing {
        let cursor_x = (cursor_pos - scroll_offset) as u16;
        frame.set_cursor_position((input_area.x + cursor_x + 1, input_area.y + 1));
    }
}

fn render_permission_dialog(app: &App, frame: &mut Frame, area: Rect) {
    let popup = popup_area(area, 60, 7);
    frame.render_widget(Clear, popup);

    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::Yellow))
        .title(" Microphone ");

    let rationale = app
        .chat
        .permission_prompt
        .rationale
        .clone()
        .unwrap_or_else(|| "Allow voice input?".to_string());

    let text = Text::from(vec![
        Line::from(rationale),
        Line::default(),
        Line::from(vec![
            Span::styled(" y ", Style::default().bg(Color::DarkGray).fg(Color::White)),
            Span::raw(" allow  "),
            Span::styled(" n ", Style::default().bg(Color::DarkGray).fg(Color::White)),
            Span::raw(" deny  "),
            Span::styled(" Esc ", Style::default().bg(Color::DarkGray).fg(Color::White)),
            Span::raw(" not now"),
        ]),
    ]);

    frame.render_widget(
        Paragraph::new(text).block(block).wrap(Wrap { trim: true }),
        popup,
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bold_markers_become_styled_spans() {
        let line = parse_markdown_line("Say **I went** home");
        assert_eq!(line.spans.len(), 3);
        assert_eq!(line.spans[1].content, "I went");
        assert!(line.spans[1].style.add_modifier.contains(Modifier::BOLD));
    }

    #[test]
    fn unmatched_markers_stay_literal() {
        let line = parse_markdown_line("2 ** 3");
        assert_eq!(line.spans.len(), 1);
        assert_eq!(line.spans[0].content, "2 ** 3");
    }

    #[test]
    fn wrapped_height_counts_empty_lines() {
        let lines = vec![Line::from("abcdef"), Line::default(), Line::from("abc")];
        assert_eq!(wrapped_height(&lines, 4), 2 + 1 + 1);
        assert_eq!(wrapped_height(&lines, 0), 0);
    }
}
