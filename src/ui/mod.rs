use ratatui::layout::{Constraint, Direction, Layout, Rect};
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span, Text};
use ratatui::widgets::{Block, Borders, Clear, List, ListItem, ListState, Paragraph, Wrap};
use ratatui::Frame;
use regex::Regex;
use strum::IntoEnumIterator;
use time::{macros::format_description, OffsetDateTime};
use unicode_width::UnicodeWidthStr;

use crate::app::{App, Focus, FormField, NoteForm, Overlay};
use crate::highlight::{build_highlight_regex, split_matches};
use crate::journaling::{AutoSaveStatus, LogEntry, MessageKind};
use crate::notes::{format_note_date, DateField, Note};
use crate::settings::{PanelMode, SettingsItem, SettingsStore};

pub mod rows;
mod viewport;

use rows::Row;

pub fn draw_app(frame: &mut Frame, app: &App) {
    let vertical = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Min(3), Constraint::Length(4)])
        .split(frame.size());

    let settings = app.services().settings.get();
    if settings.sidebar.visible {
        let columns = Layout::default()
            .direction(Direction::Horizontal)
            .constraints([Constraint::Percentage(35), Constraint::Percentage(65)])
            .split(vertical[0]);
        draw_sidebar(frame, app, columns[0]);
        draw_content(frame, app, columns[1]);
    } else {
        draw_content(frame, app, vertical[0]);
    }

    let status = Paragraph::new(build_status_text(app))
        .block(Block::default().borders(Borders::ALL).title("Status"));
    frame.render_widget(status, vertical[1]);

    draw_overlay(frame, app);
}

fn focus_style(active: bool) -> Style {
    if active {
        Style::default().fg(Color::Cyan)
    } else {
        Style::default()
    }
}

fn highlight_style() -> Style {
    Style::default()
        .fg(Color::Yellow)
        .add_modifier(Modifier::BOLD)
}

fn search_regex(app: &App) -> Option<Regex> {
    let search = app.search();
    if !search.mode {
        return None;
    }
    build_highlight_regex(&search.text, app.services().settings.get().search.whole)
}

fn draw_sidebar(frame: &mut Frame, app: &App, area: Rect) {
    let parts = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Length(3), Constraint::Min(1)])
        .split(area);

    let search = app.search();
    let flags = &app.services().settings.get().search;
    let mut query = search.text.clone();
    if app.focus() == Focus::Search {
        query.push('▌');
    }
    let search_title = format!("Search {}", search_flags(flags.title, flags.whole, flags.tree_mode));
    let input = Paragraph::new(query).block(
        Block::default()
            .title(search_title)
            .borders(Borders::ALL)
            .border_style(focus_style(app.focus() == Focus::Search)),
    );
    frame.render_widget(input, parts[0]);

    let tree = app.notes().tree();
    let rows = rows::visible_rows(tree, search, flags.tree_mode);
    let regex = search_regex(app);
    let current = app.notes().current().id;
    let settings = app.services().settings.get();
    let title_width = parts[1].width.saturating_sub(2) as usize;

    let mut items: Vec<ListItem> = rows
        .iter()
        .filter_map(|row| tree.get(row.id).map(|note| (row, note)))
        .map(|(row, note)| {
            ListItem::new(row_text(
                row,
                note,
                regex.as_ref(),
                title_width,
                settings.treeview.multiline,
            ))
        })
        .collect();
    if items.is_empty() {
        let message = if search.mode && search.loading {
            "Searching..."
        } else if search.not_found {
            "Nothing found."
        } else if app.notes().load_error() {
            "Notes could not be loaded."
        } else {
            "No notes yet."
        };
        items.push(ListItem::new(message));
    }

    let list = List::new(items)
        .block(
            Block::default()
                .title("Notes")
                .borders(Borders::ALL)
                .border_style(focus_style(app.focus() == Focus::Tree)),
        )
        .highlight_style(
            Style::default()
                .bg(Color::Blue)
                .fg(Color::Black)
                .add_modifier(Modifier::BOLD),
        );
    let mut state = ListState::default().with_selected(rows.iter().position(|row| row.id == current));
    frame.render_stateful_widget(list, parts[1], &mut state);
}

fn search_flags(title: bool, whole: bool, tree_mode: bool) -> String {
    let flag = |on: bool, label: char| if on { label } else { '-' };
    format!(
        "[{}{}{}]",
        flag(title, 'T'),
        flag(whole, 'W'),
        flag(tree_mode, 'Y')
    )
}

fn row_marker(row: &Row) -> &'static str {
    match (row.has_children, row.expanded) {
        (false, _) => "  ",
        (true, true) => "▾ ",
        (true, false) => "▸ ",
    }
}

fn row_text(
    row: &Row,
    note: &Note,
    regex: Option<&Regex>,
    width: usize,
    multiline: bool,
) -> Text<'static> {
    let base = if row.excluded {
        Style::default().fg(Color::DarkGray)
    } else {
        Style::default()
    };
    let indent = format!("{}{}", "  ".repeat(row.depth), row_marker(row));
    let mut prefix = vec![Span::styled(indent.clone(), base)];
    let mut prefix_width = indent.width();
    if note.favorite {
        prefix.push(Span::styled("★ ", base.fg(Color::Yellow)));
        prefix_width += 2;
    }
    let title = if note.title.is_empty() {
        format!("#{}", note.id)
    } else {
        note.title.clone()
    };
    let available = width.saturating_sub(prefix_width).max(1);

    if !multiline {
        let mut spans = prefix;
        spans.extend(highlight_spans(
            &viewport::truncate_graphemes(&title, available),
            regex,
            base,
        ));
        return Text::from(Line::from(spans));
    }

    let mut lines = Vec::new();
    for (index, part) in viewport::wrap_graphemes(&title, available).into_iter().enumerate() {
        let mut spans = if index == 0 {
            prefix.clone()
        } else {
            vec![Span::styled(" ".repeat(prefix_width), base)]
        };
        spans.extend(highlight_spans(&part, regex, base));
        lines.push(Line::from(spans));
    }
    Text::from(lines)
}

fn highlight_spans(text: &str, regex: Option<&Regex>, base: Style) -> Vec<Span<'static>> {
    match regex {
        Some(regex) => split_matches(regex, text)
            .into_iter()
            .map(|(part, hit)| {
                Span::styled(part.to_string(), if hit { highlight_style() } else { base })
            })
            .collect(),
        None => vec![Span::styled(text.to_string(), base)],
    }
}

fn draw_content(frame: &mut Frame, app: &App, area: Rect) {
    let notes = app.notes();
    if !notes.is_note_opened() {
        draw_welcome(frame, app, area);
        return;
    }
    let settings = app.services().settings.get();
    let current = notes.current();

    let parts = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Length(3), Constraint::Min(1)])
        .split(area);

    let path = notes.path_title(current.id, &settings.title.path_separator);
    let header = Paragraph::new(vec![
        Line::from(Span::styled(path, Style::default().add_modifier(Modifier::BOLD))),
        Line::from(Span::styled(
            note_meta(current),
            Style::default().fg(Color::Gray),
        )),
    ])
    .wrap(Wrap { trim: true })
    .block(Block::default().borders(Borders::BOTTOM));
    frame.render_widget(header, parts[0]);

    match app.services().settings.panel_mode() {
        PanelMode::Off => {
            if app.services().settings.is_edit_mode() && app.editor().is_some() {
                draw_editor(frame, app, parts[1]);
            } else {
                draw_viewer(frame, app, parts[1]);
            }
        }
        mode => {
            let direction = if mode == PanelMode::Vertical {
                Direction::Horizontal
            } else {
                Direction::Vertical
            };
            let panes = Layout::default()
                .direction(direction)
                .constraints([Constraint::Percentage(50), Constraint::Percentage(50)])
                .split(parts[1]);
            if app.editor().is_some() {
                draw_editor(frame, app, panes[0]);
            }
            draw_viewer(frame, app, panes[1]);
        }
    }
}

fn note_meta(note: &Note) -> String {
    let mut meta = format!(
        "#{} • created {} • modified {} • {} chars",
        note.id,
        format_note_date(note.date_created),
        format_note_date(note.date_modified),
        note.contents_length
    );
    if note.readonly {
        meta.push_str(" • read-only");
    }
    if let Some(syntax) = note.syntax.as_deref().filter(|s| !s.is_empty()) {
        meta.push_str(" • ");
        meta.push_str(syntax);
    }
    meta
}

fn draw_viewer(frame: &mut Frame, app: &App, area: Rect) {
    let current = app.notes().current();
    let regex = search_regex(app);
    let text: Text = if current.is_link() {
        Text::from(vec![
            Line::from("Link"),
            Line::from(Span::styled(
                current.url.clone().unwrap_or_default(),
                Style::default().fg(Color::Cyan).add_modifier(Modifier::UNDERLINED),
            )),
        ])
    } else {
        current
            .contents
            .lines()
            .map(|line| Line::from(highlight_spans(line, regex.as_ref(), Style::default())))
            .collect::<Vec<_>>()
            .into()
    };
    let mut viewer = Paragraph::new(text).block(Block::default().title("View").borders(Borders::ALL));
    if app.services().settings.get().viewer.prewrap {
        viewer = viewer.wrap(Wrap { trim: false });
    }
    frame.render_widget(viewer, area);
}

fn draw_editor(frame: &mut Frame, app: &App, area: Rect) {
    let Some(editor) = app.editor() else {
        return;
    };
    let focused = app.focus() == Focus::Editor;
    let title = match app.autosave_status() {
        AutoSaveStatus::Pending { .. } => "Edit*",
        AutoSaveStatus::Error { .. } => "Edit (unsaved)",
        AutoSaveStatus::Idle { .. } => "Edit",
    };
    let linewrap = app.services().settings.get().editor.linewrap;

    let inner_width = area.width.saturating_sub(2) as usize;
    let inner_height = area.height.saturating_sub(2) as usize;
    let view = viewport::editor_viewport(
        editor.buffer(),
        editor.cursor_line_col(),
        inner_width,
        inner_height,
        linewrap,
    );
    let lines: Vec<Line> = view.rows.into_iter().map(Line::from).collect();
    let paragraph = Paragraph::new(lines)
        .block(
            Block::default()
                .title(title)
                .borders(Borders::ALL)
                .border_style(focus_style(focused)),
        )
        .scroll((0, view.column_offset));
    frame.render_widget(paragraph, area);

    if let (true, Some((cx, cy))) = (focused, view.caret) {
        let x = area.x.saturating_add(1).saturating_add(cx);
        let y = area.y.saturating_add(1).saturating_add(cy);
        if x < area.right().saturating_sub(1) && y < area.bottom().saturating_sub(1) {
            frame.set_cursor(x, y);
        }
    }
}

fn draw_welcome(frame: &mut Frame, app: &App, area: Rect) {
    let notes = app.notes();
    let count = app.services().settings.get().welcome.items_count;
    let columns = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage(50), Constraint::Percentage(50)])
        .split(area);

    let latest = welcome_lines(&notes.latest(DateField::Modified, count), |note| {
        format_note_date(note.date_modified)
    });
    let favorites = welcome_lines(&notes.favorites(count), |note| format!("#{}", note.id));
    frame.render_widget(
        Paragraph::new(latest.join("\n"))
            .block(Block::default().title("Recently modified").borders(Borders::ALL)),
        columns[0],
    );
    frame.render_widget(
        Paragraph::new(favorites.join("\n"))
            .block(Block::default().title("Favorites").borders(Borders::ALL)),
        columns[1],
    );
}

fn welcome_lines(notes: &[&Note], detail: impl Fn(&Note) -> String) -> Vec<String> {
    if notes.is_empty() {
        return vec!["Nothing here yet.".to_string()];
    }
    notes
        .iter()
        .map(|note| format!("{}  {}", detail(note), note.title))
        .collect()
}

fn message_style(kind: MessageKind) -> Style {
    match kind {
        MessageKind::Info => Style::default().fg(Color::Green),
        MessageKind::Warning => Style::default().fg(Color::Yellow),
        MessageKind::Error => Style::default().fg(Color::Red).add_modifier(Modifier::BOLD),
    }
}

fn build_status_text(app: &App) -> Text<'static> {
    let svc = app.services();
    let message = match svc.log.last() {
        Some(entry) => Line::from(Span::styled(entry.message.clone(), message_style(entry.kind))),
        None => Line::from(Span::styled(
            "Ready",
            Style::default().fg(Color::Gray),
        )),
    };
    let database = svc.gateway.database_info();
    let mut hints = vec![
        autosave_label(&app.autosave_status()),
        format!("mode: {}", if svc.settings.is_edit_mode() { "edit" } else { "view" }),
    ];
    if !database.name.is_empty() {
        hints.push(format!("db: {} ({})", database.name, database.size_label()));
    }
    hints.push("Ctrl+Alt+M messages • Ctrl+Alt+O settings • / search • Ctrl+Q quit".to_string());
    Text::from(vec![
        message,
        Line::from(Span::styled(hints.join(" • "), Style::default().fg(Color::Gray))),
    ])
}

fn autosave_label(status: &AutoSaveStatus) -> String {
    match status {
        AutoSaveStatus::Idle {
            last_saved_at: Some(at),
        } => format!("saved {}", format_time_short(*at)),
        AutoSaveStatus::Idle { last_saved_at: None } => "no unsaved changes".to_string(),
        AutoSaveStatus::Pending { count } => format!("{count} pending save(s)"),
        AutoSaveStatus::Error { note_id, .. } => format!("save failed for #{note_id}"),
    }
}

fn format_time_short(dt: OffsetDateTime) -> String {
    dt.format(&format_description!("[hour]:[minute]:[second]"))
        .unwrap_or_default()
}

fn draw_overlay(frame: &mut Frame, app: &App) {
    match app.overlay() {
        Some(Overlay::Form(form)) => {
            let area = centered_rect(60, 40, frame.size());
            frame.render_widget(Clear, area);
            let title = if form.is_edit() { "Edit note" } else { "New note" };
            let paragraph = Paragraph::new(form_lines(form))
                .block(Block::default().title(title).borders(Borders::ALL))
                .wrap(Wrap { trim: false });
            frame.render_widget(paragraph, area);
        }
        Some(Overlay::ConfirmDelete { id, title }) => {
            let area = centered_rect(50, 20, frame.size());
            frame.render_widget(Clear, area);
            let paragraph = Paragraph::new(vec![
                Line::from(format!("Delete note #{id} \"{title}\" and all its children?")),
                Line::from(""),
                Line::from(Span::styled(
                    "Enter/y confirm • Esc/n cancel",
                    Style::default().fg(Color::Gray),
                )),
            ])
            .block(
                Block::default()
                    .title("Delete note")
                    .borders(Borders::ALL)
                    .border_style(Style::default().fg(Color::Red)),
            )
            .wrap(Wrap { trim: true });
            frame.render_widget(paragraph, area);
        }
        Some(Overlay::Messages) => {
            let area = centered_rect(80, 70, frame.size());
            frame.render_widget(Clear, area);
            let entries = app.services().log.entries();
            let lines: Vec<Line> = if entries.is_empty() {
                vec![Line::from("No messages.")]
            } else {
                entries.iter().rev().map(message_line).collect()
            };
            let paragraph = Paragraph::new(lines).block(
                Block::default()
                    .title("Messages (c clear • Esc close)")
                    .borders(Borders::ALL),
            );
            frame.render_widget(paragraph, area);
        }
        Some(Overlay::Settings { selected }) => {
            let area = centered_rect(50, 50, frame.size());
            frame.render_widget(Clear, area);
            let paragraph = Paragraph::new(settings_lines(&app.services().settings, *selected))
                .block(
                    Block::default()
                        .title("Settings (Enter change • Esc close)")
                        .borders(Borders::ALL),
                );
            frame.render_widget(paragraph, area);
        }
        None => {}
    }
}

fn settings_lines(store: &SettingsStore, selected: usize) -> Vec<Line<'static>> {
    SettingsItem::iter()
        .enumerate()
        .map(|(index, item)| {
            let label = item.to_string();
            let padding = " ".repeat(22usize.saturating_sub(label.width()));
            let style = if index == selected {
                Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD)
            } else {
                Style::default()
            };
            Line::from(vec![
                Span::styled(format!("{label}{padding}"), style),
                Span::raw(item.value(store)),
            ])
        })
        .collect()
}

fn message_line(entry: &LogEntry) -> Line<'static> {
    Line::from(Span::styled(entry.format(), message_style(entry.kind)))
}

fn form_lines(form: &NoteForm) -> Vec<Line<'static>> {
    let mut lines = Vec::new();
    for field in FormField::ALL {
        let label = form_label(field);
        let focused = form.field == field;
        let mut value = form.field_value(field).to_string();
        if focused {
            value.push('▌');
        }
        let label_style = if focused {
            Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD)
        } else {
            Style::default().fg(Color::Gray)
        };
        let padding = " ".repeat(11usize.saturating_sub(label.width()));
        lines.push(Line::from(vec![
            Span::styled(format!("{label}{padding}"), label_style),
            Span::raw(value),
        ]));
    }
    lines.push(Line::from(""));
    lines.push(Line::from(Span::styled(
        "Tab next field • Space toggles read-only • Enter save • Esc cancel",
        Style::default().fg(Color::Gray),
    )));
    lines
}

fn form_label(field: FormField) -> &'static str {
    match field {
        FormField::Title => "Title",
        FormField::Kind => "Type",
        FormField::Url => "URL",
        FormField::Syntax => "Syntax",
        FormField::Icon => "Icon",
        FormField::Parent => "Parent",
        FormField::Readonly => "Read-only",
    }
}

fn centered_rect(percent_x: u16, percent_y: u16, area: Rect) -> Rect {
    let vertical = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Percentage((100 - percent_y) / 2),
            Constraint::Percentage(percent_y),
            Constraint::Percentage((100 - percent_y) / 2),
        ])
        .split(area);

    Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Percentage((100 - percent_x) / 2),
            Constraint::Percentage(percent_x),
            Constraint::Percentage((100 - percent_x) / 2),
        ])
        .split(vertical[1])[1]
}
