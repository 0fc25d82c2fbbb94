// UI rendering logic
//
// Pure rendering: everything drawn here is read from App and the
// coordinator it owns. The only mutation is the editor's scroll offset.

use super::app::{App, Focus};
use super::modal::Modal;
use crate::coordinator::STATUS_SUCCESS;
use ratatui::{
    layout::{Constraint, Direction, Layout, Rect},
    style::{Modifier, Style},
    text::{Line, Span, Text},
    widgets::{Block, Borders, Clear, List, ListItem, Paragraph, Wrap},
    Frame,
};
use tracing::Level;

/// Main UI render function - called on every frame
pub fn draw(f: &mut Frame, app: &mut App) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3), // Header
            Constraint::Min(6),    // Files + editor
            Constraint::Length(8), // Output
        ])
        .split(f.area());

    render_header(f, chunks[0], app);

    let body = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Length(30), Constraint::Min(20)])
        .split(chunks[1]);
    render_files(f, body[0], app);
    render_editor(f, body[1], app);

    render_output(f, chunks[2], app);

    if let Some(modal) = &app.modal {
        render_modal(f, modal, app);
    }
    if let Some(toast) = &app.toast {
        let area = f.area();
        toast.render(f, area, &app.theme);
    }
}

fn pane_block<'a>(app: &App, title: impl Into<Line<'a>>, focused: bool) -> Block<'a> {
    let border = if focused {
        app.theme.highlight
    } else {
        app.theme.border
    };
    Block::default()
        .borders(Borders::ALL)
        .border_type(app.theme.border_type)
        .border_style(Style::default().fg(border))
        .title(title)
}

fn render_header(f: &mut Frame, area: Rect, app: &App) {
    let auth = if app.coordinator.is_authenticated() {
        Span::styled("logged in", Style::default().fg(app.theme.success))
    } else if app.coordinator.session_expired() {
        Span::styled("session expired", Style::default().fg(app.theme.warning))
    } else {
        Span::styled("anonymous", Style::default().fg(app.theme.muted))
    };
    let line = Line::from(vec![
        Span::styled(
            " scopepad ",
            Style::default()
                .fg(app.theme.title)
                .add_modifier(Modifier::BOLD),
        ),
        Span::styled("── ", Style::default().fg(app.theme.border)),
        auth,
        Span::styled(" ── ", Style::default().fg(app.theme.border)),
        Span::styled(app.api_url.as_str(), Style::default().fg(app.theme.muted)),
    ]);

    let header = Paragraph::new(line).block(
        Block::default()
            .borders(Borders::ALL)
            .border_type(app.theme.border_type)
            .border_style(Style::default().fg(app.theme.title))
            .title_top(Line::from(" F1 help ").right_aligned()),
    );
    f.render_widget(header, area);
}

fn render_files(f: &mut Frame, area: Rect, app: &App) {
    let session = app.coordinator.session();
    let current = session.current_id();
    let focused = app.focus == Focus::Files && app.modal.is_none();

    let items: Vec<ListItem> = app
        .coordinator
        .files()
        .iter()
        .enumerate()
        .map(|(idx, file)| {
            let marker = if Some(&file.id) == current { "● " } else { "  " };
            let mut style = Style::default().fg(app.theme.foreground);
            if idx == app.selected && focused {
                style = style.bg(app.theme.selection).fg(app.theme.selection_fg);
            } else if Some(&file.id) == current {
                style = style.add_modifier(Modifier::BOLD);
            }
            ListItem::new(format!("{}{}", marker, file.title)).style(style)
        })
        .collect();

    let indicator_style = if session.is_dirty() {
        Style::default().fg(app.theme.warning)
    } else {
        Style::default().fg(app.theme.muted)
    };
    let block = pane_block(app, " Files ", focused)
        .title_bottom(Line::styled(format!(" {} ", app.coordinator.indicator()), indicator_style));

    f.render_widget(List::new(items).block(block), area);
}

fn render_editor(f: &mut Frame, area: Rect, app: &mut App) {
    let focused = app.focus == Focus::Editor && app.modal.is_none();
    let session = app.coordinator.session();
    let dirty = if session.is_dirty() { " *" } else { "" };
    let title = format!(" {}{} ", session.file().title, dirty);
    let editable = session.is_editable();

    let inner_height = area.height.saturating_sub(2) as usize;
    let scroll = app.editor.scroll_to_cursor(inner_height);

    let text_style = if editable {
        Style::default().fg(app.theme.foreground)
    } else {
        Style::default().fg(app.theme.muted)
    };
    let lines: Vec<Line> = app
        .editor
        .lines()
        .iter()
        .map(|l| Line::raw(l.as_str()))
        .collect();

    let editor = Paragraph::new(Text::from(lines))
        .style(text_style)
        .scroll((scroll as u16, 0))
        .block(pane_block(app, title, focused));
    f.render_widget(editor, area);

    if focused && editable {
        let (row, _) = app.editor.cursor();
        let x = area.x + 1 + app.editor.cursor_column() as u16;
        let y = area.y + 1 + (row - scroll) as u16;
        if x < area.right().saturating_sub(1) && y < area.bottom().saturating_sub(1) {
            f.set_cursor_position((x, y));
        }
    }
}

fn render_output(f: &mut Frame, area: Rect, app: &App) {
    let console = app.coordinator.console();
    let status_style = if console.error {
        Style::default().fg(app.theme.error)
    } else if console.status == STATUS_SUCCESS {
        Style::default().fg(app.theme.success)
    } else {
        Style::default().fg(app.theme.foreground)
    };
    let status = if app.is_running() {
        format!(" {} {} ", app.spinner_char(), console.status)
    } else if console.status.is_empty() {
        " Output ".to_string()
    } else {
        format!(" {} ", console.status)
    };

    let output_style = if console.error {
        Style::default().fg(app.theme.error)
    } else {
        Style::default().fg(app.theme.foreground)
    };
    // Keep the tail of long outputs in view
    let visible = area.height.saturating_sub(2) as usize;
    let total = console.output.lines().count();
    let skip = total.saturating_sub(visible) as u16;

    let output = Paragraph::new(console.output.as_str())
        .style(output_style)
        .wrap(Wrap { trim: false })
        .scroll((skip, 0))
        .block(
            Block::default()
                .borders(Borders::ALL)
                .border_type(app.theme.border_type)
                .border_style(Style::default().fg(app.theme.border))
                .title(Span::styled(status, status_style))
                .title_top(Line::from(" ^R run  ^T stop  ^S save ").right_aligned()),
        );
    f.render_widget(output, area);
}

// ─────────────────────────────────────────────────────────────────────────────
// Modals
// ─────────────────────────────────────────────────────────────────────────────

/// Calculate centered rect for modal dialog
fn centered_rect(width: u16, height: u16, area: Rect) -> Rect {
    let x = area.x + (area.width.saturating_sub(width)) / 2;
    let y = area.y + (area.height.saturating_sub(height)) / 2;
    Rect::new(x, y, width.min(area.width), height.min(area.height))
}

fn render_modal(f: &mut Frame, modal: &Modal, app: &App) {
    match modal {
        Modal::NewFile { input, error } => {
            let mut lines = vec![
                Line::raw(""),
                Line::from(vec![Span::raw("  Name: "), Span::raw(input.as_str())]),
            ];
            if let Some(error) = error {
                lines.push(Line::raw(""));
                lines.push(Line::styled(
                    format!("  {}", error),
                    Style::default().fg(app.theme.error),
                ));
            }
            render_dialog(f, app, " New file ", lines, " Enter create · Esc cancel ");
        }
        Modal::Login { input } => {
            let masked = "•".repeat(input.chars().count());
            let lines = vec![
                Line::raw(""),
                Line::from(vec![Span::raw("  Token: "), Span::raw(masked)]),
            ];
            render_dialog(f, app, " Log in ", lines, " Enter log in · Esc cancel ");
        }
        Modal::UnsavedChoice { title } => {
            let lines = vec![
                Line::raw(""),
                Line::raw(format!("  {} has unsaved changes.", app.coordinator.session().file().title)),
                Line::raw(format!("  Open {} anyway?", title)),
                Line::raw(""),
                Line::raw("  [s] Save first   [d] Discard   [c] Cancel"),
            ];
            render_dialog(f, app, " Unsaved changes ", lines, " s / d / c ");
        }
        Modal::ConfirmClear => {
            let lines = vec![
                Line::raw(""),
                Line::raw("  Clear the editor and output?"),
            ];
            render_dialog(f, app, " Clear ", lines, " y confirm · n cancel ");
        }
        Modal::ConfirmDelete { title, .. } => {
            let lines = vec![Line::raw(""), Line::raw(format!("  Delete {}?", title))];
            render_dialog(f, app, " Delete file ", lines, " y confirm · n cancel ");
        }
        Modal::SessionExpired => {
            let lines = vec![
                Line::raw(""),
                Line::styled(
                    "  Access expired. Please log in again.",
                    Style::default().fg(app.theme.error),
                ),
            ];
            render_dialog(f, app, " Session expired ", lines, " Enter to log in ");
        }
        Modal::Help => render_help(f, app),
        Modal::Logs => render_logs(f, app),
    }
}

fn render_dialog(f: &mut Frame, app: &App, title: &str, lines: Vec<Line>, hint: &str) {
    let width = 56;
    let height = lines.len() as u16 + 3;
    let area = centered_rect(width, height, f.area());

    f.render_widget(Clear, area);
    let dialog = Paragraph::new(Text::from(lines))
        .style(Style::default().bg(app.theme.background).fg(app.theme.foreground))
        .wrap(Wrap { trim: false })
        .block(
            Block::default()
                .borders(Borders::ALL)
                .border_style(Style::default().fg(app.theme.highlight))
                .border_type(app.theme.border_type)
                .title(title.to_string())
                .title_bottom(Line::from(hint.to_string()).centered()),
        );
    f.render_widget(dialog, area);
}

/// Render the help modal overlay
fn render_help(f: &mut Frame, app: &App) {
    let key_style = Style::default().fg(app.theme.title);
    let desc_style = Style::default().fg(app.theme.foreground);
    let header_style = Style::default()
        .fg(app.theme.highlight)
        .add_modifier(Modifier::BOLD);

    let kb = |key: &str, desc: &str| -> Line {
        Line::from(vec![
            Span::raw("    "),
            Span::styled(format!("{:<12}", key), key_style),
            Span::styled(desc.to_string(), desc_style),
        ])
    };

    let content = Text::from(vec![
        Line::raw(""),
        Line::from(Span::styled("  Program", header_style)),
        kb("Ctrl+R", "Run"),
        kb("Ctrl+T", "Stop"),
        kb("Ctrl+Y", "Copy output"),
        Line::raw(""),
        Line::from(Span::styled("  Files", header_style)),
        kb("Ctrl+N", "New file"),
        kb("Ctrl+S", "Save"),
        kb("Ctrl+L", "Clear"),
        kb("Ctrl+D", "Download as .txt"),
        kb("F5", "Reload file list"),
        kb("Enter", "Open selected"),
        kb("Delete", "Delete selected"),
        Line::raw(""),
        Line::from(Span::styled("  Session", header_style)),
        kb("Ctrl+G", "Log in"),
        kb("Ctrl+O", "Log out"),
        Line::raw(""),
        Line::from(Span::styled("  General", header_style)),
        kb("Tab", "Switch files / editor"),
        kb("F1", "Toggle this help"),
        kb("F2", "Recent logs"),
        kb("Ctrl+Q", "Quit"),
        Line::raw(""),
        Line::from(vec![
            Span::styled("  Theme: ", desc_style),
            Span::styled(app.theme.name, key_style),
        ]),
    ]);

    let area = centered_rect(44, 29, f.area());
    f.render_widget(Clear, area);
    let paragraph = Paragraph::new(content)
        .style(Style::default().bg(app.theme.background))
        .block(
            Block::default()
                .borders(Borders::ALL)
                .border_style(Style::default().fg(app.theme.highlight))
                .border_type(app.theme.border_type)
                .title(" Help ")
                .title_bottom(Line::from(" Press F1 or Esc to close ").centered()),
        );
    f.render_widget(paragraph, area);
}

fn render_logs(f: &mut Frame, app: &App) {
    let full = f.area();
    let area = centered_rect(full.width.saturating_sub(8), full.height.saturating_sub(4), full);
    let visible = area.height.saturating_sub(2) as usize;

    let items: Vec<ListItem> = app
        .log_buffer
        .recent(visible)
        .into_iter()
        .map(|entry| {
            let level_colour = if entry.level == Level::ERROR {
                app.theme.error
            } else if entry.level == Level::WARN {
                app.theme.warning
            } else if entry.level == Level::INFO {
                app.theme.success
            } else {
                app.theme.muted
            };
            let level_style = Style::default().fg(level_colour);
            ListItem::new(Line::from(vec![
                Span::styled(
                    entry.timestamp.format("%H:%M:%S ").to_string(),
                    Style::default().fg(app.theme.muted),
                ),
                Span::styled(format!("{:<5} ", entry.level.as_str()), level_style),
                Span::styled(
                    format!("{} ", entry.target),
                    Style::default().fg(app.theme.muted),
                ),
                Span::styled(entry.message, Style::default().fg(app.theme.foreground)),
            ]))
        })
        .collect();

    f.render_widget(Clear, area);
    let list = List::new(items)
        .style(Style::default().bg(app.theme.background))
        .block(
            Block::default()
                .borders(Borders::ALL)
                .border_style(Style::default().fg(app.theme.highlight))
                .border_type(app.theme.border_type)
                .title(format!(" Logs ({} captured) ", app.log_buffer.len()))
                .title_bottom(Line::from(" Press F2 or Esc to close ").centered()),
        );
    f.render_widget(list, area);
}
