use crate::app::App;
use deck_core::tree::{DependencyRow, NodeKind, SessionRow};
use deck_core::{ComputerStatus, WorkStatus};
use deck_state::{Highlight, UiState, View, MAX_STICKY_PANES};
use ratatui::{
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, List, ListItem, Paragraph},
    Frame,
};

const HEADER_ROWS: u16 = 1;
const FOOTER_ROWS: u16 = 1;

/// Tree rows that fit in a terminal of the given height.
pub fn body_rows(height: u16) -> usize {
    usize::from(height.saturating_sub(HEADER_ROWS + FOOTER_ROWS + 2)).max(1)
}

pub fn render(f: &mut Frame, app: &App) {
    let area = f.size();
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(HEADER_ROWS),
            Constraint::Min(0),
            Constraint::Length(FOOTER_ROWS),
        ])
        .split(area);
    f.render_widget(render_header(app), chunks[0]);
    match app.state.app.view {
        View::Sessions => render_sessions(f, app, chunks[1]),
        View::Preparation => render_preparation(f, app, chunks[1]),
    }
    f.render_widget(render_footer(app), chunks[2]);
}

fn render_header(app: &App) -> Paragraph<'static> {
    let mut spans = Vec::new();
    for view in [View::Sessions, View::Preparation] {
        let style = if view == app.state.app.view {
            Style::default()
                .fg(Color::Cyan)
                .add_modifier(Modifier::BOLD)
        } else {
            Style::default().fg(Color::DarkGray)
        };
        spans.push(Span::styled(format!(" {} ", view.title()), style));
    }
    spans.push(Span::raw(format!(
        " pins {}/{}",
        app.state.sticky_count(),
        MAX_STICKY_PANES
    )));
    if !app.state.app.tree_focus {
        spans.push(Span::styled("  (pane focused)", Style::default().fg(Color::DarkGray)));
    }
    Paragraph::new(Line::from(spans))
}

fn render_footer(app: &App) -> Paragraph<'static> {
    match &app.notice {
        Some(notice) => Paragraph::new(Line::from(Span::styled(
            notice.clone(),
            Style::default().fg(Color::Yellow),
        ))),
        None => Paragraph::new(Line::from(Span::styled(
            "enter focus  space preview  s pin  c fold  x clear  tab view  b status  q quit",
            Style::default().fg(Color::DarkGray),
        ))),
    }
}

fn tree_block(title: &str, focused: bool) -> Block<'static> {
    let border = if focused {
        Style::default().fg(Color::Cyan)
    } else {
        Style::default().fg(Color::DarkGray)
    };
    Block::default()
        .borders(Borders::ALL)
        .title(title.to_string())
        .border_style(border)
}

fn render_sessions(f: &mut Frame, app: &App, area: Rect) {
    let block = tree_block("Sessions", app.state.app.tree_focus);
    if app.session_rows.is_empty() {
        let empty = Paragraph::new("No sessions in catalog").block(block);
        f.render_widget(empty, area);
        return;
    }
    let offset = app.state.sessions.scroll_offset;
    let height = usize::from(area.height.saturating_sub(2));
    let items: Vec<ListItem> = app
        .session_rows
        .iter()
        .enumerate()
        .skip(offset)
        .take(height)
        .map(|(idx, row)| {
            let line = session_line(row, &app.state);
            if idx == app.session_cursor {
                ListItem::new(line).style(Style::default().add_modifier(Modifier::REVERSED))
            } else {
                ListItem::new(line)
            }
        })
        .collect();
    f.render_widget(List::new(items).block(block), area);
}

fn fold_marker(row: &SessionRow, state: &UiState) -> &'static str {
    if !row.has_children {
        "  "
    } else if state.sessions.collapsed.contains(&row.id) {
        "▸ "
    } else {
        "▾ "
    }
}

fn session_line(row: &SessionRow, state: &UiState) -> Line<'static> {
    let mut spans = vec![
        Span::styled(row.connector_prefix(), Style::default().fg(Color::DarkGray)),
        Span::raw(fold_marker(row, state)),
    ];
    match &row.kind {
        NodeKind::Computer { info, backfilled } => {
            spans.push(Span::styled(
                info.name.clone(),
                Style::default().add_modifier(Modifier::BOLD),
            ));
            if info.status == ComputerStatus::Offline || *backfilled {
                spans.push(Span::styled(" offline", Style::default().fg(Color::Red)));
            }
        }
        NodeKind::Project { info, .. } => {
            spans.push(Span::styled(
                info.display_name().to_string(),
                Style::default().fg(Color::Blue),
            ));
        }
        NodeKind::Session {
            info,
            display_index,
        } => {
            let id = info.session_id.as_str();
            let title = if info.title.trim().is_empty() {
                id
            } else {
                info.title.as_str()
            };
            spans.push(Span::raw(format!("{display_index} {title}")));
            if let Some(agent) = info.active_agent.as_deref() {
                spans.push(Span::styled(
                    format!(" [{agent}]"),
                    Style::default().fg(Color::DarkGray),
                ));
            }
            if info.is_headless() {
                spans.push(Span::styled(" headless", Style::default().fg(Color::DarkGray)));
            }
            if state.is_sticky_session(id) {
                spans.push(Span::styled(" ◆", Style::default().fg(Color::Magenta)));
            } else if state.sessions.preview.as_deref() == Some(id) {
                spans.push(Span::styled(" ▶", Style::default().fg(Color::Cyan)));
            }
            if let Some(highlight) = state.highlight(id) {
                spans.push(highlight_span(highlight));
            }
        }
    }
    Line::from(spans)
}

fn highlight_span(highlight: Highlight) -> Span<'static> {
    match highlight {
        Highlight::InputPending => Span::styled(" ? input", Style::default().fg(Color::Yellow)),
        Highlight::OutputPending => Span::styled(" ● done", Style::default().fg(Color::Green)),
        Highlight::OutputTransient { .. } => Span::styled(" ○", Style::default().fg(Color::Cyan)),
    }
}

fn render_preparation(f: &mut Frame, app: &App, area: Rect) {
    let block = tree_block("Preparation", app.state.app.tree_focus);
    if app.dependency_rows.is_empty() {
        f.render_widget(Paragraph::new("No work items").block(block), area);
        return;
    }
    let offset = app.state.preparation.scroll_offset;
    let height = usize::from(area.height.saturating_sub(2));
    let items: Vec<ListItem> = app
        .dependency_rows
        .iter()
        .enumerate()
        .skip(offset)
        .take(height)
        .map(|(idx, row)| {
            let line = dependency_line(row, &app.state);
            if idx == app.prep_cursor {
                ListItem::new(line).style(Style::default().add_modifier(Modifier::REVERSED))
            } else {
                ListItem::new(line)
            }
        })
        .collect();
    f.render_widget(List::new(items).block(block), area);
}

fn status_style(status: WorkStatus) -> Style {
    match status {
        WorkStatus::Done => Style::default().fg(Color::Green),
        WorkStatus::InProgress => Style::default().fg(Color::Yellow),
        WorkStatus::Ready => Style::default().fg(Color::Cyan),
        WorkStatus::Pending => Style::default().fg(Color::DarkGray),
    }
}

fn dependency_line(row: &DependencyRow, state: &UiState) -> Line<'static> {
    let item = &row.item;
    let mut spans = vec![
        Span::styled(row.connector_prefix(), Style::default().fg(Color::DarkGray)),
        Span::styled(format!("[{}] ", item.status.as_str()), status_style(item.status)),
        Span::raw(item.slug.clone()),
    ];
    if let Some(title) = item.title.as_deref().filter(|title| *title != item.slug) {
        spans.push(Span::styled(
            format!("  {title}"),
            Style::default().fg(Color::DarkGray),
        ));
    }
    if state.is_sticky_doc(&item.slug) {
        spans.push(Span::styled(" ◆", Style::default().fg(Color::Magenta)));
    } else if state
        .preparation
        .preview
        .as_ref()
        .is_some_and(|doc| doc.doc_id == item.slug)
    {
        spans.push(Span::styled(" ▶", Style::default().fg(Color::Cyan)));
    }
    if state.preparation.expanded.contains(&item.slug) && !item.after.is_empty() {
        spans.push(Span::styled(
            format!("  after: {}", item.after.join(", ")),
            Style::default().fg(Color::DarkGray),
        ));
    }
    Line::from(spans)
}
