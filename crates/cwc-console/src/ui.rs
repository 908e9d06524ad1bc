//! Rendering: pure read-only projection of the latest snapshot. Spinner
//! placeholders are computed at draw time and never stored.

use crate::app::{App, Overlay, TreeRow};
use crate::theme::Theme;
use chrono::Utc;
use cwc_core::timefmt::{relative_created, truncate};
use cwc_core::{ExecutionJob, ExecutionStatus, FunctionJob, ResolveState};
use ratatui::{
    layout::{Constraint, Direction, Layout, Rect},
    text::{Line, Span},
    widgets::{Block, Borders, Clear, Paragraph, Wrap},
    Frame,
};

const EXPANDED: &str = "v";
const COLLAPSED: &str = ">";

pub fn render(frame: &mut Frame, app: &App, theme: Theme) {
    let area = frame.size();
    let layout = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Length(3), Constraint::Min(0)])
        .split(area);
    render_header(frame, app, theme, layout[0]);
    render_tree(frame, app, theme, layout[1]);

    match &app.overlay {
        Overlay::Logs { job, content, scroll } => {
            render_logs_overlay(frame, app, theme, &job.id, content.as_deref(), *scroll);
        }
        Overlay::ConfirmStop { job } => {
            render_confirm_overlay(frame, theme, &job.id);
        }
        Overlay::None => {}
    }
}

fn render_header(frame: &mut Frame, app: &App, theme: Theme, area: Rect) {
    let now = Utc::now();
    let refresh = match app.snapshot.last_refresh_at {
        Some(at) => format!("refreshed {}", relative_created(Some(at), now)),
        None => format!("{} connecting...", app.spinner_char()),
    };
    let mut spans = vec![
        Span::styled("Jobs", theme.title()),
        Span::raw("  "),
        Span::styled(refresh, theme.muted()),
    ];
    if let Some(error) = app.snapshot.listing_error.as_deref() {
        spans.push(Span::raw("  "));
        spans.push(Span::styled(
            format!("stale: {}", truncate(error, 48)),
            theme.error(),
        ));
    }
    if let Some(note) = app.status_note.as_deref() {
        spans.push(Span::raw("  "));
        spans.push(Span::styled(truncate(note, 64), theme.notice()));
    }

    let hints = Line::from(Span::styled(
        "up/down move  enter expand  l logs  s stop  q quit",
        theme.muted(),
    ));

    let paragraph = Paragraph::new(vec![Line::from(spans), hints]).block(
        Block::default()
            .borders(Borders::BOTTOM)
            .border_style(theme.muted()),
    );
    frame.render_widget(paragraph, area);
}

fn render_tree(frame: &mut Frame, app: &App, theme: Theme, area: Rect) {
    if app.rows.is_empty() {
        let message = if app.snapshot.last_refresh_at.is_none() {
            format!("{} loading jobs...", app.spinner_char())
        } else {
            "(no jobs)".to_string()
        };
        let paragraph = Paragraph::new(Line::from(Span::styled(message, theme.muted())));
        frame.render_widget(paragraph, area);
        return;
    }

    let height = area.height as usize;
    let offset = scroll_offset(app.cursor, height, app.rows.len());
    let mut lines = Vec::with_capacity(height.min(app.rows.len()));
    for (visual_idx, row) in app.rows.iter().enumerate().skip(offset).take(height) {
        let selected = visual_idx == app.cursor;
        if let Some(line) = row_line(app, theme, *row, selected) {
            lines.push(line);
        }
    }
    frame.render_widget(Paragraph::new(lines), area);
}

/// Missing data is always representable; a row that no longer resolves
/// against the snapshot is dropped, never a panic.
fn row_line(app: &App, theme: Theme, row: TreeRow, selected: bool) -> Option<Line<'static>> {
    match row {
        TreeRow::Parent { job_idx } => {
            let job = app.snapshot.jobs.get(job_idx)?;
            Some(parent_line(job, app, theme, selected))
        }
        TreeRow::Child { job_idx, child_idx } => {
            let child = app.snapshot.jobs.get(job_idx)?.children.get(child_idx)?;
            Some(child_line(child, app, theme, selected))
        }
    }
}

/// Keep the cursor inside the visible window.
fn scroll_offset(cursor: usize, height: usize, total: usize) -> usize {
    if height == 0 || total <= height {
        return 0;
    }
    if cursor < height {
        0
    } else {
        (cursor + 1 - height).min(total - height)
    }
}

fn parent_line(job: &FunctionJob, app: &App, theme: Theme, selected: bool) -> Line<'static> {
    let terminal = job.status.is_terminal();
    let marker = if app.is_expanded(&job.id) { EXPANDED } else { COLLAPSED };

    let mut spans: Vec<Span<'static>> = vec![Span::styled(format!("{marker} "), theme.muted())];
    match job.function_name.as_deref() {
        Some(name) => spans.push(Span::raw(format!("{} ", truncate(name, 24)))),
        None => spans.push(Span::styled(format!("{} ", app.spinner_char()), theme.muted())),
    }
    spans.push(Span::styled(format!("{} ", job.id), theme.id()));
    spans.push(Span::styled(
        truncate(&job.display_status(), 32),
        theme.job_status(job.status),
    ));
    // Non-terminal parents can receive new children at any time.
    if !terminal {
        spans.push(Span::styled(format!(" {}", app.spinner_char()), theme.muted()));
    } else if job.children_resolved == ResolveState::NotFetched {
        spans.push(Span::styled(format!(" {}", app.spinner_char()), theme.muted()));
    }
    spans.push(Span::styled(
        format!(" {}", relative_created(job.created_at, Utc::now())),
        theme.muted(),
    ));
    if job.children_error.is_some() {
        spans.push(Span::styled(" !", theme.error()));
    }

    finish_line(spans, theme, selected)
}

fn child_line(child: &ExecutionJob, app: &App, theme: Theme, selected: bool) -> Line<'static> {
    let mut spans: Vec<Span<'static>> = vec![Span::raw("  "), Span::styled("- ", theme.muted())];
    spans.push(Span::styled(format!("{} ", child.id), theme.id()));
    if child.status == ExecutionStatus::Unknown {
        // First status fetch still pending.
        spans.push(Span::styled(app.spinner_char().to_string(), theme.muted()));
    } else {
        spans.push(Span::styled(
            child.status.to_string(),
            theme.execution_status(child.status),
        ));
        if !child.status.is_terminal() {
            spans.push(Span::styled(format!(" {}", app.spinner_char()), theme.muted()));
        }
        let backend = child.backend_name.as_deref().unwrap_or("(unknown)");
        spans.push(Span::styled(format!(" {backend}"), theme.muted()));
    }

    finish_line(spans, theme, selected)
}

fn finish_line(mut spans: Vec<Span<'static>>, theme: Theme, selected: bool) -> Line<'static> {
    if selected {
        let highlight = theme.selected();
        for span in &mut spans {
            span.style = span.style.patch(highlight);
        }
    }
    Line::from(spans)
}

fn render_logs_overlay(
    frame: &mut Frame,
    app: &App,
    theme: Theme,
    job_id: &str,
    content: Option<&str>,
    scroll: u16,
) {
    let area = centered_rect(90, 90, frame.size());
    frame.render_widget(Clear, area);
    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(theme.muted())
        .title(Span::styled(format!("Logs: {job_id}"), theme.title()));
    let inner = block.inner(area);
    frame.render_widget(block, area);

    let paragraph = match content {
        Some(text) if text.trim().is_empty() => {
            Paragraph::new(Line::from(Span::styled("(empty)", theme.muted())))
        }
        Some(text) => {
            let lines: Vec<Line> = text.lines().map(|line| Line::from(line.to_string())).collect();
            Paragraph::new(lines).scroll((scroll, 0)).wrap(Wrap { trim: false })
        }
        None => Paragraph::new(Line::from(vec![
            Span::styled(app.spinner_char().to_string(), theme.muted()),
            Span::raw(" loading logs..."),
        ])),
    };
    frame.render_widget(paragraph, inner);
}

fn render_confirm_overlay(frame: &mut Frame, theme: Theme, job_id: &str) {
    let area = centered_rect(50, 20, frame.size());
    frame.render_widget(Clear, area);
    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(theme.notice())
        .title(Span::styled("Stop job?", theme.title()));
    let inner = block.inner(area);
    frame.render_widget(block, area);

    let lines = vec![
        Line::from(""),
        Line::from(Span::styled(job_id.to_string(), theme.id())),
        Line::from(""),
        Line::from(Span::styled("enter confirm  esc cancel", theme.muted())),
    ];
    frame.render_widget(Paragraph::new(lines), inner);
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

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scroll_offset_keeps_cursor_visible() {
        assert_eq!(scroll_offset(0, 10, 5), 0);
        assert_eq!(scroll_offset(4, 10, 5), 0);
        assert_eq!(scroll_offset(9, 10, 30), 0);
        assert_eq!(scroll_offset(10, 10, 30), 1);
        assert_eq!(scroll_offset(29, 10, 30), 20);
        assert_eq!(scroll_offset(3, 0, 30), 0);
    }
}
