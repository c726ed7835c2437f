//! Task panel: steps, notices and outcome of the current task

use crate::theme::Theme;
use ratatui::{
    buffer::Buffer,
    layout::Rect,
    text::{Line, Span},
    widgets::{Paragraph, Widget},
};
use taskview_core::{LineKind, TaskView, ViewLine};

/// Wrap one view line into display rows
fn line_rows(line: &ViewLine, theme: &Theme, width: usize) -> Vec<Line<'static>> {
    let mut rows = vec![Line::from(Span::styled(
        line.header.clone(),
        theme.line_style(&line.kind),
    ))];

    let body_style = match line.kind {
        LineKind::Error | LineKind::Failed => theme.error_style(),
        _ => theme.base_style(),
    };
    let body_width = width.saturating_sub(2).max(1);
    for raw in line.body.lines() {
        for wrapped in textwrap::wrap(raw, body_width) {
            rows.push(Line::from(Span::styled(format!("  {}", wrapped), body_style)));
        }
    }

    if matches!(line.kind, LineKind::Step(_) | LineKind::Completed | LineKind::Failed) {
        rows.push(Line::from(""));
    }
    rows
}

/// All display rows of a view at the given width
pub fn render_rows(view: &TaskView, theme: &Theme, width: usize) -> Vec<Line<'static>> {
    view.lines()
        .iter()
        .flat_map(|line| line_rows(line, theme, width))
        .collect()
}

/// Number of rows the panel needs at `width`
pub fn content_height(view: &TaskView, theme: &Theme, width: usize) -> usize {
    render_rows(view, theme, width).len()
}

/// Scrollable rendering of a [`TaskView`]
pub struct TaskPanel<'a> {
    view: &'a TaskView,
    theme: &'a Theme,
    scroll: usize,
}

impl<'a> TaskPanel<'a> {
    pub fn new(view: &'a TaskView, theme: &'a Theme) -> Self {
        Self {
            view,
            theme,
            scroll: 0,
        }
    }

    /// First row to show
    pub fn scroll(mut self, scroll: usize) -> Self {
        self.scroll = scroll;
        self
    }
}

impl Widget for TaskPanel<'_> {
    fn render(self, area: Rect, buf: &mut Buffer) {
        if area.width == 0 || area.height == 0 {
            return;
        }
        let rows: Vec<Line> = render_rows(self.view, self.theme, area.width as usize)
            .into_iter()
            .skip(self.scroll)
            .take(area.height as usize)
            .collect();
        Paragraph::new(rows).render(area, buf);
    }
}
