//! Recent-task list panel

use crate::theme::Theme;
use ratatui::{
    buffer::Buffer,
    layout::Rect,
    text::{Line, Span},
    widgets::{
        Block, Borders, HighlightSpacing, List, ListItem, ListState, Paragraph, StatefulWidget,
        Widget, Wrap,
    },
};
use taskview_core::{HistoryEntry, HistoryList};
use unicode_width::UnicodeWidthStr;

/// Cut `text` to at most `width` columns on a single line, ending with "…"
/// when shortened
pub fn truncate(text: &str, width: usize) -> String {
    let flat = text.replace(['\n', '\r'], " ");
    if flat.width() <= width {
        return flat;
    }
    let mut out = String::new();
    let mut used = 0;
    for c in flat.chars() {
        let w = c.to_string().width();
        if used + w + 1 > width {
            break;
        }
        out.push(c);
        used += w;
    }
    out.push('…');
    out
}

fn entry_item<'a>(entry: &HistoryEntry, theme: &Theme, width: usize) -> ListItem<'a> {
    let prompt = truncate(&entry.prompt, width.saturating_sub(4));
    let mut lines = vec![Line::from(vec![
        Span::styled(format!("{} ", entry.glyph()), theme.status_style(entry.status)),
        Span::styled(prompt, theme.base_style()),
    ])];
    let created = entry.created_label();
    if !created.is_empty() {
        lines.push(Line::from(Span::styled(format!("   {}", created), theme.dim_style())));
    }
    ListItem::new(lines)
}

/// History panel with an optional highlighted row
pub struct HistoryPanel<'a> {
    history: &'a HistoryList,
    theme: &'a Theme,
    selected: Option<usize>,
    focused: bool,
}

impl<'a> HistoryPanel<'a> {
    pub fn new(history: &'a HistoryList, theme: &'a Theme) -> Self {
        Self {
            history,
            theme,
            selected: None,
            focused: false,
        }
    }

    pub fn selected(mut self, selected: Option<usize>) -> Self {
        self.selected = selected;
        self
    }

    pub fn focused(mut self, focused: bool) -> Self {
        self.focused = focused;
        self
    }
}

impl Widget for HistoryPanel<'_> {
    fn render(self, area: Rect, buf: &mut Buffer) {
        let block = Block::default()
            .title(" History ")
            .borders(Borders::ALL)
            .border_style(if self.focused {
                self.theme.accent_style()
            } else {
                self.theme.border_style()
            });

        if let Some(message) = self.history.state().message() {
            Paragraph::new(message)
                .style(self.theme.dim_style())
                .wrap(Wrap { trim: true })
                .block(block)
                .render(area, buf);
            return;
        }

        let width = area.width.saturating_sub(2) as usize;
        let items: Vec<ListItem> = self
            .history
            .entries()
            .iter()
            .map(|entry| entry_item(entry, self.theme, width))
            .collect();

        let list = List::new(items)
            .block(block)
            .highlight_style(self.theme.selected_style())
            .highlight_spacing(HighlightSpacing::Never);

        let mut state = ListState::default();
        state.select(self.selected);
        StatefulWidget::render(list, area, buf, &mut state);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truncate() {
        assert_eq!(truncate("short", 10), "short");
        assert_eq!(truncate("a much longer prompt", 8), "a much …");
        assert_eq!(truncate("line one\nline two", 40), "line one line two");
    }
}
