//! Centered modal popup for confirmations and blocking notices

use crate::theme::Theme;
use ratatui::{
    buffer::Buffer,
    layout::Rect,
    style::Style,
    text::{Line, Span},
    widgets::{Block, Borders, Clear, Padding, Paragraph, Widget, Wrap},
};
use unicode_width::UnicodeWidthStr;

const MAX_POPUP_WIDTH: u16 = 64;

/// What a popup asks of the user
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PopupKind {
    /// y/n question
    Confirm,
    /// Dismissed with any key
    Notice,
}

pub struct Popup<'a> {
    title: &'a str,
    message: &'a str,
    kind: PopupKind,
    theme: &'a Theme,
}

impl<'a> Popup<'a> {
    pub fn confirm(title: &'a str, message: &'a str, theme: &'a Theme) -> Self {
        Self {
            title,
            message,
            kind: PopupKind::Confirm,
            theme,
        }
    }

    pub fn notice(title: &'a str, message: &'a str, theme: &'a Theme) -> Self {
        Self {
            title,
            message,
            kind: PopupKind::Notice,
            theme,
        }
    }

    fn hint(&self) -> &'static str {
        match self.kind {
            PopupKind::Confirm => "y: confirm │ n/Esc: cancel",
            PopupKind::Notice => "press any key",
        }
    }

    fn border(&self) -> Style {
        match self.kind {
            PopupKind::Confirm => self.theme.accent_style(),
            PopupKind::Notice => self.theme.error_style(),
        }
    }
}

/// Rect of size `width`×`height` centered in `area`, clipped to it
pub fn centered(area: Rect, width: u16, height: u16) -> Rect {
    let width = width.min(area.width);
    let height = height.min(area.height);
    let x = area.x + (area.width - width) / 2;
    let y = area.y + (area.height - height) / 2;
    Rect::new(x, y, width, height)
}

impl Widget for Popup<'_> {
    fn render(self, area: Rect, buf: &mut Buffer) {
        let content_width = self
            .message
            .lines()
            .map(|l| l.width())
            .chain([self.title.width() + 2, self.hint().width()])
            .max()
            .unwrap_or(0);
        let width = (content_width as u16 + 4).clamp(24, MAX_POPUP_WIDTH);
        let inner_width = width.saturating_sub(4) as usize;
        let message_rows: usize = self
            .message
            .lines()
            .map(|l| textwrap::wrap(l, inner_width.max(1)).len().max(1))
            .sum();
        let height = message_rows as u16 + 4;

        let popup_area = centered(area, width, height);
        Clear.render(popup_area, buf);

        let block = Block::default()
            .title(format!(" {} ", self.title))
            .title_style(self.theme.accent_bold())
            .borders(Borders::ALL)
            .border_style(self.border())
            .padding(Padding::horizontal(1));

        let mut lines: Vec<Line> = self
            .message
            .lines()
            .map(|l| Line::from(Span::styled(l.to_string(), self.theme.base_style())))
            .collect();
        lines.push(Line::from(""));
        lines.push(Line::from(Span::styled(self.hint(), self.theme.dim_style())));

        Paragraph::new(lines)
            .block(block)
            .wrap(Wrap { trim: false })
            .render(popup_area, buf);
    }
}
