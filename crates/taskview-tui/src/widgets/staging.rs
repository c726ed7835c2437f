//! One-line summary of files staged for upload

use crate::theme::Theme;
use ratatui::{
    buffer::Buffer,
    layout::Rect,
    text::{Line, Span},
    widgets::{Paragraph, Widget},
};
use taskview_core::UploadStaging;

pub struct StagingBar<'a> {
    staging: &'a UploadStaging,
    theme: &'a Theme,
}

impl<'a> StagingBar<'a> {
    pub fn new(staging: &'a UploadStaging, theme: &'a Theme) -> Self {
        Self { staging, theme }
    }

    /// Whether there is anything to draw
    pub fn is_visible(&self) -> bool {
        !self.staging.is_empty()
    }
}

impl Widget for StagingBar<'_> {
    fn render(self, area: Rect, buf: &mut Buffer) {
        if !self.is_visible() {
            return;
        }
        let line = Line::from(vec![
            Span::styled(
                format!("📎 {} staged: ", self.staging.len()),
                self.theme.accent_style(),
            ),
            Span::styled(self.staging.names().join(", "), self.theme.base_style()),
            Span::styled("  (Ctrl+O upload │ /cancel-upload)", self.theme.dim_style()),
        ]);
        Paragraph::new(line).render(area, buf);
    }
}
