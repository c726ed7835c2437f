//! Color theme support

use ratatui::style::{Color, Modifier, Style};
use taskview_api::{StepKind, TaskStatus};
use taskview_core::LineKind;

/// Color theme for the UI
#[derive(Debug, Clone, PartialEq)]
pub struct Theme {
    /// Whether this is the dark variant
    pub dark: bool,
    /// Background color
    pub bg: Color,
    /// Primary text color
    pub fg: Color,
    /// Dimmed/secondary text
    pub dim: Color,
    /// Accent color (highlights, prompts)
    pub accent: Color,
    pub error: Color,
    pub success: Color,
    pub warning: Color,
    pub border: Color,
    /// Selection/highlight background
    pub selection_bg: Color,
    /// Thinking steps
    pub think: Color,
    /// Tool and action steps
    pub tool: Color,
}

impl Default for Theme {
    fn default() -> Self {
        Self::dark()
    }
}

impl Theme {
    /// Dark theme (default)
    pub fn dark() -> Self {
        Self {
            dark: true,
            bg: Color::Reset,
            fg: Color::White,
            dim: Color::DarkGray,
            accent: Color::Cyan,
            error: Color::Red,
            success: Color::Green,
            warning: Color::Yellow,
            border: Color::DarkGray,
            selection_bg: Color::DarkGray,
            think: Color::LightBlue,
            tool: Color::Magenta,
        }
    }

    /// Light theme
    pub fn light() -> Self {
        Self {
            dark: false,
            bg: Color::White,
            fg: Color::Black,
            dim: Color::Gray,
            accent: Color::Blue,
            error: Color::Red,
            success: Color::Rgb(0, 130, 0),
            warning: Color::Rgb(180, 120, 0),
            border: Color::Gray,
            selection_bg: Color::LightBlue,
            think: Color::Rgb(40, 90, 160),
            tool: Color::Magenta,
        }
    }

    pub fn from_dark_mode(dark: bool) -> Self {
        if dark { Self::dark() } else { Self::light() }
    }

    /// The other variant
    pub fn toggled(&self) -> Self {
        Self::from_dark_mode(!self.dark)
    }

    pub fn base_style(&self) -> Style {
        Style::default().fg(self.fg).bg(self.bg)
    }

    pub fn dim_style(&self) -> Style {
        Style::default().fg(self.dim)
    }

    pub fn accent_style(&self) -> Style {
        Style::default().fg(self.accent)
    }

    pub fn accent_bold(&self) -> Style {
        Style::default()
            .fg(self.accent)
            .add_modifier(Modifier::BOLD)
    }

    pub fn error_style(&self) -> Style {
        Style::default().fg(self.error)
    }

    pub fn success_style(&self) -> Style {
        Style::default().fg(self.success)
    }

    pub fn warning_style(&self) -> Style {
        Style::default().fg(self.warning)
    }

    pub fn border_style(&self) -> Style {
        Style::default().fg(self.border)
    }

    /// Highlighted row in a list
    pub fn selected_style(&self) -> Style {
        Style::default()
            .bg(self.selection_bg)
            .fg(self.fg)
            .add_modifier(Modifier::BOLD)
    }

    /// Header style of a step
    pub fn step_style(&self, kind: &StepKind) -> Style {
        let color = match kind {
            StepKind::Think => self.think,
            StepKind::Tool | StepKind::Act | StepKind::Run => self.tool,
            StepKind::Result => self.success,
            StepKind::Log | StepKind::Message | StepKind::Other(_) => self.dim,
        };
        Style::default().fg(color).add_modifier(Modifier::BOLD)
    }

    /// Header style of a task panel line
    pub fn line_style(&self, kind: &LineKind) -> Style {
        match kind {
            LineKind::Banner => self.accent_style().add_modifier(Modifier::ITALIC),
            LineKind::Step(step) => self.step_style(step),
            LineKind::Heartbeat | LineKind::Empty => self.dim_style(),
            LineKind::Warning => self.warning_style(),
            LineKind::Error => self.error_style(),
            LineKind::Completed => self.success_style().add_modifier(Modifier::BOLD),
            LineKind::Failed => self.error_style().add_modifier(Modifier::BOLD),
        }
    }

    pub fn status_style(&self, status: TaskStatus) -> Style {
        match status {
            TaskStatus::Completed => self.success_style(),
            TaskStatus::Failed => self.error_style(),
            TaskStatus::Running => self.accent_style(),
            TaskStatus::Pending | TaskStatus::Unknown => self.dim_style(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_toggle_round_trip() {
        let dark = Theme::dark();
        let light = dark.toggled();
        assert!(!light.dark);
        assert_eq!(light.toggled(), dark);
    }

    #[test]
    fn test_result_steps_use_success_color() {
        let theme = Theme::light();
        assert_eq!(
            theme.line_style(&LineKind::Step(StepKind::Result)).fg,
            Some(theme.success)
        );
    }
}
