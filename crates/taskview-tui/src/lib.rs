//! taskview-tui: terminal widgets for following tasks
//!
//! Widgets that draw a [`taskview_core::TaskView`], the task history and
//! the upload staging set with ratatui, plus terminal setup and key mapping.

pub mod app;
pub mod input;
pub mod theme;
pub mod widgets;

pub use app::App;
pub use theme::Theme;
