//! Custom widgets for the TUI

pub mod history_panel;
pub mod popup;
pub mod prompt;
pub mod spinner;
pub mod staging;
pub mod task_panel;

pub use history_panel::HistoryPanel;
pub use popup::Popup;
pub use prompt::PromptInput;
pub use spinner::Spinner;
pub use staging::StagingBar;
pub use task_panel::TaskPanel;
