//! taskview-core: live task view for the task service
//!
//! This crate holds the client-side state: a reducer that folds stream
//! events, poll results and connection changes into a render model, the
//! subscription runner that feeds it, the task history and the upload
//! staging set. A [`Session`] ties them together for one front end.

pub mod backend;
pub mod error;
pub mod history;
pub mod render;
pub mod session;
pub mod staging;
pub mod subscription;
pub mod view;

#[cfg(test)]
pub(crate) mod mock;

pub use backend::TaskBackend;
pub use error::{Error, Result};
pub use history::{EMPTY_HISTORY, HistoryEntry, HistoryList, HistoryState};
pub use render::{LineKind, ViewLine, step_header};
pub use session::{Session, UpdateReceiver};
pub use staging::{FileSource, StagedFile, UploadStaging};
pub use subscription::{SessionUpdate, Subscription, SubscriptionConfig};
pub use view::{Notice, NoticeLevel, Outcome, StatusLine, StepEntry, TaskView, ViewPhase, ViewUpdate};
