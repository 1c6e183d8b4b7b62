use crate::error::AppError;

/// Notification kinds surfaced to whatever presentation layer hosts the
/// core. Rendering (dialogs, toasts, log lines) is up to the caller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notice {
    /// A destructive action wants explicit confirmation before it runs.
    ConfirmDelete(String),
    /// The operation completed and any pending changes were persisted.
    Saved(String),
    /// The operation was rejected because of a referential conflict;
    /// nothing was changed.
    Rejected(String),
    /// An unexpected persistence failure; the in-memory state is kept and
    /// the user may retry.
    Failed(String),
}

impl Notice {
    pub fn from_error(err: &AppError) -> Self {
        match err {
            AppError::Conflict(msg) => Notice::Rejected(msg.clone()),
            AppError::Validation(msg) => Notice::Rejected(msg.clone()),
            other => Notice::Failed(other.to_string()),
        }
    }
}
