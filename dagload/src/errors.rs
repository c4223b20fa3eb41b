// src/errors.rs

//! Crate-wide error types.
//!
//! The loader reports a closed set of error kinds: `Cycle` from `schedule`,
//! `Failed` when a job function returns an error (or panics), and `Canceled`
//! when a job was removed or lost a dependency. Errors are cloneable because
//! the same stored error is re-raised to every waiter of a job.

use thiserror::Error;

/// Stable numeric codes for the closed set of loader error kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(i32)]
pub enum ErrorKind {
    /// `schedule` detected a dependency cycle in the provisional graph.
    Cycle = 1,
    /// A job's user function returned an error.
    Failed = 2,
    /// A job was canceled: its task was removed, or a dependency did not
    /// reach OK.
    Canceled = 3,
}

impl ErrorKind {
    /// Numeric code of this kind.
    pub fn code(self) -> i32 {
        self as i32
    }
}

#[derive(Error, Debug, Clone)]
pub enum LoadError {
    /// Names of the jobs on the detected cycle, in dependency order.
    /// Jobs not on the cycle never appear here.
    #[error("dependency cycle detected: {}", format_cycle(.names))]
    Cycle { names: Vec<String> },

    #[error("job '{name}' failed: {message}")]
    Failed { name: String, message: String },

    #[error("job '{name}' canceled: {reason}")]
    Canceled { name: String, reason: String },
}

impl LoadError {
    pub(crate) fn cycle(names: Vec<String>) -> Self {
        LoadError::Cycle { names }
    }

    pub(crate) fn failed(name: &str, message: impl Into<String>) -> Self {
        LoadError::Failed {
            name: name.to_string(),
            message: message.into(),
        }
    }

    pub(crate) fn canceled(name: &str, reason: impl Into<String>) -> Self {
        LoadError::Canceled {
            name: name.to_string(),
            reason: reason.into(),
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            LoadError::Cycle { .. } => ErrorKind::Cycle,
            LoadError::Failed { .. } => ErrorKind::Failed,
            LoadError::Canceled { .. } => ErrorKind::Canceled,
        }
    }

    /// Numeric code of this error's kind.
    pub fn code(&self) -> i32 {
        self.kind().code()
    }

    /// Phrase a job's terminal error as the cancellation reason for one of
    /// its dependents, keeping the originating message in the chain.
    pub(crate) fn as_dependency_reason(&self) -> String {
        match self {
            LoadError::Failed { name, message } => {
                format!("dependency '{name}' failed: {message}")
            }
            LoadError::Canceled { name, reason } => {
                format!("dependency '{name}' was canceled: {reason}")
            }
            LoadError::Cycle { .. } => format!("dependency rejected: {self}"),
        }
    }
}

/// Render a cycle as `'a' -> 'b' -> 'a'`, closing the loop on the first name.
fn format_cycle(names: &[String]) -> String {
    let mut out = String::new();
    for name in names {
        out.push('\'');
        out.push_str(name);
        out.push_str("' -> ");
    }
    if let Some(first) = names.first() {
        out.push('\'');
        out.push_str(first);
        out.push('\'');
    }
    out
}

pub type Result<T> = std::result::Result<T, LoadError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kinds_have_distinct_codes() {
        assert_eq!(ErrorKind::Cycle.code(), 1);
        assert_eq!(ErrorKind::Failed.code(), 2);
        assert_eq!(ErrorKind::Canceled.code(), 3);
    }

    #[test]
    fn cycle_message_lists_only_cycle_members() {
        let err = LoadError::cycle(vec!["j1".into(), "j3".into(), "j2".into()]);
        let msg = err.to_string();
        assert!(msg.contains("'j1'"));
        assert!(msg.contains("'j2'"));
        assert!(msg.contains("'j3'"));
        assert!(!msg.contains("'j0'"));
        assert_eq!(err.kind(), ErrorKind::Cycle);
    }

    #[test]
    fn failed_message_carries_user_text() {
        let err = LoadError::failed("job", "test job failure");
        assert!(err.to_string().contains("test job failure"));
        assert_eq!(err.code(), 2);
    }
}
