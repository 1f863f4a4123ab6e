use std::{fmt, io};
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameSourceErrorKind {
    PermissionDenied,
    Unavailable,
    ConstraintUnsatisfiable,
    Backend,
}

impl fmt::Display for FrameSourceErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::PermissionDenied => "PermissionDenied",
            Self::Unavailable => "Unavailable",
            Self::ConstraintUnsatisfiable => "ConstraintUnsatisfiable",
            Self::Backend => "Backend",
        };
        f.write_str(name)
    }
}

/// Failure to acquire or drive a camera stream.
#[derive(Debug, Clone, Error)]
#[error("{kind}: {message}")]
pub struct FrameSourceError {
    pub kind: FrameSourceErrorKind,
    pub message: String,
}

impl FrameSourceError {
    pub fn new(kind: FrameSourceErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn permission_denied(message: impl Into<String>) -> Self {
        Self::new(FrameSourceErrorKind::PermissionDenied, message)
    }

    pub fn unavailable(message: impl Into<String>) -> Self {
        Self::new(FrameSourceErrorKind::Unavailable, message)
    }

    pub fn constraint(message: impl Into<String>) -> Self {
        Self::new(FrameSourceErrorKind::ConstraintUnsatisfiable, message)
    }

    pub fn backend(message: impl Into<String>) -> Self {
        Self::new(FrameSourceErrorKind::Backend, message)
    }
}

impl From<io::Error> for FrameSourceError {
    fn from(err: io::Error) -> Self {
        let message = err.to_string();
        match err.kind() {
            io::ErrorKind::PermissionDenied => Self::permission_denied(message),
            io::ErrorKind::NotFound => Self::unavailable(message),
            _ => Self::backend(message),
        }
    }
}
