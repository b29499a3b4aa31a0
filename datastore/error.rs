use std::fmt;

pub type Result<T> = std::result::Result<T, Error>;

#[macro_export]
macro_rules! schema_conflict {
    ($($token:tt)*) => {
        return Err($crate::error::Error::schema_conflict(anyhow::anyhow!($($token)*)))
    };
}

#[macro_export]
macro_rules! unsupported {
    ($($token:tt)*) => {
        return Err($crate::error::Error::unsupported(anyhow::anyhow!($($token)*)))
    };
}

#[macro_export]
macro_rules! corrupt_history {
    ($($token:tt)*) => {
        return Err($crate::error::Error::history_corruption(anyhow::anyhow!($($token)*)))
    };
}

#[macro_export]
macro_rules! internal {
    ($($token:tt)*) => {
        return Err($crate::error::Error::internal(anyhow::anyhow!($($token)*)))
    };
}

#[derive(Debug)]
pub struct Error {
    pub inner: anyhow::Error,
    pub err_kind: ErrorKind,
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let context = match self.err_kind {
            ErrorKind::SchemaConflict => "schema conflict",
            ErrorKind::UnsupportedOperation => "unsupported operation",
            ErrorKind::ExecutionFailure => "execution failure",
            ErrorKind::HistoryCorruption => "corrupted migration history",
            ErrorKind::Internal => "internal error",
        };

        write!(f, "{context}: {:#}", self.inner)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Adding a column that exists, or dropping/altering one that does not.
    SchemaConflict,
    /// The dialect cannot express the requested DDL.
    UnsupportedOperation,
    /// The database rejected the migration script.
    ExecutionFailure,
    /// A migration file is unreadable or malformed.
    HistoryCorruption,
    Internal,
}

impl std::error::Error for Error {}

pub trait ResultExt<T> {
    fn err_internal(self) -> Result<T>;
    fn err_execution(self) -> Result<T>;
    fn err_history(self) -> Result<T>;
}

impl<T, E> ResultExt<T> for std::result::Result<T, E>
where
    E: Into<anyhow::Error>,
{
    fn err_internal(self) -> Result<T> {
        self.map_err(|e| Error::internal(e.into()))
    }

    fn err_execution(self) -> Result<T> {
        self.map_err(|e| Error::execution_failure(e.into()))
    }

    fn err_history(self) -> Result<T> {
        self.map_err(|e| Error::history_corruption(e.into()))
    }
}

impl Error {
    pub fn new(err_kind: ErrorKind, inner: anyhow::Error) -> Self {
        Self { inner, err_kind }
    }

    pub fn schema_conflict(inner: anyhow::Error) -> Self {
        Self::new(ErrorKind::SchemaConflict, inner)
    }

    pub fn unsupported(inner: anyhow::Error) -> Self {
        Self::new(ErrorKind::UnsupportedOperation, inner)
    }

    pub fn execution_failure(inner: anyhow::Error) -> Self {
        Self::new(ErrorKind::ExecutionFailure, inner)
    }

    pub fn history_corruption(inner: anyhow::Error) -> Self {
        Self::new(ErrorKind::HistoryCorruption, inner)
    }

    pub fn internal(inner: anyhow::Error) -> Self {
        Self::new(ErrorKind::Internal, inner)
    }

    pub fn kind(&self) -> ErrorKind {
        self.err_kind
    }

    /// Wraps the inner error with additional context, keeping the kind.
    pub fn context<C>(self, context: C) -> Self
    where
        C: fmt::Display + Send + Sync + 'static,
    {
        Self { inner: self.inner.context(context), err_kind: self.err_kind }
    }
}
