use std::error::Error as StdError;
use std::fmt;

use crate::core::status::PluginStatus;

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ErrorKind {
    Internal,
    Open,
    Script,
    Callback,
    Format,
    Range,
    Unknown,
}

#[derive(Debug)]
pub struct Error {
    kind: ErrorKind,
    message: Option<String>,
    offset: Option<u64>,
    source: Option<Box<dyn StdError + Send + Sync>>,
}

impl Error {
    pub fn new(kind: ErrorKind) -> Self {
        Self {
            kind,
            message: None,
            offset: None,
            source: None,
        }
    }

    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    pub fn message(&self) -> Option<&str> {
        self.message.as_deref()
    }

    pub fn offset(&self) -> Option<u64> {
        self.offset
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }

    pub fn with_offset(mut self, offset: u64) -> Self {
        self.offset = Some(offset);
        self
    }

    pub fn with_source(mut self, source: impl StdError + Send + Sync + 'static) -> Self {
        self.source = Some(Box::new(source));
        self
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self.kind)?;
        if let Some(message) = &self.message {
            write!(f, ": {message}")?;
        }
        if let Some(offset) = self.offset {
            write!(f, " (offset: {offset})")?;
        }
        Ok(())
    }
}

impl StdError for Error {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        self.source
            .as_ref()
            .map(|source| source.as_ref() as &(dyn StdError + 'static))
    }
}

pub fn to_status(kind: ErrorKind) -> PluginStatus {
    match kind {
        ErrorKind::Internal => PluginStatus::Fail,
        ErrorKind::Open => PluginStatus::OpenError,
        ErrorKind::Script => PluginStatus::ScriptError,
        ErrorKind::Callback => PluginStatus::CallbackError,
        ErrorKind::Format => PluginStatus::FormatError,
        ErrorKind::Range => PluginStatus::RangeError,
        ErrorKind::Unknown => PluginStatus::Unknown,
    }
}

/// Inverse of `to_status`; `Ok` carries no error kind.
pub fn kind_for_status(status: PluginStatus) -> Option<ErrorKind> {
    match status {
        PluginStatus::Ok => None,
        PluginStatus::Fail => Some(ErrorKind::Internal),
        PluginStatus::OpenError => Some(ErrorKind::Open),
        PluginStatus::ScriptError => Some(ErrorKind::Script),
        PluginStatus::CallbackError => Some(ErrorKind::Callback),
        PluginStatus::FormatError => Some(ErrorKind::Format),
        PluginStatus::RangeError => Some(ErrorKind::Range),
        PluginStatus::Unknown => Some(ErrorKind::Unknown),
    }
}
