use std::fmt::Display;
use std::panic::Location;
use std::rc::Rc;

use thiserror::Error;

/// What went wrong, independent of where.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AnomalyKind {
    EndOfFile,
    SourceNotFound,
    UnknownToken,
    UnknownOperator,
    Punctuation,
    Grammar,
    IdentifierNotFound,
    AlreadyRegistered,
    NotAScope,
    NoConversion,
    UnsupportedOperation,
    NoInterfaceAttached,
    ListIndexOutOfRange,
    UndefinedOperator,
    ConstAssignment,
    PrecisionOutOfRange,
    NoBlocksInSource,
    NoOperatorFound,
    ResourceExhausted,
}

impl Display for AnomalyKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let text = match self {
            AnomalyKind::EndOfFile => "unexpected end of file",
            AnomalyKind::SourceNotFound => "source not found",
            AnomalyKind::UnknownToken => "unknown token",
            AnomalyKind::UnknownOperator => "unknown operator",
            AnomalyKind::Punctuation => "punctuation mismatch",
            AnomalyKind::Grammar => "grammar error",
            AnomalyKind::IdentifierNotFound => "identifier not found",
            AnomalyKind::AlreadyRegistered => "already registered",
            AnomalyKind::NotAScope => "not a scope",
            AnomalyKind::NoConversion => "no conversion",
            AnomalyKind::UnsupportedOperation => "unsupported operation",
            AnomalyKind::NoInterfaceAttached => "no interface attached",
            AnomalyKind::ListIndexOutOfRange => "list index out of range",
            AnomalyKind::UndefinedOperator => "undefined operator",
            AnomalyKind::ConstAssignment => "assignment to constant",
            AnomalyKind::PrecisionOutOfRange => "precision out of range",
            AnomalyKind::NoBlocksInSource => "no blocks in source",
            AnomalyKind::NoOperatorFound => "no operator found",
            AnomalyKind::ResourceExhausted => "resource exhausted",
        };
        f.write_str(text)
    }
}

/// A position inside a script, attached to errors as they cross a source boundary.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScriptLocation {
    pub source: Rc<str>,
    pub line: usize,
}

impl Display for ScriptLocation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.source, self.line)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Located(pub Option<ScriptLocation>);

impl Display for Located {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.0 {
            Some(location) => write!(f, " at {location}"),
            None => Ok(()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum Anomaly {
    /// An interpreter defect. Never caused by the script itself.
    #[error("internal interpreter error ({origin}): {message}")]
    Panic {
        message: String,
        origin: &'static Location<'static>,
    },
    #[error("{kind}{location}: {message}")]
    Script {
        kind: AnomalyKind,
        message: String,
        location: Located,
        origin: &'static Location<'static>,
    },
}

impl Anomaly {
    #[track_caller]
    pub fn new(kind: AnomalyKind, message: impl Into<String>) -> Self {
        Anomaly::Script {
            kind,
            message: message.into(),
            location: Located(None),
            origin: Location::caller(),
        }
    }

    #[track_caller]
    pub fn panic(message: impl Into<String>) -> Self {
        Anomaly::Panic {
            message: message.into(),
            origin: Location::caller(),
        }
    }

    /// `None` for interpreter defects.
    pub fn kind(&self) -> Option<AnomalyKind> {
        match self {
            Anomaly::Panic { .. } => None,
            Anomaly::Script { kind, .. } => Some(*kind),
        }
    }

    pub fn is_panic(&self) -> bool {
        matches!(self, Anomaly::Panic { .. })
    }

    pub fn message(&self) -> &str {
        match self {
            Anomaly::Panic { message, .. } | Anomaly::Script { message, .. } => message,
        }
    }

    pub fn location(&self) -> Option<&ScriptLocation> {
        match self {
            Anomaly::Panic { .. } => None,
            Anomaly::Script { location, .. } => location.0.as_ref(),
        }
    }

    pub fn origin(&self) -> &'static Location<'static> {
        match self {
            Anomaly::Panic { origin, .. } | Anomaly::Script { origin, .. } => origin,
        }
    }

    /// Attaches a script location unless a more precise one is already present.
    pub fn located(mut self, at: ScriptLocation) -> Self {
        if let Anomaly::Script { location, .. } = &mut self {
            if location.0.is_none() {
                location.0 = Some(at);
            }
        }
        self
    }
}

pub trait ResultExt<T> {
    fn at(self, location: impl FnOnce() -> ScriptLocation) -> Result<T, Anomaly>;
}

impl<T> ResultExt<T> for Result<T, Anomaly> {
    fn at(self, location: impl FnOnce() -> ScriptLocation) -> Result<T, Anomaly> {
        self.map_err(|error| error.located(location()))
    }
}
