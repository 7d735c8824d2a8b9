use std::cell::RefCell;
use std::collections::VecDeque;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;
use std::rc::Rc;

use crate::error::{Anomaly, AnomalyKind};

/// Produces raw script text one line at a time.
///
/// Each line keeps its terminating newline. An empty string means the
/// source has nothing more to give right now.
pub trait LineSource {
    fn read_line(&mut self) -> Result<String, Anomaly>;
}

/// An in-memory script.
pub struct StringSource {
    text: String,
    offset: usize,
}

impl StringSource {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            offset: 0,
        }
    }
}

impl LineSource for StringSource {
    fn read_line(&mut self) -> Result<String, Anomaly> {
        let rest = &self.text[self.offset..];
        let end = rest.find('\n').map(|idx| idx + 1).unwrap_or(rest.len());
        self.offset += end;
        Ok(rest[..end].to_owned())
    }
}

pub struct FileSource {
    reader: BufReader<File>,
}

impl FileSource {
    pub fn open(path: impl AsRef<Path>) -> Result<Self, Anomaly> {
        let path = path.as_ref();
        let file = File::open(path).map_err(|err| {
            Anomaly::new(
                AnomalyKind::SourceNotFound,
                format!("cannot open {}: {err}", path.display()),
            )
        })?;
        Ok(Self {
            reader: BufReader::new(file),
        })
    }
}

impl LineSource for FileSource {
    fn read_line(&mut self) -> Result<String, Anomaly> {
        let mut line = String::new();
        self.reader.read_line(&mut line).map_err(|err| {
            Anomaly::new(AnomalyKind::SourceNotFound, format!("read failed: {err}"))
        })?;
        Ok(line)
    }
}

/// A source that can keep growing after it has been drained.
///
/// Clones share the same queue, so a host can hand one clone to the
/// interpreter and push more lines through the other.
#[derive(Clone, Default)]
pub struct SharedSource {
    lines: Rc<RefCell<VecDeque<String>>>,
}

impl SharedSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_line(&self, line: &str) {
        let mut line = line.to_owned();
        if !line.ends_with('\n') {
            line.push('\n');
        }
        self.lines.borrow_mut().push_back(line);
    }
}

impl LineSource for SharedSource {
    fn read_line(&mut self) -> Result<String, Anomaly> {
        Ok(self.lines.borrow_mut().pop_front().unwrap_or_default())
    }
}

/// A resumable cursor into a source, counted in tokens.
///
/// Only the position is kept. The scopes a block body runs in are built
/// by the interpreter on each call, not restored from here.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Bookmark {
    pub source: Rc<str>,
    pub position: usize,
    pub line: usize,
}

impl Bookmark {
    pub fn new(source: Rc<str>, position: usize, line: usize) -> Self {
        Self {
            source,
            position,
            line,
        }
    }

    /// Sentinel for "no source".
    pub fn void() -> Self {
        Self::new(Rc::from(""), 0, 0)
    }

    pub fn is_void(&self) -> bool {
        self.source.is_empty() && self.position == 0 && self.line == 0
    }
}
