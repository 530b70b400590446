use std::fmt;

/// Severity of a diagnostic.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Kind {
    Error,
    Warning,
    Info,
}

impl fmt::Display for Kind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Kind::Error => write!(f, "error"),
            Kind::Warning => write!(f, "warning"),
            Kind::Info => write!(f, "info"),
        }
    }
}

/// A single finding from parsing or converting a config.  Line and column are only known for
/// problems found while reading the YAML itself.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Entry {
    pub kind: Kind,
    pub message: String,
    pub line: Option<usize>,
    pub column: Option<usize>,
}

impl Entry {
    pub(crate) fn from_yaml_error(err: &serde_yaml::Error) -> Self {
        let location = err.location();
        Self {
            kind: Kind::Error,
            message: err.to_string(),
            line: location.as_ref().map(|l| l.line()),
            column: location.as_ref().map(|l| l.column()),
        }
    }
}

impl fmt::Display for Entry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (self.line, self.column) {
            (Some(line), Some(column)) => write!(
                f,
                "{} at line {}, column {}: {}",
                self.kind, line, column, self.message
            ),
            _ => write!(f, "{}: {}", self.kind, self.message),
        }
    }
}

/// The diagnostics collected while parsing or converting a config.
///
/// Parsing and conversion never fail outright; they record what they found here and leave it to
/// the caller to decide what is acceptable.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Report {
    entries: Vec<Entry>,
}

impl Report {
    pub fn entries(&self) -> &[Entry] {
        &self.entries
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// A report is fatal if it contains at least one error.
    pub fn is_fatal(&self) -> bool {
        self.entries.iter().any(|e| e.kind == Kind::Error)
    }

    pub(crate) fn add_entry(&mut self, entry: Entry) {
        self.entries.push(entry)
    }

    pub(crate) fn add_error<S: Into<String>>(&mut self, message: S) {
        self.add(Kind::Error, message)
    }

    pub(crate) fn add_warning<S: Into<String>>(&mut self, message: S) {
        self.add(Kind::Warning, message)
    }

    fn add<S: Into<String>>(&mut self, kind: Kind, message: S) {
        self.entries.push(Entry {
            kind,
            message: message.into(),
            line: None,
            column: None,
        })
    }
}

impl fmt::Display for Report {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for entry in &self.entries {
            writeln!(f, "{}", entry)?;
        }
        Ok(())
    }
}
