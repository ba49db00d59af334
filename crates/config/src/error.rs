//! Error types for configuration loading and validation.

use std::{
    cmp::{max, min},
    fmt::Write as _,
    path::{Path, PathBuf},
};

use thiserror::Error;

/// Errors produced while loading or parsing a configuration.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum Error {
    /// I/O or filesystem read error.
    #[error("{message}")]
    Read {
        /// Optional path associated with the read error.
        path: Option<PathBuf>,
        /// Human-readable error message.
        message: String,
    },
    /// A single malformed line; loading stops at the first one.
    #[error("line {line}: {kind}")]
    Line {
        /// Optional path of the file containing the line.
        path: Option<PathBuf>,
        /// 1-based line number.
        line: usize,
        /// 1-based column of the offending token.
        col: usize,
        /// What is wrong with the line.
        kind: LineError,
        /// Rendered excerpt including a caret at the offending token.
        excerpt: String,
    },
}

/// The distinct ways a configuration line can be malformed.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum LineError {
    /// The line has too few tokens, or the wrong number for its action.
    #[error("expected {expected} tokens, found {found}")]
    TokenCount {
        /// Tokens required by the line's action or directive.
        expected: usize,
        /// Tokens actually present.
        found: usize,
    },
    /// First token is not `ch=`.
    #[error("missing token \"ch=\" for channel")]
    ChannelTokenMissing,
    /// Channel is not an integer in 0..=15.
    #[error("invalid channel, must be a value between 0 and 15")]
    ChannelInvalid,
    /// Second token is not `ev=`.
    #[error("missing token \"ev=\" for event")]
    EventTokenMissing,
    /// Event (note) is not an integer in 0..=255.
    #[error("invalid event, must be a value between 0 and 255")]
    EventInvalid,
    /// Third token is not `key=`.
    #[error("missing token \"key=\" for key")]
    KeyTokenMissing,
    /// A key name or combo could not be parsed.
    #[error("{0}")]
    KeyInvalid(String),
    /// Fourth token is not `thres=`.
    #[error("missing token \"thres=\" for threshold")]
    ThresholdTokenMissing,
    /// Threshold is not an integer in 0..=255.
    #[error("invalid threshold, must be a value between 0 and 255")]
    ThresholdInvalid,
    /// Unknown action name.
    #[error("invalid action '{0}', must be one of BASIC, VELOCITY, TOGGLE, REPEAT, REPEAT-SEQUENCE")]
    ActionInvalid(String),
    /// An action argument is not a positive integer in range.
    #[error("invalid action argument '{0}', expected a positive integer")]
    ActionArgumentInvalid(String),
    /// Unknown `@` directive.
    #[error("unknown directive '{0}', must be one of @profile, @active, @swap")]
    DirectiveInvalid(String),
    /// A profile name is empty or reserved.
    #[error("invalid profile name '{0}'")]
    ProfileNameInvalid(String),
}

impl Error {
    /// Render a human-friendly error message including location and an excerpt when available.
    pub fn pretty(&self) -> String {
        match self {
            Self::Read { path, message } => match path {
                Some(p) => format!("Read error at {}: {}", p.display(), message),
                None => format!("Read error: {}", message),
            },
            Self::Line {
                path,
                line,
                col,
                kind,
                excerpt,
            } => match path {
                Some(p) => format!(
                    "Config error at {}:{}:{}\n{}\n{}",
                    p.display(),
                    line,
                    col,
                    kind,
                    excerpt
                ),
                None => format!(
                    "Config error at line {}, column {}\n{}\n{}",
                    line, col, kind, excerpt
                ),
            },
        }
    }

    /// Access the optional path attached to this error.
    pub fn path(&self) -> Option<&Path> {
        match self {
            Self::Read { path, .. } | Self::Line { path, .. } => path.as_deref(),
        }
    }

    /// The line error kind, if this is a line error.
    pub fn line_error(&self) -> Option<&LineError> {
        match self {
            Self::Line { kind, .. } => Some(kind),
            Self::Read { .. } => None,
        }
    }
}

/// Build a small 2-3 line excerpt with a caret at `(line_no, col_no)`.
pub fn excerpt_at(source: &str, line_no: usize, col_no: usize) -> String {
    let lines: Vec<&str> = source.lines().collect();
    let total = lines.len();
    let start = max(1usize, line_no.saturating_sub(1));
    let end = min(total, line_no + 1);

    let mut out = String::new();
    for n in start..=end {
        let text = lines.get(n - 1).copied().unwrap_or("");
        let _ignored = writeln!(out, " {:>4} | {}", n, text);
        if n == line_no {
            let prefix = format!(" {:>4} | ", n);
            let _ignored = writeln!(
                out,
                "{}{}^",
                " ".repeat(prefix.len()),
                " ".repeat(col_no.saturating_sub(1))
            );
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn excerpt_points_at_column() {
        let src = "# bindings\nch=1 ev=2 key=A thres=30 BASIC 10\nch=1 ev=3 key=B\n";
        let ex = excerpt_at(src, 2, 11);
        let lines: Vec<&str> = ex.lines().collect();
        assert_eq!(lines.len(), 4);
        assert!(lines[1].ends_with("ch=1 ev=2 key=A thres=30 BASIC 10"));
        let caret = lines[2].find('^').expect("caret");
        let text_start = lines[1].find("ch=").expect("text");
        assert_eq!(caret - text_start, 10);
    }

    #[test]
    fn pretty_includes_location() {
        let err = Error::Line {
            path: Some(PathBuf::from("/tmp/drums.txt")),
            line: 3,
            col: 1,
            kind: LineError::ChannelTokenMissing,
            excerpt: String::new(),
        };
        let text = err.pretty();
        assert!(text.starts_with("Config error at /tmp/drums.txt:3:1"));
        assert!(text.contains("\"ch=\""));
        assert_eq!(err.line_error(), Some(&LineError::ChannelTokenMissing));
    }
}
