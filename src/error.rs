//! Error taxonomy for the FHIRPath engine.
//!
//! Every failure mode from lexing through evaluation is one variant here so
//! callers can match on `kind()` without parsing message strings.

use thiserror::Error;

/// Result type alias used throughout the crate.
pub type Result<T> = std::result::Result<T, FhirPathError>;

/// A 1-based line/column position inside FHIRPath source text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Position {
    /// Byte offset into the source.
    pub offset: usize,
    /// 1-based line number.
    pub line: usize,
    /// 1-based column number.
    pub column: usize,
}

impl Position {
    /// Compute line/column for a byte offset into `source`.
    pub fn from_offset(source: &str, offset: usize) -> Self {
        let mut line = 1;
        let mut col = 1;
        for ch in source[..offset.min(source.len())].chars() {
            if ch == '\n' {
                line += 1;
                col = 1;
            } else {
                col += 1;
            }
        }
        Self {
            offset,
            line,
            column: col,
        }
    }
}

impl std::fmt::Display for Position {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.line, self.column)
    }
}

/// Comprehensive error type for FHIRPath compilation and evaluation.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum FhirPathError {
    /// Lexical error: unrecognized token or unterminated literal.
    #[error("lex error at {position}: {message}")]
    LexError {
        /// Human-readable description of the failure.
        message: String,
        /// Source position of the failure.
        position: Position,
    },

    /// Parse error: structural failure while building the expression tree.
    #[error("parse error at {position}: expected {expected}, got {found}")]
    ParseError {
        /// What the parser expected to see.
        expected: String,
        /// What it found instead.
        found: String,
        /// Source position of the failure.
        position: Position,
    },

    /// Function called with the wrong number of arguments.
    #[error(
        "function '{name}' expects {min}{} arguments, got {actual}",
        max.map(|m| if m == *min { String::new() } else { format!("-{m}") }).unwrap_or_else(|| "+".to_string())
    )]
    ArityError {
        /// Function name.
        name: String,
        /// Minimum accepted argument count.
        min: usize,
        /// Maximum accepted argument count, `None` if variadic.
        max: Option<usize>,
        /// Argument count actually supplied.
        actual: usize,
    },

    /// Operator or function applied to incompatible operand types.
    #[error("type error: {message}")]
    TypeError {
        /// Human-readable description.
        message: String,
    },

    /// `single()` saw more than one element, or a scalar-only context
    /// was handed a multi-element collection.
    #[error("singleton error: {message}")]
    SingletonError {
        /// Human-readable description.
        message: String,
    },

    /// Recursion depth, collection size, or deadline exceeded.
    #[error("resource limit exceeded: {message}")]
    ResourceLimitError {
        /// Human-readable description.
        message: String,
    },

    /// Evaluation was aborted via the cancellation handle or timeout.
    #[error("evaluation cancelled")]
    CancellationError,

    /// The resolver callback returned an error, surfaced verbatim.
    #[error("resolver error: {0}")]
    ResolverError(String),

    /// Unknown function name referenced in an expression.
    #[error("unknown function: {0}")]
    UnknownFunction(String),

    /// Unknown variable name referenced via `%name`.
    #[error("unknown variable: {0}")]
    UnknownVariable(String),

    /// Arithmetic failure (division by zero, overflow, incompatible units).
    #[error("arithmetic error: {0}")]
    ArithmeticError(String),
}

impl FhirPathError {
    /// Short, stable tag identifying the error kind (for programmatic matching).
    pub fn kind(&self) -> &'static str {
        match self {
            Self::LexError { .. } => "LexError",
            Self::ParseError { .. } => "ParseError",
            Self::ArityError { .. } => "ArityError",
            Self::TypeError { .. } => "TypeError",
            Self::SingletonError { .. } => "SingletonError",
            Self::ResourceLimitError { .. } => "ResourceLimitError",
            Self::CancellationError => "CancellationError",
            Self::ResolverError(_) => "ResolverError",
            Self::UnknownFunction(_) => "UnknownFunction",
            Self::UnknownVariable(_) => "UnknownVariable",
            Self::ArithmeticError(_) => "ArithmeticError",
        }
    }

    pub(crate) fn arity(name: impl Into<String>, min: usize, max: Option<usize>, actual: usize) -> Self {
        Self::ArityError {
            name: name.into(),
            min,
            max,
            actual,
        }
    }

    pub(crate) fn type_error(message: impl Into<String>) -> Self {
        Self::TypeError {
            message: message.into(),
        }
    }

    pub(crate) fn singleton(message: impl Into<String>) -> Self {
        Self::SingletonError {
            message: message.into(),
        }
    }

    pub(crate) fn limit(message: impl Into<String>) -> Self {
        Self::ResourceLimitError {
            message: message.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn position_tracks_lines() {
        let src = "line1\nline2\nline3";
        let pos = Position::from_offset(src, 7);
        assert_eq!(pos.line, 2);
        assert_eq!(pos.column, 2);
    }

    #[test]
    fn arity_message_formats_min_max() {
        let err = FhirPathError::arity("substring", 1, Some(2), 3);
        assert!(err.to_string().contains("substring"));
        assert_eq!(err.kind(), "ArityError");
    }
}
