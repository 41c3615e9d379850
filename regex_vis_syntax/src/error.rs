use thiserror::Error;

/// Errors produced while building the syntax tree of a pattern.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ParseError {
    #[error("{msg} `{fragment}` (at offset {offset})")]
    Syntax { msg: String, fragment: String, offset: usize },

    #[error("nesting limit of {limit} exceeded (at offset {offset})")]
    NestLimitExceeded { limit: u32, offset: usize },

    /// The parsed tree doesn't render back into the original pattern. Only
    /// reported when the parser runs in debug mode.
    #[error("pattern `{pattern}` was rendered back as `{parsed}`")]
    RoundTrip { pattern: String, parsed: String },
}

impl ParseError {
    pub(crate) fn syntax<M, F>(msg: M, fragment: F) -> Self
    where
        M: Into<String>,
        F: Into<String>,
    {
        ParseError::Syntax {
            msg: msg.into(),
            fragment: fragment.into(),
            offset: 0,
        }
    }

    /// Moves a syntax error to the given offset within the pattern.
    pub(crate) fn at(self, new_offset: usize) -> Self {
        match self {
            ParseError::Syntax { msg, fragment, .. } => {
                ParseError::Syntax { msg, fragment, offset: new_offset }
            }
            other => other,
        }
    }
}
