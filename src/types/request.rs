//! Generation request types.

use serde::{Deserialize, Serialize};

use crate::error::{ComposerError, Result};

/// Musical genre used for the prompt and the output file name.
///
/// Labels outside the known genres are kept verbatim in [`Style::Other`];
/// the pipeline does not reject them.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Style {
    #[default]
    Classical,
    Jazz,
    Pop,
    /// Any other label, passed through unchanged.
    Other(String),
}

impl Style {
    /// Maps a label to a style.
    ///
    /// Only the exact genre names map to known variants, so the caller's
    /// spelling is what ends up in file names and titles.
    pub fn from_label(label: &str) -> Self {
        match label {
            "Classical" => Style::Classical,
            "Jazz" => Style::Jazz,
            "Pop" => Style::Pop,
            _ => Style::Other(label.to_string()),
        }
    }

    /// Returns the display label of the style.
    pub fn label(&self) -> &str {
        match self {
            Style::Classical => "Classical",
            Style::Jazz => "Jazz",
            Style::Pop => "Pop",
            Style::Other(label) => label,
        }
    }

    /// Returns true for the genres the record layer lists.
    pub fn is_known(&self) -> bool {
        !matches!(self, Style::Other(_))
    }
}

impl From<String> for Style {
    fn from(label: String) -> Self {
        Style::from_label(&label)
    }
}

impl From<Style> for String {
    fn from(style: Style) -> Self {
        style.label().to_string()
    }
}

impl std::fmt::Display for Style {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

/// A request for one instrumental clip.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerationRequest {
    /// Genre of the clip.
    pub style: Style,
    /// Optional free-text description appended to the prompt.
    pub hint: Option<String>,
    /// Exact length of the output in seconds. Always > 0.
    pub duration_seconds: u32,
}

impl GenerationRequest {
    /// Creates a request, rejecting a zero duration.
    pub fn new(style: Style, hint: Option<String>, duration_seconds: u32) -> Result<Self> {
        if duration_seconds == 0 {
            return Err(ComposerError::invalid_duration(duration_seconds));
        }
        Ok(Self {
            style,
            hint,
            duration_seconds,
        })
    }

    /// Returns the hint with surrounding whitespace removed, or None if blank.
    pub fn trimmed_hint(&self) -> Option<&str> {
        self.hint
            .as_deref()
            .map(str::trim)
            .filter(|hint| !hint.is_empty())
    }
}
