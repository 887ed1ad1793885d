use regex::Regex;
use thiserror::Error;

/// "lesson" in Hebrew, the word the roster has always used.
pub const DEFAULT_MARKER: &str = "שיעור";

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ResolveError {
    #[error("lesson label is empty")]
    Empty,

    #[error(
        "cannot parse lesson number from \"{raw}\"; expected \"{marker} X\" or a number (X can be 0 or higher)"
    )]
    Unparseable { raw: String, marker: String },
}

#[derive(Debug, Error)]
pub enum MarkerError {
    #[error("lesson marker must not be empty")]
    Empty,

    #[error("lesson marker must not contain digits")]
    ContainsDigit,

    #[error("lesson marker pattern failed to compile: {0}")]
    Pattern(#[from] regex::Error),
}

/// Reads and writes lesson labels for one marker word.
///
/// Accepted encodings, tried in order with the first match winning:
/// the marker followed by optional whitespace and digits anywhere in the
/// text, then a bare number. The canonical form is `"{marker} {n}"`.
#[derive(Debug, Clone)]
pub struct LessonFormat {
    marker: String,
    patterns: Vec<Regex>,
    negative: Regex,
}

impl LessonFormat {
    pub fn new(marker: &str) -> Result<Self, MarkerError> {
        let marker = marker.trim();
        if marker.is_empty() {
            return Err(MarkerError::Empty);
        }
        if marker.chars().any(|c| c.is_ascii_digit()) {
            return Err(MarkerError::ContainsDigit);
        }
        let m = regex::escape(marker);
        let patterns = vec![
            Regex::new(&format!(r"{m}\s*([0-9]+)"))?,
            Regex::new(r"^([0-9]+)$")?,
        ];
        let negative = Regex::new(&format!(r"(?:{m}\s*-[0-9]+)|(?:^-[0-9]+$)"))?;
        Ok(Self {
            marker: marker.to_string(),
            patterns,
            negative,
        })
    }

    pub fn resolve(&self, raw: &str) -> Result<u32, ResolveError> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Err(ResolveError::Empty);
        }
        for pattern in &self.patterns {
            if let Some(caps) = pattern.captures(trimmed) {
                return caps
                    .get(1)
                    .and_then(|m| m.as_str().parse::<u32>().ok())
                    .ok_or_else(|| self.unparseable(raw));
            }
        }
        Err(self.unparseable(raw))
    }

    pub fn label(&self, number: u32) -> String {
        format!("{} {}", self.marker, number)
    }

    /// True when the text carries an explicitly negative lesson number
    /// (`"{marker} -3"` or `"-3"`).
    pub fn is_negative(&self, raw: &str) -> bool {
        self.negative.is_match(raw.trim())
    }

    fn unparseable(&self, raw: &str) -> ResolveError {
        ResolveError::Unparseable {
            raw: raw.to_string(),
            marker: self.marker.clone(),
        }
    }
}
