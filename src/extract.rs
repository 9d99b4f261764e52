use regex::Regex;

// First contiguous run of digits, optionally with a fractional part.
// No sign, no exponent.
const DECIMAL_PATTERN: &str = r"[0-9]*\.?[0-9]+";

/// Pulls a floating-point observation out of free-form record text.
///
/// This is the single numeric-coercion path for every gauge, summary and
/// histogram observation, so it has to tolerate inputs like `"42 requests"`,
/// `"3.14ms"` or structured values stringified by a generic formatter.
///
/// The pattern is compiled once when the extractor is built and is read-only
/// afterwards.
#[derive(Debug, Clone)]
pub struct ValueExtractor {
    pattern: Regex,
}

impl ValueExtractor {
    pub fn new() -> ValueExtractor {
        ValueExtractor {
            pattern: Regex::new(DECIMAL_PATTERN).expect("decimal pattern is valid"),
        }
    }

    /// Returns the first decimal substring of `text` parsed as a float, or
    /// `None` when no such substring exists.
    pub fn extract(&self, text: &str) -> Option<f64> {
        self.pattern
            .find(text)
            .and_then(|m| m.as_str().parse().ok())
    }
}

impl Default for ValueExtractor {
    fn default() -> Self {
        ValueExtractor::new()
    }
}
