//! Loosely-typed numeric values.

/// A numeric field as the backend sent it.
///
/// Mesh backends report rates, percentages and datapoint values as
/// strings (`"12.5"`, `"NaN"`), but some emit plain JSON numbers. Both
/// forms are accepted and kept verbatim; the engine decides how to parse.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(untagged))]
pub enum RawNumber {
    /// A JSON number.
    Number(f64),
    /// A string that may or may not hold a number.
    Text(String),
}

impl RawNumber {
    /// Parse into an `f64`.
    ///
    /// Returns `None` for text that is not a decimal number. Note that
    /// `"NaN"` parses to `f64::NAN`; callers that treat NaN as missing must
    /// check for it.
    pub fn to_f64(&self) -> Option<f64> {
        match self {
            RawNumber::Number(n) => Some(*n),
            RawNumber::Text(s) => s.trim().parse::<f64>().ok(),
        }
    }
}

impl From<&str> for RawNumber {
    fn from(s: &str) -> Self {
        RawNumber::Text(s.to_string())
    }
}

impl From<String> for RawNumber {
    fn from(s: String) -> Self {
        RawNumber::Text(s)
    }
}

impl From<f64> for RawNumber {
    fn from(n: f64) -> Self {
        RawNumber::Number(n)
    }
}
