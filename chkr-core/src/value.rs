use std::fmt;

/// Expected value of a body check.
///
/// Comparison is done on [`canonical`](Self::canonical) strings, so a check written as
/// `1` matches a body holding `"1"`, `1` or `1.0`.
#[derive(Debug, Clone, PartialEq)]
pub enum ExpectedValue {
    Null,
    Bool(bool),
    /// Exact integer; covers the whole `i64` and `u64` ranges.
    Integer(i128),
    Number(f64),
    String(String),
}

impl ExpectedValue {
    #[must_use]
    pub fn canonical(&self) -> String {
        match self {
            Self::Null => "null".to_string(),
            Self::Bool(b) => b.to_string(),
            Self::Integer(i) => i.to_string(),
            Self::Number(n) => canonical_f64(*n),
            Self::String(s) => s.clone(),
        }
    }

    /// Whether a value taken from a response body is equal under canonical comparison.
    #[must_use]
    pub fn matches(&self, actual: &serde_json::Value) -> bool {
        self.canonical() == canonical_json(actual)
    }
}

impl fmt::Display for ExpectedValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.canonical())
    }
}

impl From<&str> for ExpectedValue {
    fn from(value: &str) -> Self {
        Self::String(value.to_string())
    }
}

impl From<String> for ExpectedValue {
    fn from(value: String) -> Self {
        Self::String(value)
    }
}

impl From<bool> for ExpectedValue {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<i64> for ExpectedValue {
    fn from(value: i64) -> Self {
        Self::Integer(value.into())
    }
}

impl From<u64> for ExpectedValue {
    fn from(value: u64) -> Self {
        Self::Integer(value.into())
    }
}

impl From<f64> for ExpectedValue {
    fn from(value: f64) -> Self {
        Self::Number(value)
    }
}

/// Canonical string of a JSON value pulled out of a response body.
pub(crate) fn canonical_json(value: &serde_json::Value) -> String {
    match value {
        serde_json::Value::Null => "null".to_string(),
        serde_json::Value::Bool(b) => b.to_string(),
        serde_json::Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                i.to_string()
            } else if let Some(u) = n.as_u64() {
                u.to_string()
            } else {
                n.as_f64().map(canonical_f64).unwrap_or_else(|| n.to_string())
            }
        }
        serde_json::Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

// Integral values print without a fraction so `1` and `1.0` agree.
fn canonical_f64(n: f64) -> String {
    if n.is_finite() && n.fract() == 0.0 && n.abs() < 1e15 {
        (n as i64).to_string()
    } else {
        n.to_string()
    }
}
