//! Subject string and `.`-delimited single-segment wildcard matching
//! ("`*` wildcard matches one segment").

/// A thin wrapper around a `.`-delimited subject string.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Subject(String);

impl Subject {
    pub fn new(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// True if this subject matches `pattern`, treating `*` as a
    /// placeholder for exactly one `.`-delimited segment.
    pub fn matches(&self, pattern: &str) -> bool {
        matches(&self.0, pattern)
    }
}

impl std::fmt::Display for Subject {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Segment-by-segment match; `*` in `pattern` matches any one segment of
/// `subject`. Neither side supports a multi-segment wildcard.
pub fn matches(subject: &str, pattern: &str) -> bool {
    let mut subject_parts = subject.split('.');
    let mut pattern_parts = pattern.split('.');

    loop {
        match (subject_parts.next(), pattern_parts.next()) {
            (Some(s), Some(p)) => {
                if p != "*" && p != s {
                    return false;
                }
            }
            (None, None) => return true,
            _ => return false,
        }
    }
}
