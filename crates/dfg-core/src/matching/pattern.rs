//! Include/exclude patterns.
//!
//! A pattern spec is either `include` or `include!exclude`. A line matches
//! when it contains the include and, if an exclude is given, does not contain
//! the exclude. Among several configured patterns the first match wins.

use std::fmt;

const EXCLUDE_SEPARATOR: char = '!';

/// A parsed pattern spec.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Pattern {
    spec: String,
    include: String,
    exclude: Option<String>,
}

impl Pattern {
    /// Parse a pattern spec.
    ///
    /// Specs with more than one `!` are taken literally as an include; the
    /// config validator rejects them before they get here.
    pub fn parse(spec: &str) -> Self {
        let (include, exclude) = match spec.split_once(EXCLUDE_SEPARATOR) {
            Some((include, exclude)) if !exclude.contains(EXCLUDE_SEPARATOR) => {
                (include, Some(exclude).filter(|e| !e.is_empty()))
            }
            _ => (spec, None),
        };
        Self {
            spec: spec.to_string(),
            include: include.to_string(),
            exclude: exclude.map(str::to_string),
        }
    }

    /// The original spec string, used as the pattern's identifier.
    pub fn spec(&self) -> &str {
        &self.spec
    }

    pub fn include(&self) -> &str {
        &self.include
    }

    pub fn exclude(&self) -> Option<&str> {
        self.exclude.as_deref()
    }

    pub fn matches(&self, line: &str) -> bool {
        line.contains(self.include.as_str())
            && !self.exclude.as_deref().is_some_and(|e| line.contains(e))
    }
}

impl fmt::Display for Pattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.spec)
    }
}

/// Decides which configured pattern, if any, a line belongs to.
pub trait PatternMatcher: Send {
    fn matching_pattern(&self, line: &str) -> Option<&Pattern>;
}

/// Ordered list of patterns, first match wins.
#[derive(Debug, Clone, Default)]
pub struct PatternSet {
    patterns: Vec<Pattern>,
}

impl PatternSet {
    pub fn new<S: AsRef<str>>(specs: &[S]) -> Self {
        Self {
            patterns: specs.iter().map(|s| Pattern::parse(s.as_ref())).collect(),
        }
    }

    pub fn patterns(&self) -> &[Pattern] {
        &self.patterns
    }

    pub fn is_empty(&self) -> bool {
        self.patterns.is_empty()
    }
}

impl PatternMatcher for PatternSet {
    fn matching_pattern(&self, line: &str) -> Option<&Pattern> {
        self.patterns.iter().find(|p| p.matches(line))
    }
}
