//! Line-oriented allow list of user name patterns.
//!
//! ```text
//! # platform operators
//! ^admin-[a-z]+$
//! ^system:serviceaccount:kube-system:
//! ```
//!
//! Blank lines and lines starting with `#` are ignored. Every other line is a
//! regex; a user is admitted when any of them matches. A file with no
//! patterns admits nobody.

use regex::Regex;
use std::path::Path;

use super::RuleSet;
use crate::error::{ProxyError, ProxyResult};

/// Users admitted by regex.
#[derive(Debug, Clone, Default)]
pub struct PatternRules {
    allow: Vec<Regex>,
}

impl PatternRules {
    /// Parse rules from text.
    ///
    /// # Errors
    ///
    /// Returns a configuration error naming the first line that is not a
    /// valid regex.
    pub fn parse(text: &str) -> ProxyResult<Self> {
        let allow = text
            .lines()
            .enumerate()
            .map(|(n, line)| (n + 1, line.trim()))
            .filter(|(_, line)| !line.is_empty() && !line.starts_with('#'))
            .map(|(n, line)| {
                Regex::new(line).map_err(|e| {
                    ProxyError::config(
                        format!("invalid user gating rule on line {n}: {line:?}"),
                        Some(Box::new(e)),
                    )
                })
            })
            .collect::<ProxyResult<Vec<_>>>()?;

        Ok(Self { allow })
    }

    /// Read and parse a rules file.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if the file cannot be read or parsed.
    pub fn from_file(path: &Path) -> ProxyResult<Self> {
        let text = std::fs::read_to_string(path).map_err(|e| {
            ProxyError::config(
                format!("cannot read user gating rules from {}", path.display()),
                Some(Box::new(e)),
            )
        })?;
        Self::parse(&text)
    }

    /// Number of patterns.
    #[must_use]
    pub fn len(&self) -> usize {
        self.allow.len()
    }

    /// Whether there are no patterns, so nobody is admitted.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.allow.is_empty()
    }
}

impl RuleSet for PatternRules {
    fn admits(&self, user: &str) -> bool {
        self.allow.iter().any(|re| re.is_match(user))
    }
}
