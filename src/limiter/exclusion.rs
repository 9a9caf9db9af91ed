//! Regex-based exemption from rate limiting.

use regex::Regex;

use crate::error::{ProxyError, ProxyResult};

/// Decides which users bypass rate limiting.
///
/// The pattern is compiled once and owned; there is no way to swap it after
/// construction.
#[derive(Debug, Clone, Default)]
pub struct ExclusionPolicy {
    pattern: Option<Regex>,
}

impl ExclusionPolicy {
    /// Compile `pattern`. An empty pattern exempts nobody.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if the pattern is not a valid regex.
    pub fn new(pattern: &str) -> ProxyResult<Self> {
        if pattern.is_empty() {
            return Ok(Self::default());
        }

        let pattern = Regex::new(pattern).map_err(|e| {
            ProxyError::config(
                format!("invalid regex passed to --ratelimit-exclude-pattern: {e}"),
                Some(Box::new(e)),
            )
        })?;

        Ok(Self {
            pattern: Some(pattern),
        })
    }

    /// Whether `user` is exempt. Unanchored: the pattern may match anywhere.
    #[must_use]
    pub fn matches(&self, user: &str) -> bool {
        self.pattern
            .as_ref()
            .is_some_and(|pattern| pattern.is_match(user))
    }

    /// The source pattern, if any.
    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        self.pattern.as_ref().map(Regex::as_str)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_pattern_exempts_nobody() -> ProxyResult<()> {
        let policy = ExclusionPolicy::new("")?;
        assert!(!policy.matches("system:admin"));
        assert!(!policy.matches(""));
        assert!(policy.as_str().is_none());
        Ok(())
    }

    #[test]
    fn test_pattern_matches_service_accounts() -> ProxyResult<()> {
        let policy = ExclusionPolicy::new("^system:serviceaccount:")?;
        assert!(policy.matches("system:serviceaccount:kube-system:controller"));
        assert!(!policy.matches("alice"));
        assert_eq!(policy.as_str(), Some("^system:serviceaccount:"));
        Ok(())
    }

    #[test]
    fn test_unanchored_match() -> ProxyResult<()> {
        let policy = ExclusionPolicy::new("bot")?;
        assert!(policy.matches("ci-bot-42"));
        Ok(())
    }

    #[test]
    fn test_invalid_pattern_is_config_error() {
        let result = ExclusionPolicy::new("([unclosed");
        assert!(matches!(result, Err(ProxyError::ConfigError { .. })));
    }
}
