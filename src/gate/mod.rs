//! Optional admission gating by user.
//!
//! A gate decides, per authenticated user, whether a request is let in at
//! all. Rule sets come from whatever owns them (a file on disk, a controller
//! watching a remote store); the HTTP layer only ever asks the gate for the
//! current [`RuleSet`] and checks the user against it.
//!
//! [`ReloadableGate`] is the bundled implementation: it holds one rule set
//! that can be swapped at runtime while requests are in flight.

pub mod rules;

pub use rules::PatternRules;

use parking_lot::RwLock;
use std::fmt;
use std::sync::Arc;

/// A set of admission rules.
pub trait RuleSet: fmt::Debug + Send + Sync {
    /// Whether `user` may make requests.
    fn admits(&self, user: &str) -> bool;
}

/// Source of the rule set currently in force.
pub trait UserGate: fmt::Debug + Send + Sync {
    /// The rules to apply to the next request, or `None` if none are loaded.
    fn rule_set(&self) -> Option<Arc<dyn RuleSet>>;
}

/// Gate holding a replaceable rule set.
#[derive(Debug, Default)]
pub struct ReloadableGate {
    current: RwLock<Option<Arc<dyn RuleSet>>>,
}

impl ReloadableGate {
    /// Create a gate enforcing `rules`, or no rules yet.
    #[must_use]
    pub fn new(rules: Option<Arc<dyn RuleSet>>) -> Self {
        Self {
            current: RwLock::new(rules),
        }
    }

    /// Swap in a new rule set. Requests already checked are unaffected.
    pub fn replace(&self, rules: Arc<dyn RuleSet>) {
        *self.current.write() = Some(rules);
    }
}

impl UserGate for ReloadableGate {
    fn rule_set(&self) -> Option<Arc<dyn RuleSet>> {
        self.current.read().clone()
    }
}
