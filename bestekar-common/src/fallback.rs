//! Prioritized fallback chains
//!
//! Several places in the pipeline try a primary strategy and fall back to
//! progressively weaker ones: voice profile acquisition walks a mirror
//! list before settling for a placeholder, and song assembly falls back
//! to the instrumental track when mixing fails. This module models that
//! pattern once: an ordered list of named strategies, tried in order,
//! first success short-circuiting.

use std::fmt;
use tracing::{debug, warn};

/// Outcome of a successful chain run: the value plus the name of the
/// strategy that produced it.
#[derive(Debug)]
pub struct Chosen<T> {
    pub value: T,
    pub strategy: String,
}

/// All strategies failed; carries the per-strategy error messages in the
/// order they were attempted.
#[derive(Debug)]
pub struct Exhausted {
    pub goal: String,
    pub attempts: Vec<(String, String)>,
}

impl fmt::Display for Exhausted {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "all strategies for {} failed:", self.goal)?;
        for (name, error) in &self.attempts {
            write!(f, " [{}: {}]", name, error)?;
        }
        Ok(())
    }
}

impl std::error::Error for Exhausted {}

type Attempt<'a, T> = Box<dyn FnOnce() -> anyhow::Result<T> + 'a>;

/// Ordered list of named strategies for obtaining a `T`.
pub struct FallbackChain<'a, T> {
    goal: String,
    strategies: Vec<(String, Attempt<'a, T>)>,
}

impl<'a, T> FallbackChain<'a, T> {
    /// Create an empty chain. `goal` names what is being acquired and
    /// only appears in logs and error messages.
    pub fn new(goal: impl Into<String>) -> Self {
        Self {
            goal: goal.into(),
            strategies: Vec::new(),
        }
    }

    /// Append a strategy to the end of the chain.
    pub fn attempt(
        mut self,
        name: impl Into<String>,
        f: impl FnOnce() -> anyhow::Result<T> + 'a,
    ) -> Self {
        self.strategies.push((name.into(), Box::new(f)));
        self
    }

    /// Run strategies in order; the first success wins.
    pub fn run(self) -> Result<Chosen<T>, Exhausted> {
        let mut attempts = Vec::new();
        for (name, f) in self.strategies {
            match f() {
                Ok(value) => {
                    debug!(goal = %self.goal, strategy = %name, "fallback chain succeeded");
                    return Ok(Chosen {
                        value,
                        strategy: name,
                    });
                }
                Err(e) => {
                    warn!(goal = %self.goal, strategy = %name, error = %e, "strategy failed, trying next");
                    attempts.push((name, e.to_string()));
                }
            }
        }
        Err(Exhausted {
            goal: self.goal,
            attempts,
        })
    }
}
