//! Bounded repair of unparsable model output.
//!
//! When a delta cannot be parsed, the model is shown its own output and
//! asked to fix it. Only parse and validation failures qualify; transport
//! errors, including a blank repair reply, propagate untouched.

use std::time::Duration;

use tracing::{instrument, warn};

use chainfold_llm::{Generator, generate_text, truncate_for_log};
use chainfold_shared::{AppConfig, RepairConfig, Result};

/// How many repair round-trips a step may spend.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Repair calls allowed per segment. `0` disables repair.
    pub max_repairs: u32,
    /// Optional pause before each repair call.
    pub backoff: Option<Duration>,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_repairs: 1,
            backoff: None,
        }
    }
}

impl From<&RepairConfig> for RetryPolicy {
    fn from(config: &RepairConfig) -> Self {
        Self {
            max_repairs: config.max_repairs,
            backoff: (config.backoff_ms > 0).then(|| Duration::from_millis(config.backoff_ms)),
        }
    }
}

impl From<&AppConfig> for RetryPolicy {
    fn from(config: &AppConfig) -> Self {
        Self::from(&config.repair)
    }
}

impl RetryPolicy {
    /// Parse `raw`, asking `generator` to repair it on recoverable failures.
    ///
    /// Each repair prompt is built from the most recent bad output. The
    /// error from the last attempt is returned once the budget is spent, or
    /// straight away when `repair_prompt` yields `None`.
    #[instrument(skip_all, fields(max_repairs = self.max_repairs))]
    pub async fn parse_with_repair<T, P, R>(
        &self,
        generator: &dyn Generator,
        raw: String,
        parse: P,
        repair_prompt: R,
    ) -> Result<T>
    where
        P: Fn(&str) -> Result<T>,
        R: Fn(&str) -> Option<String>,
    {
        let mut current = raw;
        let mut attempts = 0;

        loop {
            match parse(&current) {
                Ok(value) => return Ok(value),
                Err(e) if e.is_recoverable() && attempts < self.max_repairs => {
                    let Some(prompt) = repair_prompt(&current) else {
                        return Err(e);
                    };
                    attempts += 1;
                    warn!(
                        attempt = attempts,
                        error = %e,
                        output = %truncate_for_log(&current, 120),
                        "unparsable output, requesting repair"
                    );
                    if let Some(delay) = self.backoff {
                        tokio::time::sleep(delay).await;
                    }
                    current = generate_text(generator, &prompt).await?;
                }
                Err(e) => return Err(e),
            }
        }
    }
}
