//! Response generation
//!
//! Tiers are tried in order until one yields text: the primary remote
//! model, a cheaper secondary model, then canned local responses. Failed
//! remote attempts are counted across turns; once the count reaches the
//! policy maximum the pipeline apologises instead of calling out and starts
//! the next turn fresh.

mod local;
mod remote;
mod retry;

pub use local::{
    BASE_RESPONSES, GRATITUDE_RESPONSES, GREETING_RESPONSES, LocalResponder, QUESTION_RESPONSES,
    emotion_responses, topic_responses,
};
pub use remote::{PromptStyle, RemoteResponder};
pub use retry::{RetryPolicy, RetryState, delay_for_attempt, is_recoverable};

use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use crate::Result;
use crate::persona::Personality;
use crate::prefs::Preferences;

/// Reply used once the remote tiers have failed too often
pub const CONNECTION_TROUBLE: &str = "I'm having a little trouble connecting right now. \
     Let's pause for a moment, take a breath, and try again in a little while.";

/// One remote tier
#[async_trait]
pub trait Responder: Send + Sync {
    /// Whether a credential is configured
    fn is_configured(&self) -> bool;

    /// Replace the credential (`None` clears it)
    fn set_credential(&self, key: Option<String>);

    /// Produce a reply for `text` in the voice of `personality`
    ///
    /// # Errors
    ///
    /// Returns error on transport failure, a non-success status, a malformed
    /// payload or empty content
    async fn try_respond(&self, text: &str, personality: Personality) -> Result<String>;

    /// Tier name for logging
    fn name(&self) -> &'static str;
}

/// Ordered tiers plus the shared failure counter
pub struct ResponsePipeline {
    prefs: Preferences,
    primary: Option<Arc<dyn Responder>>,
    secondary: Option<Arc<dyn Responder>>,
    local: LocalResponder,
    policy: RetryPolicy,
    state: Mutex<RetryState>,
}

impl ResponsePipeline {
    /// Pipeline with only the local tier
    #[must_use]
    pub fn new(prefs: Preferences, policy: RetryPolicy) -> Self {
        Self {
            prefs,
            primary: None,
            secondary: None,
            local: LocalResponder::default(),
            policy,
            state: Mutex::new(RetryState::default()),
        }
    }

    #[must_use]
    pub fn with_primary(mut self, responder: Arc<dyn Responder>) -> Self {
        self.primary = Some(responder);
        self
    }

    #[must_use]
    pub fn with_secondary(mut self, responder: Arc<dyn Responder>) -> Self {
        self.secondary = Some(responder);
        self
    }

    #[must_use]
    pub fn with_local(mut self, local: LocalResponder) -> Self {
        self.local = local;
        self
    }

    /// Failed remote attempts since the last primary success
    #[must_use]
    pub fn attempts(&self) -> u32 {
        self.state.lock().map_or(0, |s| s.attempts)
    }

    /// Replace both remote credentials and start counting afresh
    pub fn set_credentials(&self, primary: Option<String>, secondary: Option<String>) {
        if let Some(tier) = &self.primary {
            tier.set_credential(primary);
        }
        if let Some(tier) = &self.secondary {
            tier.set_credential(secondary);
        }
        self.update(RetryState::reset);
    }

    /// Reply to one user turn
    ///
    /// Never fails; every failure path ends in some user-facing text. Callers
    /// await one turn before starting the next.
    pub async fn get_response(&self, text: &str) -> String {
        let personality = self.prefs.snapshot().personality;

        if let Some(apology) = self.apology_if_exhausted() {
            return apology;
        }

        if let Some(primary) = configured(self.primary.as_ref()) {
            let delay = delay_for_attempt(&self.policy, self.attempts());
            if !delay.is_zero() {
                tracing::debug!(delay_ms = delay.as_millis(), "backing off before primary tier");
                tokio::time::sleep(delay).await;
            }

            match primary.try_respond(text, personality).await {
                Ok(reply) => {
                    self.update(RetryState::reset);
                    return reply;
                }
                Err(e) => {
                    self.update(RetryState::record_failure);
                    tracing::warn!(
                        tier = primary.name(),
                        attempts = self.attempts(),
                        error = %e,
                        "completion failed"
                    );
                }
            }

            if let Some(apology) = self.apology_if_exhausted() {
                return apology;
            }
        }

        if let Some(secondary) = configured(self.secondary.as_ref()) {
            match secondary.try_respond(text, personality).await {
                Ok(reply) => return reply,
                Err(e) => {
                    self.update(RetryState::record_failure);
                    tracing::warn!(
                        tier = secondary.name(),
                        attempts = self.attempts(),
                        error = %e,
                        "completion failed"
                    );
                }
            }

            if let Some(apology) = self.apology_if_exhausted() {
                return apology;
            }
        }

        tracing::debug!("answering from local responses");
        self.local.respond(text)
    }

    /// The connection-trouble reply, resetting the counter, once exhausted
    fn apology_if_exhausted(&self) -> Option<String> {
        let mut state = self.state.lock().ok()?;
        if !state.exhausted(&self.policy) {
            return None;
        }

        tracing::warn!(attempts = state.attempts, "remote tiers exhausted");
        state.reset();
        Some(CONNECTION_TROUBLE.to_string())
    }

    fn update(&self, f: impl FnOnce(&mut RetryState)) {
        if let Ok(mut state) = self.state.lock() {
            f(&mut state);
        }
    }
}

/// A tier worth calling: attached and credentialed
fn configured(tier: Option<&Arc<dyn Responder>>) -> Option<&Arc<dyn Responder>> {
    let tier = tier?;
    if tier.is_configured() {
        Some(tier)
    } else {
        tracing::trace!(tier = tier.name(), "tier has no credential, skipping");
        None
    }
}
