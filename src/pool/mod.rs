use parking_lot::Mutex;
use serde::Serialize;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

use crate::providers::TextGenerator;

pub const DEFAULT_COOLDOWN: Duration = Duration::from_secs(60);
pub const DEFAULT_MAX_ERROR_COUNT: u32 = 5;

/// Pool of interchangeable primary-provider credentials. Selection is
/// first-eligible in pool order (stable, not round-robin), so a healthy
/// credential at the front is preferred as long as it stays eligible.
///
/// Credentials are constructed once at startup and live for the process
/// lifetime; `reset_all` is the only way to clear their state.
pub struct CredentialPool {
    credentials: Mutex<Vec<CredentialState>>,
    cooldown: Duration,
    max_error_count: u32,
}

struct CredentialState {
    label: String,
    client: Arc<dyn TextGenerator>,
    last_used_at: Option<Instant>,
    cooldown_until: Option<Instant>,
    error_count: u32,
    available: bool,
}

impl CredentialState {
    fn is_eligible(&self, now: Instant, max_error_count: u32) -> bool {
        self.cooldown_until.map_or(true, |until| until <= now)
            && self.error_count < max_error_count
    }
}

/// Handle returned by selection. Carries the bound client and the masked
/// label; the raw secret never leaves the pool.
#[derive(Clone)]
pub struct SelectedCredential {
    index: usize,
    pub label: String,
    pub client: Arc<dyn TextGenerator>,
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct PoolStatus {
    pub total: usize,
    pub eligible: usize,
    pub in_cooldown: usize,
    pub with_errors: usize,
}

impl CredentialPool {
    pub fn new(cooldown: Duration, max_error_count: u32) -> Self {
        Self {
            credentials: Mutex::new(Vec::new()),
            cooldown,
            max_error_count,
        }
    }

    pub fn add_credential(&self, secret: &str, client: Arc<dyn TextGenerator>) {
        let mut credentials = self.credentials.lock();
        let label = format!("{}#{} ({})", client.name(), credentials.len(), mask_secret(secret));
        info!("Adding credential to pool: {}", label);
        credentials.push(CredentialState {
            label,
            client,
            last_used_at: None,
            cooldown_until: None,
            error_count: 0,
            available: true,
        });
    }

    /// Recomputes eligibility for every credential, then hands out the
    /// first eligible one in pool order, updating its `last_used_at`.
    pub fn select_credential(&self) -> Option<SelectedCredential> {
        let now = Instant::now();
        let mut credentials = self.credentials.lock();

        for credential in credentials.iter_mut() {
            credential.available = credential.is_eligible(now, self.max_error_count);
        }

        let (index, credential) = credentials
            .iter_mut()
            .enumerate()
            .find(|(_, c)| c.available)?;

        credential.last_used_at = Some(now);
        debug!("Selected credential: {}", credential.label);

        Some(SelectedCredential {
            index,
            label: credential.label.clone(),
            client: Arc::clone(&credential.client),
        })
    }

    /// Rate-limit cooldown: base duration normally, escalated to 5x base
    /// once the error count reaches the hard-disable threshold.
    pub fn mark_rate_limited(&self, selected: &SelectedCredential) {
        let now = Instant::now();
        let mut credentials = self.credentials.lock();
        let Some(credential) = credentials.get_mut(selected.index) else {
            return;
        };

        credential.error_count += 1;
        credential.available = false;
        if credential.error_count >= self.max_error_count {
            credential.cooldown_until = Some(now + self.cooldown * 5);
            warn!(
                "Credential {} hard-disabled after {} errors (cooldown {}s)",
                credential.label,
                credential.error_count,
                (self.cooldown * 5).as_secs()
            );
        } else {
            credential.cooldown_until = Some(now + self.cooldown);
            warn!(
                "Credential {} rate limited, cooling down for {}s",
                credential.label,
                self.cooldown.as_secs()
            );
        }
    }

    /// A single generic error does not cool the credential down; only
    /// crossing the error threshold does.
    pub fn mark_error(&self, selected: &SelectedCredential) {
        let now = Instant::now();
        let mut credentials = self.credentials.lock();
        let Some(credential) = credentials.get_mut(selected.index) else {
            return;
        };

        credential.error_count += 1;
        if credential.error_count >= self.max_error_count {
            credential.available = false;
            credential.cooldown_until = Some(now + self.cooldown * 2);
            warn!(
                "Credential {} crossed error threshold ({}), cooling down for {}s",
                credential.label,
                credential.error_count,
                (self.cooldown * 2).as_secs()
            );
        } else {
            debug!(
                "Credential {} error count now {}/{}",
                credential.label, credential.error_count, self.max_error_count
            );
        }
    }

    /// Gradual recovery: one success undoes one error, never wiping a
    /// real error pattern in a single call.
    pub fn mark_success(&self, selected: &SelectedCredential) {
        let mut credentials = self.credentials.lock();
        let Some(credential) = credentials.get_mut(selected.index) else {
            return;
        };

        credential.error_count = credential.error_count.saturating_sub(1);
        debug!(
            "Credential {} success, error count now {}",
            credential.label, credential.error_count
        );
    }

    pub fn has_eligible(&self) -> bool {
        let now = Instant::now();
        self.credentials
            .lock()
            .iter()
            .any(|c| c.is_eligible(now, self.max_error_count))
    }

    pub fn status(&self) -> PoolStatus {
        let now = Instant::now();
        let credentials = self.credentials.lock();

        PoolStatus {
            total: credentials.len(),
            eligible: credentials
                .iter()
                .filter(|c| c.is_eligible(now, self.max_error_count))
                .count(),
            in_cooldown: credentials
                .iter()
                .filter(|c| c.cooldown_until.map_or(false, |until| until > now))
                .count(),
            with_errors: credentials.iter().filter(|c| c.error_count > 0).count(),
        }
    }

    /// Operator/test escape hatch: every credential back to its initial
    /// eligible state.
    pub fn reset_all(&self) {
        let mut credentials = self.credentials.lock();
        for credential in credentials.iter_mut() {
            credential.cooldown_until = None;
            credential.error_count = 0;
            credential.available = true;
        }
        info!("Reset all {} credentials", credentials.len());
    }

    pub fn len(&self) -> usize {
        self.credentials.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.credentials.lock().is_empty()
    }

    #[cfg(test)]
    fn cooldown_until(&self, index: usize) -> Option<Instant> {
        self.credentials.lock().get(index).and_then(|c| c.cooldown_until)
    }

    #[cfg(test)]
    fn error_count(&self, index: usize) -> u32 {
        self.credentials.lock().get(index).map(|c| c.error_count).unwrap_or(0)
    }
}

fn mask_secret(secret: &str) -> String {
    let chars: Vec<char> = secret.chars().collect();
    if chars.len() <= 8 {
        return "****".to_string();
    }
    let head: String = chars[..4].iter().collect();
    let tail: String = chars[chars.len() - 4..].iter().collect();
    format!("{}...{}", head, tail)
}
