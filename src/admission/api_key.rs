//! API key storage and constant-time matching
//!
//! Keys are opaque secrets generated once per deployment. The store validates a
//! presented secret in constant time over the whole key set, then checks the
//! enabled flag and the usage-plan binding. Secrets are zeroized on drop and
//! never rendered by `Debug` or logged.

use subtle::ConstantTimeEq;
use uuid::Uuid;
use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::config::GatewayConfig;

use super::AdmissionError;

/// A configured API key.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct ApiKey {
    #[zeroize(skip)]
    pub id: String,
    secret: String,
    #[zeroize(skip)]
    pub enabled: bool,
    /// Usage plan this key is bound to.
    #[zeroize(skip)]
    pub plan: String,
}

impl std::fmt::Debug for ApiKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApiKey")
            .field("id", &self.id)
            .field("secret", &"<redacted>")
            .field("enabled", &self.enabled)
            .field("plan", &self.plan)
            .finish()
    }
}

impl ApiKey {
    pub fn new(
        id: impl Into<String>,
        secret: impl Into<String>,
        enabled: bool,
        plan: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            secret: secret.into(),
            enabled,
            plan: plan.into(),
        }
    }

    /// Generate a fresh key bound to the given plan.
    ///
    /// 256 bits of randomness rendered as 64 hex characters. The caller is
    /// responsible for emitting the secret over a sensitive channel exactly once.
    pub fn generate(id: impl Into<String>, plan: impl Into<String>) -> Self {
        let secret = format!(
            "{}{}",
            Uuid::new_v4().simple(),
            Uuid::new_v4().simple()
        );
        Self::new(id, secret, true, plan)
    }

    /// The secret value. Only the keygen path should read this.
    pub fn expose_secret(&self) -> &str {
        &self.secret
    }

    fn matches(&self, presented: &str) -> bool {
        self.secret.as_bytes().ct_eq(presented.as_bytes()).into()
    }
}

/// Identity attached to an admitted request, available to handlers as an
/// axum request extension.
#[derive(Debug, Clone)]
pub struct KeyIdentity {
    pub key_id: String,
    pub plan: String,
}

/// The deployment's key registry, bound to one active usage plan.
#[derive(Debug)]
pub struct KeyStore {
    keys: Vec<ApiKey>,
    active_plan: String,
}

impl KeyStore {
    pub fn new(keys: Vec<ApiKey>, active_plan: impl Into<String>) -> Self {
        Self {
            keys,
            active_plan: active_plan.into(),
        }
    }

    /// Build the store from validated configuration.
    pub fn from_config(config: &GatewayConfig) -> Self {
        let keys = config
            .api_keys
            .iter()
            .map(|entry| ApiKey::new(&entry.id, &entry.secret, entry.enabled, &entry.plan))
            .collect();
        Self::new(keys, config.active_plan.clone())
    }

    pub fn active_plan(&self) -> &str {
        &self.active_plan
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    /// Validate a presented secret.
    ///
    /// The secret comparison visits every configured key without early exit so
    /// timing does not reveal which (if any) key prefix-matched. The enabled and
    /// plan-binding checks run after the match and are logged, but the caller
    /// receives the same `InvalidKey` either way.
    pub fn authenticate(&self, presented: &str) -> Result<KeyIdentity, AdmissionError> {
        let mut matched: Option<&ApiKey> = None;
        for key in &self.keys {
            if key.matches(presented) && matched.is_none() {
                matched = Some(key);
            }
        }

        let key = matched.ok_or_else(|| {
            tracing::warn!("api key rejected: no matching key");
            AdmissionError::InvalidKey
        })?;

        if !key.enabled {
            tracing::warn!(key_id = %key.id, "api key rejected: key disabled");
            return Err(AdmissionError::InvalidKey);
        }

        if key.plan != self.active_plan {
            tracing::warn!(
                key_id = %key.id,
                bound_plan = %key.plan,
                active_plan = %self.active_plan,
                "api key rejected: not bound to active plan"
            );
            return Err(AdmissionError::InvalidKey);
        }

        Ok(KeyIdentity {
            key_id: key.id.clone(),
            plan: key.plan.clone(),
        })
    }
}
