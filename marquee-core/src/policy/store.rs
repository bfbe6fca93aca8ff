use std::{path::PathBuf, sync::Arc};

use parking_lot::RwLock;
use sha2::{Digest, Sha256};
use tokio::fs;
use tracing::{info, warn};

use super::{HeroPolicy, PolicyError};

/// Where the selection policy is read from.
#[derive(Debug, Clone)]
pub enum PolicySource {
    /// JSON file, re-read on every lookup and re-parsed when it changes.
    File(PathBuf),
    /// JSON document supplied through configuration.
    Inline(String),
    /// Always use the built-in policy.
    Builtin,
}

/// Why the effective policy looks the way it does.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PolicyOrigin {
    Loaded,
    Builtin,
    Fallback { reason: String },
}

/// A policy together with its fingerprint.
#[derive(Debug, Clone)]
pub struct EffectivePolicy {
    pub policy: HeroPolicy,
    pub fingerprint: String,
    pub origin: PolicyOrigin,
}

impl EffectivePolicy {
    fn new(policy: HeroPolicy, origin: PolicyOrigin) -> Self {
        let fingerprint = policy.fingerprint();
        Self {
            policy,
            fingerprint,
            origin,
        }
    }
}

#[derive(Debug)]
struct CachedPolicy {
    /// Digest of the raw source bytes; `None` when the source was unreadable.
    content_key: Option<String>,
    effective: Arc<EffectivePolicy>,
}

/// Read-through policy cache keyed by source content.
///
/// Unreadable or invalid sources never fail a lookup: the built-in default
/// policy is substituted and the problem is logged once per distinct source
/// state.
#[derive(Debug)]
pub struct PolicyStore {
    source: PolicySource,
    cached: RwLock<Option<CachedPolicy>>,
}

impl PolicyStore {
    pub fn new(source: PolicySource) -> Self {
        Self {
            source,
            cached: RwLock::new(None),
        }
    }

    pub fn builtin() -> Self {
        Self::new(PolicySource::Builtin)
    }

    pub fn source(&self) -> &PolicySource {
        &self.source
    }

    /// The policy in effect right now.
    pub async fn current(&self) -> Arc<EffectivePolicy> {
        let raw = match self.read_source().await {
            Ok(raw) => raw,
            Err(err) => {
                return self.remember(None, || {
                    warn!(error = %err, "hero policy unreadable; using default policy");
                    EffectivePolicy::new(
                        HeroPolicy::default(),
                        PolicyOrigin::Fallback {
                            reason: err.to_string(),
                        },
                    )
                });
            }
        };

        let Some(raw) = raw else {
            return self.remember(Some(String::new()), || {
                EffectivePolicy::new(
                    HeroPolicy::default(),
                    PolicyOrigin::Builtin,
                )
            });
        };

        let content_key = hex::encode(Sha256::digest(raw.as_bytes()));
        self.remember(Some(content_key), || {
            match HeroPolicy::from_json(&raw) {
                Ok(policy) => {
                    let effective =
                        EffectivePolicy::new(policy, PolicyOrigin::Loaded);
                    info!(
                        version = effective.policy.version,
                        fingerprint = %effective.fingerprint,
                        "hero policy loaded"
                    );
                    effective
                }
                Err(err) => {
                    warn!(error = %err, "hero policy invalid; using default policy");
                    EffectivePolicy::new(
                        HeroPolicy::default(),
                        PolicyOrigin::Fallback {
                            reason: err.to_string(),
                        },
                    )
                }
            }
        })
    }

    async fn read_source(&self) -> Result<Option<String>, PolicyError> {
        match &self.source {
            PolicySource::File(path) => fs::read_to_string(path)
                .await
                .map(Some)
                .map_err(|source| PolicyError::Io {
                    path: path.display().to_string(),
                    source,
                }),
            PolicySource::Inline(raw) => Ok(Some(raw.clone())),
            PolicySource::Builtin => Ok(None),
        }
    }

    fn remember(
        &self,
        content_key: Option<String>,
        build: impl FnOnce() -> EffectivePolicy,
    ) -> Arc<EffectivePolicy> {
        if let Some(cached) = self.cached.read().as_ref()
            && cached.content_key == content_key
        {
            return Arc::clone(&cached.effective);
        }

        let effective = Arc::new(build());
        *self.cached.write() = Some(CachedPolicy {
            content_key,
            effective: Arc::clone(&effective),
        });
        effective
    }
}
