#![forbid(unsafe_code)]

//! Binding behavior configuration.
//!
//! With the `policy-config` feature, a [`BindingConfig`] can be loaded from
//! TOML or JSON so the policy can ship as data:
//!
//! ```toml
//! link_cache = "advance_on_subscribe"
//! replay_latest = true
//! ```
//!
//! Missing keys take their [`Default`] values.

/// When a link's cached value advances during a chain rebuild.
///
/// A link's value is only re-subscribed when it differs by identity from the
/// cached one, so this decides what "the cached one" is for values that do
/// not raise change notifications.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(
    feature = "policy-config",
    derive(serde::Serialize, serde::Deserialize),
    serde(rename_all = "snake_case")
)]
pub enum LinkCachePolicy {
    /// Cache every new value, notifying or not. A non-notifying value that
    /// stays in place is evaluated but never probed again.
    #[default]
    AdvanceOnChange,
    /// Cache only values that accepted a subscription. A non-notifying value
    /// leaves the link empty, so it is probed again on every rebuild.
    AdvanceOnSubscribe,
}

/// Per-binding behavior knobs.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(
    feature = "policy-config",
    derive(serde::Serialize, serde::Deserialize),
    serde(default)
)]
pub struct BindingConfig {
    /// Link cache policy for chain rebuilds.
    pub link_cache: LinkCachePolicy,
    /// Send the last published result to observers that join an already
    /// live binding.
    pub replay_latest: bool,
}

impl Default for BindingConfig {
    fn default() -> Self {
        Self {
            link_cache: LinkCachePolicy::default(),
            replay_latest: true,
        }
    }
}

impl BindingConfig {
    #[must_use]
    pub fn with_link_cache(mut self, policy: LinkCachePolicy) -> Self {
        self.link_cache = policy;
        self
    }

    #[must_use]
    pub fn with_replay_latest(mut self, replay: bool) -> Self {
        self.replay_latest = replay;
        self
    }
}

/// Failure loading a [`BindingConfig`].
#[cfg(feature = "policy-config")]
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

#[cfg(feature = "policy-config")]
impl BindingConfig {
    /// Parse a configuration from TOML.
    pub fn from_toml_str(input: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(input)?)
    }

    /// Parse a configuration from JSON.
    pub fn from_json_str(input: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(input)?)
    }
}
