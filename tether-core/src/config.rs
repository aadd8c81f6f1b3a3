//! Binder configuration.
//!
//! Hosts normally use [`BinderConfig::default`]. A host that never replays
//! effects (no debug double-invoke) can switch to immediate disposal, and a
//! host that manages bulk cleanup itself can turn off tracking.

use serde::Deserialize;

use crate::error::{Error, Result};

/// When a record whose interest dropped to zero is disposed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Deferral {
    /// Dispose on the next microtask turn unless interest comes back first.
    #[default]
    Microtask,

    /// Dispose synchronously inside the releasing cleanup.
    Immediate,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct BinderConfig {
    pub deferral: Deferral,

    /// Register constructed records with the thread's tracking registry so
    /// that [`crate::teardown_all`] can retire them.
    pub track: bool,

    /// Optional name attached to every log event emitted by the binder.
    pub label: Option<String>,
}

impl Default for BinderConfig {
    fn default() -> Self {
        Self {
            deferral: Deferral::Microtask,
            track: true,
            label: None,
        }
    }
}

impl BinderConfig {
    /// Parse a configuration from a JSON document.
    ///
    /// Missing fields fall back to their defaults.
    pub fn from_json(source: &str) -> Result<Self> {
        serde_json::from_str(source).map_err(|e| Error::Config(e.to_string()))
    }

    pub fn with_deferral(mut self, deferral: Deferral) -> Self {
        self.deferral = deferral;
        self
    }

    pub fn with_tracking(mut self, track: bool) -> Self {
        self.track = track;
        self
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    pub(crate) fn label(&self) -> &str {
        self.label.as_deref().unwrap_or("-")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_defer_and_track() {
        let config = BinderConfig::default();
        assert_eq!(config.deferral, Deferral::Microtask);
        assert!(config.track);
        assert_eq!(config.label(), "-");
    }

    #[test]
    fn parses_partial_json() {
        let config = BinderConfig::from_json(r#"{ "deferral": "immediate" }"#).unwrap();
        assert_eq!(config.deferral, Deferral::Immediate);
        assert!(config.track);

        let config = BinderConfig::from_json(r#"{ "track": false, "label": "counter" }"#).unwrap();
        assert_eq!(config.deferral, Deferral::Microtask);
        assert!(!config.track);
        assert_eq!(config.label(), "counter");
    }

    #[test]
    fn rejects_unknown_deferral() {
        let err = BinderConfig::from_json(r#"{ "deferral": "later" }"#).unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }
}
