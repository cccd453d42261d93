//! Engine configuration.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::EngineError;

/// Options for building sessions and dispatching requests.
///
/// Deserializes from JSON with every field optional.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineOptions {
    /// Conditional symbols added to `GLIMPSE` and `DEBUG`.
    pub extra_symbols: Vec<String>,
    /// Namespaces imported after the defaults when a session is built.
    pub extra_imports: Vec<String>,
    /// How long a caller waits for the UI thread. `None` waits forever.
    pub dispatch_timeout_ms: Option<u64>,
    /// Whether to define the upper-cased OS name (`LINUX`, `MACOS`, ...).
    pub include_platform_symbol: bool,
}

impl Default for EngineOptions {
    fn default() -> Self {
        Self {
            extra_symbols: Vec::new(),
            extra_imports: Vec::new(),
            dispatch_timeout_ms: None,
            include_platform_symbol: true,
        }
    }
}

impl EngineOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn symbol(mut self, symbol: impl Into<String>) -> Self {
        self.extra_symbols.push(symbol.into());
        self
    }

    pub fn import(mut self, namespace: impl Into<String>) -> Self {
        self.extra_imports.push(namespace.into());
        self
    }

    pub fn dispatch_timeout(mut self, timeout: Duration) -> Self {
        self.dispatch_timeout_ms = Some(timeout.as_millis() as u64);
        self
    }

    pub fn include_platform_symbol(mut self, include: bool) -> Self {
        self.include_platform_symbol = include;
        self
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.dispatch_timeout_ms.map(Duration::from_millis)
    }

    pub fn from_json(json: &str) -> Result<Self, EngineError> {
        serde_json::from_str(json).map_err(|e| EngineError::Config(e.to_string()))
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, EngineError> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path)
            .map_err(|e| EngineError::Config(format!("{}: {}", path.display(), e)))?;
        Self::from_json(&json)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_fields_take_defaults() {
        let options = EngineOptions::from_json(r#"{"extra_symbols": ["TRACE"]}"#).unwrap();
        assert_eq!(options.extra_symbols, vec!["TRACE"]);
        assert!(options.include_platform_symbol);
        assert_eq!(options.timeout(), None);
    }

    #[test]
    fn test_builder() {
        let options = EngineOptions::new()
            .import("ui")
            .dispatch_timeout(Duration::from_millis(250))
            .include_platform_symbol(false);
        assert_eq!(options.extra_imports, vec!["ui"]);
        assert_eq!(options.timeout(), Some(Duration::from_millis(250)));
        assert!(!options.include_platform_symbol);
    }

    #[test]
    fn test_invalid_json_is_config_error() {
        assert!(matches!(
            EngineOptions::from_json("{not json"),
            Err(EngineError::Config(_))
        ));
    }
}
