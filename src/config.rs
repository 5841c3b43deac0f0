//! Build configuration

use std::path::PathBuf;

use serde::Deserialize;

use crate::error::{Error, Result};

/// Environment variable overriding the compiler command template
pub const CXX_ENV: &str = "LOGIC_COMPILER_CXX";

pub const DEFAULT_COMPILER: &str = "g++ -O2 -fPIC -shared -w -o {libname} {csource}";

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct BuildConfig {
    /// Command template; `{libname}` and `{csource}` are substituted
    pub compiler: String,
    /// Where sources and artifacts are written
    pub build_dir: PathBuf,
    /// Initial state of the runtime switch gating each block's trace statement
    pub trace: bool,
    /// Keep the generated source after a successful build
    pub keep_source: bool,
    /// Reuse an existing artifact built from identical source
    pub reuse_cached: bool,
}

impl Default for BuildConfig {
    fn default() -> Self {
        Self {
            compiler: DEFAULT_COMPILER.to_string(),
            build_dir: std::env::temp_dir().join("logic_compiler"),
            trace: false,
            keep_source: false,
            reuse_cached: true,
        }
    }
}

impl BuildConfig {
    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json).map_err(|e| Error::InvalidConfig(e.to_string()))
    }

    pub fn with_env_overrides(mut self) -> Self {
        if let Ok(cxx) = std::env::var(CXX_ENV) {
            if !cxx.trim().is_empty() {
                tracing::debug!("compiler command overridden by {}", CXX_ENV);
                self.compiler = cxx;
            }
        }
        self
    }

    pub fn with_build_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.build_dir = dir.into();
        self
    }

    pub fn with_trace(mut self, trace: bool) -> Self {
        self.trace = trace;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = BuildConfig::default();
        assert!(config.compiler.contains("{libname}"));
        assert!(config.compiler.contains("{csource}"));
        assert!(config.build_dir.ends_with("logic_compiler"));
        assert!(config.reuse_cached);
        assert!(!config.trace);
    }

    #[test]
    fn test_partial_json_keeps_defaults() {
        let config = BuildConfig::from_json(r#"{"trace": true, "build_dir": "/tmp/x"}"#).unwrap();
        assert!(config.trace);
        assert_eq!(config.build_dir, PathBuf::from("/tmp/x"));
        assert_eq!(config.compiler, DEFAULT_COMPILER);
    }

    #[test]
    fn test_bad_json() {
        assert!(matches!(BuildConfig::from_json("{\"trace\": 3}"), Err(Error::InvalidConfig(_))));
    }
}
