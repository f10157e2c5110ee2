//! Environment variable access
//!
//! Lookups go through [`Environment`] so resolution rules can be exercised
//! without mutating the process environment.

use std::collections::HashMap;

pub const DEVELOPMENT_ROOT: &str = "DEVELOPMENT_ROOT";
pub const TOOLCHAIN_ROOT: &str = "TOOLCHAIN_ROOT";
pub const CONFIG_OVERRIDE: &str = "TKMAKE_CONFIG";

pub trait Environment {
    /// Value of `key`; empty values count as unset.
    fn var(&self, key: &str) -> Option<String>;
}

/// The real process environment.
#[derive(Debug, Clone, Copy, Default)]
pub struct ProcessEnv;

impl Environment for ProcessEnv {
    fn var(&self, key: &str) -> Option<String> {
        std::env::var(key)
            .ok()
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
    }
}

impl Environment for HashMap<String, String> {
    fn var(&self, key: &str) -> Option<String> {
        self.get(key).filter(|v| !v.is_empty()).cloned()
    }
}

/// `ACME_WIDGET_DEFAULT_BRANCH` from `["acme", "widget"]` and `"DEFAULT_BRANCH"`.
pub fn scoped_key(scope: &[&str], suffix: &str) -> String {
    let mut key = String::new();
    for part in scope {
        for c in part.chars() {
            if c.is_ascii_alphanumeric() {
                key.push(c.to_ascii_uppercase());
            } else {
                key.push('_');
            }
        }
        key.push('_');
    }
    key.push_str(suffix);
    key
}
