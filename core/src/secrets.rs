//! Secret lookup at startup. A missing secret is fatal to the caller.

use crate::error::{SimError, SimResult};
use std::collections::HashMap;

pub trait SecretProvider {
    fn get_secret(&self, name: &str) -> SimResult<String>;
}

/// Reads secrets from the process environment, optionally under a prefix
/// (`prefix` + `name`).
#[derive(Debug, Clone, Default)]
pub struct EnvSecretProvider {
    prefix: String,
}

impl EnvSecretProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_prefix(prefix: impl Into<String>) -> Self {
        Self { prefix: prefix.into() }
    }
}

impl SecretProvider for EnvSecretProvider {
    fn get_secret(&self, name: &str) -> SimResult<String> {
        let key = format!("{}{name}", self.prefix);
        match std::env::var(&key) {
            Ok(value) if !value.is_empty() => Ok(value),
            Ok(_) => Err(SimError::config(format!("secret '{key}' is empty"))),
            Err(_) => Err(SimError::config(format!("secret '{key}' is not set"))),
        }
    }
}

/// Fixed secrets, for tests and embedded callers.
#[derive(Debug, Clone, Default)]
pub struct StaticSecretProvider {
    secrets: HashMap<String, String>,
}

impl StaticSecretProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, name: &str, value: &str) -> Self {
        self.secrets.insert(name.to_string(), value.to_string());
        self
    }
}

impl SecretProvider for StaticSecretProvider {
    fn get_secret(&self, name: &str) -> SimResult<String> {
        self.secrets
            .get(name)
            .cloned()
            .ok_or_else(|| SimError::config(format!("secret '{name}' is not set")))
    }
}
