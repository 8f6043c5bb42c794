// ABOUTME: Environment variable value types with interpolation support.
// ABOUTME: Handles literal values and references to environment variables.

use crate::deploy::{EnvVar, validate_env_key};
use crate::error::{Error, Result};
use serde::Deserialize;

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum EnvValue {
    Literal(String),
    FromEnv {
        #[serde(rename = "env")]
        var: String,
        #[serde(default)]
        default: Option<String>,
    },
}

impl EnvValue {
    pub fn resolve(&self) -> Result<String> {
        match self {
            EnvValue::Literal(s) => Ok(s.clone()),
            EnvValue::FromEnv { var, default } => match std::env::var(var) {
                Ok(val) => Ok(val),
                Err(_) => default
                    .clone()
                    .ok_or_else(|| Error::MissingEnvVar(var.clone())),
            },
        }
    }
}

/// One `env` entry of a deployment manifest.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct EnvEntry {
    pub key: String,
    pub value: EnvValue,
}

/// Resolve manifest entries in order.
pub fn resolve_env_list(entries: &[EnvEntry]) -> Result<Vec<EnvVar>> {
    entries
        .iter()
        .map(|entry| {
            validate_env_key(&entry.key)?;
            let value = entry.value.resolve()?;
            Ok(EnvVar::new(entry.key.clone(), value))
        })
        .collect()
}
