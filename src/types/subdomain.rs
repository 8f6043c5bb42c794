// ABOUTME: DNS-compatible subdomain validation.
// ABOUTME: Ensures routing host rules are built from valid RFC 1123 labels.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use thiserror::Error;

use super::DeploymentId;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SubdomainError {
    #[error("subdomain cannot be empty")]
    Empty,

    #[error("subdomain exceeds maximum length of 63 characters")]
    TooLong,

    #[error("subdomain cannot start with a hyphen")]
    StartsWithHyphen,

    #[error("subdomain cannot end with a hyphen")]
    EndsWithHyphen,

    #[error("subdomain must be lowercase")]
    NotLowercase,

    #[error("invalid character in subdomain: '{0}'")]
    InvalidChar(char),
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Subdomain(String);

impl Subdomain {
    pub fn new(value: &str) -> Result<Self, SubdomainError> {
        if value.is_empty() {
            return Err(SubdomainError::Empty);
        }

        if value.len() > 63 {
            return Err(SubdomainError::TooLong);
        }

        if value.starts_with('-') {
            return Err(SubdomainError::StartsWithHyphen);
        }

        if value.ends_with('-') {
            return Err(SubdomainError::EndsWithHyphen);
        }

        for c in value.chars() {
            if c.is_ascii_uppercase() {
                return Err(SubdomainError::NotLowercase);
            }
            if !c.is_ascii_lowercase() && !c.is_ascii_digit() && c != '-' {
                return Err(SubdomainError::InvalidChar(c));
            }
        }

        Ok(Self(value.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

// Every deployment id is a valid label: 1-63 lowercase alphanumerics.
impl From<&DeploymentId> for Subdomain {
    fn from(id: &DeploymentId) -> Self {
        Self(id.as_str().to_string())
    }
}

impl fmt::Display for Subdomain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl Serialize for Subdomain {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.0.serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for Subdomain {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Self::new(&s).map_err(serde::de::Error::custom)
    }
}
