// ABOUTME: Persistence seam for deployment records and their env vars.
// ABOUTME: In-memory implementation backs the CLI and tests.

use parking_lot::RwLock;
use std::collections::HashMap;

use crate::types::DeploymentId;

use super::{DeployError, Deployment, EnvVar};

/// Storage for deployment records.
pub trait DeploymentStore: Send + Sync {
    /// Insert a new record. Fails with `AlreadyExists` if the subdomain is taken.
    fn add(&self, deployment: &Deployment) -> Result<(), DeployError>;

    /// Replace an existing record.
    fn update(&self, deployment: &Deployment) -> Result<(), DeployError>;

    fn get(&self, id: &DeploymentId) -> Result<Deployment, DeployError>;

    fn find_by_subdomain(&self, subdomain: &str) -> Option<Deployment>;

    fn find_by_clone_url(&self, clone_url: &str) -> Option<Deployment>;

    fn list(&self) -> Vec<Deployment>;

    /// Append env vars, keeping their order. Keys must be plain variable names.
    fn add_env_vars(&self, id: &DeploymentId, vars: &[EnvVar]) -> Result<(), DeployError>;

    /// Set the value of every env var named `key`.
    fn update_env_var(&self, id: &DeploymentId, key: &str, value: &str)
    -> Result<(), DeployError>;

    /// Remove every env var named `key`.
    fn delete_env_var(&self, id: &DeploymentId, key: &str) -> Result<(), DeployError>;
}

/// Process-local deployment records.
#[derive(Debug, Default)]
pub struct MemoryDeploymentStore {
    records: RwLock<HashMap<DeploymentId, Deployment>>,
}

impl MemoryDeploymentStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn with_record<T>(
        &self,
        id: &DeploymentId,
        f: impl FnOnce(&mut Deployment) -> Result<T, DeployError>,
    ) -> Result<T, DeployError> {
        let mut records = self.records.write();
        let record = records
            .get_mut(id)
            .ok_or_else(|| DeployError::NotFound(id.to_string()))?;
        f(record)
    }
}

impl DeploymentStore for MemoryDeploymentStore {
    fn add(&self, deployment: &Deployment) -> Result<(), DeployError> {
        let mut records = self.records.write();
        if records
            .values()
            .any(|d| d.subdomain == deployment.subdomain)
        {
            return Err(DeployError::AlreadyExists(deployment.subdomain.to_string()));
        }
        if records.contains_key(&deployment.id) {
            return Err(DeployError::StateConflict(deployment.id.to_string()));
        }
        records.insert(deployment.id.clone(), deployment.clone());
        Ok(())
    }

    fn update(&self, deployment: &Deployment) -> Result<(), DeployError> {
        self.with_record(&deployment.id, |record| {
            *record = deployment.clone();
            Ok(())
        })
    }

    fn get(&self, id: &DeploymentId) -> Result<Deployment, DeployError> {
        self.records
            .read()
            .get(id)
            .cloned()
            .ok_or_else(|| DeployError::NotFound(id.to_string()))
    }

    fn find_by_subdomain(&self, subdomain: &str) -> Option<Deployment> {
        self.records
            .read()
            .values()
            .find(|d| d.subdomain.as_str() == subdomain)
            .cloned()
    }

    fn find_by_clone_url(&self, clone_url: &str) -> Option<Deployment> {
        self.records
            .read()
            .values()
            .find(|d| d.clone_url == clone_url)
            .cloned()
    }

    fn list(&self) -> Vec<Deployment> {
        let mut all: Vec<Deployment> = self.records.read().values().cloned().collect();
        all.sort_by(|a, b| a.id.cmp(&b.id));
        all
    }

    fn add_env_vars(&self, id: &DeploymentId, vars: &[EnvVar]) -> Result<(), DeployError> {
        vars.iter().try_for_each(EnvVar::validate)?;
        self.with_record(id, |record| {
            record.env_vars.extend_from_slice(vars);
            Ok(())
        })
    }

    fn update_env_var(
        &self,
        id: &DeploymentId,
        key: &str,
        value: &str,
    ) -> Result<(), DeployError> {
        self.with_record(id, |record| {
            let mut found = false;
            for var in record.env_vars.iter_mut().filter(|v| v.key == key) {
                var.value = value.to_string();
                found = true;
            }
            if found {
                Ok(())
            } else {
                Err(DeployError::NotFound(format!("env var {}", key)))
            }
        })
    }

    fn delete_env_var(&self, id: &DeploymentId, key: &str) -> Result<(), DeployError> {
        self.with_record(id, |record| {
            let before = record.env_vars.len();
            record.env_vars.retain(|v| v.key != key);
            if record.env_vars.len() == before {
                return Err(DeployError::NotFound(format!("env var {}", key)));
            }
            Ok(())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::deploy::DeployErrorKind;
    use crate::deploy::testing::sample_deployment;

    #[test]
    fn env_var_update_and_delete_by_key() {
        let store = MemoryDeploymentStore::new();
        let d = sample_deployment();
        store.add(&d).unwrap();
        store
            .add_env_vars(&d.id, &[EnvVar::new("A", "1"), EnvVar::new("B", "2")])
            .unwrap();

        store.update_env_var(&d.id, "A", "10").unwrap();
        store.delete_env_var(&d.id, "B").unwrap();

        let vars = store.get(&d.id).unwrap().env_vars;
        assert_eq!(vars, vec![EnvVar::new("A", "10")]);

        let err = store.delete_env_var(&d.id, "B").unwrap_err();
        assert_eq!(err.kind(), DeployErrorKind::NotFound);
        let err = store.update_env_var(&d.id, "C", "x").unwrap_err();
        assert_eq!(err.kind(), DeployErrorKind::NotFound);
    }

    #[test]
    fn invalid_env_key_adds_nothing() {
        let store = MemoryDeploymentStore::new();
        let d = sample_deployment();
        store.add(&d).unwrap();

        let err = store
            .add_env_vars(&d.id, &[EnvVar::new("OK", "1"), EnvVar::new("NOT OK", "2")])
            .unwrap_err();
        assert_eq!(err.kind(), DeployErrorKind::InvalidEnvVar);
        assert!(store.get(&d.id).unwrap().env_vars.is_empty());
    }

    #[test]
    fn lookups_by_subdomain_and_clone_url() {
        let store = MemoryDeploymentStore::new();
        let d = sample_deployment();
        store.add(&d).unwrap();

        assert_eq!(store.find_by_subdomain("demo").unwrap().id, d.id);
        assert_eq!(store.find_by_clone_url(&d.clone_url).unwrap().id, d.id);
        assert!(store.find_by_subdomain("other").is_none());
    }
}
