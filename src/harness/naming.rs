// src/harness/naming.rs
use rand::Rng;
use serde_json::{json, Map, Value};
use std::collections::BTreeMap;

use crate::config::{AccountConfig, DeploymentConfig};

/// `n` random lowercase ASCII letters.
pub fn random_id(n: usize) -> String {
    let mut rng = rand::thread_rng();
    (0..n).map(|_| rng.gen_range('a'..='z')).collect()
}

/// Name and tags shared by every resource of one test run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommonName {
    pub name: String,
    pub environment: String,
    pub tags: BTreeMap<String, String>,
}

impl CommonName {
    pub fn generate(account: &AccountConfig, deployment: &DeploymentConfig) -> Self {
        Self::with_id(account, deployment, &random_id(8))
    }

    pub fn with_id(account: &AccountConfig, deployment: &DeploymentConfig, id: &str) -> Self {
        let environment = format!("{}-{}", deployment.environment_name, id);
        let name = format!(
            "{}-{}-{}",
            deployment.project_name, deployment.service_name, environment
        )
        .to_lowercase();

        let account_name = account
            .profile
            .clone()
            .or_else(|| account.account_id.clone())
            .unwrap_or_default();
        let tags = BTreeMap::from([
            ("Account".to_string(), account_name),
            ("Region".to_string(), account.region.clone()),
            ("Project".to_string(), deployment.project_name.clone()),
            ("Service".to_string(), deployment.service_name.clone()),
            ("Environment".to_string(), environment.clone()),
        ]);

        Self {
            name,
            environment,
            tags,
        }
    }

    pub fn env_bucket_name(&self) -> String {
        format!("{}-env", self.name)
    }

    /// Variables every microservice module takes.
    pub fn base_vars(&self) -> Map<String, Value> {
        let bucket = self.env_bucket_name();
        let vars = json!({
            "common_name": self.name,
            "common_tags": self.tags,
            "microservice": {
                "ecs": {
                    "log": {
                        "retention_days": 1,
                        "prefix": "aws/ecs",
                    },
                    "task_definition": {
                        "env_bucket_name": bucket,
                    },
                },
                "bucket_env": {
                    "name": bucket,
                    "force_destroy": true,
                    "versioning": false,
                },
            },
        });

        vars.as_object().cloned().unwrap_or_default()
    }
}

/// Deep-merges `overlay` into `base`. Objects merge key by key, anything
/// else replaces.
pub fn merge_vars(base: &mut Map<String, Value>, overlay: Map<String, Value>) {
    for (key, value) in overlay {
        match value {
            Value::Object(incoming) if base.get(&key).is_some_and(Value::is_object) => {
                if let Some(Value::Object(existing)) = base.get_mut(&key) {
                    merge_vars(existing, incoming);
                }
            }
            value => {
                base.insert(key, value);
            }
        }
    }
}
