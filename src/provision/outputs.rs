// src/provision/outputs.rs
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::collections::HashMap;

/// Root outputs of an applied module, keyed by output name.
#[derive(Debug, Clone, Default)]
pub struct StackOutputs {
    values: HashMap<String, serde_json::Value>,
}

#[derive(Deserialize)]
struct RawOutput {
    #[serde(default)]
    value: serde_json::Value,
}

impl StackOutputs {
    /// Parses the document printed by `terraform output -json`.
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        let raw: HashMap<String, RawOutput> = serde_json::from_str(json)?;
        Ok(Self {
            values: raw.into_iter().map(|(k, v)| (k, v.value)).collect(),
        })
    }

    pub fn get<T: DeserializeOwned>(&self, name: &str) -> Result<Option<T>, serde_json::Error> {
        match self.values.get(name) {
            None | Some(serde_json::Value::Null) => Ok(None),
            Some(value) => T::deserialize(value).map(Some),
        }
    }

    pub fn microservice(&self) -> Result<Option<MicroserviceOutputs>, serde_json::Error> {
        self.get("microservice")
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct MicroserviceOutputs {
    #[serde(default)]
    pub ecs: Option<EcsOutputs>,
    #[serde(default)]
    pub route53: Option<Route53Output>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct EcsOutputs {
    #[serde(default)]
    pub elb: Option<ElbOutput>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ElbOutput {
    pub lb_dns_name: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Route53Output {
    pub zone: ZoneOutput,
    pub record: RecordOutput,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ZoneOutput {
    pub name: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RecordOutput {
    pub subdomain_name: String,
}

impl MicroserviceOutputs {
    pub fn load_balancer_host(&self) -> Option<&str> {
        self.ecs
            .as_ref()
            .and_then(|ecs| ecs.elb.as_ref())
            .map(|elb| elb.lb_dns_name.as_str())
    }

    pub fn dns_host(&self) -> Option<String> {
        self.route53.as_ref().map(|route53| {
            format!(
                "{}.{}",
                route53.record.subdomain_name,
                route53.zone.name.trim_end_matches('.')
            )
        })
    }
}
