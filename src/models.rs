//! Request bodies sent to Enrober, and the flag parsers that produce them

use serde::{Deserialize, Serialize};

use crate::error::{Result, ShipyardError};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EnvVar {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value_from: Option<EnvVarSource>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EnvVarSource {
    pub edge_config_ref: ConfigRef,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConfigRef {
    pub name: String,
    pub key: String,
}

/// New deployment of an imported application revision
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Deployment {
    pub deployment_name: String,
    pub revision: i32,
    pub replicas: i32,
    pub env_vars: Vec<EnvVar>,
}

/// New deployment backed by an externally built Pod Template Spec
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PtsDeployment {
    pub deployment_name: String,
    pub public_hosts: String,
    pub private_hosts: String,
    pub replicas: i32,
    pub pts_url: String,
    pub env_vars: Vec<EnvVar>,
}

/// Partial update of an active deployment; absent fields stay untouched
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeploymentPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub revision: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub replicas: Option<i32>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub env_vars: Vec<EnvVar>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Environment {
    pub environment_name: String,
    pub host_names: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EnvironmentPatch {
    pub host_names: Vec<String>,
}

/// Enrober addresses an environment as `{org}:{env}`
pub fn shipyard_env(org: &str, env: &str) -> String {
    format!("{}:{}", org, env)
}

/// Split `name[:revision]`
pub fn split_name_revision(input: &str) -> Result<(&str, Option<i32>)> {
    match input.split_once(':') {
        None => Ok((input, None)),
        Some((name, rev)) => {
            let revision = rev.parse::<i32>().map_err(|_| {
                ShipyardError::invalid("name", format!("revision '{}' is not a number", rev))
            })?;
            Ok((name, Some(revision)))
        }
    }
}

/// Parse `KEY=VAL` pairs; the value may itself contain `=`
pub fn parse_env_vars(raw: &[String]) -> Result<Vec<EnvVar>> {
    raw.iter()
        .map(|pair| {
            let (name, value) = pair
                .split_once('=')
                .ok_or_else(|| ShipyardError::invalid("env-var", format!("expected KEY=VAL, got '{}'", pair)))?;
            Ok(EnvVar {
                name: name.to_string(),
                value: Some(value.to_string()),
                value_from: None,
            })
        })
        .collect()
}

/// Parse `NAME=CONFIG:KEY` references to Edge key-value maps
pub fn parse_config_refs(raw: &[String]) -> Result<Vec<EnvVar>> {
    raw.iter()
        .map(|pair| {
            let malformed = || {
                ShipyardError::invalid("edge-config", format!("expected NAME=CONFIG:KEY, got '{}'", pair))
            };
            let (name, reference) = pair.split_once('=').ok_or_else(malformed)?;
            let (config, key) = reference.split_once(':').ok_or_else(malformed)?;
            Ok(EnvVar {
                name: name.to_string(),
                value: None,
                value_from: Some(EnvVarSource {
                    edge_config_ref: ConfigRef {
                        name: config.to_string(),
                        key: key.to_string(),
                    },
                }),
            })
        })
        .collect()
}
