//! Command handlers, one module per resource

pub mod application;
pub mod deployment;
pub mod environment;
pub mod login;
pub mod proxy;

use crate::cli::{OrgArgs, ScopeArgs};
use crate::error::{Result, ShipyardError};
use crate::models;

pub fn require_org(args: &OrgArgs) -> Result<&str> {
    present(args.org.as_deref()).ok_or(ShipyardError::MissingFlagOrEnv {
        flag: "org",
        env: "APIGEE_ORG",
    })
}

pub fn require_name(name: &Option<String>) -> Result<&str> {
    present(name.as_deref()).ok_or(ShipyardError::MissingFlag { flag: "name" })
}

/// Validated `{org, env}` pair
#[derive(Debug, Clone, PartialEq)]
pub struct Scope {
    pub org: String,
    pub env: String,
}

impl Scope {
    pub fn require(args: &ScopeArgs) -> Result<Self> {
        let org = present(args.org.as_deref()).ok_or(ShipyardError::MissingFlagOrEnv {
            flag: "org",
            env: "APIGEE_ORG",
        })?;
        let env = present(args.env.as_deref()).ok_or(ShipyardError::MissingFlagOrEnv {
            flag: "env",
            env: "APIGEE_ENV",
        })?;
        Ok(Self {
            org: org.to_string(),
            env: env.to_string(),
        })
    }

    /// `{org}:{env}`, the environment id Enrober uses
    pub fn shipyard_env(&self) -> String {
        models::shipyard_env(&self.org, &self.env)
    }
}

fn present(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}
