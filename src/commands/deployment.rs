//! Enrober deployment commands

use anyhow::{Context, Result};
use serde_json::Value;

use crate::cli::{ScopeArgs, VarArgs};
use crate::client::ApiClient;
use crate::commands::{require_name, Scope};
use crate::error::ShipyardError;
use crate::format::{FormatArg, Presentation, Render};
use crate::models::{self, Deployment, DeploymentPatch, EnvVar, PtsDeployment};
use crate::output::Messages;

pub async fn get(
    client: &mut ApiClient<'_>,
    scope: &ScopeArgs,
    name: &Option<String>,
    all: bool,
    format: Option<FormatArg>,
) -> Result<()> {
    let scope = Scope::require(scope)?;
    let env = scope.shipyard_env();

    let (url, failure) = if all {
        (
            client.endpoints().deployments(&env),
            format!("\nThere was a problem retrieving deployments in {}", env),
        )
    } else {
        let name = require_name(name)?;
        (
            client.endpoints().deployment(&env, name),
            format!("\nThere was a problem retrieving {} in {}", name, env),
        )
    };

    let reply = client
        .fetch(|http, token| Ok(http.get(&url).bearer_auth(token)))
        .await?;
    client.out().report(
        "get deployment",
        reply.status,
        &reply.body,
        &Messages::failure_only(failure),
        get_presentation(format),
    )?;
    Ok(())
}

/// Deployments are shown whole unless a table is asked for
fn get_presentation(format: Option<FormatArg>) -> Presentation {
    Presentation::choose(format, Some(Render::Json))
}

pub async fn logs(
    client: &mut ApiClient<'_>,
    scope: &ScopeArgs,
    name: &Option<String>,
    previous: bool,
) -> Result<()> {
    let name = require_name(name)?;
    let scope = Scope::require(scope)?;
    let url = client.endpoints().logs(&scope.shipyard_env(), name, previous);

    let reply = client
        .fetch(|http, token| Ok(http.get(&url).bearer_auth(token)))
        .await?;

    // logs are plain text whatever the status
    let text = String::from_utf8_lossy(&reply.body);
    if !text.is_empty() {
        client.out().say(text.trim_end());
    }
    if !(200..300).contains(&reply.status) {
        return Err(ShipyardError::api("get logs", reply.status).into());
    }
    Ok(())
}

pub async fn undeploy(client: &mut ApiClient<'_>, scope: &ScopeArgs, name: &Option<String>) -> Result<()> {
    let name = require_name(name)?;
    let scope = Scope::require(scope)?;
    undeploy_named(client, &scope, name).await
}

pub async fn undeploy_named(client: &mut ApiClient<'_>, scope: &Scope, name: &str) -> Result<()> {
    let env = scope.shipyard_env();
    let url = client.endpoints().deployment(&env, name);

    let reply = client
        .fetch(|http, token| Ok(http.delete(&url).bearer_auth(token)))
        .await?;
    client.out().report(
        "undeploy application",
        reply.status,
        &reply.body,
        &Messages::new(
            format!("\nUndeployment of {} in {} was successful", name, env),
            format!("\nThere was a problem undeploying {} in {}", name, env),
        ),
        Presentation::choose(None, None),
    )?;
    Ok(())
}

fn collect_vars(vars: &VarArgs) -> Result<Vec<EnvVar>> {
    let mut all = models::parse_env_vars(&vars.env_vars)?;
    all.extend(models::parse_config_refs(&vars.edge_configs)?);
    Ok(all)
}

/// `deploy application`: create a deployment, or patch the active one with `--force`
pub async fn deploy(
    client: &mut ApiClient<'_>,
    scope: &ScopeArgs,
    name: &Option<String>,
    vars: &VarArgs,
    replicas: i32,
    force: bool,
    format: Option<FormatArg>,
) -> Result<()> {
    let full_name = require_name(name)?;
    let scope = Scope::require(scope)?;
    let env_vars = collect_vars(vars)?;
    let (app, revision) = models::split_name_revision(full_name)?;

    if force {
        let patch = DeploymentPatch {
            revision,
            replicas: None,
            env_vars,
        };
        return send_patch(client, &scope, app, &patch, format).await;
    }

    let revision = revision.ok_or(ShipyardError::MissingRevision)?;
    let body = Deployment {
        deployment_name: app.to_string(),
        revision,
        replicas,
        env_vars,
    };
    post_deployment(client, &scope, app, &body, format).await
}

/// `create deployment`: deployment from an externally built Pod Template Spec
#[allow(clippy::too_many_arguments)]
pub async fn create(
    client: &mut ApiClient<'_>,
    scope: &ScopeArgs,
    name: &Option<String>,
    public_hosts: &str,
    private_hosts: &str,
    replicas: i32,
    pts_url: &str,
    env_vars: &[String],
) -> Result<()> {
    let name = require_name(name)?;
    let scope = Scope::require(scope)?;
    let body = PtsDeployment {
        deployment_name: name.to_string(),
        public_hosts: public_hosts.to_string(),
        private_hosts: private_hosts.to_string(),
        replicas,
        pts_url: pts_url.to_string(),
        env_vars: models::parse_env_vars(env_vars)?,
    };
    post_deployment(client, &scope, name, &body, None).await
}

async fn post_deployment<T: serde::Serialize>(
    client: &mut ApiClient<'_>,
    scope: &Scope,
    name: &str,
    body: &T,
    format: Option<FormatArg>,
) -> Result<()> {
    let env = scope.shipyard_env();
    let url = client.endpoints().deployments(&env);

    let reply = client
        .fetch(|http, token| Ok(http.post(&url).bearer_auth(token).json(body)))
        .await?;
    client.out().report(
        "deploy application",
        reply.status,
        &reply.body,
        &Messages::new(
            format!("\nCreation of {} in {} was successful", name, env),
            format!("\nThere was a problem deploying {} in {}", name, env),
        ),
        Presentation::choose(format, None),
    )?;
    Ok(())
}

pub async fn update(
    client: &mut ApiClient<'_>,
    scope: &ScopeArgs,
    name: &Option<String>,
    replicas: Option<i32>,
    vars: &VarArgs,
    format: Option<FormatArg>,
) -> Result<()> {
    let full_name = require_name(name)?;
    let scope = Scope::require(scope)?;
    let (app, revision) = models::split_name_revision(full_name)?;
    let patch = DeploymentPatch {
        revision,
        replicas,
        env_vars: collect_vars(vars)?,
    };
    send_patch(client, &scope, app, &patch, format).await
}

async fn send_patch(
    client: &mut ApiClient<'_>,
    scope: &Scope,
    name: &str,
    patch: &DeploymentPatch,
    format: Option<FormatArg>,
) -> Result<()> {
    let body = serde_json::to_value(patch)?;
    patch_deployment(client, scope, name, &body, format).await
}

/// `patch deployment`: forward a user-written JSON object as is
pub async fn patch(
    client: &mut ApiClient<'_>,
    scope: &ScopeArgs,
    name: &Option<String>,
    update: &str,
) -> Result<()> {
    let name = require_name(name)?;
    let scope = Scope::require(scope)?;
    let body = parse_update(update)?;
    patch_deployment(client, &scope, name, &body, None).await
}

/// The update must be a JSON object
pub fn parse_update(update: &str) -> Result<Value> {
    let value: Value = serde_json::from_str(update).context("Update data is not valid JSON")?;
    if !value.is_object() {
        return Err(ShipyardError::invalid("update", "expected a JSON object").into());
    }
    Ok(value)
}

async fn patch_deployment(
    client: &mut ApiClient<'_>,
    scope: &Scope,
    name: &str,
    body: &Value,
    format: Option<FormatArg>,
) -> Result<()> {
    let env = scope.shipyard_env();
    let url = client.endpoints().deployment(&env, name);

    let reply = client
        .fetch(|http, token| Ok(http.patch(&url).bearer_auth(token).json(body)))
        .await?;
    client.out().report(
        "update deployment",
        reply.status,
        &reply.body,
        &Messages::new(
            format!("\nUpdate of {} in {} was successful", name, env),
            format!("\nThere was a problem updating {} in {}", name, env),
        ),
        Presentation::choose(format, None),
    )?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn vars_combine_plain_and_edge_config() {
        let vars = VarArgs {
            env_vars: vec!["PORT=9000".into()],
            edge_configs: vec!["SECRET=vault:token".into()],
        };
        let all = collect_vars(&vars).unwrap();
        assert_eq!(all.len(), 2);
        assert_eq!(all[0].value.as_deref(), Some("9000"));
        assert_eq!(all[1].value_from.as_ref().unwrap().edge_config_ref.key, "token");
    }

    #[test]
    fn deployment_defaults_to_full_json() {
        let p = get_presentation(None);
        assert_eq!(p.render, Some(Render::Json));
        assert!(!p.banner);

        let p = get_presentation(Some(FormatArg::GetDeps));
        assert_eq!(p.render, Some(Render::Deployments));
    }

    #[test]
    fn update_must_be_an_object() {
        assert_eq!(
            parse_update(r#"{"replicas": 3}"#).unwrap(),
            json!({"replicas": 3})
        );
        assert!(parse_update("[1, 2]").is_err());
        assert!(parse_update("{replicas: 3").is_err());
    }
}
