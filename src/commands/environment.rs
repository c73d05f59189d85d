//! Enrober environment commands

use anyhow::Result;

use crate::cli::ScopeArgs;
use crate::client::ApiClient;
use crate::commands::Scope;
use crate::format::{FormatArg, Presentation, Render};
use crate::models::{Environment, EnvironmentPatch};
use crate::output::Messages;

pub async fn get(client: &mut ApiClient<'_>, scope: &ScopeArgs, format: Option<FormatArg>) -> Result<()> {
    let env = Scope::require(scope)?.shipyard_env();
    let url = client.endpoints().environment(&env);

    let reply = client
        .fetch(|http, token| Ok(http.get(&url).bearer_auth(token)))
        .await?;
    client.out().report(
        "get environment",
        reply.status,
        &reply.body,
        &Messages::failure_only(format!("\nThere was an error retrieving {}", env)),
        Presentation::choose(format, Some(Render::Json)),
    )?;
    Ok(())
}

pub async fn create(client: &mut ApiClient<'_>, scope: &ScopeArgs, host_names: &[String]) -> Result<()> {
    let env = Scope::require(scope)?.shipyard_env();
    let url = client.endpoints().environments();
    let body = Environment {
        environment_name: env.clone(),
        host_names: host_names.to_vec(),
    };

    let reply = client
        .fetch(|http, token| Ok(http.post(&url).bearer_auth(token).json(&body)))
        .await?;
    client.out().report(
        "create environment",
        reply.status,
        &reply.body,
        &Messages::new(
            format!("\nCreation of {} was successful", env),
            format!("\nThere was a problem creating {}", env),
        ),
        Presentation::choose(None, Some(Render::Json)).with_banner(),
    )?;
    Ok(())
}

pub async fn update(client: &mut ApiClient<'_>, scope: &ScopeArgs, host_names: &[String]) -> Result<()> {
    let env = Scope::require(scope)?.shipyard_env();
    let url = client.endpoints().environment(&env);
    let body = EnvironmentPatch {
        host_names: host_names.to_vec(),
    };

    let reply = client
        .fetch(|http, token| Ok(http.patch(&url).bearer_auth(token).json(&body)))
        .await?;
    client.out().report(
        "update environment",
        reply.status,
        &reply.body,
        &Messages::new(
            format!("\nUpdate of {} was successful", env),
            format!("\nThere was a problem updating {}", env),
        ),
        Presentation::choose(None, Some(Render::Json)).with_banner(),
    )?;
    Ok(())
}

pub async fn delete(client: &mut ApiClient<'_>, scope: &ScopeArgs) -> Result<()> {
    let env = Scope::require(scope)?.shipyard_env();
    let url = client.endpoints().environment(&env);

    let reply = client
        .fetch(|http, token| Ok(http.delete(&url).bearer_auth(token)))
        .await?;
    client.out().report(
        "delete environment",
        reply.status,
        &reply.body,
        &Messages::new(
            format!("\nDeletion of {} was successful", env),
            format!("\nThere was a problem deleting {}", env),
        ),
        Presentation::choose(None, None),
    )?;
    Ok(())
}

/// PATCH with no body makes Enrober re-sync the environment with Edge
pub async fn sync(client: &mut ApiClient<'_>, scope: &ScopeArgs) -> Result<()> {
    let env = Scope::require(scope)?.shipyard_env();
    let url = client.endpoints().environment(&env);

    let reply = client
        .fetch(|http, token| Ok(http.patch(&url).bearer_auth(token)))
        .await?;
    client.out().report(
        "sync environment",
        reply.status,
        &reply.body,
        &Messages::new(
            format!("\nPatch of {} was successful\n", env),
            format!("\nThere was a problem syncing {}", env),
        ),
        Presentation::choose(None, Some(Render::Raw)).with_banner(),
    )?;
    Ok(())
}
