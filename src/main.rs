//! shipyardctl - CLI for the Shipyard build service and the Enrober deployment API

mod auth;
mod bundle;
mod cli;
mod client;
mod commands;
mod config;
mod error;
mod format;
mod models;
mod output;
#[cfg(test)]
mod testing;

use clap::{CommandFactory, Parser};
use cli::{
    Cli, Commands, CreateResource, DeleteResource, DeployResource, GetResource, ImportResource,
    PatchResource, SyncResource, UndeployResource, UpdateResource,
};
use client::ApiClient;
use commands::{application, deployment, environment, login, proxy};
use error::ShipyardError;
use output::Output;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    setup_logging(cli.verbose);
    config::load_env();

    let out = Output::new(cli.verbose);

    let command = match cli.command {
        Some(cmd) => cmd,
        None => {
            let _ = Cli::command().print_help();
            std::process::exit(1);
        }
    };

    let settings = match config::Settings::load(cli.config.as_deref(), command.tolerates_broken_config()) {
        Ok(settings) => settings,
        Err(e) => out.error(&e),
    };
    let mut client = match ApiClient::new(settings, &out) {
        Ok(client) => client,
        Err(e) => out.error(&e),
    };

    if let Err(e) = run(command, &mut client).await {
        match e.downcast_ref::<ShipyardError>() {
            Some(err) => out.error(err),
            None => {
                eprintln!("Error [sys]: {:#}", e);
                std::process::exit(2);
            }
        }
    }
}

fn setup_logging(verbose: bool) {
    // RUST_LOG wins; otherwise stay quiet unless --verbose
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(if verbose { "shipyardctl=debug" } else { "warn" }));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

async fn run(command: Commands, client: &mut ApiClient<'_>) -> anyhow::Result<()> {
    match command {
        Commands::Get(cmd) => match cmd.resource {
            GetResource::Applications { org, format } => application::list(client, &org, format).await,
            GetResource::Application { org, name, format } => {
                application::get(client, &org, &name, format).await
            }
            GetResource::Deployment {
                scope,
                name,
                all,
                format,
            } => deployment::get(client, &scope, &name, all, format).await,
            GetResource::Environment { scope, format } => environment::get(client, &scope, format).await,
            GetResource::Logs {
                scope,
                name,
                previous,
            } => deployment::logs(client, &scope, &name, previous).await,
        },

        Commands::Import(cmd) => match cmd.resource {
            ImportResource::Application {
                org,
                name,
                directory,
                runtime,
                env_vars,
            } => application::import(client, &org, &name, &directory, &runtime, &env_vars).await,
        },

        Commands::Delete(cmd) => match cmd.resource {
            DeleteResource::Application { scope, name, force } => {
                application::delete(client, &scope, &name, force).await
            }
            DeleteResource::Environment { scope } => environment::delete(client, &scope).await,
        },

        Commands::Deploy(cmd) => match cmd.resource {
            DeployResource::Application {
                scope,
                name,
                vars,
                replicas,
                force,
                format,
            } => deployment::deploy(client, &scope, &name, &vars, replicas, force, format).await,
            DeployResource::Proxy {
                scope,
                name,
                zip_path,
                base_path,
                target_path,
            } => proxy::deploy(client, &scope, &name, &zip_path, &base_path, &target_path).await,
        },

        Commands::Undeploy(cmd) => match cmd.resource {
            UndeployResource::Application { scope, name } => deployment::undeploy(client, &scope, &name).await,
        },

        Commands::Create(cmd) => match cmd.resource {
            CreateResource::Bundle {
                name,
                save,
                base_path,
                target_path,
            } => proxy::create(client.out(), &name, &save, &base_path, &target_path),
            CreateResource::Deployment {
                scope,
                name,
                public_hosts,
                private_hosts,
                replicas,
                pts_url,
                env_vars,
            } => {
                deployment::create(
                    client,
                    &scope,
                    &name,
                    &public_hosts,
                    &private_hosts,
                    replicas,
                    &pts_url,
                    &env_vars,
                )
                .await
            }
            CreateResource::Environment { scope, host_names } => {
                environment::create(client, &scope, &host_names).await
            }
        },

        Commands::Update(cmd) => match cmd.resource {
            UpdateResource::Deployment {
                scope,
                name,
                replicas,
                vars,
                format,
            } => deployment::update(client, &scope, &name, replicas, &vars, format).await,
            UpdateResource::Environment { scope, host_names } => {
                environment::update(client, &scope, &host_names).await
            }
        },

        Commands::Patch(cmd) => match cmd.resource {
            PatchResource::Deployment { scope, name, update } => {
                deployment::patch(client, &scope, &name, &update).await
            }
        },

        Commands::Sync(cmd) => match cmd.resource {
            SyncResource::Environment { scope } => environment::sync(client, &scope).await,
        },

        Commands::Login { username, password } => login::run(client, username, password).await,
    }
}
