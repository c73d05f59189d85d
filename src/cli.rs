//! CLI definition using clap

use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

use crate::format::FormatArg;

#[derive(Parser)]
#[command(name = "shipyardctl")]
#[command(version)]
#[command(about = "CLI for the Shipyard build service and the Enrober deployment API")]
#[command(long_about = r#"
shipyardctl wraps two management APIs:

  Shipyard  builds container images from application source archives
  Enrober   manages environments and deployments on the Kubernetes cluster

It can also generate Edge proxy bundles for deployed applications and upload
them to the Edge management API.

Before use, run `shipyardctl login` or export APIGEE_TOKEN.
"#)]
#[command(after_help = r#"
Examples:

  Import an application from the current directory:
    shipyardctl import application --name echo --directory . --org acme --runtime node:4

  Deploy revision 1 of it:
    shipyardctl deploy application --org acme --env test --name echo:1

  List active deployments:
    shipyardctl get deployment --org acme --env test --all

Environment:
  CLUSTER_TARGET, SSO_TARGET, MGMT_API_TARGET, APIGEE_TOKEN, APIGEE_ORG, APIGEE_ENV
"#)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// Print environment variables used and API calls made
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Config file (default is $HOME/.shipyardctl/config)
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Retrieve applications, deployments, environments or logs
    Get(GetCommand),

    /// Import an artifact into Shipyard
    Import(ImportCommand),

    /// Delete an application or environment
    Delete(DeleteCommand),

    /// Deploy an application to Enrober or a proxy to Edge
    Deploy(DeployCommand),

    /// Undeploy an active deployment
    Undeploy(UndeployCommand),

    /// Create a deployment, environment or proxy bundle
    Create(CreateCommand),

    /// Update an active deployment or environment
    Update(UpdateCommand),

    /// Patch an active deployment with raw JSON
    Patch(PatchCommand),

    /// Sync an environment with Edge
    Sync(SyncCommand),

    /// Get a new auth token
    #[command(after_help = "Examples:
  shipyardctl login -u orgAdmin@apigee.com")]
    Login {
        /// Apigee org admin username (or APIGEE_USERNAME)
        #[arg(short, long)]
        username: Option<String>,

        /// Apigee org admin password (or APIGEE_PASSWORD)
        #[arg(short, long)]
        password: Option<String>,
    },
}

impl Commands {
    /// Commands that run without the API, or that repair the config file
    pub fn tolerates_broken_config(&self) -> bool {
        matches!(
            self,
            Commands::Login { .. }
                | Commands::Create(CreateCommand {
                    resource: CreateResource::Bundle { .. }
                })
        )
    }
}

// ============ Shared Args ============

#[derive(Args, Debug, Clone)]
pub struct OrgArgs {
    /// Apigee organization name
    #[arg(short, long, env = "APIGEE_ORG")]
    pub org: Option<String>,
}

#[derive(Args, Debug, Clone)]
pub struct ScopeArgs {
    /// Apigee organization name
    #[arg(short, long, env = "APIGEE_ORG")]
    pub org: Option<String>,

    /// Apigee environment name
    #[arg(short, long, env = "APIGEE_ENV")]
    pub env: Option<String>,
}

#[derive(Args, Debug, Clone, Default)]
pub struct VarArgs {
    /// Environment variable to set, "KEY=VAL" (repeatable)
    #[arg(long = "env-var", value_name = "KEY=VAL")]
    pub env_vars: Vec<String>,

    /// Edge key-value map entry exposed as a variable, "NAME=MAP:KEY" (repeatable)
    #[arg(long = "edge-config", value_name = "NAME=MAP:KEY")]
    pub edge_configs: Vec<String>,
}

// ============ Get ============

#[derive(Args)]
pub struct GetCommand {
    #[command(subcommand)]
    pub resource: GetResource,
}

#[derive(Subcommand)]
pub enum GetResource {
    /// Retrieve all applications in an organization
    #[command(after_help = "Examples:
  shipyardctl get applications --org acme")]
    Applications {
        #[command(flatten)]
        org: OrgArgs,

        /// Output format
        #[arg(short, long, value_enum)]
        format: Option<FormatArg>,
    },

    /// Retrieve all revisions of an application, or one revision
    #[command(after_help = "Examples:
  shipyardctl get application --org acme --name echo
  shipyardctl get application --org acme --name echo:4")]
    Application {
        #[command(flatten)]
        org: OrgArgs,

        /// Application name and optional revision, ex. my-app[:4]
        #[arg(short, long)]
        name: Option<String>,

        /// Output format
        #[arg(short, long, value_enum)]
        format: Option<FormatArg>,
    },

    /// Retrieve an active deployment, or all of them
    #[command(after_help = "Examples:
  shipyardctl get deployment -o acme -e test -n echo
  shipyardctl get deployment -o acme -e test --all")]
    Deployment {
        #[command(flatten)]
        scope: ScopeArgs,

        /// Name of the deployment
        #[arg(short, long)]
        name: Option<String>,

        /// Retrieve all deployments
        #[arg(short, long)]
        all: bool,

        /// Output format
        #[arg(short, long, value_enum)]
        format: Option<FormatArg>,
    },

    /// Retrieve an environment
    #[command(after_help = "Examples:
  shipyardctl get environment -o acme -e test")]
    Environment {
        #[command(flatten)]
        scope: ScopeArgs,

        /// Output format
        #[arg(short, long, value_enum)]
        format: Option<FormatArg>,
    },

    /// Retrieve the logs of an active deployment
    #[command(after_help = "Examples:
  shipyardctl get logs -o acme -e test -n echo")]
    Logs {
        #[command(flatten)]
        scope: ScopeArgs,

        /// Name of the deployment
        #[arg(short, long)]
        name: Option<String>,

        /// Retrieve the previous container's logs
        #[arg(short, long)]
        previous: bool,
    },
}

// ============ Import ============

#[derive(Args)]
pub struct ImportCommand {
    #[command(subcommand)]
    pub resource: ImportResource,
}

#[derive(Subcommand)]
pub enum ImportResource {
    /// Import an application source directory into Shipyard
    ///
    /// The directory must contain a valid package.json. With --verbose the
    /// build output is streamed as it happens.
    #[command(after_help = "Examples:
  shipyardctl import application --name echo --directory . --org acme --runtime node:4")]
    Application {
        #[command(flatten)]
        org: OrgArgs,

        /// Application name
        #[arg(short, long)]
        name: Option<String>,

        /// Directory of the application source
        #[arg(short, long)]
        directory: Option<PathBuf>,

        /// Runtime and optional version, ex. node[:5]
        #[arg(short = 'u', long, default_value = "node:4")]
        runtime: String,

        /// Environment variable to set in the built image, "KEY=VAL" (repeatable)
        #[arg(long = "env-var", value_name = "KEY=VAL")]
        env_vars: Vec<String>,
    },
}

// ============ Delete ============

#[derive(Args)]
pub struct DeleteCommand {
    #[command(subcommand)]
    pub resource: DeleteResource,
}

#[derive(Subcommand)]
pub enum DeleteResource {
    /// Delete all revisions of an imported application
    #[command(after_help = "Examples:
  shipyardctl delete application -n echo --org acme
  shipyardctl delete application -n echo --org acme --env test --force")]
    Application {
        #[command(flatten)]
        scope: ScopeArgs,

        /// Name of the application
        #[arg(short, long)]
        name: Option<String>,

        /// Skip the prompt and undeploy any active deployment first (needs --env)
        #[arg(long)]
        force: bool,
    },

    /// Delete an environment
    #[command(after_help = "Examples:
  shipyardctl delete environment -o acme -e test")]
    Environment {
        #[command(flatten)]
        scope: ScopeArgs,
    },
}

// ============ Deploy / Undeploy ============

#[derive(Args)]
pub struct DeployCommand {
    #[command(subcommand)]
    pub resource: DeployResource,
}

#[derive(Subcommand)]
pub enum DeployResource {
    /// Deploy an application revision, or update an active deployment with --force
    #[command(after_help = "Examples:
  shipyardctl deploy application -o acme -e test -n echo:4

  Update the revision of an active deployment:
    shipyardctl deploy application -o acme -e test -n echo:5 --force

  Update an environment variable:
    shipyardctl deploy application -o acme -e test -n echo --force --env-var EXISTING_KEY=NEW_VAL

  Bounce a deployment:
    shipyardctl deploy application -o acme -e test -n echo --force")]
    Application {
        #[command(flatten)]
        scope: ScopeArgs,

        /// Name and revision of the application, ex. hello:3
        #[arg(short, long)]
        name: Option<String>,

        #[command(flatten)]
        vars: VarArgs,

        /// Number of replicas for a new deployment
        #[arg(long, default_value = "1")]
        replicas: i32,

        /// Update the active deployment instead of creating one
        #[arg(long)]
        force: bool,

        /// Output format
        #[arg(short, long, value_enum)]
        format: Option<FormatArg>,
    },

    /// Upload a proxy bundle to Edge, generating one if no zip is given
    #[command(after_help = "Examples:
  shipyardctl deploy proxy -o acme -e test -n echo
  shipyardctl deploy proxy -o acme -e test -n echo -z ./echo.zip")]
    Proxy {
        #[command(flatten)]
        scope: ScopeArgs,

        /// Name of the proxy
        #[arg(short, long)]
        name: Option<String>,

        /// Path to an existing proxy bundle zip
        #[arg(short = 'z', long)]
        zip_path: Option<PathBuf>,

        /// Proxy base path (defaults to /{name})
        #[arg(short, long)]
        base_path: Option<String>,

        /// Application public path (defaults to /{name})
        #[arg(short = 'p', long)]
        target_path: Option<String>,
    },
}

#[derive(Args)]
pub struct UndeployCommand {
    #[command(subcommand)]
    pub resource: UndeployResource,
}

#[derive(Subcommand)]
pub enum UndeployResource {
    /// Undeploy an active deployment
    #[command(after_help = "Examples:
  shipyardctl undeploy application -n echo -o acme -e test")]
    Application {
        #[command(flatten)]
        scope: ScopeArgs,

        /// Name of the deployment
        #[arg(short, long)]
        name: Option<String>,
    },
}

// ============ Create ============

#[derive(Args)]
pub struct CreateCommand {
    #[command(subcommand)]
    pub resource: CreateResource,
}

#[derive(Subcommand)]
pub enum CreateResource {
    /// Generate an Edge proxy bundle zip
    #[command(after_help = "Examples:
  shipyardctl create bundle -n echo
  shipyardctl create bundle -n echo --save ./out --base-path /api/echo")]
    Bundle {
        /// Proxy bundle name
        #[arg(short, long)]
        name: Option<String>,

        /// Directory to save the bundle zip in (defaults to the current directory)
        #[arg(short, long)]
        save: Option<PathBuf>,

        /// Proxy base path (defaults to /{name})
        #[arg(short, long)]
        base_path: Option<String>,

        /// Application public path (defaults to /{name})
        #[arg(short = 'p', long)]
        target_path: Option<String>,
    },

    /// Create a deployment from a Pod Template Spec URL
    #[command(after_help = "Examples:
  shipyardctl create deployment -o acme -e test -n echo --public-hosts echo.acme.net --private-hosts echo.internal --pts-url https://pts.example.com/echo")]
    Deployment {
        #[command(flatten)]
        scope: ScopeArgs,

        /// Name of the deployment
        #[arg(short, long)]
        name: Option<String>,

        /// Accepted public hosts
        #[arg(long)]
        public_hosts: String,

        /// Accepted private hosts
        #[arg(long)]
        private_hosts: String,

        /// Number of replicas
        #[arg(long, default_value = "1")]
        replicas: i32,

        /// URL of the Pod Template Spec
        #[arg(long)]
        pts_url: String,

        /// Environment variable to set, "KEY=VAL" (repeatable)
        #[arg(long = "env-var", value_name = "KEY=VAL")]
        env_vars: Vec<String>,
    },

    /// Create an environment
    #[command(after_help = "Examples:
  shipyardctl create environment -o acme -e test --hostnames test.acme.net")]
    Environment {
        #[command(flatten)]
        scope: ScopeArgs,

        /// Accepted host names (repeatable)
        #[arg(long = "hostnames", value_name = "HOST", required = true)]
        host_names: Vec<String>,
    },
}

// ============ Update / Patch / Sync ============

#[derive(Args)]
pub struct UpdateCommand {
    #[command(subcommand)]
    pub resource: UpdateResource,
}

#[derive(Subcommand)]
pub enum UpdateResource {
    /// Update revision, replicas or variables of an active deployment
    #[command(after_help = "Examples:
  shipyardctl update deployment -o acme -e test -n echo:5
  shipyardctl update deployment -o acme -e test -n echo --replicas 3")]
    Deployment {
        #[command(flatten)]
        scope: ScopeArgs,

        /// Name of the deployment and optional revision
        #[arg(short, long)]
        name: Option<String>,

        /// Number of replicas
        #[arg(long)]
        replicas: Option<i32>,

        #[command(flatten)]
        vars: VarArgs,

        /// Output format
        #[arg(short, long, value_enum)]
        format: Option<FormatArg>,
    },

    /// Replace the host names of an environment
    #[command(after_help = "Examples:
  shipyardctl update environment -o acme -e test --hostnames test.acme.net --hostnames www.acme.net")]
    Environment {
        #[command(flatten)]
        scope: ScopeArgs,

        /// Accepted host names (repeatable)
        #[arg(long = "hostnames", value_name = "HOST", required = true)]
        host_names: Vec<String>,
    },
}

#[derive(Args)]
pub struct PatchCommand {
    #[command(subcommand)]
    pub resource: PatchResource,
}

#[derive(Subcommand)]
pub enum PatchResource {
    /// Patch an active deployment with a JSON object of mutations
    #[command(after_help = r#"Examples:
  shipyardctl patch deployment -o acme -e test -n echo '{"replicas": 3, "publicHosts": "echo.acme.net"}'"#)]
    Deployment {
        #[command(flatten)]
        scope: ScopeArgs,

        /// Name of the deployment
        #[arg(short, long)]
        name: Option<String>,

        /// JSON object with the fields to change
        update: String,
    },
}

#[derive(Args)]
pub struct SyncCommand {
    #[command(subcommand)]
    pub resource: SyncResource,
}

#[derive(Subcommand)]
pub enum SyncResource {
    /// Sync an active environment with Edge
    #[command(after_help = "Examples:
  shipyardctl sync environment -o acme -e test")]
    Environment {
        #[command(flatten)]
        scope: ScopeArgs,
    },
}
