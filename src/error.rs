//! Error types for shipyardctl
//!
//! Every failure a command can surface ends up as a `ShipyardError`, which
//! knows its category and the process exit code that goes with it.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ShipyardError {
    /// A required flag was not given and has no environment fallback
    #[error("Missing required flag '--{flag}'.")]
    MissingFlag { flag: &'static str },

    /// A required flag was not given and its environment fallback is unset too
    #[error("Missing required flag '--{flag}', or place in environment as {env}.")]
    MissingFlagOrEnv {
        flag: &'static str,
        env: &'static str,
    },

    #[error("Missing auth token. Run 'shipyardctl login' or place one in environment as APIGEE_TOKEN.")]
    MissingToken,

    #[error("Invalid value for '--{flag}': {reason}")]
    InvalidArgument { flag: &'static str, reason: String },

    #[error("Missing required revision number.\n\nIf you are trying to update an active deployment, please use the --force flag.")]
    MissingRevision,

    #[error("Provided runtime: \"{provided}\"\nSupported runtimes: \"{supported}\"")]
    UnsupportedRuntime { provided: String, supported: String },

    #[error("Invalid credentials. Failed to login.")]
    InvalidCredentials,

    #[error("Unable to authenticate. Please check your SSO target URL is correct.")]
    Unauthenticated,

    /// The API answered with a non-success status; the body was already printed
    #[error("{operation} failed with status {status}")]
    Api { operation: String, status: u16 },

    #[error("{0}")]
    BuildFailed(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("Archive error: {0}")]
    Zip(#[from] zip::result::ZipError),
}

impl ShipyardError {
    pub fn invalid(flag: &'static str, reason: impl Into<String>) -> Self {
        Self::InvalidArgument {
            flag,
            reason: reason.into(),
        }
    }

    pub fn api(operation: impl Into<String>, status: u16) -> Self {
        Self::Api {
            operation: operation.into(),
            status,
        }
    }

    /// Short category tag, printed next to the message
    pub fn category(&self) -> &'static str {
        match self {
            Self::MissingFlag { .. }
            | Self::MissingFlagOrEnv { .. }
            | Self::InvalidArgument { .. }
            | Self::MissingRevision
            | Self::UnsupportedRuntime { .. } => "in",
            Self::MissingToken | Self::InvalidCredentials | Self::Unauthenticated => "auth",
            Self::Api { status: 401 | 403, .. } => "auth",
            Self::Api { .. } | Self::BuildFailed(_) => "ext",
            Self::Http(_) => "net",
            Self::Config(_) | Self::Io(_) | Self::Json(_) | Self::Yaml(_) | Self::Zip(_) => "sys",
        }
    }

    pub fn exit_code(&self) -> i32 {
        match self.category() {
            "in" => 1,
            "auth" => 3,
            _ => 2,
        }
    }
}

pub type Result<T> = std::result::Result<T, ShipyardError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_org_message_names_flag_and_env() {
        let err = ShipyardError::MissingFlagOrEnv {
            flag: "org",
            env: "APIGEE_ORG",
        };
        assert_eq!(
            err.to_string(),
            "Missing required flag '--org', or place in environment as APIGEE_ORG."
        );
        assert_eq!(err.exit_code(), 1);
    }

    #[test]
    fn exit_codes_follow_category() {
        assert_eq!(ShipyardError::Unauthenticated.exit_code(), 3);
        assert_eq!(ShipyardError::api("get", 403).exit_code(), 3);
        assert_eq!(ShipyardError::api("get", 404).exit_code(), 2);
        assert_eq!(ShipyardError::Config("bad".into()).exit_code(), 2);
        assert_eq!(ShipyardError::MissingRevision.exit_code(), 1);
    }
}
