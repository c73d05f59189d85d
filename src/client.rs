//! HTTP client for Shipyard, Enrober and the Edge management API
//!
//! Every call goes through [`ApiClient::send`], which attaches the bearer
//! token and retries exactly once after a fresh login when the API answers 401.

use reqwest::{Client, RequestBuilder, Response};

use crate::auth::{self, Credentials};
use crate::config::Settings;
use crate::error::{Result, ShipyardError};
use crate::output::Output;

const BUILD_BASE: &str = "/organizations";
const ENROBER_BASE: &str = "/environments";

/// URL construction for every endpoint the CLI talks to
#[derive(Debug, Clone)]
pub struct Endpoints {
    cluster: String,
}

impl Endpoints {
    pub fn new(cluster_target: &str) -> Self {
        Self {
            cluster: cluster_target.trim_end_matches('/').to_string(),
        }
    }

    pub fn apps(&self, org: &str) -> String {
        format!("{}{}/{}/apps", self.cluster, BUILD_BASE, org)
    }

    pub fn app(&self, org: &str, name: &str) -> String {
        format!("{}/{}", self.apps(org), name)
    }

    pub fn app_revision(&self, org: &str, name: &str, revision: i32) -> String {
        format!("{}/version/{}", self.app(org, name), revision)
    }

    pub fn environments(&self) -> String {
        format!("{}{}", self.cluster, ENROBER_BASE)
    }

    /// `shipyard_env` is the `{org}:{env}` pair
    pub fn environment(&self, shipyard_env: &str) -> String {
        format!("{}/{}", self.environments(), shipyard_env)
    }

    pub fn deployments(&self, shipyard_env: &str) -> String {
        format!("{}/deployments", self.environment(shipyard_env))
    }

    pub fn deployment(&self, shipyard_env: &str, name: &str) -> String {
        format!("{}/{}", self.deployments(shipyard_env), name)
    }

    pub fn logs(&self, shipyard_env: &str, name: &str, previous: bool) -> String {
        let base = format!("{}/logs", self.deployment(shipyard_env, name));
        if previous {
            format!("{}?previous=true", base)
        } else {
            base
        }
    }
}

/// Edge management API: import a proxy bundle zip
pub fn proxy_import_url(mgmt_target: &str, org: &str, name: &str) -> String {
    format!(
        "{}/v1/o/{}/apis?action=import&validate=false&name={}",
        mgmt_target.trim_end_matches('/'),
        org,
        name
    )
}

/// Status and fully read body of a response
#[derive(Debug)]
pub struct Reply {
    pub status: u16,
    pub body: Vec<u8>,
}

pub struct ApiClient<'a> {
    http: Client,
    settings: Settings,
    endpoints: Endpoints,
    out: &'a Output,
    /// Used for re-login instead of asking again
    credentials: Option<Credentials>,
}

impl<'a> ApiClient<'a> {
    pub fn new(settings: Settings, out: &'a Output) -> Result<Self> {
        let http = Client::builder()
            .user_agent(concat!("shipyardctl/", env!("CARGO_PKG_VERSION")))
            .build()?;
        let endpoints = Endpoints::new(&settings.cluster_target);
        Ok(Self {
            http,
            settings,
            endpoints,
            out,
            credentials: None,
        })
    }

    #[cfg(test)]
    pub fn with_credentials(mut self, credentials: Credentials) -> Self {
        self.credentials = Some(credentials);
        self
    }

    pub fn http(&self) -> &Client {
        &self.http
    }

    pub fn endpoints(&self) -> &Endpoints {
        &self.endpoints
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn out(&self) -> &Output {
        self.out
    }

    /// Send an authenticated request built by `build`
    ///
    /// `build` gets the client and the current token; it runs again with the
    /// refreshed token when the first attempt is rejected with 401.
    pub async fn send<F>(&mut self, build: F) -> Result<Response>
    where
        F: Fn(&Client, &str) -> Result<RequestBuilder>,
    {
        let token = self.settings.require_token()?.to_string();
        let response = self.execute(build(&self.http, &token)?).await?;
        if response.status().as_u16() != 401 {
            return Ok(response);
        }

        tracing::info!("Request rejected with 401, refreshing token");
        self.out
            .say("Your auth token is missing, invalid or expired. Please login again.");
        let token = self.relogin().await?;
        self.settings.token = Some(token.clone());

        let response = self.execute(build(&self.http, &token)?).await?;
        if response.status().as_u16() == 401 {
            return Err(ShipyardError::Unauthenticated);
        }
        Ok(response)
    }

    /// [`send`](Self::send), then read the whole body
    pub async fn fetch<F>(&mut self, build: F) -> Result<Reply>
    where
        F: Fn(&Client, &str) -> Result<RequestBuilder>,
    {
        let response = self.send(build).await?;
        let status = response.status().as_u16();
        let body = response.bytes().await?.to_vec();
        tracing::debug!("Received {} bytes with status {}", body.len(), status);
        Ok(Reply { status, body })
    }

    async fn relogin(&self) -> Result<String> {
        let credentials = match &self.credentials {
            Some(c) => c.clone(),
            None => auth::collect_credentials(None, None)?,
        };
        auth::authenticate(&self.http, &self.settings, &credentials, self.out).await
    }

    async fn execute(&self, builder: RequestBuilder) -> Result<Response> {
        let request = builder.build()?;
        if self.out.verbose() {
            self.out.dump(&self.describe_environment());
            self.out.dump(&describe_request(&request));
        }

        tracing::debug!("{} {}", request.method(), request.url());
        let response = self.http.execute(request).await?;

        if self.out.verbose() {
            self.out.dump(&describe_response(&response));
        }
        Ok(response)
    }

    fn describe_environment(&self) -> String {
        let mut lines = vec![
            "Current environment:".to_string(),
            format!("CLUSTER_TARGET={}", self.settings.cluster_target),
            format!("SSO_TARGET={}", self.settings.sso_target),
            format!("MGMT_API_TARGET={}", self.settings.mgmt_target),
        ];
        if let Some(key) = &self.settings.public_key {
            lines.push(format!("PUBLIC_KEY={}", key));
        }
        lines.join("\n")
    }
}

fn describe_request(request: &reqwest::Request) -> String {
    let mut dump = format!("\nRequest:\n{} {}\n", request.method(), request.url());
    for (name, value) in request.headers() {
        let shown = if name == reqwest::header::AUTHORIZATION {
            redact(value.to_str().unwrap_or_default())
        } else {
            String::from_utf8_lossy(value.as_bytes()).into_owned()
        };
        dump.push_str(&format!("{}: {}\n", name, shown));
    }
    if let Some(body) = request.body() {
        match body.as_bytes() {
            Some(bytes) => dump.push_str(&format!("\n{}", String::from_utf8_lossy(bytes))),
            None => dump.push_str("\n<streamed body>"),
        }
    }
    dump
}

fn describe_response(response: &Response) -> String {
    let mut dump = format!("\nResponse:\n{:?} {}\n", response.version(), response.status());
    for (name, value) in response.headers() {
        dump.push_str(&format!("{}: {}\n", name, String::from_utf8_lossy(value.as_bytes())));
    }
    dump
}

/// Keep the scheme and a short prefix of a credential header
fn redact(value: &str) -> String {
    match value.split_once(' ') {
        Some((scheme, secret)) if secret.chars().count() > 8 => {
            format!("{} {}...", scheme, secret.chars().take(8).collect::<String>())
        }
        Some((scheme, _)) => format!("{} ***", scheme),
        None => "***".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ConfigFile;
    use crate::testing::{serve, Canned};
    use std::path::Path;
    use tempfile::TempDir;

    fn endpoints() -> Endpoints {
        Endpoints::new("https://shipyard.example.com/")
    }

    #[test]
    fn deployment_url_uses_org_env_pair() {
        assert_eq!(
            endpoints().deployment("acme:test", "app"),
            "https://shipyard.example.com/environments/acme:test/deployments/app"
        );
    }

    #[test]
    fn application_urls() {
        let e = endpoints();
        assert_eq!(e.apps("acme"), "https://shipyard.example.com/organizations/acme/apps");
        assert_eq!(
            e.app_revision("acme", "echo", 4),
            "https://shipyard.example.com/organizations/acme/apps/echo/version/4"
        );
    }

    #[test]
    fn logs_url_with_previous_flag() {
        let e = endpoints();
        assert_eq!(
            e.logs("acme:test", "app", false),
            "https://shipyard.example.com/environments/acme:test/deployments/app/logs"
        );
        assert!(e.logs("acme:test", "app", true).ends_with("/logs?previous=true"));
    }

    #[test]
    fn environment_urls() {
        let e = endpoints();
        assert_eq!(e.environments(), "https://shipyard.example.com/environments");
        assert_eq!(
            e.environment("acme:test"),
            "https://shipyard.example.com/environments/acme:test"
        );
    }

    #[test]
    fn proxy_import_url_targets_management_api() {
        assert_eq!(
            proxy_import_url("https://api.enterprise.apigee.com", "acme", "echo"),
            "https://api.enterprise.apigee.com/v1/o/acme/apis?action=import&validate=false&name=echo"
        );
    }

    #[test]
    fn request_dump_redacts_token() {
        let request = Client::new()
            .get("https://shipyard.example.com/environments/acme:test")
            .bearer_auth("abcdefghijklmnop")
            .build()
            .unwrap();
        let dump = describe_request(&request);
        assert!(dump.contains("GET https://shipyard.example.com/environments/acme:test"));
        assert!(dump.contains("Bearer abcdefgh..."));
        assert!(!dump.contains("ijklmnop"));
    }

    fn stub_settings(base: &str, dir: &Path) -> Settings {
        Settings {
            cluster_target: base.to_string(),
            sso_target: base.to_string(),
            mgmt_target: base.to_string(),
            token: Some("stale-token".into()),
            public_key: None,
            config_path: dir.join("config"),
        }
    }

    fn admin() -> Credentials {
        Credentials {
            username: "admin@acme.com".into(),
            password: "s3cret".into(),
            mfa: None,
        }
    }

    #[tokio::test]
    async fn expired_token_is_refreshed_and_request_resent_once() {
        let (base, server) = serve(vec![
            Canned::status(401, ""),
            Canned::status(200, r#"{"access_token":"fresh-token"}"#),
            Canned::status(200, r#"[{"name":"echo"}]"#),
        ])
        .await;
        let dir = TempDir::new().unwrap();
        let out = Output::new(false);
        let mut client = ApiClient::new(stub_settings(&base, dir.path()), &out)
            .unwrap()
            .with_credentials(admin());
        let url = client.endpoints().apps("acme");

        let reply = client
            .fetch(|http, token| Ok(http.get(&url).bearer_auth(token)))
            .await
            .unwrap();
        assert_eq!(reply.status, 200);
        assert_eq!(reply.body, br#"[{"name":"echo"}]"#.to_vec());

        let requests = server.await.unwrap();
        assert_eq!(requests.len(), 3);
        assert!(requests[0].starts_with("get /organizations/acme/apps"));
        assert!(requests[0].contains("authorization: bearer stale-token"));
        assert!(requests[1].starts_with("post /oauth/token"));
        assert!(requests[2].starts_with("get /organizations/acme/apps"));
        assert!(requests[2].contains("authorization: bearer fresh-token"));

        let saved = ConfigFile::load(&dir.path().join("config")).unwrap();
        assert_eq!(saved.current().unwrap().user_info.token, "fresh-token");
        assert_eq!(client.settings().token.as_deref(), Some("fresh-token"));
    }

    #[tokio::test]
    async fn second_rejection_is_unauthenticated() {
        let (base, server) = serve(vec![
            Canned::status(401, ""),
            Canned::status(200, r#"{"access_token":"fresh-token"}"#),
            Canned::status(401, ""),
        ])
        .await;
        let dir = TempDir::new().unwrap();
        let out = Output::new(false);
        let mut client = ApiClient::new(stub_settings(&base, dir.path()), &out)
            .unwrap()
            .with_credentials(admin());
        let url = client.endpoints().environment("acme:test");

        let err = client
            .fetch(|http, token| Ok(http.get(&url).bearer_auth(token)))
            .await
            .unwrap_err();
        assert!(matches!(err, ShipyardError::Unauthenticated));
        assert_eq!(err.exit_code(), 3);
        assert_eq!(server.await.unwrap().len(), 3);
    }

    #[tokio::test]
    async fn rejected_login_stops_the_retry() {
        let (base, server) = serve(vec![Canned::status(401, ""), Canned::status(400, "{}")]).await;
        let dir = TempDir::new().unwrap();
        let out = Output::new(false);
        let mut client = ApiClient::new(stub_settings(&base, dir.path()), &out)
            .unwrap()
            .with_credentials(admin());
        let url = client.endpoints().apps("acme");

        let err = client
            .fetch(|http, token| Ok(http.get(&url).bearer_auth(token)))
            .await
            .unwrap_err();
        assert!(matches!(err, ShipyardError::InvalidCredentials));
        assert_eq!(server.await.unwrap().len(), 2);
    }

    #[test]
    fn short_secrets_are_fully_hidden() {
        assert_eq!(redact("Bearer abc"), "Bearer ***");
        assert_eq!(redact("opaque"), "***");
    }
}
