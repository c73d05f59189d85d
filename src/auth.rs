//! SSO login: collect credentials, exchange them for a bearer token, persist it

use dialoguer::{Input, Password};
use reqwest::{Client, RequestBuilder};
use serde::Deserialize;

use crate::config::{ConfigFile, Settings};
use crate::error::{Result, ShipyardError};
use crate::output::Output;

/// OAuth client credentials the SSO server expects from CLI tools
const CLIENT_AUTH: &str = "ZWRnZWNsaTplZGdlY2xpc2VjcmV0";

#[derive(Debug, Clone)]
pub struct Credentials {
    pub username: String,
    pub password: String,
    pub mfa: Option<String>,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
}

/// Fill in whatever the flags did not provide from the environment, then prompts
pub fn collect_credentials(username: Option<String>, password: Option<String>) -> Result<Credentials> {
    let from_env = |key: &str| std::env::var(key).ok().filter(|v| !v.is_empty());

    let username = match username.or_else(|| from_env("APIGEE_USERNAME")) {
        Some(u) => u,
        None => Input::<String>::new()
            .with_prompt("Enter your Apigee username")
            .interact_text()?
            .trim()
            .to_string(),
    };

    let password = match password.or_else(|| from_env("APIGEE_PASSWORD")) {
        Some(p) => p,
        None => Password::new()
            .with_prompt(format!("Enter password for username '{}'", username))
            .interact()?,
    };

    let mfa = Input::<String>::new()
        .with_prompt("Enter your MFA token or just press 'enter' to skip")
        .allow_empty(true)
        .interact_text()?;
    let mfa = Some(mfa.trim().to_string()).filter(|m| !m.is_empty());

    Ok(Credentials {
        username,
        password,
        mfa,
    })
}

pub fn token_request(http: &Client, sso_target: &str, creds: &Credentials) -> RequestBuilder {
    let mut url = format!("{}/oauth/token", sso_target.trim_end_matches('/'));
    if let Some(mfa) = &creds.mfa {
        url = format!("{}?mfa_token={}", url, mfa);
    }

    http.post(url)
        .header(reqwest::header::AUTHORIZATION, format!("Basic {}", CLIENT_AUTH))
        .header(reqwest::header::ACCEPT, "application/json;charset=utf-8")
        .form(&[
            ("username", creds.username.as_str()),
            ("password", creds.password.as_str()),
            ("grant_type", "password"),
        ])
}

/// Trade credentials for an access token
pub async fn exchange(http: &Client, sso_target: &str, creds: &Credentials) -> Result<String> {
    let response = token_request(http, sso_target, creds).send().await?;
    if response.status().as_u16() != 200 {
        tracing::debug!("SSO answered {}", response.status());
        return Err(ShipyardError::InvalidCredentials);
    }
    let token: TokenResponse = response.json().await?;
    Ok(token.access_token)
}

/// Write the token into the current context of the config file
pub fn persist(settings: &Settings, username: &str, token: &str) -> Result<()> {
    let mut config = ConfigFile::load_lenient(&settings.config_path)?;
    config.set_token(username, token);
    config.save(&settings.config_path)
}

/// Full login flow; returns the new token
pub async fn login(
    http: &Client,
    settings: &Settings,
    username: Option<String>,
    password: Option<String>,
    out: &Output,
) -> Result<String> {
    let creds = collect_credentials(username, password)?;
    authenticate(http, settings, &creds, out).await
}

/// Exchange already collected credentials and store the token
pub async fn authenticate(http: &Client, settings: &Settings, creds: &Credentials, out: &Output) -> Result<String> {
    let token = exchange(http, &settings.sso_target, creds).await?;
    tracing::debug!("Received access token for {}", creds.username);

    out.say("Writing credentials to current context");
    persist(settings, &creds.username, &token)?;
    out.say(&format!(
        "Successfully wrote credentials to {}",
        settings.config_path.display()
    ));
    Ok(token)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;
    use tempfile::TempDir;

    fn creds(mfa: Option<&str>) -> Credentials {
        Credentials {
            username: "admin@acme.com".into(),
            password: "s3cret&x".into(),
            mfa: mfa.map(String::from),
        }
    }

    #[test]
    fn token_request_posts_form_with_basic_auth() {
        let request = token_request(&Client::new(), "https://login.example.com/", &creds(None))
            .build()
            .unwrap();
        assert_eq!(request.method(), reqwest::Method::POST);
        assert_eq!(request.url().as_str(), "https://login.example.com/oauth/token");
        assert_eq!(
            request.headers()[reqwest::header::AUTHORIZATION],
            "Basic ZWRnZWNsaTplZGdlY2xpc2VjcmV0"
        );
        let body = request.body().and_then(|b| b.as_bytes()).unwrap();
        assert_eq!(
            std::str::from_utf8(body).unwrap(),
            "username=admin%40acme.com&password=s3cret%26x&grant_type=password"
        );
    }

    #[test]
    fn token_request_carries_mfa_token() {
        let request = token_request(&Client::new(), "https://login.example.com", &creds(Some("123456")))
            .build()
            .unwrap();
        assert_eq!(request.url().query(), Some("mfa_token=123456"));
    }

    #[test]
    fn persist_writes_token_to_config() {
        let dir = TempDir::new().unwrap();
        let path: PathBuf = dir.path().join("config");
        let settings = Settings::resolve(&ConfigFile::default(), path.clone(), |_| None);

        persist(&settings, "admin@acme.com", "tok-1").unwrap();

        let saved = ConfigFile::load(&path).unwrap();
        assert_eq!(saved.current().unwrap().user_info.token, "tok-1");
    }
}
