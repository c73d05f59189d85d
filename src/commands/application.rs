//! Shipyard application commands: list, get, import, delete

use anyhow::{Context, Result};
use dialoguer::Input;
use regex::Regex;
use reqwest::multipart::{Form, Part};
use reqwest::Response;
use std::path::Path;
use std::sync::OnceLock;

use crate::bundle;
use crate::cli::{OrgArgs, ScopeArgs};
use crate::client::ApiClient;
use crate::commands::{deployment, require_name, require_org, Scope};
use crate::error::ShipyardError;
use crate::format::{FormatArg, Presentation, Render};
use crate::models;
use crate::output::{Messages, Output};

const SUPPORTED_RUNTIMES: &[&str] = &["node"];

const BUILD_SUMMARY: &str = r"Organization: [a-z0-9]+|Application: [a-z0-9]+|Revision: [a-z0-9]+";

fn build_summary() -> &'static Regex {
    static SUMMARY: OnceLock<Regex> = OnceLock::new();
    SUMMARY.get_or_init(|| Regex::new(BUILD_SUMMARY).expect("build summary pattern is valid"))
}

pub async fn list(client: &mut ApiClient<'_>, org: &OrgArgs, format: Option<FormatArg>) -> Result<()> {
    let org = require_org(org)?;
    let url = client.endpoints().apps(org);

    let reply = client
        .fetch(|http, token| Ok(http.get(&url).bearer_auth(token)))
        .await?;

    client.out().report(
        "get applications",
        reply.status,
        &reply.body,
        &Messages::failure_only("\nThere was an error retrieving your imported applications"),
        Presentation::choose(format, Some(Render::Apps)),
    )?;
    Ok(())
}

pub async fn get(
    client: &mut ApiClient<'_>,
    org: &OrgArgs,
    name: &Option<String>,
    format: Option<FormatArg>,
) -> Result<()> {
    let org = require_org(org)?;
    let full_name = require_name(name)?;
    let (app, revision) = models::split_name_revision(full_name)?;

    let (url, default) = match revision {
        Some(rev) => (client.endpoints().app_revision(org, app, rev), Render::AppRevision),
        None => (client.endpoints().app(org, app), Render::App),
    };

    let reply = client
        .fetch(|http, token| Ok(http.get(&url).bearer_auth(token)))
        .await?;

    client.out().report(
        "get application",
        reply.status,
        &reply.body,
        &Messages::failure_only(format!("\nThere was an error retrieving {} from {}", full_name, org)),
        Presentation::choose(format, Some(default)),
    )?;
    Ok(())
}

/// Runtime must be `{name}[:{version}]` with a supported name
pub fn validate_runtime(runtime: &str) -> Result<(), ShipyardError> {
    let name = runtime.split(':').next().unwrap_or_default();
    if SUPPORTED_RUNTIMES.contains(&name) {
        Ok(())
    } else {
        Err(ShipyardError::UnsupportedRuntime {
            provided: name.to_string(),
            supported: SUPPORTED_RUNTIMES.join(", "),
        })
    }
}

pub async fn import(
    client: &mut ApiClient<'_>,
    org: &OrgArgs,
    name: &Option<String>,
    directory: &Option<std::path::PathBuf>,
    runtime: &str,
    env_vars: &[String],
) -> Result<()> {
    let name = require_name(name)?;
    let org = require_org(org)?;
    let directory = directory
        .as_deref()
        .ok_or(ShipyardError::MissingFlag { flag: "directory" })?;
    validate_runtime(runtime)?;
    // reject malformed pairs before packing anything
    models::parse_env_vars(env_vars)?;

    let archive = pack_sources(directory, name)
        .with_context(|| format!("Failed to archive {:?}", directory))?;
    tracing::info!("Packed {} bytes of application source", archive.len());

    let url = client.endpoints().apps(org);
    let file_name = format!("{}.zip", name);

    let response = client
        .send(|http, token| {
            let part = Part::bytes(archive.clone())
                .file_name(file_name.clone())
                .mime_str("application/zip")?;
            let mut form = Form::new().part("file", part);
            for var in env_vars {
                form = form.text("envVar", var.clone());
            }
            let form = form
                .text("name", name.to_string())
                .text("runtime", runtime.to_string());
            Ok(http.post(&url).bearer_auth(token).multipart(form))
        })
        .await?;

    let status = response.status().as_u16();
    if status == 201 {
        let out = client.out();
        out.say("\nBeginning application import. This could take a minute.");
        follow_build(response, out.verbose(), out).await?;
        return Ok(());
    }

    let body = response.bytes().await.map_err(ShipyardError::from)?;
    client.out().report(
        "import application",
        status,
        &body,
        &Messages::failure_only(format!("\nThere was an error importing {}", name)),
        Presentation::choose(Some(FormatArg::Raw), None),
    )?;
    Ok(())
}

/// Zip the directory contents (without the directory itself) and read it back
fn pack_sources(directory: &Path, name: &str) -> Result<Vec<u8>> {
    let workdir = tempfile::Builder::new().prefix(name).tempdir()?;
    let zip_path = workdir.path().join(format!("{}.zip", name));
    bundle::archive_dir(directory, &zip_path, false)?;
    Ok(std::fs::read(&zip_path)?)
}

/// Splits a streamed body into lines as chunks arrive
///
/// A buffered log keeps every line for the failure report; an unbuffered one
/// (lines already echoed) only remembers the last non-empty line.
#[derive(Debug)]
pub struct BuildLog {
    buffered: bool,
    pending: Vec<u8>,
    lines: Vec<String>,
    last: Option<String>,
}

impl BuildLog {
    pub fn new(buffered: bool) -> Self {
        Self {
            buffered,
            pending: Vec::new(),
            lines: Vec::new(),
            last: None,
        }
    }

    /// Feed a chunk; returns the lines it completed
    pub fn push(&mut self, chunk: &[u8]) -> Vec<String> {
        self.pending.extend_from_slice(chunk);
        let mut completed = Vec::new();
        while let Some(pos) = self.pending.iter().position(|b| *b == b'\n') {
            let raw: Vec<u8> = self.pending.drain(..=pos).collect();
            let line = String::from_utf8_lossy(&raw)
                .trim_end_matches(&['\r', '\n'][..])
                .to_string();
            completed.push(line);
        }
        for line in &completed {
            self.record(line);
        }
        completed
    }

    /// Flush a trailing line that had no newline
    pub fn finish(&mut self) -> Option<String> {
        if self.pending.is_empty() {
            return None;
        }
        let line = String::from_utf8_lossy(&self.pending).trim_end().to_string();
        self.pending.clear();
        self.record(&line);
        Some(line)
    }

    fn record(&mut self, line: &str) {
        if !line.trim().is_empty() {
            self.last = Some(line.to_string());
        }
        if self.buffered {
            self.lines.push(line.to_string());
        }
    }

    pub fn last_line(&self) -> Option<&str> {
        self.last.as_deref()
    }

    pub fn transcript(&self) -> String {
        self.lines.join("\n")
    }

    /// A finished build ends with its organization/application/revision summary
    pub fn succeeded(&self) -> bool {
        self.last_line().is_some_and(|line| build_summary().is_match(line))
    }
}

async fn follow_build(mut response: Response, echo: bool, out: &Output) -> Result<()> {
    let mut log = BuildLog::new(!echo);
    while let Some(chunk) = response.chunk().await.map_err(ShipyardError::from)? {
        for line in log.push(&chunk) {
            if echo {
                out.say(&line);
            }
        }
    }
    if let Some(line) = log.finish() {
        if echo {
            out.say(&line);
        }
    }

    if !log.succeeded() {
        let message = if echo {
            "There was a problem during the build. Refer to the build stream".to_string()
        } else {
            format!(
                "There was a problem during the build. Build output:\n{}\nPlease refer to the above build output",
                log.transcript()
            )
        };
        return Err(ShipyardError::BuildFailed(message).into());
    }

    if !echo {
        if let Some(summary) = log.last_line() {
            out.say(summary);
        }
    }
    Ok(())
}

pub async fn delete(
    client: &mut ApiClient<'_>,
    scope: &ScopeArgs,
    name: &Option<String>,
    force: bool,
) -> Result<()> {
    let name = require_name(name)?;
    let org = require_org(&OrgArgs { org: scope.org.clone() })?.to_string();

    if force {
        let scope = Scope::require(scope)?;
        client.out().say(&format!(
            "Undeploying any active deployment of {} in {}",
            name,
            scope.shipyard_env()
        ));
        // nothing deployed is fine, the delete below is what matters
        match deployment::undeploy_named(client, &scope, name).await {
            Ok(()) => {}
            Err(e) => match e.downcast_ref::<ShipyardError>() {
                Some(ShipyardError::Api { .. }) => tracing::info!("Undeploy skipped: {}", e),
                _ => return Err(e),
            },
        }
    } else if !confirm_deletion(name)? {
        client.out().say("Chose to cancel. Aborting.");
        return Ok(());
    }

    let url = client.endpoints().app(&org, name);
    let reply = client
        .fetch(|http, token| Ok(http.delete(&url).bearer_auth(token)))
        .await?;

    let result = client.out().report(
        "delete application",
        reply.status,
        &reply.body,
        &Messages::new(
            format!("\nDeletion of application {} successful.", name),
            format!("\nThere was an error deleting {}.", name),
        ),
        Presentation::choose(None, None),
    );
    if reply.status == 409 {
        client.out().say(
            "Please use the --force flag or use the undeploy command first if you wish to undeploy and delete the application",
        );
    }
    result?;
    Ok(())
}

fn confirm_deletion(name: &str) -> Result<bool> {
    let answer = Input::<String>::new()
        .with_prompt(format!(
            "You are about to delete all revisions of \"{}\". Are you sure? [Y/n]",
            name
        ))
        .allow_empty(true)
        .interact_text()?;
    Ok(answer.trim() == "Y")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{serve, Canned};

    #[test]
    fn node_runtimes_are_supported() {
        assert!(validate_runtime("node").is_ok());
        assert!(validate_runtime("node:4").is_ok());
    }

    #[test]
    fn other_runtimes_are_rejected() {
        let err = validate_runtime("python:3").unwrap_err();
        assert_eq!(
            err.to_string(),
            "Provided runtime: \"python\"\nSupported runtimes: \"node\""
        );
    }

    #[test]
    fn build_log_reassembles_split_lines() {
        let mut log = BuildLog::new(true);
        assert!(log.push(b"Step 1/3 : FROM no").is_empty());
        assert_eq!(log.push(b"de:4\r\nStep 2/3\n"), vec!["Step 1/3 : FROM node:4", "Step 2/3"]);
        assert_eq!(log.finish(), None);
    }

    #[test]
    fn build_succeeds_on_summary_line() {
        let mut log = BuildLog::new(true);
        log.push(b"Step 1/3\n");
        log.push(b"Organization: acme | Application: echo | Revision: 3");
        log.finish();
        assert!(log.succeeded());
        assert_eq!(
            log.last_line(),
            Some("Organization: acme | Application: echo | Revision: 3")
        );
    }

    #[test]
    fn build_fails_without_summary() {
        let mut log = BuildLog::new(true);
        log.push(b"Step 1/3\nnpm ERR! missing script: start\n\n");
        assert!(!log.succeeded());
        assert!(log.transcript().contains("npm ERR!"));
        assert_eq!(log.last_line(), Some("npm ERR! missing script: start"));
    }

    #[test]
    fn echoed_log_keeps_only_last_line() {
        let mut log = BuildLog::new(false);
        log.push(b"Step 1/3\nStep 2/3\n");
        log.push(b"Organization: acme | Application: echo | Revision: 3\n");
        assert_eq!(log.transcript(), "");
        assert!(log.succeeded());
    }

    #[test]
    fn summary_pattern_compiles_once() {
        assert!(std::ptr::eq(build_summary(), build_summary()));
        assert!(build_summary().is_match("Revision: 12"));
    }

    #[tokio::test]
    async fn cut_off_build_stream_is_a_network_error() {
        let (base, _server) = serve(vec![Canned::truncated(201, "Step 1/3 : FROM node:4\n")]).await;
        let response = reqwest::get(&base).await.unwrap();

        let err = follow_build(response, false, &Output::new(false))
            .await
            .unwrap_err();
        let err = err.downcast_ref::<ShipyardError>().unwrap();
        assert!(matches!(err, ShipyardError::Http(_)));
        assert_eq!(err.category(), "net");
    }

    #[test]
    fn sources_are_packed_without_base_dir() {
        let src = tempfile::TempDir::new().unwrap();
        std::fs::write(src.path().join("package.json"), "{}").unwrap();

        let bytes = pack_sources(src.path(), "echo").unwrap();
        let mut archive = zip::ZipArchive::new(std::io::Cursor::new(bytes)).unwrap();
        assert_eq!(archive.len(), 1);
        assert_eq!(archive.by_index(0).unwrap().name(), "package.json");
    }
}
