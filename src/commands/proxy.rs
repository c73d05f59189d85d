//! Edge proxy bundles: generate locally, upload to the management API

use anyhow::{Context, Result};
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

use crate::bundle::Bundle;
use crate::cli::ScopeArgs;
use crate::client::{proxy_import_url, ApiClient};
use crate::commands::{require_name, Scope};
use crate::format::{Presentation, Render};
use crate::output::{Messages, Output};

/// `create bundle`: write `{name}.zip` into `save` or the working directory
pub fn create(
    out: &Output,
    name: &Option<String>,
    save: &Option<PathBuf>,
    base_path: &Option<String>,
    target_path: &Option<String>,
) -> Result<()> {
    let name = require_name(name)?;
    let bundle = Bundle::new(name, base_path.clone(), target_path.clone());

    let dest_dir = match save {
        Some(dir) => dir.clone(),
        None => std::env::current_dir().context("Unable to read the working directory")?,
    };
    let dest = write_bundle(&bundle, &dest_dir)?;

    out.say(&format!("Proxy bundle {} written to {}", name, dest.display()));
    Ok(())
}

/// Package `bundle` in a scratch directory and copy the zip into `dest_dir`
pub fn write_bundle(bundle: &Bundle, dest_dir: &Path) -> Result<PathBuf> {
    let scratch = TempDir::new().context("Unable to create a temporary directory")?;
    tracing::debug!("Building bundle in {:?}", scratch.path());
    let zip_path = bundle
        .package(scratch.path())
        .context("Problem building proxy bundle")?;

    let dest = dest_dir.join(format!("{}.zip", bundle.name));
    // copy, not rename: the scratch dir may live on another filesystem
    fs::copy(&zip_path, &dest)
        .with_context(|| format!("Unable to move proxy bundle to {:?}", dest_dir))?;
    Ok(dest)
}

/// `deploy proxy`: upload a bundle zip, generating one when none is given
pub async fn deploy(
    client: &mut ApiClient<'_>,
    scope: &ScopeArgs,
    name: &Option<String>,
    zip_path: &Option<PathBuf>,
    base_path: &Option<String>,
    target_path: &Option<String>,
) -> Result<()> {
    client.settings().require_token()?;
    let name = require_name(name)?.to_string();
    let scope = Scope::require(scope)?;

    let archive = match zip_path {
        Some(path) => fs::read(path).with_context(|| format!("Unable to read proxy bundle {:?}", path))?,
        None => {
            let bundle = Bundle::new(&name, base_path.clone(), target_path.clone());
            let scratch = TempDir::new().context("Unable to create a temporary directory")?;
            let zip = bundle
                .package(scratch.path())
                .context("Problem building proxy bundle")?;
            fs::read(&zip)?
        }
    };
    tracing::info!("Uploading {} byte proxy bundle for {}", archive.len(), name);

    let url = proxy_import_url(&client.settings().mgmt_target, &scope.org, &name);
    let reply = client
        .fetch(|http, token| {
            Ok(http
                .post(&url)
                .bearer_auth(token)
                .header(reqwest::header::CONTENT_TYPE, "application/octet-stream")
                .body(archive.clone()))
        })
        .await?;

    // the import response is only interesting when debugging
    let render = client.out().verbose().then_some(Render::Raw);
    client.out().report(
        "deploy proxy",
        reply.status,
        &reply.body,
        &Messages::new(
            format!("\nProxy {} imported into {}", name, scope.org),
            format!("\nError importing proxy {}", name),
        ),
        Presentation::choose(None, render).with_banner(),
    )?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs::File;
    use zip::ZipArchive;

    #[test]
    fn bundle_lands_in_save_dir() {
        let dest = TempDir::new().unwrap();
        let bundle = Bundle::new("echo", None, None);

        let path = write_bundle(&bundle, dest.path()).unwrap();
        assert_eq!(path, dest.path().join("echo.zip"));

        let archive = ZipArchive::new(File::open(&path).unwrap()).unwrap();
        let names: Vec<&str> = archive.file_names().collect();
        assert!(names.contains(&"apiproxy/echo.xml"));
        assert!(names.contains(&"apiproxy/proxies/default.xml"));
    }

    #[test]
    fn create_requires_name() {
        let dest = TempDir::new().unwrap();
        let err = create(
            &Output::new(false),
            &None,
            &Some(dest.path().to_path_buf()),
            &None,
            &None,
        )
        .unwrap_err();
        assert_eq!(err.to_string(), "Missing required flag '--name'.");
    }

    #[test]
    fn missing_save_dir_is_an_error() {
        let dest = TempDir::new().unwrap();
        let bundle = Bundle::new("echo", None, None);
        assert!(write_bundle(&bundle, &dest.path().join("absent")).is_err());
    }
}
