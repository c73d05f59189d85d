//! Edge proxy bundles and zip archives
//!
//! A bundle is an `apiproxy/` tree of XML descriptors pointing Edge at an app
//! running on Shipyard. The same archiver packs application sources for import.

use std::fs::{self, File};
use std::io::{Read, Write};
use std::path::{Path, PathBuf};

use walkdir::WalkDir;
use zip::write::FileOptions;
use zip::{CompressionMethod, ZipWriter};

use crate::error::Result;

const FILE_MODE: u32 = 0o755;

#[derive(Debug, Clone, PartialEq)]
pub struct Bundle {
    pub name: String,
    pub base_path: String,
    pub target_path: String,
}

impl Bundle {
    /// Base and target paths default to `/{name}`
    pub fn new(name: &str, base_path: Option<String>, target_path: Option<String>) -> Self {
        let default_path = || format!("/{}", name);
        Self {
            name: name.to_string(),
            base_path: base_path.filter(|p| !p.is_empty()).unwrap_or_else(default_path),
            target_path: target_path.filter(|p| !p.is_empty()).unwrap_or_else(default_path),
        }
    }

    /// Files of the bundle, relative to `apiproxy/`
    pub fn files(&self) -> Vec<(String, String)> {
        vec![
            (format!("{}.xml", self.name), proxy_descriptor(&self.name)),
            ("policies/AddCors.xml".to_string(), ADD_CORS.to_string()),
            ("proxies/default.xml".to_string(), proxy_endpoint(&self.base_path)),
            ("targets/default.xml".to_string(), target_endpoint(&self.target_path)),
        ]
    }

    /// Write the `apiproxy/` tree under `root` and return its path
    pub fn render_tree(&self, root: &Path) -> Result<PathBuf> {
        let dir = root.join("apiproxy");
        for sub in ["proxies", "targets", "policies"] {
            fs::create_dir_all(dir.join(sub))?;
            tracing::debug!("Created {:?}", dir.join(sub));
        }

        for (relative, content) in self.files() {
            let path = dir.join(&relative);
            fs::write(&path, content)?;
            set_mode(&path)?;
            tracing::debug!("Wrote {:?}", path);
        }
        Ok(dir)
    }

    /// Render the tree inside `workdir` and zip it to `workdir/{name}.zip`
    pub fn package(&self, workdir: &Path) -> Result<PathBuf> {
        let tree = self.render_tree(workdir)?;
        let zip_path = workdir.join(format!("{}.zip", self.name));
        archive_dir(&tree, &zip_path, true)?;
        Ok(zip_path)
    }
}

#[cfg(unix)]
fn set_mode(path: &Path) -> Result<()> {
    use std::os::unix::fs::PermissionsExt;
    fs::set_permissions(path, fs::Permissions::from_mode(FILE_MODE))?;
    Ok(())
}

#[cfg(not(unix))]
fn set_mode(_path: &Path) -> Result<()> {
    Ok(())
}

/// Zip every file under `src` into `dest`
///
/// With `include_base` the entries are rooted at `src`'s own directory name
/// (`apiproxy/...`); without it they are relative to `src`.
pub fn archive_dir(src: &Path, dest: &Path, include_base: bool) -> Result<()> {
    let prefix = match (include_base, src.file_name()) {
        (true, Some(base)) => format!("{}/", base.to_string_lossy()),
        _ => String::new(),
    };

    let options = FileOptions::default()
        .compression_method(CompressionMethod::Deflated)
        .unix_permissions(FILE_MODE);
    let mut zip = ZipWriter::new(File::create(dest)?);
    let mut buffer = Vec::new();

    for entry in WalkDir::new(src).sort_by_file_name() {
        let entry = entry.map_err(std::io::Error::from)?;
        let path = entry.path();
        // never pack the archive into itself
        if path == dest {
            continue;
        }
        let relative = match path.strip_prefix(src) {
            Ok(r) if !r.as_os_str().is_empty() => r,
            _ => {
                if !prefix.is_empty() {
                    zip.add_directory(prefix.clone(), options)?;
                }
                continue;
            }
        };
        let name = format!("{}{}", prefix, entry_name(relative));

        if entry.file_type().is_dir() {
            zip.add_directory(name, options)?;
        } else {
            zip.start_file(name, options)?;
            buffer.clear();
            File::open(path)?.read_to_end(&mut buffer)?;
            zip.write_all(&buffer)?;
        }
    }

    zip.finish()?;
    Ok(())
}

/// Archive entries always use `/`
fn entry_name(relative: &Path) -> String {
    relative
        .components()
        .map(|c| c.as_os_str().to_string_lossy().into_owned())
        .collect::<Vec<_>>()
        .join("/")
}

fn escape_xml(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for ch in raw.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&apos;"),
            c => out.push(c),
        }
    }
    out
}

// ============ Templates ============

const XML_HEADER: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>"#;

fn proxy_descriptor(name: &str) -> String {
    let name = escape_xml(name);
    format!(
        r#"{XML_HEADER}
<APIProxy revision="1" name="{name}">
    <ConfigurationVersion majorVersion="4" minorVersion="0"/>
    <CreatedAt>1459886430613</CreatedAt>
    <CreatedBy>shipyard@apigee.com</CreatedBy>
    <Description>This is a proxy for {name}, deployed on Shipyard.</Description>
    <DisplayName>{name}</DisplayName>
    <LastModifiedAt>1459886430613</LastModifiedAt>
    <LastModifiedBy>shipyard@apigee.com</LastModifiedBy>
    <Policies>
        <Policy>AddCors</Policy>
    </Policies>
    <ProxyEndpoints>
        <ProxyEndpoint>default</ProxyEndpoint>
    </ProxyEndpoints>
    <Resources/>
    <TargetServers/>
    <TargetEndpoints>
        <TargetEndpoint>default</TargetEndpoint>
    </TargetEndpoints>
    <validate>false</validate>
</APIProxy>
"#
    )
}

fn proxy_endpoint(base_path: &str) -> String {
    let base_path = escape_xml(base_path);
    format!(
        r#"{XML_HEADER}
<ProxyEndpoint name="default">
    <Description/>
    <FaultRules/>
    <PreFlow name="PreFlow">
        <Request/>
        <Response/>
    </PreFlow>
    <PostFlow name="PostFlow">
        <Request/>
        <Response/>
    </PostFlow>
    <Flows/>
    <HTTPProxyConnection>
        <BasePath>{base_path}</BasePath>
        <Properties/>
        <VirtualHost>default</VirtualHost>
        <VirtualHost>secure</VirtualHost>
    </HTTPProxyConnection>
    <RouteRule name="default">
        <TargetEndpoint>default</TargetEndpoint>
    </RouteRule>
</ProxyEndpoint>"#
    )
}

fn target_endpoint(target_path: &str) -> String {
    let target_path = escape_xml(target_path);
    format!(
        r#"{XML_HEADER}
<TargetEndpoint name="default">
    <Description/>
    <FaultRules/>
    <PreFlow name="PreFlow">
        <Request/>
        <Response>
            <Step>
                <Name>AddCors</Name>
            </Step>
        </Response>
    </PreFlow>
    <PostFlow name="PostFlow">
        <Request/>
        <Response/>
    </PostFlow>
    <Flows/>
    <ScriptContainer>
        <ResourceURL>{target_path}</ResourceURL>
    </ScriptContainer>
</TargetEndpoint>"#
    )
}

const ADD_CORS: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<AssignMessage async="false" continueOnError="false" enabled="true" name="AddCors">
    <DisplayName>Add CORS Headers</DisplayName>
    <FaultRules/>
    <Properties/>
    <Add>
        <Headers>
            <Header name="Access-Control-Allow-Origin">*</Header>
            <Header name="Access-Control-Allow-Headers">origin, x-requested-with, accept</Header>
            <Header name="Access-Control-Max-Age">3628800</Header>
            <Header name="Access-Control-Allow-Methods">GET, PUT, POST, DELETE</Header>
        </Headers>
    </Add>
    <IgnoreUnresolvedVariables>true</IgnoreUnresolvedVariables>
    <AssignTo createNew="false" transport="http" type="response"/>
</AssignMessage>"#;

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;
    use zip::ZipArchive;

    fn entries(zip_path: &Path) -> Vec<String> {
        let mut archive = ZipArchive::new(File::open(zip_path).unwrap()).unwrap();
        let mut names: Vec<String> = (0..archive.len())
            .map(|i| archive.by_index(i).unwrap().name().to_string())
            .collect();
        names.sort();
        names
    }

    #[test]
    fn paths_default_to_name() {
        let bundle = Bundle::new("echo", None, Some(String::new()));
        assert_eq!(bundle.base_path, "/echo");
        assert_eq!(bundle.target_path, "/echo");

        let bundle = Bundle::new("echo", Some("/api".into()), None);
        assert_eq!(bundle.base_path, "/api");
    }

    #[test]
    fn templates_interpolate_and_escape() {
        let bundle = Bundle::new("a&b", Some("/v1".into()), Some("/app".into()));
        let files = bundle.files();

        let descriptor = &files[0];
        assert_eq!(descriptor.0, "a&b.xml");
        assert!(descriptor.1.contains(r#"<APIProxy revision="1" name="a&amp;b">"#));
        assert!(files[2].1.contains("<BasePath>/v1</BasePath>"));
        assert!(files[3].1.contains("<ResourceURL>/app</ResourceURL>"));
        assert!(files[1].1.contains(r#"name="AddCors""#));
    }

    #[test]
    fn package_zips_apiproxy_tree() {
        let dir = TempDir::new().unwrap();
        let zip_path = Bundle::new("echo", None, None).package(dir.path()).unwrap();

        assert_eq!(zip_path, dir.path().join("echo.zip"));
        assert_eq!(
            entries(&zip_path),
            vec![
                "apiproxy/",
                "apiproxy/echo.xml",
                "apiproxy/policies/",
                "apiproxy/policies/AddCors.xml",
                "apiproxy/proxies/",
                "apiproxy/proxies/default.xml",
                "apiproxy/targets/",
                "apiproxy/targets/default.xml",
            ]
        );
    }

    #[test]
    fn archive_without_base_dir_keeps_relative_paths() {
        let src = TempDir::new().unwrap();
        fs::write(src.path().join("package.json"), "{}").unwrap();
        fs::create_dir(src.path().join("lib")).unwrap();
        fs::write(src.path().join("lib").join("index.js"), "module.exports = 1").unwrap();

        let out = TempDir::new().unwrap();
        let zip_path = out.path().join("app.zip");
        archive_dir(src.path(), &zip_path, false).unwrap();

        assert_eq!(entries(&zip_path), vec!["lib/", "lib/index.js", "package.json"]);

        let mut archive = ZipArchive::new(File::open(&zip_path).unwrap()).unwrap();
        let mut content = String::new();
        archive
            .by_name("lib/index.js")
            .unwrap()
            .read_to_string(&mut content)
            .unwrap();
        assert_eq!(content, "module.exports = 1");
    }
}
