//! Response body rendering
//!
//! Machine formats (json, yaml, raw) re-encode the body. Human formats pick a
//! few fields out of the JSON and lay them out as aligned columns.

use clap::ValueEnum;
use serde_json::Value;

use crate::error::Result;

/// Formats a user can ask for with `--format`
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum FormatArg {
    Json,
    Yaml,
    Raw,
    /// Table of application names
    GetApps,
    /// Table of revisions of one application
    GetApp,
    /// Table of one application revision
    GetAppRev,
    /// Table of deployments
    GetDeps,
    /// Table of one deployment
    GetDep,
}

/// Everything the renderer knows how to produce
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Render {
    Json,
    Yaml,
    Raw,
    Apps,
    App,
    AppRevision,
    Deployments,
    Deployment,
}

impl From<FormatArg> for Render {
    fn from(arg: FormatArg) -> Self {
        match arg {
            FormatArg::Json => Render::Json,
            FormatArg::Yaml => Render::Yaml,
            FormatArg::Raw => Render::Raw,
            FormatArg::GetApps => Render::Apps,
            FormatArg::GetApp => Render::App,
            FormatArg::GetAppRev => Render::AppRevision,
            FormatArg::GetDeps => Render::Deployments,
            FormatArg::GetDep => Render::Deployment,
        }
    }
}

/// How a command wants its successful response shown
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Presentation {
    pub render: Option<Render>,
    /// Print the success banner before the body
    pub banner: bool,
}

impl Presentation {
    /// User's `--format` if given, else the command's default
    ///
    /// The banner only shows when nothing is going to be rendered.
    pub fn choose(arg: Option<FormatArg>, default: Option<Render>) -> Self {
        let render = arg.map(Render::from).or(default);
        Self {
            render,
            banner: render.is_none(),
        }
    }

    /// Keep the banner even though a body is rendered
    pub fn with_banner(self) -> Self {
        Self {
            banner: true,
            ..self
        }
    }
}

/// Render a body; `Ok(None)` means there is nothing to print
pub fn render_body(render: Render, body: &[u8]) -> Result<Option<String>> {
    if body.is_empty() {
        return Ok(None);
    }

    let out = match render {
        Render::Raw => String::from_utf8_lossy(body).into_owned(),
        Render::Yaml => {
            let value: serde_yaml::Value = serde_yaml::from_slice(body)?;
            serde_yaml::to_string(&value)?.trim_end().to_string()
        }
        Render::Json => {
            let value: Value = serde_json::from_slice(body)?;
            serde_json::to_string_pretty(&value)?
        }
        human => {
            let value: Value = serde_json::from_slice(body)?;
            columnize(&table_rows(human, &value))
        }
    };
    Ok(Some(out))
}

const REVISION_LABEL: &str = "edge/app.rev";

fn table_rows(render: Render, value: &Value) -> Vec<Vec<String>> {
    let each = |v: &Value| v.as_array().cloned().unwrap_or_default();

    match render {
        Render::Apps => std::iter::once(vec!["AVAILABLE APPLICATIONS".to_string()])
            .chain(each(value).iter().map(|app| vec![cell(&app["name"])]))
            .collect(),
        Render::App => std::iter::once(vec!["AVAILABLE REVISIONS".to_string()])
            .chain(each(value).iter().map(|rev| vec![cell(&rev["revision"])]))
            .collect(),
        Render::AppRevision => vec![
            header(&["REVISION", "CREATED", "IMAGE-ID"]),
            vec![
                cell(&value["revision"]),
                cell(&value["created"]),
                cell(&value["imageId"]),
            ],
        ],
        Render::Deployments => std::iter::once(deployment_header())
            .chain(each(&value["items"]).iter().map(deployment_row))
            .collect(),
        Render::Deployment => vec![deployment_header(), deployment_row(value)],
        Render::Json | Render::Yaml | Render::Raw => Vec::new(),
    }
}

fn header(cols: &[&str]) -> Vec<String> {
    cols.iter().map(|c| c.to_string()).collect()
}

fn deployment_header() -> Vec<String> {
    header(&["NAME", "CREATED", "APP-REVISION"])
}

fn deployment_row(dep: &Value) -> Vec<String> {
    let meta = &dep["metadata"];
    vec![
        cell(&meta["name"]),
        cell(&meta["creationTimestamp"]),
        cell(&meta["labels"][REVISION_LABEL]),
    ]
}

fn cell(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Left-align cells into columns joined by two spaces; the last column is not padded
pub fn columnize(rows: &[Vec<String>]) -> String {
    let cols = rows.iter().map(Vec::len).max().unwrap_or(0);
    let mut widths = vec![0usize; cols];
    for row in rows {
        for (i, c) in row.iter().enumerate() {
            widths[i] = widths[i].max(c.trim().chars().count());
        }
    }

    rows.iter()
        .map(|row| {
            let last = row.len().saturating_sub(1);
            row.iter()
                .enumerate()
                .map(|(i, c)| {
                    let c = c.trim();
                    if i == last {
                        c.to_string()
                    } else {
                        format!("{:<width$}", c, width = widths[i])
                    }
                })
                .collect::<Vec<_>>()
                .join("  ")
        })
        .collect::<Vec<_>>()
        .join("\n")
}
