// src/fetch/source.rs

use std::{collections::BTreeMap, fmt, path::PathBuf};

use serde::{Deserialize, Serialize};
use url::Url;

const YEAR_PLACEHOLDER: &str = "{year}";

/// A configured candidate, templated on `{year}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "method", rename_all = "lowercase")]
pub enum SourceTemplate {
    Get {
        url: String,
    },
    Post {
        url: String,
        #[serde(default)]
        form: BTreeMap<String, String>,
    },
    File {
        path: String,
    },
}

/// A candidate with the year filled in, ready to be tried.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Source {
    Get { url: String },
    Post { url: String, form: BTreeMap<String, String> },
    File { path: PathBuf },
}

fn fill(template: &str, year: i32) -> String {
    template.replace(YEAR_PLACEHOLDER, &year.to_string())
}

impl SourceTemplate {
    pub fn resolve(&self, year: i32) -> Source {
        match self {
            SourceTemplate::Get { url } => Source::Get {
                url: fill(url, year),
            },
            SourceTemplate::Post { url, form } => Source::Post {
                url: fill(url, year),
                form: form
                    .iter()
                    .map(|(k, v)| (k.clone(), fill(v, year)))
                    .collect(),
            },
            SourceTemplate::File { path } => Source::File {
                path: PathBuf::from(fill(path, year)),
            },
        }
    }
}

impl Source {
    /// Reject URLs that will never parse, before any request is sent.
    pub fn check(&self) -> Result<(), String> {
        match self {
            Source::Get { url } | Source::Post { url, .. } => Url::parse(url)
                .map(|_| ())
                .map_err(|e| format!("bad source url `{}`: {}", url, e)),
            Source::File { path } if path.as_os_str().is_empty() => {
                Err("empty source path".to_string())
            }
            Source::File { .. } => Ok(()),
        }
    }
}

impl fmt::Display for Source {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Source::Get { url } => write!(f, "GET {}", url),
            Source::Post { url, form } => {
                write!(f, "POST {}", url)?;
                if let Some(file) = form.get("file") {
                    write!(f, " [{}]", file)?;
                }
                Ok(())
            }
            Source::File { path } => write!(f, "file {}", path.display()),
        }
    }
}

pub fn resolve_all(templates: &[SourceTemplate], year: i32) -> Vec<Source> {
    templates.iter().map(|t| t.resolve(year)).collect()
}
