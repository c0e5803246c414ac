//! Loading of the question/answer knowledge base embedded in fallback prompts.
//!
//! The base is a JSON array of `{ "question": …, "answer": … }` objects. It can
//! live in one file, be split over every `.json` file of a directory tree, or
//! be served over HTTP. Callers that must keep answering use
//! [`KnowledgeSource::load_or_empty`], which degrades to an empty base.

use std::path::{Path, PathBuf};
use std::time::Duration;

use hakach_core::{KnowledgeBase, KnowledgeItem};
use reqwest::Client;
use serde::Deserialize;
use thiserror::Error;
use tracing::{info, warn};
use walkdir::WalkDir;

#[derive(Debug, Error)]
pub enum KnowledgeError {
    #[error("failed reading knowledge base {path}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("knowledge base {origin} is not a JSON list of question/answer pairs: {source}")]
    Json {
        origin: String,
        #[source]
        source: serde_json::Error,
    },
    #[error("knowledge base request to {url} failed: {source}")]
    Http {
        url: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("knowledge base {url} answered HTTP {status}")]
    Status { url: String, status: u16 },
}

#[derive(Debug, Deserialize)]
struct RawItem {
    #[serde(default)]
    question: String,
    #[serde(default)]
    answer: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KnowledgeSource {
    File(PathBuf),
    Directory(PathBuf),
    Url(String),
    None,
}

impl KnowledgeSource {
    /// `http(s)://` locations are fetched, directories are walked, anything else is a file.
    pub fn from_location(location: &str) -> Self {
        let location = location.trim();
        if location.is_empty() {
            return Self::None;
        }
        if location.starts_with("http://") || location.starts_with("https://") {
            return Self::Url(location.to_string());
        }
        let path = PathBuf::from(location);
        if path.is_dir() {
            Self::Directory(path)
        } else {
            Self::File(path)
        }
    }

    pub fn describe(&self) -> String {
        match self {
            Self::File(path) | Self::Directory(path) => path.display().to_string(),
            Self::Url(url) => url.clone(),
            Self::None => "none".to_string(),
        }
    }

    pub async fn load(&self, client: &Client) -> Result<KnowledgeBase, KnowledgeError> {
        match self {
            Self::File(path) => load_file(path),
            Self::Directory(path) => load_dir(path),
            Self::Url(url) => fetch_url(client, url).await,
            Self::None => Ok(KnowledgeBase::empty()),
        }
    }

    pub async fn load_or_empty(&self, client: &Client) -> KnowledgeBase {
        match self.load(client).await {
            Ok(knowledge) => {
                info!(source = %self.describe(), items = knowledge.len(), "knowledge base loaded");
                knowledge
            }
            Err(err) => {
                warn!(source = %self.describe(), error = %err, "knowledge base unavailable, continuing without it");
                KnowledgeBase::empty()
            }
        }
    }
}

pub fn parse_items(raw: &str, origin: &str) -> Result<Vec<KnowledgeItem>, KnowledgeError> {
    let items = serde_json::from_str::<Vec<RawItem>>(raw).map_err(|source| KnowledgeError::Json {
        origin: origin.to_string(),
        source,
    })?;

    Ok(items
        .into_iter()
        .filter_map(|item| {
            let question = item.question.trim();
            let answer = item.answer.trim();
            if question.is_empty() || answer.is_empty() {
                return None;
            }
            Some(KnowledgeItem {
                question: question.to_string(),
                answer: answer.to_string(),
            })
        })
        .collect())
}

pub fn load_file(path: impl AsRef<Path>) -> Result<KnowledgeBase, KnowledgeError> {
    Ok(KnowledgeBase::new(read_items(path.as_ref())?))
}

/// Every `.json` file below `root`, in path order.
pub fn load_dir(root: impl AsRef<Path>) -> Result<KnowledgeBase, KnowledgeError> {
    let mut paths = WalkDir::new(root.as_ref())
        .into_iter()
        .filter_map(std::result::Result::ok)
        .filter(|entry| entry.file_type().is_file())
        .filter(|entry| entry.path().extension().and_then(|ext| ext.to_str()) == Some("json"))
        .map(|entry| entry.into_path())
        .collect::<Vec<_>>();
    paths.sort();

    let mut items = Vec::new();
    for path in paths {
        items.extend(read_items(&path)?);
    }
    Ok(KnowledgeBase::new(items))
}

pub async fn fetch_url(client: &Client, url: &str) -> Result<KnowledgeBase, KnowledgeError> {
    let http_error = |source| KnowledgeError::Http {
        url: url.to_string(),
        source,
    };
    let response = client
        .get(url)
        .timeout(Duration::from_secs(10))
        .send()
        .await
        .map_err(http_error)?;

    let status = response.status();
    if !status.is_success() {
        return Err(KnowledgeError::Status {
            url: url.to_string(),
            status: status.as_u16(),
        });
    }

    let raw = response.text().await.map_err(http_error)?;
    Ok(KnowledgeBase::new(parse_items(&raw, url)?))
}

fn read_items(path: &Path) -> Result<Vec<KnowledgeItem>, KnowledgeError> {
    let raw = std::fs::read_to_string(path).map_err(|source| KnowledgeError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    parse_items(&raw, &path.display().to_string())
}
