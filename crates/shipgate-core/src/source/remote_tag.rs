//! Tags on the remote VCS hosting API.

use std::collections::HashSet;

use serde::Deserialize;
use tracing::{debug, instrument};

use super::{Resolved, SourceKind, VersionSource, latest_of};
use crate::error::{SourceError, SourceResult};
use crate::http::{ReqwestTransport, Transport, get_ok};

#[derive(Debug, Deserialize)]
struct TagEntry {
    name: String,
}

/// The two page shapes the tag endpoint may answer with.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum TagPage {
    /// A bare array; further pages are announced in the `Link` header.
    List(Vec<TagEntry>),
    /// An envelope with an explicit cursor.
    Paged {
        results: Vec<TagEntry>,
        #[serde(default)]
        next: Option<String>,
    },
}

/// Latest version among `GET {api_url}/{repository}/tags`.
#[derive(Debug, Clone)]
pub struct RemoteTagSource<T = ReqwestTransport> {
    transport: T,
    tags_url: String,
}

impl<T: Transport> RemoteTagSource<T> {
    /// Source for `repository` (`owner/name`) under `api_url`.
    pub fn new(transport: T, api_url: &str, repository: &str) -> Self {
        Self {
            transport,
            tags_url: format!("{}/{repository}/tags", api_url.trim_end_matches('/')),
        }
    }

    /// First page URL.
    pub fn tags_url(&self) -> &str {
        &self.tags_url
    }

    /// Collect tag names across all pages, in page order.
    fn fetch_names(&self) -> SourceResult<Vec<String>> {
        let mut names = Vec::new();
        let mut seen = HashSet::new();
        let mut next = Some(self.tags_url.clone());

        while let Some(url) = next.take() {
            if !seen.insert(url.clone()) {
                debug!(%url, "page already fetched, stopping");
                break;
            }
            let response = get_ok(&self.transport, &url)?;
            let page: TagPage = serde_json::from_str(&response.body).map_err(|e| {
                debug!(%url, error = %e, "unexpected tag page shape");
                SourceError::field_missing(url.as_str(), "name")
            })?;

            next = match page {
                TagPage::List(entries) => {
                    names.extend(entries.into_iter().map(|t| t.name));
                    response.next_link
                }
                TagPage::Paged { results, next } => {
                    names.extend(results.into_iter().map(|t| t.name));
                    next
                }
            };
            debug!(%url, total = names.len(), more = next.is_some(), "tag page");
        }

        Ok(names)
    }
}

impl<T: Transport> VersionSource for RemoteTagSource<T> {
    fn kind(&self) -> SourceKind {
        SourceKind::RemoteTag
    }

    #[instrument(name = "remote_tag", skip(self), fields(url = %self.tags_url))]
    fn resolve_latest(&self) -> SourceResult<Resolved> {
        let names = self.fetch_names()?;
        latest_of(SourceKind::RemoteTag, names)
    }
}
