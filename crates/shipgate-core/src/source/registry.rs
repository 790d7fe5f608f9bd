//! Published versions in the package registry index.
//!
//! The index is a git repository browsed through the hosting contents API.
//! Its directory layout shards packages by two-character chunks of the
//! name, and short names live in shallower directories. Rather than encode
//! the layout rules, the source walks from the deepest candidate directory
//! upwards until one of them holds the package file.

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use serde::Deserialize;
use tracing::{debug, instrument};

use super::{Resolved, SourceKind, VersionSource};
use crate::error::{SourceError, SourceResult};
use crate::http::{ReqwestTransport, Transport};
use crate::version::{ReleaseVersion, max_version};

#[derive(Debug, Deserialize)]
struct ContentsResponse {
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct IndexRecord {
    vers: String,
}

/// Candidate index directories for `name`, deepest first.
///
/// The name is split into two-character chunks. Each step shortens the last
/// chunk by one character, dropping it once it would be a single character
/// or less, until no chunks are left.
///
/// ```
/// use shipgate_core::source::shard_candidates;
///
/// assert_eq!(shard_candidates("ab"), ["ab"]);
/// assert_eq!(shard_candidates("abc"), ["ab/c", "ab"]);
/// assert_eq!(shard_candidates("foobar"), ["fo/ob/ar", "fo/ob", "fo"]);
/// ```
pub fn shard_candidates(name: &str) -> Vec<String> {
    let chars: Vec<char> = name.chars().collect();
    let mut chunks: Vec<String> = chars.chunks(2).map(|c| c.iter().collect()).collect();
    let mut candidates = Vec::new();

    while !chunks.is_empty() {
        candidates.push(chunks.join("/"));

        let Some(last) = chunks.last_mut() else {
            break;
        };
        last.pop();
        if last.chars().count() <= 1 {
            chunks.pop();
        }
    }

    candidates
}

/// Latest version of a package in the registry index.
#[derive(Debug, Clone)]
pub struct RegistrySource<T = ReqwestTransport> {
    transport: T,
    index_url: String,
    package: String,
}

impl<T: Transport> RegistrySource<T> {
    /// Source for `package` in the index at `index_url`.
    pub fn new(transport: T, index_url: &str, package: impl Into<String>) -> Self {
        Self {
            transport,
            index_url: index_url.trim_end_matches('/').to_string(),
            package: package.into(),
        }
    }

    fn contents_url(&self) -> String {
        format!("{}/contents", self.index_url)
    }

    /// Probe candidate directories in order; the first 2xx body wins.
    fn fetch_index_file(&self) -> SourceResult<(String, String)> {
        let mut last_status = None;

        for candidate in shard_candidates(&self.package) {
            let url = format!("{}/{candidate}/{}", self.contents_url(), self.package);
            match self.transport.get(&url) {
                Ok(response) if response.is_success() => {
                    debug!(%url, "index file found");
                    return Ok((url, response.body));
                }
                Ok(response) => {
                    debug!(%url, status = response.status, "not here");
                    last_status = Some(response.status);
                }
                Err(e) => {
                    debug!(%url, error = %e, "probe failed");
                    last_status = None;
                }
            }
        }

        Err(SourceError::HttpError {
            url: self.contents_url(),
            status: last_status,
        })
    }
}

/// Decode a contents API body into the versions it lists.
fn versions_from_contents(url: &str, body: &str) -> SourceResult<Vec<ReleaseVersion>> {
    let missing = |field: &str| SourceError::field_missing(url, field);

    let response: ContentsResponse =
        serde_json::from_str(body).map_err(|_| missing("content"))?;
    let encoded: String = response
        .content
        .ok_or_else(|| missing("content"))?
        .chars()
        .filter(|c| !c.is_ascii_whitespace())
        .collect();

    let decoded = STANDARD.decode(encoded).map_err(|e| {
        debug!(error = %e, "content is not base64");
        missing("content")
    })?;
    let text = String::from_utf8(decoded).map_err(|_| missing("content"))?;

    text.lines()
        .filter(|line| !line.trim().is_empty())
        .map(|line| {
            let record: IndexRecord = serde_json::from_str(line).map_err(|_| missing("vers"))?;
            ReleaseVersion::parse(&record.vers)
        })
        .collect()
}

impl<T: Transport> VersionSource for RegistrySource<T> {
    fn kind(&self) -> SourceKind {
        SourceKind::Registry
    }

    #[instrument(name = "registry", skip(self), fields(package = %self.package))]
    fn resolve_latest(&self) -> SourceResult<Resolved> {
        let (url, body) = self.fetch_index_file()?;
        let versions = versions_from_contents(&url, &body)?;
        let considered = versions.len();
        let version = max_version(versions)?;
        debug!(%version, considered, "registry version");
        Ok(Resolved {
            version,
            considered,
            skipped: Vec::new(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::testing::FakeTransport;

    const INDEX: &str = "https://api.test/repos/rust-lang/crates.io-index";

    fn contents_body(records: &str) -> String {
        let encoded = STANDARD.encode(records);
        // the API wraps base64 at 60 columns
        let wrapped: Vec<String> = encoded
            .as_bytes()
            .chunks(60)
            .map(|c| String::from_utf8_lossy(c).into_owned())
            .collect();
        serde_json::json!({ "name": "kojamp", "content": wrapped.join("\n") }).to_string()
    }

    // ========================================================================
    // shard_candidates
    // ========================================================================

    #[test]
    fn two_char_name_has_one_candidate() {
        assert_eq!(shard_candidates("ab"), vec!["ab"]);
    }

    #[test]
    fn odd_name_drops_trailing_single() {
        assert_eq!(shard_candidates("abc"), vec!["ab/c", "ab"]);
    }

    #[test]
    fn long_name_shrinks_to_first_chunk() {
        assert_eq!(shard_candidates("foobar"), vec!["fo/ob/ar", "fo/ob", "fo"]);
        assert_eq!(
            shard_candidates("kojamp"),
            vec!["ko/ja/mp", "ko/ja", "ko"]
        );
    }

    #[test]
    fn tiny_names() {
        assert_eq!(shard_candidates("a"), vec!["a"]);
        assert!(shard_candidates("").is_empty());
    }

    // ========================================================================
    // RegistrySource
    // ========================================================================

    #[test]
    fn two_char_name_probes_single_path() {
        let transport = FakeTransport::new();
        let source = RegistrySource::new(&transport, INDEX, "ab");
        let _ = source.resolve_latest();
        assert_eq!(
            transport.requested(),
            vec![format!("{INDEX}/contents/ab/ab")]
        );
    }

    #[test]
    fn walks_up_until_found() {
        let found = format!("{INDEX}/contents/ko/ja/kojamp");
        let body = contents_body(
            "{\"name\":\"kojamp\",\"vers\":\"0.1.0\"}\n{\"name\":\"kojamp\",\"vers\":\"0.1.2\"}\n{\"name\":\"kojamp\",\"vers\":\"0.1.1\"}\n",
        );
        let transport = FakeTransport::new().json(&found, &body);
        let source = RegistrySource::new(&transport, INDEX, "kojamp");

        let resolved = source.resolve_latest().unwrap();
        assert_eq!(resolved.version, ReleaseVersion::new(0, 1, 2));
        assert_eq!(resolved.considered, 3);
        assert_eq!(
            transport.requested(),
            vec![format!("{INDEX}/contents/ko/ja/mp/kojamp"), found]
        );
    }

    #[test]
    fn not_found_anywhere_reports_last_status() {
        let transport = FakeTransport::new().status(&format!("{INDEX}/contents/ko/kojamp"), 403);
        let source = RegistrySource::new(&transport, INDEX, "kojamp");
        assert_eq!(
            source.resolve_latest().unwrap_err(),
            SourceError::HttpError {
                url: format!("{INDEX}/contents"),
                status: Some(403)
            }
        );
        assert_eq!(transport.requested().len(), 3);
    }

    #[test]
    fn missing_content_field() {
        let url = format!("{INDEX}/contents/ab/ab");
        let transport = FakeTransport::new().json(&url, r#"{"name":"ab"}"#);
        let source = RegistrySource::new(&transport, INDEX, "ab");
        assert_eq!(
            source.resolve_latest().unwrap_err(),
            SourceError::field_missing(url, "content")
        );
    }

    #[test]
    fn undecodable_content() {
        let url = format!("{INDEX}/contents/ab/ab");
        let transport = FakeTransport::new().json(&url, r#"{"content":"!!not base64!!"}"#);
        let source = RegistrySource::new(&transport, INDEX, "ab");
        assert!(matches!(
            source.resolve_latest(),
            Err(SourceError::FieldMissing { ref field, .. }) if field == "content"
        ));
    }

    #[test]
    fn record_without_vers() {
        let url = format!("{INDEX}/contents/ab/ab");
        let body = contents_body("{\"name\":\"ab\",\"vers\":\"1.0.0\"}\n{\"name\":\"ab\"}\n");
        let transport = FakeTransport::new().json(&url, &body);
        let source = RegistrySource::new(&transport, INDEX, "ab");
        assert_eq!(
            source.resolve_latest().unwrap_err(),
            SourceError::field_missing(url, "vers")
        );
    }

    #[test]
    fn unparseable_vers_is_invalid_format() {
        let url = format!("{INDEX}/contents/ab/ab");
        let body = contents_body("{\"vers\":\"1.0\"}\n");
        let transport = FakeTransport::new().json(&url, &body);
        let source = RegistrySource::new(&transport, INDEX, "ab");
        assert!(matches!(
            source.resolve_latest(),
            Err(SourceError::InvalidVersionFormat { .. })
        ));
    }

    #[test]
    fn empty_index_file() {
        let url = format!("{INDEX}/contents/ab/ab");
        let transport = FakeTransport::new().json(&url, &contents_body(""));
        let source = RegistrySource::new(&transport, INDEX, "ab");
        assert_eq!(
            source.resolve_latest().unwrap_err(),
            SourceError::EmptyVersionSet
        );
    }
}
