//! Storage URI validation and docker-path rewriting.
//!
//! Every file parameter carries two renderings of the same location: the
//! canonical external URI that the generated copy steps read and write, and
//! a docker path relative to the working-disk mount root that the user's
//! command sees. [`normalize`] produces both, or fails with a specific
//! [`UriError`] rather than silently approximating.

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors produced while validating or rewriting a path or URI.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum UriError {
    /// Only Google Cloud Storage locations pass the provider check.
    #[error("expected a gs:// storage location, found: {0}")]
    UnsupportedProvider(String),

    /// Square-bracket character ranges are an unsupported wildcard class.
    #[error("square bracket character ranges are not supported: {0}")]
    CharacterRange(String),

    /// `?` single-character wildcards are an unsupported wildcard class.
    #[error("question mark wildcards are not supported: {0}")]
    QuestionMark(String),

    /// `*` may only appear in the basename, never in the directory prefix.
    #[error("path wildcards (*) are only supported for files: {0}")]
    DirectoryWildcard(String),

    /// Recursive `**` wildcards would require directory-level expansion.
    #[error("recursive wildcards (\"**\") are not supported: {0}")]
    RecursiveWildcard(String),

    /// `.` and `..` cannot be used as file names.
    #[error("path characters \"..\" and \".\" are not supported for file names: {0}")]
    RelativeBasename(String),

    /// Non-recursive references must name a file or file wildcard.
    #[error("values that are not recursive must reference a filename or wildcard: {0}")]
    MissingBasename(String),
}

/// A URI split into its hierarchical prefix and basename.
///
/// `path` is the entire leading part of the URI (scheme, host, and directory
/// path for remote URIs, directory only for local paths) and always ends in
/// a forward slash. `basename` is the last token; it is empty for a bare
/// directory reference.
///
/// | uri                         | path                  | basename   |
/// |-----------------------------|-----------------------|------------|
/// | gs://bucket/folder/file.txt | `gs://bucket/folder/` | `file.txt` |
/// | gs://bucket/folder/         | `gs://bucket/folder/` | ``         |
/// | /tmp/ab.txt                 | `/tmp/`               | `ab.txt`   |
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UriParts {
    /// Hierarchical prefix of the resource; ends in `/`.
    pub path: String,
    /// Final path token; empty for a bare directory reference.
    pub basename: String,
    /// Whether this reference names a directory tree to be synchronized.
    pub recursive: bool,
}

impl UriParts {
    /// The canonical external URI: `path` and `basename` concatenated.
    #[must_use]
    pub fn uri(&self) -> String {
        format!("{}{}", self.path, self.basename)
    }
}

impl fmt::Display for UriParts {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.path, self.basename)
    }
}

/// Ensure a directory reference ends with exactly one trailing `/`.
///
/// Idempotent, and also repairs references carrying several trailing
/// slashes. Recursive copies rely on the trailing slash.
#[must_use]
pub fn directory_fmt(directory: &str) -> String {
    format!("{}/", directory.trim_end_matches('/'))
}

/// Validate `raw_uri` and rewrite it into a docker path and split URI parts.
///
/// Recursive references are coerced to directory form first, so
/// `gs://bucket/dir` and `gs://bucket/dir/` normalize identically. The
/// returned docker path is relative to the mount root: it never starts with
/// `/` and never contains a `..` segment.
pub fn normalize(raw_uri: &str, recursive: bool) -> Result<(String, UriParts), UriError> {
    // Recursive URIs are directory paths.
    let raw_uri = if recursive {
        directory_fmt(raw_uri)
    } else {
        raw_uri.to_string()
    };
    validate_provider(&raw_uri)?;
    validate_path(&raw_uri, recursive)?;
    let (uri, docker_path) = rewrite_gcs(&raw_uri);
    let (dir, base) = split_uri(&uri);
    let parts = UriParts {
        path: directory_fmt(dir),
        basename: base.to_string(),
        recursive,
    };
    Ok((docker_path, parts))
}

/// Only GCS locations are currently supported.
fn validate_provider(uri: &str) -> Result<(), UriError> {
    if uri.starts_with("gs://") {
        Ok(())
    } else {
        Err(UriError::UnsupportedProvider(uri.to_string()))
    }
}

/// Basic validation of the URI shape ahead of rewriting.
///
/// Character ranges ([0-9]) could be supported with some more work, but
/// basic asterisk wildcards cover the common cases. Square brackets and
/// question marks are rejected outright: if they appeared to work it would
/// be accidental. Wildcards at the directory level and `**` would need
/// expansion into a series of parameters, so they are rejected as well.
fn validate_path(uri: &str, recursive: bool) -> Result<(), UriError> {
    let (path, basename) = split_uri(uri);

    if uri.contains('[') || uri.contains(']') {
        return Err(UriError::CharacterRange(uri.to_string()));
    }
    if uri.contains('?') {
        return Err(UriError::QuestionMark(uri.to_string()));
    }
    if path.contains('*') {
        return Err(UriError::DirectoryWildcard(uri.to_string()));
    }
    if basename.contains("**") {
        return Err(UriError::RecursiveWildcard(uri.to_string()));
    }
    if basename == "." || basename == ".." {
        return Err(UriError::RelativeBasename(uri.to_string()));
    }
    // Do not allow non-recursive IO to reference directories.
    if !recursive && basename.is_empty() {
        return Err(UriError::MissingBasename(uri.to_string()));
    }
    Ok(())
}

/// Split a URI on its last `/` into directory prefix and basename.
fn split_uri(uri: &str) -> (&str, &str) {
    uri.rsplit_once('/').unwrap_or(("", uri))
}

/// Rewrite a GCS location for mounting inside the docker worker.
///
/// The external URI is returned untouched; the docker path replaces the
/// leading `gs://` with a `gs/` segment so the object key becomes a valid
/// sub-path under the mount root, distinguishable from rewritten local
/// paths.
fn rewrite_gcs(raw_uri: &str) -> (String, String) {
    let docker_path = raw_uri.replacen("gs://", "gs/", 1);
    (raw_uri.to_string(), docker_path)
}

/// Rewrite a local filesystem path for mounting inside the docker worker.
///
/// Dormant extension point: the provider check in [`normalize`] only admits
/// `gs://` locations today, but these rewrite rules define how local paths
/// would be made mount-safe. The external form has shell and scheme
/// prefixes (`file:///`, `~/`, `./`, `file:/`) expanded to an absolute path
/// with indirections collapsed. The docker form is re-rooted under a
/// literal `file/` segment so it can never collide with a `gs/` path, with
/// traversal above the rewrite root substituted by the synthetic `_dotdot_`
/// token and an unexpanded home prefix by `_home_`, never silently dropped,
/// so the container path cannot escape its mount root and does not record
/// the invoking user's home directory layout.
///
/// Returns `(normalized_uri, docker_path)`.
#[must_use]
pub fn rewrite_local(raw_uri: &str) -> (String, String) {
    // Split off the filename so it is never rewritten.
    let (raw_path, filename) = split_uri(raw_uri);

    // Resolvable external form: expand prefixes, make absolute, collapse
    // indirections.
    let mut normed = raw_path.to_string();
    if let Some(rest) = normed.strip_prefix("file:///") {
        normed = format!("/{rest}");
    } else if let Some(rest) = normed.strip_prefix("~/") {
        if let Some(home) = dirs::home_dir() {
            normed = format!("{}/{rest}", home.to_string_lossy());
        }
    } else if let Some(rest) = normed.strip_prefix("./") {
        normed = rest.to_string();
    } else if let Some(rest) = normed.strip_prefix("file:/") {
        normed = format!("/{rest}");
    }
    if !normed.starts_with('/') {
        if let Ok(cwd) = std::env::current_dir() {
            normed = format!("{}/{normed}", cwd.to_string_lossy());
        }
    }
    let normed_uri = format!(
        "{}{filename}",
        directory_fmt(&collapse_indirections(&normed))
    );

    // Docker form: collapse indirections lexically, substitute the
    // traversal and home tokens, strip leading path characters, re-root
    // under the local namespace segment.
    let mut docker = collapse_indirections(raw_path)
        .split('/')
        .map(|segment| if segment == ".." { "_dotdot_" } else { segment })
        .collect::<Vec<_>>()
        .join("/");
    if let Some(rest) = docker.strip_prefix("~/") {
        docker = format!("_home_/{rest}");
    } else if let Some(rest) = docker.strip_prefix("file:/") {
        docker = rest.to_string();
    }
    let docker = docker.trim_start_matches(['.', '/']);
    let docker_path = format!("{}{filename}", directory_fmt(&format!("file/{docker}")));
    (normed_uri, docker_path)
}

/// Lexically collapse `.`, empty, and resolvable `..` segments.
///
/// A `..` that would climb above the start of a relative path is kept; on an
/// absolute path it stops at the root.
fn collapse_indirections(path: &str) -> String {
    let absolute = path.starts_with('/');
    let mut stack: Vec<&str> = Vec::new();
    for segment in path.split('/') {
        match segment {
            "" | "." => {}
            ".." => {
                if absolute {
                    stack.pop();
                } else if matches!(stack.last(), None | Some(&"..")) {
                    stack.push("..");
                } else {
                    stack.pop();
                }
            }
            other => stack.push(other),
        }
    }
    let joined = stack.join("/");
    if absolute {
        format!("/{joined}")
    } else if joined.is_empty() {
        ".".to_string()
    } else {
        joined
    }
}
