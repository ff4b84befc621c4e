//! URL path to script resolution.
//!
//! # Responsibilities
//! - Percent-decode the request path before anything looks at it
//! - Pass the decoded path through when running a static command
//! - Walk the path under the script directory to find the script
//! - Split off the remainder as PATH_INFO
//!
//! # Design Decisions
//! - Directories are transparent routing nodes; a bare directory is never a script
//! - The filesystem is consulted on every call, nothing is cached
//! - `.` and `..` segments never match, so lookups stay inside the script directory

use std::path::{Path, PathBuf};

use percent_encoding::percent_decode_str;

use crate::config::GatewayConfig;
use crate::session::error::SessionError;

/// Where a URL path landed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UrlInfo {
    /// URL prefix naming the script; `/` without script-dir routing.
    pub script_path: String,
    /// Remainder after the script, empty or starting with `/`.
    pub path_info: String,
    /// Script location on disk; empty without script-dir routing.
    pub file_path: PathBuf,
}

/// Resolve the raw request `path` according to the routing mode in `config`.
///
/// `%2F` decodes to a separator, so it splits segments like a literal `/`.
pub fn resolve_url(path: &str, config: &GatewayConfig) -> Result<UrlInfo, SessionError> {
    let path = decode_path(path)?;
    match &config.script_dir {
        None => Ok(UrlInfo {
            script_path: "/".to_string(),
            path_info: path,
            file_path: PathBuf::new(),
        }),
        Some(root) => resolve_script(&path, root),
    }
}

fn decode_path(path: &str) -> Result<String, SessionError> {
    percent_decode_str(path)
        .decode_utf8()
        .map(|decoded| decoded.into_owned())
        .map_err(|_| SessionError::InvalidRequest(format!("path {path:?} is not valid UTF-8 once decoded")))
}

/// Walk `path` segment by segment under `root`.
fn resolve_script(path: &str, root: &Path) -> Result<UrlInfo, SessionError> {
    let not_found = || SessionError::ScriptNotFound {
        path: path.to_string(),
    };

    let parts: Vec<&str> = path.strip_prefix('/').unwrap_or(path).split('/').collect();
    let mut script_path = String::new();
    let mut file_path = root.to_path_buf();

    for (i, part) in parts.iter().enumerate() {
        if *part == "." || *part == ".." {
            return Err(not_found());
        }

        script_path.push('/');
        script_path.push_str(part);
        if !part.is_empty() {
            file_path.push(part);
        }

        let is_last = i == parts.len() - 1;
        let metadata = std::fs::metadata(&file_path).map_err(|_| not_found())?;

        if metadata.is_dir() {
            if is_last {
                return Err(not_found());
            }
            continue;
        }

        let path_info = if is_last {
            String::new()
        } else {
            format!("/{}", parts[i + 1..].join("/"))
        };
        return Ok(UrlInfo {
            script_path,
            path_info,
            file_path,
        });
    }

    // The last segment either matched a file or returned above.
    unreachable!("script lookup ran past the end of {path:?}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn script_dir() -> (tempfile::TempDir, GatewayConfig) {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir_all(dir.path().join("a")).unwrap();
        fs::write(dir.path().join("a/b"), "#!/bin/sh\n").unwrap();
        fs::write(dir.path().join("top"), "#!/bin/sh\n").unwrap();
        fs::create_dir_all(dir.path().join("empty")).unwrap();

        let mut config = GatewayConfig::default();
        config.script_dir = Some(dir.path().to_path_buf());
        (dir, config)
    }

    #[test]
    fn static_command_passes_path_through() {
        let config = GatewayConfig::default();
        for path in ["/", "/anything/at/all", "/a/../b"] {
            let info = resolve_url(path, &config).unwrap();
            assert_eq!(info.script_path, "/");
            assert_eq!(info.path_info, path);
            assert_eq!(info.file_path, PathBuf::new());
        }
    }

    #[test]
    fn nested_script_with_path_info() {
        let (dir, config) = script_dir();
        let info = resolve_url("/a/b/c/d", &config).unwrap();
        assert_eq!(info.script_path, "/a/b");
        assert_eq!(info.file_path, dir.path().join("a/b"));
        assert_eq!(info.path_info, "/c/d");
    }

    #[test]
    fn exact_script_has_no_path_info() {
        let (dir, config) = script_dir();
        let info = resolve_url("/top", &config).unwrap();
        assert_eq!(info.script_path, "/top");
        assert_eq!(info.file_path, dir.path().join("top"));
        assert_eq!(info.path_info, "");
    }

    #[test]
    fn trailing_slash_after_script_is_path_info() {
        let (_dir, config) = script_dir();
        let info = resolve_url("/top/", &config).unwrap();
        assert_eq!(info.path_info, "/");
    }

    #[test]
    fn missing_entries_are_not_found() {
        let (_dir, config) = script_dir();
        for path in ["/nope", "/a/nope", "/a/nope/deeper", "/empty/x"] {
            let err = resolve_url(path, &config).unwrap_err();
            assert!(matches!(err, SessionError::ScriptNotFound { .. }), "{path}");
        }
    }

    #[test]
    fn directories_are_never_scripts() {
        let (_dir, config) = script_dir();
        for path in ["/", "/a", "/a/", "/empty"] {
            let err = resolve_url(path, &config).unwrap_err();
            assert!(matches!(err, SessionError::ScriptNotFound { .. }), "{path}");
        }
    }

    #[test]
    fn dot_segments_do_not_escape_root() {
        let (dir, _) = script_dir();
        let mut config = GatewayConfig::default();
        config.script_dir = Some(dir.path().join("a"));

        assert!(resolve_url("/../top", &config).is_err());
        assert!(resolve_url("/./b", &config).is_err());
        assert!(matches!(
            resolve_url("/%2e%2e/top", &config),
            Err(SessionError::ScriptNotFound { .. })
        ));
        assert!(resolve_url("/%2E/b", &config).is_err());
    }

    #[test]
    fn encoded_script_name_and_path_info() {
        let (dir, config) = script_dir();
        fs::write(dir.path().join("hello world"), "#!/bin/sh\n").unwrap();

        let info = resolve_url("/hello%20world/x%2Fy", &config).unwrap();
        assert_eq!(info.script_path, "/hello world");
        assert_eq!(info.file_path, dir.path().join("hello world"));
        assert_eq!(info.path_info, "/x/y");

        let info = resolve_url("/a/b/caf%C3%A9", &config).unwrap();
        assert_eq!(info.path_info, "/café");
    }

    #[test]
    fn static_command_path_info_is_decoded() {
        let info = resolve_url("/chat%20room", &GatewayConfig::default()).unwrap();
        assert_eq!(info.path_info, "/chat room");
    }

    #[test]
    fn undecodable_path_is_invalid_request() {
        let (_dir, config) = script_dir();
        for config in [GatewayConfig::default(), config] {
            let err = resolve_url("/bad%FFbyte", &config).unwrap_err();
            assert!(matches!(err, SessionError::InvalidRequest(_)));
        }
    }
}
