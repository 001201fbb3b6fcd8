//! OAuth session tokens and the plaintext token file.

use std::path::{Path, PathBuf};

use crate::error::{classify_io_error, WireResult};
use crate::startup::write_private;

/// Access and refresh token of the running session.
#[derive(Clone, PartialEq, Eq)]
pub struct SessionCredentials {
    pub access_token: String,
    pub refresh_token: String,
}

impl SessionCredentials {
    pub fn new(access_token: impl Into<String>, refresh_token: impl Into<String>) -> Self {
        Self {
            access_token: access_token.into(),
            refresh_token: refresh_token.into(),
        }
    }

    /// Apply a refresh result: the access token is always replaced, the
    /// refresh token only when the provider rotated it.
    pub fn rotate(&mut self, access_token: String, refresh_token: Option<String>) {
        self.access_token = access_token;
        if let Some(refresh) = refresh_token.filter(|r| !r.is_empty()) {
            self.refresh_token = refresh;
        }
    }
}

impl std::fmt::Debug for SessionCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionCredentials")
            .field("access_token", &format!("<{} bytes>", self.access_token.len()))
            .field("refresh_token", &format!("<{} bytes>", self.refresh_token.len()))
            .finish()
    }
}

/// `.token`: the current access token, for external tools to pick up.
///
/// Not protected beyond file mode 0600.
#[derive(Debug, Clone)]
pub struct TokenFile {
    path: PathBuf,
}

impl TokenFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn write(&self, access_token: &str) -> WireResult<()> {
        write_private(&self.path, access_token.as_bytes())
            .map_err(|e| classify_io_error(e, Some(self.path.clone()), "write token file"))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rotate_keeps_refresh_token_unless_rotated() {
        let mut creds = SessionCredentials::new("a1", "r1");
        creds.rotate("a2".into(), None);
        assert_eq!(creds, SessionCredentials::new("a2", "r1"));

        creds.rotate("a3".into(), Some(String::new()));
        assert_eq!(creds.refresh_token, "r1");

        creds.rotate("a4".into(), Some("r2".into()));
        assert_eq!(creds, SessionCredentials::new("a4", "r2"));
    }

    #[test]
    fn test_debug_hides_tokens() {
        let creds = SessionCredentials::new("eyJhbGciOi", "refresh-me");
        let debug = format!("{:?}", creds);
        assert!(!debug.contains("eyJhbGciOi"));
        assert!(!debug.contains("refresh-me"));
    }

    #[test]
    fn test_token_file_overwrites() {
        let dir = tempfile::tempdir().unwrap();
        let file = TokenFile::new(dir.path().join(".token"));
        file.write("first-token-long").unwrap();
        file.write("second").unwrap();
        assert_eq!(std::fs::read_to_string(file.path()).unwrap(), "second");
    }
}
