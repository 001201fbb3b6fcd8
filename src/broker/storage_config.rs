//! rclone remote configuration for the instance.

use std::path::{Path, PathBuf};

use tracing::info;

use super::sts::StorageCredentials;
use crate::error::{classify_io_error, WireResult};
use crate::startup::write_private;

/// Writes the `[<instance>]` S3 remote the mount process reads.
#[derive(Debug, Clone)]
pub struct StorageConfigWriter {
    path: PathBuf,
    instance: String,
    s3_endpoint: String,
}

impl StorageConfigWriter {
    pub fn new(path: impl Into<PathBuf>, instance: impl Into<String>, s3_endpoint: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            instance: instance.into(),
            s3_endpoint: s3_endpoint.into(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn render(&self, creds: &StorageCredentials) -> String {
        format!(
            "[{instance}]\n\
             type = s3\n\
             provider = Minio\n\
             env_auth = false\n\
             access_key_id = {key}\n\
             secret_access_key = {secret}\n\
             session_token = {token}\n\
             endpoint = {endpoint}\n",
            instance = self.instance,
            key = creds.access_key_id,
            secret = creds.secret_access_key,
            token = creds.session_token,
            endpoint = self.s3_endpoint,
        )
    }

    /// Replace the file. Mode 0600 since it carries a secret key.
    pub fn write(&self, creds: &StorageCredentials) -> WireResult<()> {
        write_private(&self.path, self.render(creds).as_bytes())
            .map_err(|e| classify_io_error(e, Some(self.path.clone()), "write storage config"))?;
        info!(
            path = %self.path.display(),
            instance = %self.instance,
            endpoint = %self.s3_endpoint,
            "storage config written"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn creds() -> StorageCredentials {
        StorageCredentials {
            access_key_id: "AK".into(),
            secret_access_key: "SK".into(),
            session_token: "ST".into(),
            expiry: None,
        }
    }

    #[test]
    fn test_render_remote_section() {
        let writer = StorageConfigWriter::new("/tmp/x", "infn", "https://minio.example.org:9000");
        let text = writer.render(&creds());
        assert!(text.starts_with("[infn]\ntype = s3\nprovider = Minio\n"));
        assert!(text.contains("access_key_id = AK\n"));
        assert!(text.contains("secret_access_key = SK\n"));
        assert!(text.contains("session_token = ST\n"));
        assert!(text.ends_with("endpoint = https://minio.example.org:9000\n"));
    }

    #[cfg(unix)]
    #[test]
    fn test_write_is_private() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        let writer = StorageConfigWriter::new(dir.path().join("rclone.conf"), "infn", "https://s3");
        writer.write(&creds()).unwrap();
        let mode = std::fs::metadata(writer.path()).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o600);
    }
}
