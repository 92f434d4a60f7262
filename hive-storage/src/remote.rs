use async_trait::async_trait;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;

use crate::DIR_OP_TIMEOUT;
use crate::FILE_OP_TIMEOUT;
use crate::Result;
use crate::Storage;
use crate::StorageError;

/// A remote tree reached by shelling a command over to `user@host`. The
/// abstract transport used here is a plain `ssh`-shaped subprocess; any
/// transport that accepts `[command, args...]` and pipes stdin/stdout the
/// same way can be substituted without touching the rest of the coordinator.
pub struct RemoteShellStorage {
    user: String,
    host: String,
    _root: String,
}

impl RemoteShellStorage {
    pub fn new(user: String, host: String, root: String) -> Self {
        Self {
            user,
            host,
            _root: root,
        }
    }

    fn destination(&self) -> String {
        format!("{}@{}", self.user, self.host)
    }

    async fn run(&self, remote_command: &str, timeout: std::time::Duration) -> Result<Vec<u8>> {
        let output = tokio::time::timeout(
            timeout,
            Command::new("ssh")
                .arg(self.destination())
                .arg(remote_command)
                .output(),
        )
        .await
        .map_err(|_| StorageError::Timeout(timeout))??;
        if !output.status.success() {
            return Err(StorageError::RemoteCommand(format!(
                "`{remote_command}` exited with {}: {}",
                output.status,
                String::from_utf8_lossy(&output.stderr)
            )));
        }
        Ok(output.stdout)
    }

    async fn run_with_stdin(
        &self,
        remote_command: &str,
        stdin_data: &[u8],
        timeout: std::time::Duration,
    ) -> Result<()> {
        let mut child = Command::new("ssh")
            .arg(self.destination())
            .arg(remote_command)
            .stdin(std::process::Stdio::piped())
            .spawn()?;
        let mut stdin = child.stdin.take().ok_or_else(|| {
            StorageError::RemoteCommand("failed to open remote stdin pipe".to_string())
        })?;
        let write_and_wait = async {
            stdin.write_all(stdin_data).await?;
            drop(stdin);
            child.wait_with_output().await
        };
        let output = tokio::time::timeout(timeout, write_and_wait)
            .await
            .map_err(|_| StorageError::Timeout(timeout))??;
        if !output.status.success() {
            return Err(StorageError::RemoteCommand(format!(
                "`{remote_command}` exited with {}: {}",
                output.status,
                String::from_utf8_lossy(&output.stderr)
            )));
        }
        Ok(())
    }
}

#[async_trait]
impl Storage for RemoteShellStorage {
    async fn list(&self, root: &str, extension: &str) -> Result<Vec<String>> {
        let stdout = self
            .run(
                &format!(r#"find "{root}" -name "*.{extension}" -type f"#),
                DIR_OP_TIMEOUT,
            )
            .await?;
        let text = String::from_utf8_lossy(&stdout);
        Ok(text
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .map(str::to_string)
            .collect())
    }

    async fn read(&self, path: &str) -> Result<Vec<u8>> {
        let output = tokio::time::timeout(
            FILE_OP_TIMEOUT,
            Command::new("ssh")
                .arg(self.destination())
                .arg(format!(r#"cat "{path}""#))
                .output(),
        )
        .await
        .map_err(|_| StorageError::Timeout(FILE_OP_TIMEOUT))??;
        // `cat` on a missing remote path exits non-zero with nothing on
        // stdout; treat that the same as a local `NotFound` rather than a
        // generic remote-command failure, so the file proxy can 404 it.
        if !output.status.success() {
            return Err(StorageError::NotFound);
        }
        Ok(output.stdout)
    }

    async fn write(&self, path: &str, data: &[u8]) -> Result<()> {
        let dir = std::path::Path::new(path)
            .parent()
            .map(|p| p.to_string_lossy().into_owned())
            .unwrap_or_default();
        self.run(&format!(r#"mkdir -p "{dir}""#), DIR_OP_TIMEOUT)
            .await?;
        self.run_with_stdin(&format!(r#"cat > "{path}""#), data, FILE_OP_TIMEOUT)
            .await
    }

    async fn exists(&self, path: &str) -> Result<bool> {
        let stdout = self
            .run(
                &format!(r#"test -e "{path}" && echo yes || echo no"#),
                DIR_OP_TIMEOUT,
            )
            .await?;
        Ok(String::from_utf8_lossy(&stdout).trim() == "yes")
    }
}
