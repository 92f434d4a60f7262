use std::path::Path;
use std::path::PathBuf;

use async_trait::async_trait;

use crate::Result;
use crate::Storage;

/// Plain OS filesystem access rooted nowhere in particular; paths passed in
/// are already absolute logical paths.
pub struct LocalStorage {
    _root: PathBuf,
}

impl LocalStorage {
    pub fn new(root: PathBuf) -> Self {
        Self { _root: root }
    }
}

#[async_trait]
impl Storage for LocalStorage {
    async fn list(&self, root: &str, extension: &str) -> Result<Vec<String>> {
        let root = root.to_string();
        let extension = extension.to_string();
        tokio::task::spawn_blocking(move || walk_by_extension(&root, &extension))
            .await
            .unwrap_or_else(|join_err| {
                Err(std::io::Error::other(join_err.to_string()).into())
            })
    }

    async fn read(&self, path: &str) -> Result<Vec<u8>> {
        Ok(tokio::fs::read(path).await?)
    }

    async fn write(&self, path: &str, data: &[u8]) -> Result<()> {
        if let Some(parent) = Path::new(path).parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(path, data).await?;
        Ok(())
    }

    async fn exists(&self, path: &str) -> Result<bool> {
        Ok(tokio::fs::try_exists(path).await?)
    }
}

fn walk_by_extension(root: &str, extension: &str) -> Result<Vec<String>> {
    let mut found = Vec::new();
    for entry in walkdir::WalkDir::new(root).into_iter().filter_map(|e| e.ok()) {
        if !entry.file_type().is_file() {
            continue;
        }
        let matches_extension = entry
            .path()
            .extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| ext.eq_ignore_ascii_case(extension))
            .unwrap_or(false);
        if matches_extension {
            found.push(entry.path().to_string_lossy().into_owned());
        }
    }
    Ok(found)
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use super::*;

    #[tokio::test]
    async fn lists_only_matching_extension_recursively() {
        let dir = tempfile::tempdir().unwrap();
        let nested = dir.path().join("a/b");
        tokio::fs::create_dir_all(&nested).await.unwrap();
        tokio::fs::write(dir.path().join("top.pdf"), b"x").await.unwrap();
        tokio::fs::write(nested.join("deep.pdf"), b"x").await.unwrap();
        tokio::fs::write(nested.join("deep.txt"), b"x").await.unwrap();

        let storage = LocalStorage::new(dir.path().to_path_buf());
        let mut found = storage.list(dir.path().to_str().unwrap(), "pdf").await.unwrap();
        found.sort();
        assert_eq!(found.len(), 2);
        assert!(found.iter().all(|p| p.ends_with(".pdf")));
    }

    #[tokio::test]
    async fn write_creates_parent_directories() {
        let dir = tempfile::tempdir().unwrap();
        let storage = LocalStorage::new(dir.path().to_path_buf());
        let out = dir.path().join("nested/out.txt");
        storage.write(out.to_str().unwrap(), b"hello").await.unwrap();
        assert!(storage.exists(out.to_str().unwrap()).await.unwrap());
    }
}
