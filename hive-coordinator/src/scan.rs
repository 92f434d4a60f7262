//! Turning a source/destination pair of [`hive_storage::Location`]s into the
//! set of `(input_path, output_path)` pairs seeded into the queue.

use hive_storage::Storage;
use tracing::info;

/// Walk `source_root` for `.pdf` files, derive each one's `.txt` counterpart
/// under `dest_root`, drop the ones that already exist, and return the rest.
///
/// `dest_is_remote` picks the existence-check strategy: remote destinations
/// are probed with one bulk `list` call (one round trip beats one per
/// candidate over a shell transport); local destinations are checked with
/// `exists` per candidate, since a stat call is effectively free.
pub async fn scan_and_seed(
    source: &dyn Storage,
    source_root: &str,
    dest: &dyn Storage,
    dest_root: &str,
    dest_is_remote: bool,
) -> hive_storage::Result<Vec<(String, String)>> {
    info!("scanning for PDFs under {source_root}");
    let pdfs = source.list(source_root, "pdf").await?;
    info!(count = pdfs.len(), "found PDFs");

    let pairs: Vec<(String, String)> = pdfs
        .into_iter()
        .map(|pdf| {
            let text_path = derive_output_path(&pdf, source_root, dest_root);
            (pdf, text_path)
        })
        .collect();

    skip_existing(pairs, dest, dest_root, dest_is_remote).await
}

/// Replace `source_root` with `dest_root` and swap the extension for `.txt`.
fn derive_output_path(input: &str, source_root: &str, dest_root: &str) -> String {
    let relative = input
        .strip_prefix(source_root)
        .unwrap_or(input)
        .trim_start_matches('/');
    let relative_txt = std::path::Path::new(relative).with_extension("txt");
    format!(
        "{}/{}",
        dest_root.trim_end_matches('/'),
        relative_txt.to_string_lossy()
    )
}

async fn skip_existing(
    pairs: Vec<(String, String)>,
    dest: &dyn Storage,
    dest_root: &str,
    dest_is_remote: bool,
) -> hive_storage::Result<Vec<(String, String)>> {
    if dest_is_remote {
        info!("checking for existing text files");
        let existing: std::collections::HashSet<String> =
            dest.list(dest_root, "txt").await?.into_iter().collect();
        Ok(pairs
            .into_iter()
            .filter(|(_, text_path)| !existing.contains(text_path))
            .collect())
    } else {
        let mut kept = Vec::with_capacity(pairs.len());
        for (pdf, text_path) in pairs {
            if !dest.exists(&text_path).await? {
                kept.push((pdf, text_path));
            }
        }
        Ok(kept)
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use super::*;
    use hive_storage::LocalStorage;

    #[test]
    fn derives_txt_path_under_dest_root() {
        let out = derive_output_path("/src/pdfs/a/b.pdf", "/src/pdfs", "/out/text");
        assert_eq!(out, "/out/text/a/b.txt");
    }

    #[test]
    fn derives_txt_path_when_input_has_no_nesting() {
        let out = derive_output_path("/src/pdfs/b.pdf", "/src/pdfs", "/out/text");
        assert_eq!(out, "/out/text/b.txt");
    }

    #[tokio::test]
    async fn scan_and_seed_skips_local_existing_outputs() {
        let src_dir = tempfile::tempdir().unwrap();
        let dst_dir = tempfile::tempdir().unwrap();
        tokio::fs::write(src_dir.path().join("a.pdf"), b"x").await.unwrap();
        tokio::fs::write(src_dir.path().join("b.pdf"), b"x").await.unwrap();
        tokio::fs::write(dst_dir.path().join("a.txt"), b"already done").await.unwrap();

        let source = LocalStorage::new(src_dir.path().to_path_buf());
        let dest = LocalStorage::new(dst_dir.path().to_path_buf());
        let pairs = scan_and_seed(
            &source,
            src_dir.path().to_str().unwrap(),
            &dest,
            dst_dir.path().to_str().unwrap(),
            false,
        )
        .await
        .unwrap();

        assert_eq!(pairs.len(), 1);
        assert!(pairs[0].0.ends_with("b.pdf"));
    }
}
