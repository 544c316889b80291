//! services/api/src/adapters/storage.rs
//!
//! On-disk layout for uploaded originals and generated PDFs.

use std::path::{Path, PathBuf};
use tracing::{info, warn};
use uuid::Uuid;

/// Owns the `originals/` and `generated/` directories under the uploads root.
#[derive(Clone, Debug)]
pub struct FileStorage {
    originals_dir: PathBuf,
    generated_dir: PathBuf,
}

impl FileStorage {
    pub fn new(uploads_dir: impl AsRef<Path>) -> Self {
        let root = uploads_dir.as_ref();
        Self {
            originals_dir: root.join("originals"),
            generated_dir: root.join("generated"),
        }
    }

    /// Creates both directories if they do not exist yet.
    pub async fn ensure_dirs(&self) -> std::io::Result<()> {
        tokio::fs::create_dir_all(&self.originals_dir).await?;
        tokio::fs::create_dir_all(&self.generated_dir).await?;
        info!(
            "File storage ready (originals: {}, generated: {})",
            self.originals_dir.display(),
            self.generated_dir.display()
        );
        Ok(())
    }

    pub fn originals_dir(&self) -> &Path {
        &self.originals_dir
    }

    pub fn generated_dir(&self) -> &Path {
        &self.generated_dir
    }

    /// Writes an uploaded original under a collision-free name and returns its path.
    pub async fn store_original(&self, original_name: &str, data: &[u8]) -> std::io::Result<PathBuf> {
        let path = self.originals_dir.join(stored_file_name(original_name));
        tokio::fs::write(&path, data).await?;
        Ok(path)
    }

    /// Where the rendered PDF for `id` lives.
    pub fn generated_pdf_path(&self, id: Uuid) -> PathBuf {
        self.generated_dir.join(format!("{}.pdf", id))
    }
}

/// `<32 hex chars>-<original name>`, with whitespace turned into `_` and
/// path separators neutralized.
pub fn stored_file_name(original_name: &str) -> String {
    let base = original_name
        .rsplit(['/', '\\'])
        .next()
        .unwrap_or_default();
    let cleaned: String = base
        .chars()
        .map(|c| if c.is_whitespace() { '_' } else { c })
        .collect();
    let cleaned = if cleaned.is_empty() || cleaned == "." || cleaned == ".." {
        "upload".to_string()
    } else {
        cleaned
    };
    format!("{}-{}", Uuid::new_v4().simple(), cleaned)
}

/// Deletes a file, logging instead of failing when that is not possible.
pub async fn remove_file_best_effort(path: &Path, what: &str) {
    if let Err(e) = tokio::fs::remove_file(path).await {
        warn!("Could not delete {} file {}: {}", what, path.display(), e);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stored_name_has_hex_prefix_and_underscored_name() {
        let name = stored_file_name("Plano de Aula 01.pdf");
        let (prefix, rest) = name.split_at(32);
        assert!(prefix.chars().all(|c| c.is_ascii_hexdigit()));
        assert_eq!(rest, "-Plano_de_Aula_01.pdf");
    }

    #[test]
    fn stored_name_drops_directories() {
        assert!(stored_file_name("../../etc/passwd").ends_with("-passwd"));
        assert!(stored_file_name("C:\\Users\\ana\\plano.docx").ends_with("-plano.docx"));
        assert!(stored_file_name("..").ends_with("-upload"));
        assert!(stored_file_name("").ends_with("-upload"));
    }

    #[test]
    fn stored_names_do_not_collide() {
        assert_ne!(stored_file_name("a.pdf"), stored_file_name("a.pdf"));
    }

    #[tokio::test]
    async fn store_and_remove_original() {
        let dir = tempfile::tempdir().unwrap();
        let storage = FileStorage::new(dir.path());
        storage.ensure_dirs().await.unwrap();

        let path = storage.store_original("plano.pdf", b"%PDF-1.4").await.unwrap();
        assert!(path.starts_with(storage.originals_dir()));
        assert_eq!(std::fs::read(&path).unwrap(), b"%PDF-1.4");

        remove_file_best_effort(&path, "original").await;
        assert!(!path.exists());
        // A second removal only logs.
        remove_file_best_effort(&path, "original").await;
    }

    #[test]
    fn generated_pdf_is_named_after_the_id() {
        let storage = FileStorage::new("/srv/uploads");
        let id = Uuid::new_v4();
        assert_eq!(
            storage.generated_pdf_path(id),
            PathBuf::from(format!("/srv/uploads/generated/{}.pdf", id))
        );
    }
}
