use crate::core::Storage;
use crate::utils::error::Result;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

/// Stores each key as a file under `base_path`.
#[derive(Debug, Clone)]
pub struct LocalStorage {
    base_path: String,
}

impl LocalStorage {
    pub fn new(base_path: String) -> Self {
        Self { base_path }
    }

    pub fn full_path(&self, path: &str) -> PathBuf {
        Path::new(&self.base_path).join(path)
    }
}

impl Storage for LocalStorage {
    async fn read_file(&self, path: &str) -> Result<Vec<u8>> {
        let data = fs::read(self.full_path(path))?;
        Ok(data)
    }

    async fn write_file(&self, path: &str, data: &[u8]) -> Result<()> {
        let full_path = self.full_path(path);

        if let Some(parent) = full_path.parent() {
            fs::create_dir_all(parent)?;
        }

        // 先寫暫存檔再改名，輪詢端不會讀到寫一半的內容
        let tmp_path = full_path.with_extension("tmp");
        fs::write(&tmp_path, data)?;
        fs::rename(tmp_path, full_path)?;
        Ok(())
    }

    async fn remove_file(&self, path: &str) -> Result<bool> {
        match fs::remove_file(self.full_path(path)) {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    async fn exists(&self, path: &str) -> Result<bool> {
        Ok(self.full_path(path).is_file())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_write_read_remove() {
        let temp_dir = TempDir::new().unwrap();
        let storage = LocalStorage::new(temp_dir.path().to_str().unwrap().to_string());

        assert!(!storage.exists("nested/key.json").await.unwrap());
        storage.write_file("nested/key.json", b"[]").await.unwrap();
        assert!(storage.exists("nested/key.json").await.unwrap());
        assert_eq!(storage.read_file("nested/key.json").await.unwrap(), b"[]");

        assert!(storage.remove_file("nested/key.json").await.unwrap());
        assert!(!storage.remove_file("nested/key.json").await.unwrap());
        assert!(storage.read_file("nested/key.json").await.is_err());
    }

    #[test]
    fn test_overwrite_leaves_no_temp_file() {
        let temp_dir = TempDir::new().unwrap();
        let storage = LocalStorage::new(temp_dir.path().to_str().unwrap().to_string());

        tokio_test::block_on(async {
            tokio_test::assert_ok!(storage.write_file("incoming_order.json", b"{}").await);
            tokio_test::assert_ok!(storage.write_file("incoming_order.json", b"{\"id\":1}").await);
            assert_eq!(
                storage.read_file("incoming_order.json").await.unwrap(),
                b"{\"id\":1}"
            );
        });
        assert!(!temp_dir.path().join("incoming_order.tmp").exists());
    }
}
