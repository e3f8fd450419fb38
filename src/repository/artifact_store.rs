// ==========================================
// 同行评审系统 - 上传文件存储
// ==========================================
// 职责: 保存 / 读取 / 删除暂存批次背后的上传文件
// 约束: delete 幂等（文件不存在视为成功）
// ==========================================

use crate::domain::staging::ArtifactLocation;
use crate::repository::error::{RepositoryError, RepositoryResult};
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tracing::debug;
use uuid::Uuid;

// ==========================================
// ArtifactStorage Trait
// ==========================================
pub trait ArtifactStorage: Send + Sync {
    /// 保存上传内容，返回位置
    fn save(&self, bytes: &[u8]) -> RepositoryResult<ArtifactLocation>;

    /// 读取上传内容
    fn read(&self, location: &ArtifactLocation) -> RepositoryResult<Vec<u8>>;

    /// 删除上传内容（幂等）
    fn delete(&self, location: &ArtifactLocation) -> RepositoryResult<()>;

    fn exists(&self, location: &ArtifactLocation) -> bool;
}

// ==========================================
// FsArtifactStorage - 本地目录存储
// ==========================================
pub struct FsArtifactStorage {
    base_dir: PathBuf,
}

impl FsArtifactStorage {
    /// 创建存储（目录不存在时自动创建）
    pub fn new<P: AsRef<Path>>(base_dir: P) -> RepositoryResult<Self> {
        let base_dir = base_dir.as_ref().to_path_buf();
        fs::create_dir_all(&base_dir)?;
        Ok(Self { base_dir })
    }

    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    // 只接受本存储目录下的位置，防止越界删除
    fn resolve(&self, location: &ArtifactLocation) -> RepositoryResult<PathBuf> {
        let path = PathBuf::from(location.as_str());
        if path.parent() != Some(self.base_dir.as_path()) {
            return Err(RepositoryError::StorageError(format!(
                "位置不属于存储目录: {}",
                location
            )));
        }
        Ok(path)
    }
}

impl ArtifactStorage for FsArtifactStorage {
    fn save(&self, bytes: &[u8]) -> RepositoryResult<ArtifactLocation> {
        let path = self.base_dir.join(format!("{}.csv", Uuid::new_v4()));
        fs::write(&path, bytes)?;
        debug!(path = %path.display(), bytes = bytes.len(), "上传文件已保存");
        Ok(ArtifactLocation::new(path.to_string_lossy()))
    }

    fn read(&self, location: &ArtifactLocation) -> RepositoryResult<Vec<u8>> {
        let path = self.resolve(location)?;
        Ok(fs::read(path)?)
    }

    fn delete(&self, location: &ArtifactLocation) -> RepositoryResult<()> {
        let path = self.resolve(location)?;
        match fs::remove_file(&path) {
            Ok(()) => {
                debug!(path = %path.display(), "上传文件已删除");
                Ok(())
            }
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    fn exists(&self, location: &ArtifactLocation) -> bool {
        self.resolve(location)
            .map(|path| path.is_file())
            .unwrap_or(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_save_read_delete() {
        let dir = tempfile::tempdir().unwrap();
        let storage = FsArtifactStorage::new(dir.path()).unwrap();

        let location = storage.save(b"a,b\n1,2\n").unwrap();
        assert!(storage.exists(&location));
        assert_eq!(storage.read(&location).unwrap(), b"a,b\n1,2\n".to_vec());

        storage.delete(&location).unwrap();
        assert!(!storage.exists(&location));
    }

    #[test]
    fn test_delete_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let storage = FsArtifactStorage::new(dir.path()).unwrap();

        let location = storage.save(b"x").unwrap();
        storage.delete(&location).unwrap();
        assert!(storage.delete(&location).is_ok());
    }

    #[test]
    fn test_rejects_foreign_location() {
        let dir = tempfile::tempdir().unwrap();
        let storage = FsArtifactStorage::new(dir.path()).unwrap();

        let foreign = ArtifactLocation::new("/etc/passwd");
        assert!(storage.delete(&foreign).is_err());
        assert!(!storage.exists(&foreign));
    }
}
