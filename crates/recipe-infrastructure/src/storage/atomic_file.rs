//! Atomic file operations.
//!
//! Writes go to a hidden temporary file next to the target, are synced to
//! disk, and then renamed over the target, so readers only ever see the old
//! or the new content.

use recipe_core::error::{RecipeError, Result};
use serde::{Serialize, de::DeserializeOwned};
use std::fs::{self, File};
use std::io::Write as IoWrite;
use std::marker::PhantomData;
use std::path::{Path, PathBuf};
use tokio::io::AsyncWriteExt;

/// Gets a temporary file path for atomic writes.
fn temp_path_for(path: &Path) -> Result<PathBuf> {
    let parent = path
        .parent()
        .ok_or_else(|| RecipeError::io(format!("Path has no parent directory: {:?}", path)))?;
    let file_name = path
        .file_name()
        .ok_or_else(|| RecipeError::io(format!("Path has no file name: {:?}", path)))?;

    let tmp_name = format!(".{}.tmp", file_name.to_string_lossy());
    Ok(parent.join(tmp_name))
}

/// A handle to a TOML file that is replaced atomically on save.
pub struct AtomicTomlFile<T> {
    path: PathBuf,
    _phantom: PhantomData<T>,
}

impl<T> AtomicTomlFile<T>
where
    T: Serialize + DeserializeOwned,
{
    pub fn new(path: PathBuf) -> Self {
        Self {
            path,
            _phantom: PhantomData,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Loads the TOML file and deserializes it.
    ///
    /// # Returns
    ///
    /// - `Ok(Some(T))`: Successfully loaded and deserialized
    /// - `Ok(None)`: File doesn't exist or is empty
    /// - `Err`: Failed to read or parse the file
    pub fn load(&self) -> Result<Option<T>> {
        if !self.path.exists() {
            return Ok(None);
        }

        let content = fs::read_to_string(&self.path)?;

        if content.trim().is_empty() {
            return Ok(None);
        }

        let data: T = toml::from_str(&content)?;
        Ok(Some(data))
    }

    /// Saves data to the TOML file atomically.
    pub fn save(&self, data: &T) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.exists() {
                fs::create_dir_all(parent)?;
            }
        }

        let toml_string = toml::to_string_pretty(data)?;

        let tmp_path = temp_path_for(&self.path)?;
        let mut tmp_file = File::create(&tmp_path)?;
        tmp_file.write_all(toml_string.as_bytes())?;
        tmp_file.sync_all()?;
        drop(tmp_file);

        fs::rename(&tmp_path, &self.path)?;

        Ok(())
    }
}

/// A handle to a JSON file with async, atomic replacement.
pub struct AtomicJsonFile<T> {
    path: PathBuf,
    _phantom: PhantomData<T>,
}

impl<T> AtomicJsonFile<T>
where
    T: Serialize + DeserializeOwned,
{
    pub fn new(path: PathBuf) -> Self {
        Self {
            path,
            _phantom: PhantomData,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Loads and deserializes the file; `Ok(None)` if it does not exist.
    pub async fn load(&self) -> Result<Option<T>> {
        let content = match tokio::fs::read_to_string(&self.path).await {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };

        if content.trim().is_empty() {
            return Ok(None);
        }

        Ok(Some(serde_json::from_str(&content)?))
    }

    /// Serializes `data` as pretty JSON and atomically replaces the file.
    pub async fn save(&self, data: &T) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        let json = serde_json::to_string_pretty(data)?;

        let tmp_path = temp_path_for(&self.path)?;
        let mut tmp_file = tokio::fs::File::create(&tmp_path).await?;
        tmp_file.write_all(json.as_bytes()).await?;
        tmp_file.sync_all().await?;
        drop(tmp_file);

        tokio::fs::rename(&tmp_path, &self.path).await?;

        Ok(())
    }

    /// Removes the file; `Ok(false)` if it did not exist.
    pub async fn remove(&self) -> Result<bool> {
        match tokio::fs::remove_file(&self.path).await {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::{Deserialize, Serialize};
    use tempfile::TempDir;

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct TestConfig {
        name: String,
        count: u32,
    }

    fn sample() -> TestConfig {
        TestConfig {
            name: "test".to_string(),
            count: 42,
        }
    }

    #[test]
    fn test_toml_save_and_load() {
        let temp_dir = TempDir::new().unwrap();
        let atomic_file = AtomicTomlFile::<TestConfig>::new(temp_dir.path().join("test.toml"));

        atomic_file.save(&sample()).unwrap();

        let loaded = atomic_file.load().unwrap().unwrap();
        assert_eq!(loaded, sample());
    }

    #[test]
    fn test_toml_load_nonexistent_file() {
        let temp_dir = TempDir::new().unwrap();
        let atomic_file =
            AtomicTomlFile::<TestConfig>::new(temp_dir.path().join("nonexistent.toml"));

        assert!(atomic_file.load().unwrap().is_none());
    }

    #[test]
    fn test_toml_atomic_write_leaves_no_temp_file() {
        let temp_dir = TempDir::new().unwrap();
        let file_path = temp_dir.path().join("test.toml");
        let atomic_file = AtomicTomlFile::<TestConfig>::new(file_path.clone());

        atomic_file.save(&sample()).unwrap();

        assert!(!temp_dir.path().join(".test.toml.tmp").exists());
        assert!(file_path.exists());
    }

    #[tokio::test]
    async fn test_json_save_load_remove() {
        let temp_dir = TempDir::new().unwrap();
        let atomic_file =
            AtomicJsonFile::<TestConfig>::new(temp_dir.path().join("nested").join("a.json"));

        assert!(atomic_file.load().await.unwrap().is_none());

        atomic_file.save(&sample()).await.unwrap();
        assert_eq!(atomic_file.load().await.unwrap(), Some(sample()));
        assert!(!temp_dir.path().join("nested").join(".a.json.tmp").exists());

        assert!(atomic_file.remove().await.unwrap());
        assert!(!atomic_file.remove().await.unwrap());
    }
}
