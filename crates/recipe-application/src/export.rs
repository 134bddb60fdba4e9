//! Recipe export as a downloadable file.

use recipe_core::error::{RecipeError, Result};
use recipe_core::recipe::Recipe;
use std::fmt;
use std::io::{Cursor, Write};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use zip::CompressionMethod;
use zip::write::{SimpleFileOptions, ZipWriter};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ExportFormat {
    /// `<name>.json`
    Json,
    /// `<name>.json` packed into `<name>.zip`
    #[default]
    Zip,
}

impl fmt::Display for ExportFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExportFormat::Json => write!(f, "json"),
            ExportFormat::Zip => write!(f, "zip"),
        }
    }
}

impl FromStr for ExportFormat {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "json" => Ok(ExportFormat::Json),
            "zip" => Ok(ExportFormat::Zip),
            other => Err(format!("unknown export format '{}' (expected json or zip)", other)),
        }
    }
}

/// An exported file, ready to be written somewhere.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportArtifact {
    pub file_name: String,
    pub bytes: Vec<u8>,
}

impl ExportArtifact {
    /// Writes the artifact into `dir` and returns the file path.
    pub async fn write_to(&self, dir: &Path) -> Result<PathBuf> {
        tokio::fs::create_dir_all(dir).await?;
        let path = dir.join(&self.file_name);
        tokio::fs::write(&path, &self.bytes).await?;
        tracing::info!("[Export] Wrote {:?} ({} bytes)", path, self.bytes.len());
        Ok(path)
    }
}

/// Serializes `recipe` without its `ui` field.
///
/// `compression_level` is the deflate level (0-9) used for
/// [`ExportFormat::Zip`].
pub fn export_recipe(
    recipe: &Recipe,
    format: ExportFormat,
    compression_level: i64,
) -> Result<ExportArtifact> {
    let name = file_stem(recipe);
    let json = serde_json::to_string_pretty(&recipe.without_ui())?;
    let json_name = format!("{}.json", name);

    match format {
        ExportFormat::Json => Ok(ExportArtifact {
            file_name: json_name,
            bytes: json.into_bytes(),
        }),
        ExportFormat::Zip => {
            if !(0..=9).contains(&compression_level) {
                return Err(RecipeError::validation(format!(
                    "compression level must be between 0 and 9, got {}",
                    compression_level
                )));
            }
            Ok(ExportArtifact {
                file_name: format!("{}.zip", name),
                bytes: zip_single(&json_name, json.as_bytes(), compression_level)?,
            })
        }
    }
}

fn zip_single(entry_name: &str, contents: &[u8], compression_level: i64) -> Result<Vec<u8>> {
    let zip_error = |e: zip::result::ZipError| RecipeError::serialization("ZIP", e.to_string());

    let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
    let options = SimpleFileOptions::default()
        .compression_method(CompressionMethod::Deflated)
        .compression_level(Some(compression_level));
    writer
        .start_file(entry_name, options)
        .map_err(zip_error)?;
    writer.write_all(contents)?;
    let cursor = writer.finish().map_err(zip_error)?;
    Ok(cursor.into_inner())
}

/// File name stem: the display name with path separators and other
/// characters file systems reject replaced, falling back to the id.
fn file_stem(recipe: &Recipe) -> String {
    let name = recipe
        .display_name()
        .map(str::trim)
        .filter(|name| !name.is_empty())
        .unwrap_or(&recipe.id);
    name.chars()
        .map(|c| match c {
            '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|' => '_',
            c if c.is_control() => '_',
            c => c,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{Value, json};
    use std::io::Read;
    use tempfile::TempDir;
    use zip::ZipArchive;

    fn recipe() -> Recipe {
        Recipe {
            ui: Some(json!({"selectedPanel": "dates"})),
            ..Recipe::new("r1")
                .with_type("MOSAIC")
                .with_title("Coast/2020")
                .with_model(json!({"dates": {"year": 2020}}))
        }
    }

    #[test]
    fn test_json_export_omits_ui() {
        let artifact = export_recipe(&recipe(), ExportFormat::Json, 5).unwrap();

        assert_eq!(artifact.file_name, "Coast_2020.json");
        let value: Value = serde_json::from_slice(&artifact.bytes).unwrap();
        assert!(value.get("ui").is_none());
        assert_eq!(value["model"]["dates"]["year"], json!(2020));
        assert_eq!(value["type"], json!("MOSAIC"));
    }

    #[test]
    fn test_zip_export_contains_single_json_entry() {
        let artifact = export_recipe(&recipe(), ExportFormat::Zip, 5).unwrap();
        assert_eq!(artifact.file_name, "Coast_2020.zip");

        let mut archive = ZipArchive::new(Cursor::new(artifact.bytes)).unwrap();
        assert_eq!(archive.len(), 1);
        let mut entry = archive.by_index(0).unwrap();
        assert_eq!(entry.name(), "Coast_2020.json");
        assert_eq!(entry.compression(), CompressionMethod::Deflated);

        let mut contents = String::new();
        entry.read_to_string(&mut contents).unwrap();
        let value: Value = serde_json::from_str(&contents).unwrap();
        assert_eq!(value["id"], json!("r1"));
        assert!(value.get("ui").is_none());
    }

    #[test]
    fn test_untitled_recipe_uses_placeholder_or_id() {
        let placeholder = Recipe::new("r1").with_placeholder("Mosaic 1");
        assert_eq!(
            export_recipe(&placeholder, ExportFormat::Json, 5)
                .unwrap()
                .file_name,
            "Mosaic 1.json"
        );

        let bare = Recipe::new("r2");
        assert_eq!(
            export_recipe(&bare, ExportFormat::Json, 5).unwrap().file_name,
            "r2.json"
        );
    }

    #[test]
    fn test_invalid_compression_level() {
        let err = export_recipe(&recipe(), ExportFormat::Zip, 12).unwrap_err();
        assert!(err.is_validation());
    }

    #[test]
    fn test_format_parsing() {
        assert_eq!("ZIP".parse::<ExportFormat>().unwrap(), ExportFormat::Zip);
        assert_eq!("json".parse::<ExportFormat>().unwrap(), ExportFormat::Json);
        assert!("tar".parse::<ExportFormat>().is_err());
    }

    #[tokio::test]
    async fn test_write_to_directory() {
        let temp_dir = TempDir::new().unwrap();
        let artifact = export_recipe(&recipe(), ExportFormat::Json, 5).unwrap();

        let path = artifact.write_to(temp_dir.path()).await.unwrap();

        assert_eq!(path, temp_dir.path().join("Coast_2020.json"));
        assert_eq!(std::fs::read(path).unwrap(), artifact.bytes);
    }
}
