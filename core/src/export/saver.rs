use chrono::Utc;
use std::fs;
use std::io;
use std::path::PathBuf;

use crate::export::ExportArtifact;

/// Platform file-save mechanism.
pub trait ArtifactSaver: Send + Sync {
    fn save(&self, artifact: &ExportArtifact) -> io::Result<PathBuf>;
}

/// Saves artifacts into one directory, creating it on first use.
#[derive(Debug, Clone)]
pub struct DirectorySaver {
    dir: PathBuf,
}

impl DirectorySaver {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &PathBuf {
        &self.dir
    }
}

impl ArtifactSaver for DirectorySaver {
    fn save(&self, artifact: &ExportArtifact) -> io::Result<PathBuf> {
        fs::create_dir_all(&self.dir)?;
        let path = self.dir.join(artifact.file_name(Utc::now()));
        fs::write(&path, &artifact.payload_bytes)?;
        Ok(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::ExportFormat;

    #[test]
    fn saves_into_a_nested_directory() {
        let root = tempfile::tempdir().unwrap();
        let saver = DirectorySaver::new(root.path().join("exports/today"));
        let artifact = ExportArtifact {
            format: ExportFormat::Json,
            payload_bytes: br#"{"summary":{}}"#.to_vec(),
        };
        let path = saver.save(&artifact).unwrap();
        assert!(path.starts_with(saver.dir()));
        assert_eq!(path.extension().and_then(|e| e.to_str()), Some("json"));
        assert_eq!(fs::read(&path).unwrap(), artifact.payload_bytes);
    }
}
