use anyhow::Context;
use dashcore::ClientConfig;
use std::fs;
use std::path::{Path, PathBuf};

/// Command-line values that take precedence over the config file.
#[derive(Debug, Default, Clone)]
pub struct Overrides {
    pub backend_url: Option<String>,
    pub export_dir: Option<PathBuf>,
    pub timeout_ms: Option<u64>,
}

pub fn load<P: AsRef<Path>>(path: P) -> anyhow::Result<ClientConfig> {
    let path_ref = path.as_ref();
    let contents = fs::read_to_string(path_ref)
        .with_context(|| format!("reading dashboard config {}", path_ref.display()))?;
    let config: ClientConfig = serde_yaml::from_str(&contents)
        .with_context(|| format!("parsing dashboard config {}", path_ref.display()))?;
    Ok(config)
}

pub fn resolve(path: Option<&Path>, overrides: Overrides) -> anyhow::Result<ClientConfig> {
    let mut config = match path {
        Some(path) => load(path)?,
        None => ClientConfig::default(),
    };
    if let Some(url) = overrides.backend_url {
        config.backend_url = url;
    }
    if let Some(dir) = overrides.export_dir {
        config.export_dir = dir;
    }
    if overrides.timeout_ms.is_some() {
        config.command_timeout_ms = overrides.timeout_ms;
    }
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn load_fills_missing_fields_with_defaults() {
        let mut temp = NamedTempFile::new().unwrap();
        temp.write_all(b"backend_url: http://10.0.0.7:5000\nretention_limit: 50\n")
            .unwrap();
        let path = temp.into_temp_path();
        let config = load(&path).unwrap();
        assert_eq!(config.backend_url, "http://10.0.0.7:5000");
        assert_eq!(config.retention_limit, 50);
        assert_eq!(config.reconnect_delay_ms, ClientConfig::default().reconnect_delay_ms);
    }

    #[test]
    fn overrides_beat_the_file() {
        let mut temp = NamedTempFile::new().unwrap();
        temp.write_all(b"backend_url: http://10.0.0.7:5000\n").unwrap();
        let path = temp.into_temp_path();
        let config = resolve(
            Some(&path),
            Overrides {
                backend_url: Some("http://localhost:9000".into()),
                timeout_ms: Some(1500),
                ..Default::default()
            },
        )
        .unwrap();
        assert_eq!(config.backend_url, "http://localhost:9000");
        assert_eq!(config.command_timeout_ms, Some(1500));
    }

    #[test]
    fn missing_file_names_the_path() {
        let err = load("/definitely/not/here.yaml").unwrap_err();
        assert!(format!("{err:#}").contains("/definitely/not/here.yaml"));
    }
}
