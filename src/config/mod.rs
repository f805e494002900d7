mod types;

pub use types::*;

use anyhow::{Context, Result};
use std::path::Path;

/// Load configuration from a TOML file
pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {:?}", path))?;

    let config: Config = toml::from_str(&content)
        .with_context(|| format!("Failed to parse config file: {:?}", path))?;

    validate_config(&config)?;

    Ok(config)
}

/// Load config from default locations or return default config
pub fn load_config_or_default(custom_path: Option<&Path>) -> Result<Config> {
    if let Some(path) = custom_path {
        return load_config(path);
    }

    let default_paths = ["./sampleflow.toml", "~/.config/sampleflow/config.toml"];

    for path_str in default_paths {
        let path = shellexpand::tilde(path_str);
        let path = Path::new(path.as_ref());
        if path.exists() {
            tracing::debug!("Using config file {:?}", path);
            return load_config(path);
        }
    }

    Ok(Config::default())
}

/// Validate configuration
pub fn validate_config(config: &Config) -> Result<()> {
    if config.pipeline.read_chunk_size == 0 {
        anyhow::bail!("pipeline.read_chunk_size cannot be 0");
    }

    if config.pipeline.samples_per_batch == 0 {
        anyhow::bail!("pipeline.samples_per_batch cannot be 0");
    }

    if config.encoder.bitrate == 0 {
        anyhow::bail!("encoder.bitrate cannot be 0");
    }

    if config.encoder.codec.is_empty() {
        anyhow::bail!("encoder.codec cannot be empty");
    }

    RenderTarget::for_preset(&config.encoder.preset)?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults_are_valid() {
        let config = Config::default();
        validate_config(&config).unwrap();
        assert_eq!(config.pipeline.read_chunk_size, 65536);
        assert_eq!(config.pipeline.samples_per_batch, 1000);
        assert_eq!(config.encoder.preset, "qvga");
        assert_eq!(config.encoder.codec, "vp09.00.10.08");
        assert_eq!(
            config.encoder.hardware_acceleration,
            HardwareAcceleration::PreferSoftware
        );
    }

    #[test]
    fn test_load_partial_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            "[pipeline]\nsamples_per_batch = 16\n\n[encoder]\npreset = \"hd\"\nhardware_acceleration = \"prefer-hardware\""
        )
        .unwrap();

        let config = load_config(file.path()).unwrap();
        assert_eq!(config.pipeline.samples_per_batch, 16);
        assert_eq!(config.pipeline.read_chunk_size, 65536);
        assert_eq!(config.encoder.preset, "hd");
        assert_eq!(
            config.encoder.hardware_acceleration,
            HardwareAcceleration::PreferHardware
        );
        assert_eq!(config.encoder.bitrate, 10_000_000);
    }

    #[test]
    fn test_rejects_unknown_preset() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[encoder]\npreset = \"imax\"").unwrap();

        let err = load_config(file.path()).unwrap_err();
        assert!(err.to_string().contains("Unknown preset"));
    }

    #[test]
    fn test_rejects_zero_chunk_size() {
        let mut config = Config::default();
        config.pipeline.read_chunk_size = 0;
        assert!(validate_config(&config).is_err());
    }

    #[test]
    fn test_with_preset_keeps_other_settings() {
        let mut encoder = EncoderConfig::default();
        encoder.bitrate = 2_000_000;
        let hd = encoder.with_preset("hd").unwrap();
        assert_eq!(hd.bitrate, 2_000_000);
        assert_eq!(
            hd.target().unwrap(),
            RenderTarget {
                width: 1280,
                height: 720
            }
        );
        assert!(encoder.with_preset("4k").is_err());
    }

    #[test]
    fn test_explicit_path_must_exist() {
        let err = load_config_or_default(Some(Path::new("/nonexistent/sampleflow.toml")))
            .unwrap_err();
        assert!(err.to_string().contains("Failed to read config file"));
    }
}
