use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub pipeline: PipelineConfig,

    #[serde(default)]
    pub encoder: EncoderConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct PipelineConfig {
    /// Bytes requested per stream read
    #[serde(default = "default_read_chunk_size")]
    pub read_chunk_size: usize,

    /// Upper bound on samples per parser batch
    #[serde(default = "default_samples_per_batch")]
    pub samples_per_batch: usize,
}

fn default_read_chunk_size() -> usize {
    64 * 1024
}

fn default_samples_per_batch() -> usize {
    sampleflow_media::DEFAULT_SAMPLES_PER_BATCH
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            read_chunk_size: default_read_chunk_size(),
            samples_per_batch: default_samples_per_batch(),
        }
    }
}

/// Settings handed to the encode stage.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct EncoderConfig {
    /// Output resolution preset (qvga, vga, hd)
    #[serde(default = "default_preset")]
    pub preset: String,

    /// Target bitrate in bits per second
    #[serde(default = "default_bitrate")]
    pub bitrate: u32,

    /// Output codec string
    #[serde(default = "default_codec")]
    pub codec: String,

    #[serde(default)]
    pub hardware_acceleration: HardwareAcceleration,
}

fn default_preset() -> String {
    "qvga".to_string()
}
fn default_bitrate() -> u32 {
    10_000_000
}
fn default_codec() -> String {
    "vp09.00.10.08".to_string()
}

impl Default for EncoderConfig {
    fn default() -> Self {
        Self {
            preset: default_preset(),
            bitrate: default_bitrate(),
            codec: default_codec(),
            hardware_acceleration: HardwareAcceleration::default(),
        }
    }
}

impl EncoderConfig {
    /// This configuration with another preset, which must exist.
    pub fn with_preset(&self, name: &str) -> anyhow::Result<Self> {
        RenderTarget::for_preset(name)?;
        Ok(Self {
            preset: name.to_string(),
            ..self.clone()
        })
    }

    /// Output dimensions for the configured preset.
    pub fn target(&self) -> anyhow::Result<RenderTarget> {
        RenderTarget::for_preset(&self.preset)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum HardwareAcceleration {
    #[default]
    PreferSoftware,
    PreferHardware,
    NoPreference,
}

/// Output surface dimensions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
pub struct RenderTarget {
    pub width: u32,
    pub height: u32,
}

/// Named output presets.
pub const PRESETS: [(&str, RenderTarget); 3] = [
    (
        "qvga",
        RenderTarget {
            width: 320,
            height: 240,
        },
    ),
    (
        "vga",
        RenderTarget {
            width: 640,
            height: 480,
        },
    ),
    (
        "hd",
        RenderTarget {
            width: 1280,
            height: 720,
        },
    ),
];

impl RenderTarget {
    pub fn for_preset(name: &str) -> anyhow::Result<Self> {
        PRESETS
            .iter()
            .find(|(preset, _)| *preset == name)
            .map(|(_, target)| *target)
            .ok_or_else(|| {
                anyhow::anyhow!(
                    "Unknown preset '{}' (expected one of: qvga, vga, hd)",
                    name
                )
            })
    }
}
