use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, ensure};
use ash::vk;
use serde::{Deserialize, Serialize};

/// Window resize simulated between two frames.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResizeEvent {
    /// Frame id after which the swapchain is recreated.
    pub after_frame: u64,
    pub width: u32,
    pub height: u32,
}

impl ResizeEvent {
    pub fn extent(&self) -> vk::Extent2D {
        vk::Extent2D {
            width: self.width,
            height: self.height,
        }
    }
}

/// Demo settings, read from a TOML file.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DemoConfig {
    pub frame_count: u64,
    pub fif_count: usize,
    pub width: u32,
    pub height: u32,
    /// Entries in the renderable buffer the cull pass walks.
    pub renderable_count: u32,
    /// Point lights casting shadows every frame.
    pub shadow_caster_lights: Vec<u32>,
    /// png/jpg uploaded into the BRDF lookup texture; generated when absent.
    pub brdf_lut: Option<PathBuf>,
    pub resize: Option<ResizeEvent>,
}

impl Default for DemoConfig {
    fn default() -> Self {
        Self {
            frame_count: 4,
            fif_count: 3,
            width: 1280,
            height: 720,
            renderable_count: 64,
            shadow_caster_lights: vec![0],
            brdf_lut: None,
            resize: None,
        }
    }
}

impl DemoConfig {
    pub fn from_file<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let content =
            fs::read_to_string(path.as_ref()).with_context(|| format!("failed to read config {:?}", path.as_ref()))?;
        let config = Self::from_toml(&content).with_context(|| format!("invalid config {:?}", path.as_ref()))?;
        Ok(config)
    }

    pub fn from_toml(content: &str) -> anyhow::Result<Self> {
        let config: DemoConfig = toml::from_str(content).context("failed to parse TOML")?;
        ensure!(config.fif_count > 0, "fif_count must be at least 1");
        ensure!(config.width > 0 && config.height > 0, "window extent must not be empty");
        ensure!(config.renderable_count > 0, "renderable_count must be at least 1");
        if let Some(resize) = &config.resize {
            ensure!(resize.width > 0 && resize.height > 0, "resize extent must not be empty");
        }
        Ok(config)
    }

    pub fn extent(&self) -> vk::Extent2D {
        vk::Extent2D {
            width: self.width,
            height: self.height,
        }
    }
}
