//! Initial contents of vault-created resources.
//!
//! A creation spec may carry a callback producing the first contents of the
//! resource. Its failures are content errors: the resource is marked failed,
//! the passes depending on it are skipped, everything else keeps working.

use std::path::Path;
use std::rc::Rc;

use anyhow::{Context, bail};
use ash::vk;
use ember_gfx::format;

pub type RgInitialDataFn = Rc<dyn Fn(&RgInitialDataRequest) -> anyhow::Result<RgInitialData>>;

/// What the callback is asked to fill.
#[derive(Clone, Debug)]
pub struct RgInitialDataRequest {
    pub name: String,
    /// Resolved image extent, `None` for buffers.
    pub extent: Option<vk::Extent2D>,
    pub format: Option<vk::Format>,
    /// Bytes expected by an upload, when the layout is known.
    pub byte_size: Option<vk::DeviceSize>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum RgInitialData {
    /// Tightly packed texels (images) or raw bytes (buffers).
    Bytes(Vec<u8>),
    /// Every 32-bit word set to the value.
    Fill(u32),
}

impl RgInitialData {
    /// Checks the data against the resource it is uploaded into.
    pub(crate) fn validate(&self, request: &RgInitialDataRequest) -> anyhow::Result<()> {
        let Some(expected) = request.byte_size else {
            bail!("resource `{}` has a format that cannot be uploaded", request.name);
        };
        match self {
            Self::Bytes(bytes) if request.extent.is_some() && bytes.len() as vk::DeviceSize != expected => {
                bail!("`{}` expects {} bytes of texels, got {}", request.name, expected, bytes.len())
            }
            Self::Bytes(bytes) if bytes.len() as vk::DeviceSize > expected => {
                bail!("`{}` holds {} bytes, got {}", request.name, expected, bytes.len())
            }
            Self::Bytes(bytes) if bytes.is_empty() => bail!("empty initial data for `{}`", request.name),
            _ => Ok(()),
        }
    }
}

/// Channel layout of a decoded image file.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RgImageChannels {
    /// `R8G8B8A8_*`
    Rgba,
    /// `R8_UNORM`
    Gray,
}

#[derive(Clone, Debug)]
pub struct RgLoadedImage {
    pub width: u32,
    pub height: u32,
    pub channels: RgImageChannels,
    pub data: Vec<u8>,
}

impl RgLoadedImage {
    pub fn extent(&self) -> vk::Extent2D {
        vk::Extent2D {
            width: self.width,
            height: self.height,
        }
    }
}

/// Decodes a png or jpg file.
///
/// Any other extension is a content error.
pub fn load_image_file(path: impl AsRef<Path>, channels: RgImageChannels) -> anyhow::Result<RgLoadedImage> {
    let path = path.as_ref();
    let extension = path.extension().and_then(|ext| ext.to_str()).map(str::to_ascii_lowercase).unwrap_or_default();
    if !matches!(extension.as_str(), "png" | "jpg" | "jpeg") {
        bail!("unsupported image extension `{}` for {}", extension, path.display());
    }

    let decoded = image::open(path).with_context(|| format!("failed to decode {}", path.display()))?;
    let (width, height, data) = match channels {
        RgImageChannels::Rgba => {
            let rgba = decoded.to_rgba8();
            (rgba.width(), rgba.height(), rgba.into_raw())
        }
        RgImageChannels::Gray => {
            let gray = decoded.to_luma8();
            (gray.width(), gray.height(), gray.into_raw())
        }
    };
    log::info!("loaded image {} ({}x{}, {:?})", path.display(), width, height, channels);

    Ok(RgLoadedImage {
        width,
        height,
        channels,
        data,
    })
}

/// Initial-data callback uploading an image file into a fixed-size texture.
///
/// The texture extent must match the file.
pub fn image_file_initial_data(path: impl Into<std::path::PathBuf>, channels: RgImageChannels) -> RgInitialDataFn {
    let path = path.into();
    Rc::new(move |request: &RgInitialDataRequest| {
        let loaded = load_image_file(&path, channels)?;
        if request.extent != Some(loaded.extent()) {
            bail!(
                "{} is {}x{}, `{}` expects {:?}",
                path.display(),
                loaded.width,
                loaded.height,
                request.name,
                request.extent
            );
        }
        Ok(RgInitialData::Bytes(loaded.data))
    })
}

pub(crate) fn image_byte_size(extent: vk::Extent2D, fmt: vk::Format) -> Option<vk::DeviceSize> {
    format::image_byte_size(extent.width, extent.height, fmt)
}
