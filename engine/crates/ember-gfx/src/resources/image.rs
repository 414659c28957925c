use ash::vk;

use crate::format;

/// Parameters of a 2D image allocation.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct GfxImageCreateInfo {
    pub name: String,
    pub extent: vk::Extent2D,
    pub format: vk::Format,
    pub mip_levels: u32,
    pub array_layers: u32,
    pub usage: vk::ImageUsageFlags,
}

impl GfxImageCreateInfo {
    pub fn new_2d(name: impl Into<String>, extent: vk::Extent2D, format: vk::Format, usage: vk::ImageUsageFlags) -> Self {
        Self {
            name: name.into(),
            extent,
            format,
            mip_levels: 1,
            array_layers: 1,
            usage,
        }
    }

    #[inline]
    pub fn with_mips(mut self, mip_levels: u32) -> Self {
        self.mip_levels = mip_levels.max(1);
        self
    }

    #[inline]
    pub fn with_layers(mut self, array_layers: u32) -> Self {
        self.array_layers = array_layers.max(1);
        self
    }

    /// Full subresource range of the image, aspect inferred from the format.
    pub fn full_range(&self) -> vk::ImageSubresourceRange {
        vk::ImageSubresourceRange {
            aspect_mask: format::infer_aspect(self.format),
            base_mip_level: 0,
            level_count: self.mip_levels,
            base_array_layer: 0,
            layer_count: self.array_layers,
        }
    }

    pub fn as_vk_create_info(&self) -> vk::ImageCreateInfo<'static> {
        vk::ImageCreateInfo {
            image_type: vk::ImageType::TYPE_2D,
            format: self.format,
            extent: vk::Extent3D {
                width: self.extent.width,
                height: self.extent.height,
                depth: 1,
            },
            mip_levels: self.mip_levels,
            array_layers: self.array_layers,
            samples: vk::SampleCountFlags::TYPE_1,
            tiling: vk::ImageTiling::OPTIMAL,
            usage: self.usage,
            sharing_mode: vk::SharingMode::EXCLUSIVE,
            initial_layout: vk::ImageLayout::UNDEFINED,
            ..Default::default()
        }
    }
}

/// An image plus its default view.
///
/// Handles are plain values; the device that created the image owns the memory.
#[derive(Clone, Debug)]
pub struct GfxImage {
    handle: vk::Image,
    view: vk::ImageView,
    info: GfxImageCreateInfo,
}

impl GfxImage {
    pub fn new(handle: vk::Image, view: vk::ImageView, info: GfxImageCreateInfo) -> Self {
        Self { handle, view, info }
    }

    #[inline]
    pub fn handle(&self) -> vk::Image {
        self.handle
    }

    #[inline]
    pub fn view(&self) -> vk::ImageView {
        self.view
    }

    #[inline]
    pub fn info(&self) -> &GfxImageCreateInfo {
        &self.info
    }

    #[inline]
    pub fn extent(&self) -> vk::Extent2D {
        self.info.extent
    }

    #[inline]
    pub fn format(&self) -> vk::Format {
        self.info.format
    }
}
