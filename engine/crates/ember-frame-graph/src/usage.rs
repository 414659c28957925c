//! What a pass declares about one logical resource.

use std::fmt;
use std::rc::Rc;

use ash::vk;

use crate::initial_data::{RgInitialData, RgInitialDataFn, RgInitialDataRequest};
use crate::state::{RgAccess, RgStage, RgUsageType};

/// Image size, either tied to the swapchain or fixed.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RgExtent {
    /// Follows the swapchain; recreated on resize.
    Swapchain,
    Fixed { width: u32, height: u32 },
}

impl RgExtent {
    pub fn resolve(self, swapchain_extent: vk::Extent2D) -> vk::Extent2D {
        match self {
            Self::Swapchain => swapchain_extent,
            Self::Fixed { width, height } => vk::Extent2D { width, height },
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RgImageSpec {
    pub extent: RgExtent,
    pub format: vk::Format,
    pub mip_levels: u32,
    pub array_layers: u32,
    /// Added on top of the flags implied by the declaring usage.
    pub extra_usage: vk::ImageUsageFlags,
}

impl RgImageSpec {
    pub fn new(extent: RgExtent, format: vk::Format) -> Self {
        Self {
            extent,
            format,
            mip_levels: 1,
            array_layers: 1,
            extra_usage: vk::ImageUsageFlags::empty(),
        }
    }

    /// Full-screen target in `format`.
    pub fn swapchain_sized(format: vk::Format) -> Self {
        Self::new(RgExtent::Swapchain, format)
    }

    pub fn fixed(width: u32, height: u32, format: vk::Format) -> Self {
        Self::new(RgExtent::Fixed { width, height }, format)
    }

    #[inline]
    pub fn with_mips(mut self, mip_levels: u32) -> Self {
        self.mip_levels = mip_levels;
        self
    }

    #[inline]
    pub fn with_layers(mut self, array_layers: u32) -> Self {
        self.array_layers = array_layers;
        self
    }

    #[inline]
    pub fn with_extra_usage(mut self, usage: vk::ImageUsageFlags) -> Self {
        self.extra_usage |= usage;
        self
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RgBufferSpec {
    pub size: vk::DeviceSize,
    pub extra_usage: vk::BufferUsageFlags,
    pub host_visible: bool,
}

impl RgBufferSpec {
    pub fn new(size: vk::DeviceSize) -> Self {
        Self {
            size,
            extra_usage: vk::BufferUsageFlags::empty(),
            host_visible: false,
        }
    }

    #[inline]
    pub fn with_extra_usage(mut self, usage: vk::BufferUsageFlags) -> Self {
        self.extra_usage |= usage;
        self
    }

    #[inline]
    pub fn host_visible(mut self) -> Self {
        self.host_visible = true;
        self
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum RgResourceDesc {
    Image(RgImageSpec),
    Buffer(RgBufferSpec),
}

impl RgResourceDesc {
    #[inline]
    pub fn is_image(&self) -> bool {
        matches!(self, Self::Image(_))
    }

    pub fn format(&self) -> Option<vk::Format> {
        match self {
            Self::Image(spec) => Some(spec.format),
            Self::Buffer(_) => None,
        }
    }
}

/// How to create a resource the first time a pass declares it.
#[derive(Clone)]
pub struct RgCreationSpec {
    pub desc: RgResourceDesc,
    /// Invoked once per creation (again after a resize recreates the resource).
    pub initial_data: Option<RgInitialDataFn>,
}

impl RgCreationSpec {
    pub fn image(spec: RgImageSpec) -> Self {
        Self {
            desc: RgResourceDesc::Image(spec),
            initial_data: None,
        }
    }

    pub fn buffer(spec: RgBufferSpec) -> Self {
        Self {
            desc: RgResourceDesc::Buffer(spec),
            initial_data: None,
        }
    }

    pub fn with_initial_data(
        mut self,
        callback: impl Fn(&RgInitialDataRequest) -> anyhow::Result<RgInitialData> + 'static,
    ) -> Self {
        self.initial_data = Some(Rc::new(callback));
        self
    }
}

impl fmt::Debug for RgCreationSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RgCreationSpec")
            .field("desc", &self.desc)
            .field("initial_data", &self.initial_data.is_some())
            .finish()
    }
}

/// How samplers bound to this usage should address and filter.
///
/// Only carried to the execution context; it never affects the resource state.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum RgSamplerPolicy {
    #[default]
    Default,
    ClampToEdge,
    ClampToBorder,
    NoFiltering,
}

impl RgSamplerPolicy {
    /// Sampler description for this policy.
    pub fn sampler_create_info(self) -> vk::SamplerCreateInfo<'static> {
        let (address_mode, filter) = match self {
            Self::Default => (vk::SamplerAddressMode::REPEAT, vk::Filter::LINEAR),
            Self::ClampToEdge => (vk::SamplerAddressMode::CLAMP_TO_EDGE, vk::Filter::LINEAR),
            Self::ClampToBorder => (vk::SamplerAddressMode::CLAMP_TO_BORDER, vk::Filter::LINEAR),
            Self::NoFiltering => (vk::SamplerAddressMode::CLAMP_TO_EDGE, vk::Filter::NEAREST),
        };
        let mipmap_mode = if filter == vk::Filter::NEAREST {
            vk::SamplerMipmapMode::NEAREST
        } else {
            vk::SamplerMipmapMode::LINEAR
        };

        vk::SamplerCreateInfo::default()
            .mag_filter(filter)
            .min_filter(filter)
            .mipmap_mode(mipmap_mode)
            .address_mode_u(address_mode)
            .address_mode_v(address_mode)
            .address_mode_w(address_mode)
            .border_color(vk::BorderColor::FLOAT_OPAQUE_WHITE)
            .max_lod(vk::LOD_CLAMP_NONE)
    }
}

/// Slot of a bindless descriptor array the resource should be written into.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct RgArraySlot {
    pub array_id: u32,
    pub index: u32,
}

/// One declared use of a logical resource by a pass.
#[derive(Clone, Debug)]
pub struct RgResourceUsage {
    /// Unique per logical resource across the whole graph.
    pub name: String,
    pub access: RgAccess,
    pub stage: RgStage,
    pub usage_type: RgUsageType,
    pub creation: Option<RgCreationSpec>,
    /// One physical instance per frame in flight.
    pub multi_buffered: bool,
    /// Survives removal of the passes that declared it.
    pub owned_by_engine: bool,
    pub sampler: RgSamplerPolicy,
    pub array_slot: Option<RgArraySlot>,
}

// new & builder
impl RgResourceUsage {
    pub fn new(name: impl Into<String>, usage_type: RgUsageType, access: RgAccess, stage: RgStage) -> Self {
        Self {
            name: name.into(),
            access,
            stage,
            usage_type,
            creation: None,
            multi_buffered: false,
            owned_by_engine: false,
            sampler: RgSamplerPolicy::Default,
            array_slot: None,
        }
    }

    #[inline]
    pub fn read(name: impl Into<String>, usage_type: RgUsageType, stage: RgStage) -> Self {
        Self::new(name, usage_type, RgAccess::READ, stage)
    }

    #[inline]
    pub fn write(name: impl Into<String>, usage_type: RgUsageType, stage: RgStage) -> Self {
        Self::new(name, usage_type, RgAccess::WRITE, stage)
    }

    #[inline]
    pub fn create(mut self, creation: RgCreationSpec) -> Self {
        self.creation = Some(creation);
        self
    }

    #[inline]
    pub fn multi_buffered(mut self) -> Self {
        self.multi_buffered = true;
        self
    }

    #[inline]
    pub fn owned_by_engine(mut self) -> Self {
        self.owned_by_engine = true;
        self
    }

    #[inline]
    pub fn sampler(mut self, sampler: RgSamplerPolicy) -> Self {
        self.sampler = sampler;
        self
    }

    #[inline]
    pub fn array_slot(mut self, array_id: u32, index: u32) -> Self {
        self.array_slot = Some(RgArraySlot { array_id, index });
        self
    }
}

impl RgResourceUsage {
    #[inline]
    pub fn writes(&self) -> bool {
        self.access.contains(RgAccess::WRITE)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extent_resolve() {
        let swapchain = vk::Extent2D {
            width: 1280,
            height: 720,
        };
        assert_eq!(RgExtent::Swapchain.resolve(swapchain), swapchain);
        assert_eq!(
            RgExtent::Fixed {
                width: 256,
                height: 128
            }
            .resolve(swapchain),
            vk::Extent2D {
                width: 256,
                height: 128
            }
        );
    }

    #[test]
    fn test_sampler_policy() {
        let info = RgSamplerPolicy::NoFiltering.sampler_create_info();
        assert_eq!(info.mag_filter, vk::Filter::NEAREST);
        assert_eq!(info.address_mode_u, vk::SamplerAddressMode::CLAMP_TO_EDGE);

        let info = RgSamplerPolicy::ClampToBorder.sampler_create_info();
        assert_eq!(info.address_mode_v, vk::SamplerAddressMode::CLAMP_TO_BORDER);
        assert_eq!(info.min_filter, vk::Filter::LINEAR);
    }

    #[test]
    fn test_usage_builder() {
        let usage = RgResourceUsage::write("CullTransBuf", RgUsageType::StructuredBuffer, RgStage::COMPUTE)
            .create(RgCreationSpec::buffer(RgBufferSpec::new(1024)))
            .multi_buffered()
            .array_slot(2, 5);

        assert!(usage.writes());
        assert!(usage.multi_buffered);
        assert!(!usage.owned_by_engine);
        assert_eq!(usage.array_slot, Some(RgArraySlot { array_id: 2, index: 5 }));
        assert!(!usage.creation.as_ref().unwrap().desc.is_image());
    }
}
