//! Coarse resource states and the usage vocabulary passes declare with.
//!
//! A pass never names a layout or an access mask. It declares *what* it does
//! with a resource ([`RgUsageType`] + [`RgAccess`] + [`RgStage`]) and the graph
//! derives the [`RgResourceState`] it needs.

use std::fmt::{self, Display};

use ash::vk;
use bitflags::bitflags;

/// Coarse state of one physical resource instance.
///
/// Image states map to exactly one `vk::ImageLayout`; buffer states have none.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum RgResourceState {
    Undefined,
    General,
    ColorAttachment,
    DepthAttachment,
    DepthReadOnly,
    ShaderReadOnly,
    TransferSrc,
    TransferDst,
    Present,
    StorageRead,
    StorageReadWrite,
    IndirectRead,
}

impl RgResourceState {
    pub const fn layout(self) -> vk::ImageLayout {
        match self {
            Self::Undefined => vk::ImageLayout::UNDEFINED,
            Self::General => vk::ImageLayout::GENERAL,
            Self::ColorAttachment => vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL,
            Self::DepthAttachment => vk::ImageLayout::DEPTH_STENCIL_ATTACHMENT_OPTIMAL,
            Self::DepthReadOnly => vk::ImageLayout::DEPTH_STENCIL_READ_ONLY_OPTIMAL,
            Self::ShaderReadOnly => vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL,
            Self::TransferSrc => vk::ImageLayout::TRANSFER_SRC_OPTIMAL,
            Self::TransferDst => vk::ImageLayout::TRANSFER_DST_OPTIMAL,
            Self::Present => vk::ImageLayout::PRESENT_SRC_KHR,
            Self::StorageRead | Self::StorageReadWrite | Self::IndirectRead => vk::ImageLayout::UNDEFINED,
        }
    }

    /// States only buffers can be in.
    #[inline]
    pub const fn is_buffer_only(self) -> bool {
        matches!(self, Self::StorageRead | Self::StorageReadWrite | Self::IndirectRead)
    }

    /// States in which the GPU may write the resource.
    ///
    /// Re-entering one of these with a write on either side still needs a barrier.
    #[inline]
    pub const fn is_writable(self) -> bool {
        matches!(
            self,
            Self::General | Self::ColorAttachment | Self::DepthAttachment | Self::TransferDst | Self::StorageReadWrite
        )
    }
}

impl Display for RgResourceState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

bitflags! {
    #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
    pub struct RgAccess: u8 {
        const READ = 1 << 0;
        const WRITE = 1 << 1;
        const READ_WRITE = Self::READ.bits() | Self::WRITE.bits();
    }
}

bitflags! {
    /// Pipeline stages a usage happens in.
    #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
    pub struct RgStage: u8 {
        const VERTEX = 1 << 0;
        const FRAGMENT = 1 << 1;
        const COMPUTE = 1 << 2;
        const INDIRECT_DRAW = 1 << 3;
        const RAY_GEN = 1 << 4;
        const TRANSFER = 1 << 5;
    }
}

impl RgStage {
    /// Vulkan stages covered by this set.
    pub fn to_vk(self) -> vk::PipelineStageFlags2 {
        let mut stages = vk::PipelineStageFlags2::NONE;
        if self.contains(Self::VERTEX) {
            stages |= vk::PipelineStageFlags2::VERTEX_SHADER;
        }
        if self.contains(Self::FRAGMENT) {
            stages |= vk::PipelineStageFlags2::FRAGMENT_SHADER;
        }
        if self.contains(Self::COMPUTE) {
            stages |= vk::PipelineStageFlags2::COMPUTE_SHADER;
        }
        if self.contains(Self::INDIRECT_DRAW) {
            stages |= vk::PipelineStageFlags2::DRAW_INDIRECT;
        }
        if self.contains(Self::RAY_GEN) {
            stages |= vk::PipelineStageFlags2::RAY_TRACING_SHADER_KHR;
        }
        if self.contains(Self::TRANSFER) {
            stages |= vk::PipelineStageFlags2::TRANSFER;
        }
        stages
    }
}

/// How a pass uses a resource.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum RgUsageType {
    ColorAttachment,
    DepthAttachment,
    SampledTexture,
    SampledDepthTexture,
    ImageStorage,
    StructuredBuffer,
}

impl RgUsageType {
    #[inline]
    pub const fn is_image(self) -> bool {
        !matches!(self, Self::StructuredBuffer)
    }

    /// State a resource is left in after creation, by the type of its declaring usage.
    pub const fn creation_state(self) -> RgResourceState {
        match self {
            Self::ColorAttachment => RgResourceState::ColorAttachment,
            Self::DepthAttachment => RgResourceState::DepthAttachment,
            Self::SampledTexture => RgResourceState::ShaderReadOnly,
            Self::SampledDepthTexture => RgResourceState::DepthReadOnly,
            Self::ImageStorage => RgResourceState::General,
            Self::StructuredBuffer => RgResourceState::StorageReadWrite,
        }
    }

    /// State a usage needs the resource to be in.
    ///
    /// Fails for combinations no pass can legally declare, e.g. writing a sampled texture.
    pub fn requested_state(self, access: RgAccess, stage: RgStage) -> Result<RgResourceState, &'static str> {
        if access.is_empty() {
            return Err("usage declares neither read nor write access");
        }
        let writes = access.contains(RgAccess::WRITE);

        let state = match self {
            Self::ColorAttachment => RgResourceState::ColorAttachment,
            Self::DepthAttachment if writes => RgResourceState::DepthAttachment,
            Self::DepthAttachment => RgResourceState::DepthReadOnly,
            Self::SampledTexture | Self::SampledDepthTexture if writes => {
                return Err("sampled textures are read-only");
            }
            Self::SampledTexture => RgResourceState::ShaderReadOnly,
            Self::SampledDepthTexture => RgResourceState::DepthReadOnly,
            Self::ImageStorage => RgResourceState::General,
            Self::StructuredBuffer if writes => RgResourceState::StorageReadWrite,
            Self::StructuredBuffer if stage.contains(RgStage::INDIRECT_DRAW) => RgResourceState::IndirectRead,
            Self::StructuredBuffer => RgResourceState::StorageRead,
        };
        Ok(state)
    }

    /// Image usage flags a resource must have been created with to serve this usage.
    pub const fn required_image_usage(self) -> vk::ImageUsageFlags {
        match self {
            Self::ColorAttachment => vk::ImageUsageFlags::COLOR_ATTACHMENT,
            Self::DepthAttachment => vk::ImageUsageFlags::DEPTH_STENCIL_ATTACHMENT,
            Self::SampledTexture | Self::SampledDepthTexture => vk::ImageUsageFlags::SAMPLED,
            Self::ImageStorage => vk::ImageUsageFlags::STORAGE,
            Self::StructuredBuffer => vk::ImageUsageFlags::empty(),
        }
    }

    /// Buffer usage flags needed by a structured-buffer usage in `stage`.
    pub fn required_buffer_usage(self, stage: RgStage) -> vk::BufferUsageFlags {
        match self {
            Self::StructuredBuffer if stage.contains(RgStage::INDIRECT_DRAW) => vk::BufferUsageFlags::INDIRECT_BUFFER,
            Self::StructuredBuffer => vk::BufferUsageFlags::STORAGE_BUFFER,
            _ => vk::BufferUsageFlags::empty(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_requested_states() {
        let read = RgAccess::READ;
        let write = RgAccess::WRITE;
        let fragment = RgStage::FRAGMENT;

        assert_eq!(
            RgUsageType::ColorAttachment.requested_state(read, fragment),
            Ok(RgResourceState::ColorAttachment)
        );
        assert_eq!(
            RgUsageType::DepthAttachment.requested_state(RgAccess::READ_WRITE, fragment),
            Ok(RgResourceState::DepthAttachment)
        );
        assert_eq!(RgUsageType::DepthAttachment.requested_state(read, fragment), Ok(RgResourceState::DepthReadOnly));
        assert_eq!(RgUsageType::SampledTexture.requested_state(read, fragment), Ok(RgResourceState::ShaderReadOnly));
        assert_eq!(
            RgUsageType::SampledDepthTexture.requested_state(read, RgStage::COMPUTE),
            Ok(RgResourceState::DepthReadOnly)
        );
        assert_eq!(RgUsageType::ImageStorage.requested_state(read, RgStage::COMPUTE), Ok(RgResourceState::General));
        assert_eq!(
            RgUsageType::StructuredBuffer.requested_state(write, RgStage::COMPUTE),
            Ok(RgResourceState::StorageReadWrite)
        );
        assert_eq!(
            RgUsageType::StructuredBuffer.requested_state(read, RgStage::INDIRECT_DRAW),
            Ok(RgResourceState::IndirectRead)
        );
        assert_eq!(
            RgUsageType::StructuredBuffer.requested_state(read, RgStage::VERTEX),
            Ok(RgResourceState::StorageRead)
        );
    }

    #[test]
    fn test_sampled_write_is_rejected() {
        assert!(RgUsageType::SampledTexture.requested_state(RgAccess::WRITE, RgStage::FRAGMENT).is_err());
        assert!(RgUsageType::SampledDepthTexture.requested_state(RgAccess::READ_WRITE, RgStage::COMPUTE).is_err());
        assert!(RgUsageType::ImageStorage.requested_state(RgAccess::empty(), RgStage::COMPUTE).is_err());
    }

    #[test]
    fn test_creation_states() {
        assert_eq!(RgUsageType::SampledTexture.creation_state(), RgResourceState::ShaderReadOnly);
        assert_eq!(RgUsageType::ImageStorage.creation_state(), RgResourceState::General);
        assert_eq!(RgUsageType::StructuredBuffer.creation_state(), RgResourceState::StorageReadWrite);
        assert!(RgResourceState::StorageReadWrite.is_buffer_only());
        assert_eq!(RgResourceState::StorageRead.layout(), vk::ImageLayout::UNDEFINED);
    }
}
