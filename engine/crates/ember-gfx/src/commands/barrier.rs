use ash::vk;

use crate::resources::{buffer::GfxBuffer, image::GfxImage};

/// Stage and access masks on one side of a dependency.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct GfxSyncScope {
    pub stage: vk::PipelineStageFlags2,
    pub access: vk::AccessFlags2,
}

impl GfxSyncScope {
    pub const fn new(stage: vk::PipelineStageFlags2, access: vk::AccessFlags2) -> Self {
        Self { stage, access }
    }
}

/// Sync2 image barrier, never transferring queue ownership.
#[derive(Copy, Clone, Debug)]
pub struct GfxImageBarrier(vk::ImageMemoryBarrier2<'static>);

impl GfxImageBarrier {
    /// Layout change over every mip and layer of `image`.
    pub fn transition(
        image: &GfxImage,
        aspect: vk::ImageAspectFlags,
        old_layout: vk::ImageLayout,
        new_layout: vk::ImageLayout,
        src: GfxSyncScope,
        dst: GfxSyncScope,
    ) -> Self {
        let info = image.info();
        Self(vk::ImageMemoryBarrier2 {
            image: image.handle(),
            old_layout,
            new_layout,
            src_stage_mask: src.stage,
            src_access_mask: src.access,
            dst_stage_mask: dst.stage,
            dst_access_mask: dst.access,
            src_queue_family_index: vk::QUEUE_FAMILY_IGNORED,
            dst_queue_family_index: vk::QUEUE_FAMILY_IGNORED,
            subresource_range: vk::ImageSubresourceRange {
                aspect_mask: aspect,
                base_mip_level: 0,
                level_count: info.mip_levels,
                base_array_layer: 0,
                layer_count: info.array_layers,
            },
            ..Default::default()
        })
    }

    #[inline]
    pub fn raw(&self) -> &vk::ImageMemoryBarrier2<'static> {
        &self.0
    }
}

/// Sync2 buffer barrier covering the whole buffer.
#[derive(Copy, Clone, Debug)]
pub struct GfxBufferBarrier(vk::BufferMemoryBarrier2<'static>);

impl GfxBufferBarrier {
    pub fn whole(buffer: &GfxBuffer, src: GfxSyncScope, dst: GfxSyncScope) -> Self {
        Self(vk::BufferMemoryBarrier2 {
            buffer: buffer.handle(),
            offset: 0,
            size: vk::WHOLE_SIZE,
            src_stage_mask: src.stage,
            src_access_mask: src.access,
            dst_stage_mask: dst.stage,
            dst_access_mask: dst.access,
            src_queue_family_index: vk::QUEUE_FAMILY_IGNORED,
            dst_queue_family_index: vk::QUEUE_FAMILY_IGNORED,
            ..Default::default()
        })
    }

    #[inline]
    pub fn raw(&self) -> &vk::BufferMemoryBarrier2<'static> {
        &self.0
    }
}
