use ash::vk;

use crate::{
    commands::barrier::{GfxBufferBarrier, GfxImageBarrier},
    device::GfxDevice,
    resources::{buffer::GfxBuffer, image::GfxImage},
};

/// A command buffer in the recording state, bound to the device that records it.
///
/// Every `cmd_*` method forwards to the device; nothing is validated here.
#[derive(Clone, Copy)]
pub struct GfxCommandBuffer<'a> {
    device: &'a dyn GfxDevice,
    vk_handle: vk::CommandBuffer,
}

impl<'a> GfxCommandBuffer<'a> {
    pub fn new(device: &'a dyn GfxDevice, vk_handle: vk::CommandBuffer) -> Self {
        Self { device, vk_handle }
    }

    #[inline]
    pub fn vk_handle(&self) -> vk::CommandBuffer {
        self.vk_handle
    }

    #[inline]
    pub fn device(&self) -> &'a dyn GfxDevice {
        self.device
    }
}

// sync
impl GfxCommandBuffer<'_> {
    /// One `vkCmdPipelineBarrier2` for all barriers; empty input records nothing.
    pub fn pipeline_barrier(&self, image_barriers: &[GfxImageBarrier], buffer_barriers: &[GfxBufferBarrier]) {
        if image_barriers.is_empty() && buffer_barriers.is_empty() {
            return;
        }
        self.device.cmd_pipeline_barrier(self.vk_handle, image_barriers, buffer_barriers);
    }

    #[inline]
    pub fn image_memory_barrier(&self, barriers: &[GfxImageBarrier]) {
        self.pipeline_barrier(barriers, &[]);
    }

    #[inline]
    pub fn buffer_memory_barrier(&self, barriers: &[GfxBufferBarrier]) {
        self.pipeline_barrier(&[], barriers);
    }
}

// transfer
impl GfxCommandBuffer<'_> {
    /// Copies tightly packed texels into mip 0 of every layer; `dst` must be in `TRANSFER_DST_OPTIMAL`.
    pub fn cmd_copy_buffer_to_image(&self, src: &GfxBuffer, dst: &GfxImage) {
        let info = dst.info();
        let region = vk::BufferImageCopy {
            buffer_offset: 0,
            buffer_row_length: 0,
            buffer_image_height: 0,
            image_subresource: vk::ImageSubresourceLayers {
                aspect_mask: crate::format::infer_aspect(info.format),
                mip_level: 0,
                base_array_layer: 0,
                layer_count: info.array_layers,
            },
            image_offset: vk::Offset3D::default(),
            image_extent: vk::Extent3D {
                width: info.extent.width,
                height: info.extent.height,
                depth: 1,
            },
        };
        self.device.cmd_copy_buffer_to_image(
            self.vk_handle,
            src.handle(),
            dst.handle(),
            vk::ImageLayout::TRANSFER_DST_OPTIMAL,
            &[region],
        );
    }

    #[inline]
    pub fn cmd_copy_buffer(&self, src: &GfxBuffer, dst: &GfxBuffer, regions: &[vk::BufferCopy]) {
        self.device.cmd_copy_buffer(self.vk_handle, src.handle(), dst.handle(), regions);
    }

    /// Fills the whole buffer with a repeated `u32`.
    #[inline]
    pub fn cmd_fill_buffer(&self, buffer: &GfxBuffer, data: u32) {
        self.device.cmd_fill_buffer(self.vk_handle, buffer.handle(), 0, vk::WHOLE_SIZE, data);
    }
}

// pipeline
impl GfxCommandBuffer<'_> {
    #[inline]
    pub fn cmd_bind_pipeline(&self, bind_point: vk::PipelineBindPoint, pipeline: vk::Pipeline) {
        self.device.cmd_bind_pipeline(self.vk_handle, bind_point, pipeline);
    }

    #[inline]
    pub fn cmd_dispatch(&self, group_count: glam::UVec3) {
        self.device.cmd_dispatch(self.vk_handle, group_count);
    }

    #[inline]
    pub fn cmd_draw(&self, vertex_count: u32, instance_count: u32, first_vertex: u32, first_instance: u32) {
        self.device.cmd_draw(self.vk_handle, vertex_count, instance_count, first_vertex, first_instance);
    }
}

// debug
impl GfxCommandBuffer<'_> {
    #[inline]
    pub fn begin_label(&self, label_name: &str, label_color: glam::Vec4) {
        self.device.cmd_begin_label(self.vk_handle, label_name, label_color);
    }

    #[inline]
    pub fn end_label(&self) {
        self.device.cmd_end_label(self.vk_handle);
    }
}
