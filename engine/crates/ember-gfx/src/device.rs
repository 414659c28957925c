use ash::vk;

use crate::{
    commands::barrier::{GfxBufferBarrier, GfxImageBarrier},
    error::GfxResult,
    resources::{
        buffer::{GfxBuffer, GfxBufferCreateInfo},
        image::{GfxImage, GfxImageCreateInfo},
    },
};

/// Everything the frame graph needs from the GPU.
///
/// Methods take `&self`: backends keep their bookkeeping behind `Cell`/`RefCell`,
/// and every call happens on the render thread.
pub trait GfxDevice {
    /// Backend name for logs.
    fn name(&self) -> &str;

    // ---------------- resources ----------------

    /// Allocates device-local memory for the image and creates a default view
    /// covering every mip and layer.
    fn create_image(&self, info: &GfxImageCreateInfo) -> GfxResult<GfxImage>;

    fn destroy_image(&self, image: GfxImage);

    fn create_buffer(&self, info: &GfxBufferCreateInfo) -> GfxResult<GfxBuffer>;

    fn destroy_buffer(&self, buffer: GfxBuffer);

    /// Copies `data` into a host-visible buffer.
    fn write_buffer(&self, buffer: &GfxBuffer, offset: vk::DeviceSize, data: &[u8]) -> GfxResult<()>;

    // ---------------- one-time submission ----------------

    /// Returns a primary command buffer that is already in the recording state.
    fn allocate_one_time_command_buffer(&self, name: &str) -> GfxResult<vk::CommandBuffer>;

    /// Ends recording, submits to the graphics queue and waits for the queue to go idle.
    fn submit_and_wait(&self, cmd: vk::CommandBuffer, name: &str) -> GfxResult<()>;

    fn free_command_buffer(&self, cmd: vk::CommandBuffer);

    // ---------------- commands ----------------

    fn cmd_pipeline_barrier(
        &self,
        cmd: vk::CommandBuffer,
        image_barriers: &[GfxImageBarrier],
        buffer_barriers: &[GfxBufferBarrier],
    );

    fn cmd_copy_buffer_to_image(
        &self,
        cmd: vk::CommandBuffer,
        src: vk::Buffer,
        dst: vk::Image,
        dst_layout: vk::ImageLayout,
        regions: &[vk::BufferImageCopy],
    );

    fn cmd_copy_buffer(&self, cmd: vk::CommandBuffer, src: vk::Buffer, dst: vk::Buffer, regions: &[vk::BufferCopy]);

    fn cmd_fill_buffer(
        &self,
        cmd: vk::CommandBuffer,
        buffer: vk::Buffer,
        offset: vk::DeviceSize,
        size: vk::DeviceSize,
        data: u32,
    );

    fn cmd_bind_pipeline(&self, cmd: vk::CommandBuffer, bind_point: vk::PipelineBindPoint, pipeline: vk::Pipeline);

    fn cmd_dispatch(&self, cmd: vk::CommandBuffer, group_count: glam::UVec3);

    fn cmd_draw(
        &self,
        cmd: vk::CommandBuffer,
        vertex_count: u32,
        instance_count: u32,
        first_vertex: u32,
        first_instance: u32,
    );

    /// Debug labels are optional; backends without debug utils ignore them.
    fn cmd_begin_label(&self, _cmd: vk::CommandBuffer, _label: &str, _color: glam::Vec4) {}

    fn cmd_end_label(&self, _cmd: vk::CommandBuffer) {}

    // ---------------- queries ----------------

    /// Current size of the presentation surface.
    fn swapchain_extent(&self) -> vk::Extent2D;

    /// Whether `format` supports `usage` with optimal tiling.
    fn is_format_supported(&self, format: vk::Format, usage: vk::ImageUsageFlags) -> bool;
}
