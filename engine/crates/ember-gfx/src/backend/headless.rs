//! A device without a GPU.
//!
//! Handles are unique non-null integers, host-visible buffers are backed by
//! `Vec<u8>`, and every recorded command is appended to a log that tests and
//! the demo app inspect.

use std::cell::{Cell, RefCell};
use std::collections::{HashMap, HashSet};

use ash::vk;
use ash::vk::Handle;

use crate::{
    commands::barrier::{GfxBufferBarrier, GfxImageBarrier},
    device::GfxDevice,
    error::{GfxError, GfxResult},
    resources::{
        buffer::{GfxBuffer, GfxBufferCreateInfo},
        image::{GfxImage, GfxImageCreateInfo},
    },
};

/// Image barrier as recorded by [`HeadlessDevice`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct HeadlessImageBarrier {
    pub image: vk::Image,
    pub old_layout: vk::ImageLayout,
    pub new_layout: vk::ImageLayout,
    pub src_stage: vk::PipelineStageFlags2,
    pub dst_stage: vk::PipelineStageFlags2,
    pub src_access: vk::AccessFlags2,
    pub dst_access: vk::AccessFlags2,
    pub aspect: vk::ImageAspectFlags,
}

impl From<&GfxImageBarrier> for HeadlessImageBarrier {
    fn from(barrier: &GfxImageBarrier) -> Self {
        let inner = barrier.raw();
        Self {
            image: inner.image,
            old_layout: inner.old_layout,
            new_layout: inner.new_layout,
            src_stage: inner.src_stage_mask,
            dst_stage: inner.dst_stage_mask,
            src_access: inner.src_access_mask,
            dst_access: inner.dst_access_mask,
            aspect: inner.subresource_range.aspect_mask,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct HeadlessBufferBarrier {
    pub buffer: vk::Buffer,
    pub src_stage: vk::PipelineStageFlags2,
    pub dst_stage: vk::PipelineStageFlags2,
    pub src_access: vk::AccessFlags2,
    pub dst_access: vk::AccessFlags2,
}

impl From<&GfxBufferBarrier> for HeadlessBufferBarrier {
    fn from(barrier: &GfxBufferBarrier) -> Self {
        let inner = barrier.raw();
        Self {
            buffer: inner.buffer,
            src_stage: inner.src_stage_mask,
            dst_stage: inner.dst_stage_mask,
            src_access: inner.src_access_mask,
            dst_access: inner.dst_access_mask,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum HeadlessCommand {
    PipelineBarrier {
        cmd: vk::CommandBuffer,
        images: Vec<HeadlessImageBarrier>,
        buffers: Vec<HeadlessBufferBarrier>,
    },
    CopyBufferToImage {
        cmd: vk::CommandBuffer,
        src: vk::Buffer,
        dst: vk::Image,
        dst_layout: vk::ImageLayout,
    },
    CopyBuffer {
        cmd: vk::CommandBuffer,
        src: vk::Buffer,
        dst: vk::Buffer,
        size: vk::DeviceSize,
    },
    FillBuffer {
        cmd: vk::CommandBuffer,
        buffer: vk::Buffer,
        data: u32,
    },
    BindPipeline {
        cmd: vk::CommandBuffer,
        bind_point: vk::PipelineBindPoint,
        pipeline: vk::Pipeline,
    },
    Dispatch {
        cmd: vk::CommandBuffer,
        group_count: glam::UVec3,
    },
    Draw {
        cmd: vk::CommandBuffer,
        vertex_count: u32,
        instance_count: u32,
    },
    BeginLabel {
        cmd: vk::CommandBuffer,
        label: String,
    },
    EndLabel {
        cmd: vk::CommandBuffer,
    },
    Submit {
        cmd: vk::CommandBuffer,
        name: String,
    },
}

#[derive(Default)]
struct HeadlessStats {
    images_created: usize,
    buffers_created: usize,
    live_images: HashSet<vk::Image>,
    live_buffers: HashSet<vk::Buffer>,
    live_command_buffers: HashSet<vk::CommandBuffer>,
}

pub struct HeadlessDevice {
    name: String,
    next_handle: Cell<u64>,
    swapchain_extent: Cell<vk::Extent2D>,
    fail_allocations: Cell<bool>,
    unsupported_formats: RefCell<HashSet<vk::Format>>,

    commands: RefCell<Vec<HeadlessCommand>>,
    stats: RefCell<HeadlessStats>,
    buffer_memory: RefCell<HashMap<vk::Buffer, Vec<u8>>>,
}

// new & config
impl HeadlessDevice {
    pub fn new(swapchain_extent: vk::Extent2D) -> Self {
        Self {
            name: "headless".to_string(),
            next_handle: Cell::new(1),
            swapchain_extent: Cell::new(swapchain_extent),
            fail_allocations: Cell::new(false),
            unsupported_formats: RefCell::new(HashSet::new()),
            commands: RefCell::new(Vec::new()),
            stats: RefCell::new(HeadlessStats::default()),
            buffer_memory: RefCell::new(HashMap::new()),
        }
    }

    /// Simulates a window resize.
    pub fn set_swapchain_extent(&self, extent: vk::Extent2D) {
        self.swapchain_extent.set(extent);
    }

    /// While set, every image/buffer allocation fails with [`GfxError::Allocation`].
    pub fn set_fail_allocations(&self, fail: bool) {
        self.fail_allocations.set(fail);
    }

    pub fn mark_format_unsupported(&self, format: vk::Format) {
        self.unsupported_formats.borrow_mut().insert(format);
    }

    fn next_raw_handle(&self) -> u64 {
        let raw = self.next_handle.get();
        self.next_handle.set(raw + 1);
        raw
    }

    fn check_allocation(&self, name: &str) -> GfxResult<()> {
        if self.fail_allocations.get() {
            return Err(GfxError::Allocation {
                name: name.to_string(),
                reason: "allocation failure injected on headless device".to_string(),
            });
        }
        Ok(())
    }

    fn record(&self, command: HeadlessCommand) {
        self.commands.borrow_mut().push(command);
    }
}

// inspection
impl HeadlessDevice {
    /// Snapshot of the command log.
    pub fn commands(&self) -> Vec<HeadlessCommand> {
        self.commands.borrow().clone()
    }

    /// Drains the command log.
    pub fn take_commands(&self) -> Vec<HeadlessCommand> {
        std::mem::take(&mut *self.commands.borrow_mut())
    }

    /// All recorded image barriers, flattened in recording order.
    pub fn image_barriers(&self) -> Vec<HeadlessImageBarrier> {
        self.commands
            .borrow()
            .iter()
            .flat_map(|command| match command {
                HeadlessCommand::PipelineBarrier { images, .. } => images.clone(),
                _ => Vec::new(),
            })
            .collect()
    }

    pub fn buffer_barriers(&self) -> Vec<HeadlessBufferBarrier> {
        self.commands
            .borrow()
            .iter()
            .flat_map(|command| match command {
                HeadlessCommand::PipelineBarrier { buffers, .. } => buffers.clone(),
                _ => Vec::new(),
            })
            .collect()
    }

    pub fn images_created(&self) -> usize {
        self.stats.borrow().images_created
    }

    pub fn buffers_created(&self) -> usize {
        self.stats.borrow().buffers_created
    }

    pub fn live_image_count(&self) -> usize {
        self.stats.borrow().live_images.len()
    }

    pub fn live_buffer_count(&self) -> usize {
        self.stats.borrow().live_buffers.len()
    }

    pub fn live_command_buffer_count(&self) -> usize {
        self.stats.borrow().live_command_buffers.len()
    }

    pub fn is_image_alive(&self, image: vk::Image) -> bool {
        self.stats.borrow().live_images.contains(&image)
    }

    /// Contents of a host-visible buffer, `None` for device-local or destroyed buffers.
    pub fn buffer_contents(&self, buffer: vk::Buffer) -> Option<Vec<u8>> {
        self.buffer_memory.borrow().get(&buffer).cloned()
    }
}

impl GfxDevice for HeadlessDevice {
    fn name(&self) -> &str {
        &self.name
    }

    fn create_image(&self, info: &GfxImageCreateInfo) -> GfxResult<GfxImage> {
        self.check_allocation(&info.name)?;

        let image = vk::Image::from_raw(self.next_raw_handle());
        let view = vk::ImageView::from_raw(self.next_raw_handle());

        let mut stats = self.stats.borrow_mut();
        stats.images_created += 1;
        stats.live_images.insert(image);
        log::trace!("[{}] image <{}> created: {:?}", self.name, info.name, image);

        Ok(GfxImage::new(image, view, info.clone()))
    }

    fn destroy_image(&self, image: GfxImage) {
        let removed = self.stats.borrow_mut().live_images.remove(&image.handle());
        debug_assert!(removed, "image <{}> destroyed twice", image.info().name);
    }

    fn create_buffer(&self, info: &GfxBufferCreateInfo) -> GfxResult<GfxBuffer> {
        self.check_allocation(&info.name)?;

        let buffer = vk::Buffer::from_raw(self.next_raw_handle());
        if info.host_visible {
            self.buffer_memory.borrow_mut().insert(buffer, vec![0; info.size as usize]);
        }

        let mut stats = self.stats.borrow_mut();
        stats.buffers_created += 1;
        stats.live_buffers.insert(buffer);

        Ok(GfxBuffer::new(buffer, info.clone()))
    }

    fn destroy_buffer(&self, buffer: GfxBuffer) {
        self.buffer_memory.borrow_mut().remove(&buffer.handle());
        let removed = self.stats.borrow_mut().live_buffers.remove(&buffer.handle());
        debug_assert!(removed, "buffer <{}> destroyed twice", buffer.info().name);
    }

    fn write_buffer(&self, buffer: &GfxBuffer, offset: vk::DeviceSize, data: &[u8]) -> GfxResult<()> {
        let mut memory = self.buffer_memory.borrow_mut();
        let Some(bytes) = memory.get_mut(&buffer.handle()) else {
            return Err(GfxError::NotHostVisible {
                name: buffer.info().name.clone(),
            });
        };

        let begin = offset as usize;
        let end = begin + data.len();
        if end > bytes.len() {
            return Err(GfxError::BufferOverflow {
                name: buffer.info().name.clone(),
                offset,
                size: data.len(),
                capacity: buffer.size(),
            });
        }
        bytes[begin..end].copy_from_slice(data);
        Ok(())
    }

    fn allocate_one_time_command_buffer(&self, _name: &str) -> GfxResult<vk::CommandBuffer> {
        let cmd = vk::CommandBuffer::from_raw(self.next_raw_handle());
        self.stats.borrow_mut().live_command_buffers.insert(cmd);
        Ok(cmd)
    }

    fn submit_and_wait(&self, cmd: vk::CommandBuffer, name: &str) -> GfxResult<()> {
        self.record(HeadlessCommand::Submit {
            cmd,
            name: name.to_string(),
        });
        Ok(())
    }

    fn free_command_buffer(&self, cmd: vk::CommandBuffer) {
        self.stats.borrow_mut().live_command_buffers.remove(&cmd);
    }

    fn cmd_pipeline_barrier(
        &self,
        cmd: vk::CommandBuffer,
        image_barriers: &[GfxImageBarrier],
        buffer_barriers: &[GfxBufferBarrier],
    ) {
        self.record(HeadlessCommand::PipelineBarrier {
            cmd,
            images: image_barriers.iter().map(HeadlessImageBarrier::from).collect(),
            buffers: buffer_barriers.iter().map(HeadlessBufferBarrier::from).collect(),
        });
    }

    fn cmd_copy_buffer_to_image(
        &self,
        cmd: vk::CommandBuffer,
        src: vk::Buffer,
        dst: vk::Image,
        dst_layout: vk::ImageLayout,
        _regions: &[vk::BufferImageCopy],
    ) {
        self.record(HeadlessCommand::CopyBufferToImage {
            cmd,
            src,
            dst,
            dst_layout,
        });
    }

    fn cmd_copy_buffer(&self, cmd: vk::CommandBuffer, src: vk::Buffer, dst: vk::Buffer, regions: &[vk::BufferCopy]) {
        {
            let mut memory = self.buffer_memory.borrow_mut();
            for region in regions {
                let Some(src_bytes) = memory.get(&src) else { break };
                let begin = region.src_offset as usize;
                let chunk = src_bytes[begin..begin + region.size as usize].to_vec();
                if let Some(dst_bytes) = memory.get_mut(&dst) {
                    let begin = region.dst_offset as usize;
                    dst_bytes[begin..begin + chunk.len()].copy_from_slice(&chunk);
                }
            }
        }

        self.record(HeadlessCommand::CopyBuffer {
            cmd,
            src,
            dst,
            size: regions.iter().map(|region| region.size).sum(),
        });
    }

    fn cmd_fill_buffer(
        &self,
        cmd: vk::CommandBuffer,
        buffer: vk::Buffer,
        _offset: vk::DeviceSize,
        _size: vk::DeviceSize,
        data: u32,
    ) {
        if let Some(bytes) = self.buffer_memory.borrow_mut().get_mut(&buffer) {
            let pattern = data.to_le_bytes();
            for (i, byte) in bytes.iter_mut().enumerate() {
                *byte = pattern[i % 4];
            }
        }
        self.record(HeadlessCommand::FillBuffer { cmd, buffer, data });
    }

    fn cmd_bind_pipeline(&self, cmd: vk::CommandBuffer, bind_point: vk::PipelineBindPoint, pipeline: vk::Pipeline) {
        self.record(HeadlessCommand::BindPipeline {
            cmd,
            bind_point,
            pipeline,
        });
    }

    fn cmd_dispatch(&self, cmd: vk::CommandBuffer, group_count: glam::UVec3) {
        self.record(HeadlessCommand::Dispatch { cmd, group_count });
    }

    fn cmd_draw(
        &self,
        cmd: vk::CommandBuffer,
        vertex_count: u32,
        instance_count: u32,
        _first_vertex: u32,
        _first_instance: u32,
    ) {
        self.record(HeadlessCommand::Draw {
            cmd,
            vertex_count,
            instance_count,
        });
    }

    fn cmd_begin_label(&self, cmd: vk::CommandBuffer, label: &str, _color: glam::Vec4) {
        self.record(HeadlessCommand::BeginLabel {
            cmd,
            label: label.to_string(),
        });
    }

    fn cmd_end_label(&self, cmd: vk::CommandBuffer) {
        self.record(HeadlessCommand::EndLabel { cmd });
    }

    fn swapchain_extent(&self) -> vk::Extent2D {
        self.swapchain_extent.get()
    }

    fn is_format_supported(&self, format: vk::Format, _usage: vk::ImageUsageFlags) -> bool {
        format != vk::Format::UNDEFINED && !self.unsupported_formats.borrow().contains(&format)
    }
}
