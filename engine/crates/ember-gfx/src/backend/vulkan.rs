//! [`GfxDevice`] over a real Vulkan device.
//!
//! The application creates the instance, device, queue and `vk_mem::Allocator`
//! and hands them over. This backend only owns a transient command pool and the
//! allocations of resources it created.

use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::ffi::CString;
use std::sync::Arc;

use ash::vk;
use vk_mem::Alloc;

use crate::{
    commands::barrier::{GfxBufferBarrier, GfxImageBarrier},
    device::GfxDevice,
    error::{GfxError, GfxResult},
    resources::{
        buffer::{GfxBuffer, GfxBufferCreateInfo},
        image::{GfxImage, GfxImageCreateInfo},
    },
};

pub struct VulkanDevice {
    instance: ash::Instance,
    physical_device: vk::PhysicalDevice,
    device: ash::Device,
    debug_utils: Option<ash::ext::debug_utils::Device>,
    allocator: Arc<vk_mem::Allocator>,

    queue: vk::Queue,
    transient_pool: vk::CommandPool,

    swapchain_extent: Cell<vk::Extent2D>,

    image_allocations: RefCell<HashMap<vk::Image, vk_mem::Allocation>>,
    buffer_allocations: RefCell<HashMap<vk::Buffer, vk_mem::Allocation>>,
}

// new & init
impl VulkanDevice {
    /// `queue` must belong to `queue_family_index` and support graphics and transfer.
    pub fn new(
        instance: ash::Instance,
        physical_device: vk::PhysicalDevice,
        device: ash::Device,
        allocator: Arc<vk_mem::Allocator>,
        queue: vk::Queue,
        queue_family_index: u32,
        swapchain_extent: vk::Extent2D,
    ) -> GfxResult<Self> {
        let pool_info = vk::CommandPoolCreateInfo::default()
            .queue_family_index(queue_family_index)
            .flags(vk::CommandPoolCreateFlags::TRANSIENT | vk::CommandPoolCreateFlags::RESET_COMMAND_BUFFER);
        let transient_pool = unsafe { device.create_command_pool(&pool_info, None)? };

        Ok(Self {
            instance,
            physical_device,
            device,
            debug_utils: None,
            allocator,
            queue,
            transient_pool,
            swapchain_extent: Cell::new(swapchain_extent),
            image_allocations: RefCell::new(HashMap::new()),
            buffer_allocations: RefCell::new(HashMap::new()),
        })
    }

    /// Enables command buffer labels; requires `VK_EXT_debug_utils` on the instance.
    pub fn with_debug_utils(mut self) -> Self {
        self.debug_utils = Some(ash::ext::debug_utils::Device::new(&self.instance, &self.device));
        self
    }

    /// Called by the swapchain owner after recreation.
    pub fn set_swapchain_extent(&self, extent: vk::Extent2D) {
        self.swapchain_extent.set(extent);
    }

    #[inline]
    pub fn ash_device(&self) -> &ash::Device {
        &self.device
    }

    /// Destroys the transient pool. Resources still alive are reported and leaked.
    pub fn destroy(&mut self) {
        let live_images = self.image_allocations.borrow().len();
        let live_buffers = self.buffer_allocations.borrow().len();
        if live_images + live_buffers > 0 {
            log::warn!("vulkan device destroyed with {} images and {} buffers alive", live_images, live_buffers);
        }

        unsafe {
            self.device.destroy_command_pool(self.transient_pool, None);
        }
        self.transient_pool = vk::CommandPool::null();
    }
}

// tools
impl VulkanDevice {
    fn required_format_features(usage: vk::ImageUsageFlags) -> vk::FormatFeatureFlags {
        let mut features = vk::FormatFeatureFlags::empty();
        if usage.contains(vk::ImageUsageFlags::COLOR_ATTACHMENT) {
            features |= vk::FormatFeatureFlags::COLOR_ATTACHMENT;
        }
        if usage.contains(vk::ImageUsageFlags::DEPTH_STENCIL_ATTACHMENT) {
            features |= vk::FormatFeatureFlags::DEPTH_STENCIL_ATTACHMENT;
        }
        if usage.contains(vk::ImageUsageFlags::SAMPLED) {
            features |= vk::FormatFeatureFlags::SAMPLED_IMAGE;
        }
        if usage.contains(vk::ImageUsageFlags::STORAGE) {
            features |= vk::FormatFeatureFlags::STORAGE_IMAGE;
        }
        if usage.contains(vk::ImageUsageFlags::TRANSFER_SRC) {
            features |= vk::FormatFeatureFlags::TRANSFER_SRC;
        }
        if usage.contains(vk::ImageUsageFlags::TRANSFER_DST) {
            features |= vk::FormatFeatureFlags::TRANSFER_DST;
        }
        features
    }

    fn allocation_error(name: &str, err: vk::Result) -> GfxError {
        GfxError::Allocation {
            name: name.to_string(),
            reason: err.to_string(),
        }
    }
}

impl GfxDevice for VulkanDevice {
    fn name(&self) -> &str {
        "vulkan"
    }

    fn create_image(&self, info: &GfxImageCreateInfo) -> GfxResult<GfxImage> {
        crate::gfx_span!("VulkanDevice::create_image");

        let image_ci = info.as_vk_create_info();
        let alloc_ci = vk_mem::AllocationCreateInfo {
            usage: vk_mem::MemoryUsage::AutoPreferDevice,
            ..Default::default()
        };
        let (image, mut allocation) = unsafe {
            self.allocator.create_image(&image_ci, &alloc_ci).map_err(|e| Self::allocation_error(&info.name, e))?
        };

        let view_type =
            if info.array_layers > 1 { vk::ImageViewType::TYPE_2D_ARRAY } else { vk::ImageViewType::TYPE_2D };
        let view_ci = vk::ImageViewCreateInfo::default()
            .image(image)
            .view_type(view_type)
            .format(info.format)
            .subresource_range(info.full_range());
        let view = match unsafe { self.device.create_image_view(&view_ci, None) } {
            Ok(view) => view,
            Err(e) => {
                unsafe { self.allocator.destroy_image(image, &mut allocation) };
                return Err(e.into());
            }
        };

        self.image_allocations.borrow_mut().insert(image, allocation);
        Ok(GfxImage::new(image, view, info.clone()))
    }

    fn destroy_image(&self, image: GfxImage) {
        let Some(mut allocation) = self.image_allocations.borrow_mut().remove(&image.handle()) else {
            log::error!("image <{}> was not allocated by this device", image.info().name);
            return;
        };
        unsafe {
            self.device.destroy_image_view(image.view(), None);
            self.allocator.destroy_image(image.handle(), &mut allocation);
        }
    }

    fn create_buffer(&self, info: &GfxBufferCreateInfo) -> GfxResult<GfxBuffer> {
        let buffer_ci = vk::BufferCreateInfo {
            size: info.size,
            usage: info.usage,
            ..Default::default()
        };
        let alloc_ci = if info.host_visible {
            vk_mem::AllocationCreateInfo {
                usage: vk_mem::MemoryUsage::Auto,
                flags: vk_mem::AllocationCreateFlags::HOST_ACCESS_SEQUENTIAL_WRITE,
                ..Default::default()
            }
        } else {
            vk_mem::AllocationCreateInfo {
                usage: vk_mem::MemoryUsage::AutoPreferDevice,
                ..Default::default()
            }
        };

        let (buffer, allocation) = unsafe {
            self.allocator.create_buffer(&buffer_ci, &alloc_ci).map_err(|e| Self::allocation_error(&info.name, e))?
        };
        self.buffer_allocations.borrow_mut().insert(buffer, allocation);
        Ok(GfxBuffer::new(buffer, info.clone()))
    }

    fn destroy_buffer(&self, buffer: GfxBuffer) {
        let Some(mut allocation) = self.buffer_allocations.borrow_mut().remove(&buffer.handle()) else {
            log::error!("buffer <{}> was not allocated by this device", buffer.info().name);
            return;
        };
        unsafe { self.allocator.destroy_buffer(buffer.handle(), &mut allocation) };
    }

    fn write_buffer(&self, buffer: &GfxBuffer, offset: vk::DeviceSize, data: &[u8]) -> GfxResult<()> {
        if !buffer.info().host_visible {
            return Err(GfxError::NotHostVisible {
                name: buffer.info().name.clone(),
            });
        }
        if offset + data.len() as vk::DeviceSize > buffer.size() {
            return Err(GfxError::BufferOverflow {
                name: buffer.info().name.clone(),
                offset,
                size: data.len(),
                capacity: buffer.size(),
            });
        }

        let mut allocations = self.buffer_allocations.borrow_mut();
        let Some(allocation) = allocations.get_mut(&buffer.handle()) else {
            return Err(GfxError::NotHostVisible {
                name: buffer.info().name.clone(),
            });
        };
        unsafe {
            let ptr = self.allocator.map_memory(allocation)?;
            std::ptr::copy_nonoverlapping(data.as_ptr(), ptr.add(offset as usize), data.len());
            self.allocator.unmap_memory(allocation);
        }
        Ok(())
    }

    fn allocate_one_time_command_buffer(&self, name: &str) -> GfxResult<vk::CommandBuffer> {
        let info = vk::CommandBufferAllocateInfo::default()
            .command_pool(self.transient_pool)
            .level(vk::CommandBufferLevel::PRIMARY)
            .command_buffer_count(1);

        let cmd = unsafe { self.device.allocate_command_buffers(&info)? }
            .into_iter()
            .next()
            .ok_or_else(|| GfxError::Submission {
                name: name.to_string(),
                reason: "driver returned no command buffer".to_string(),
            })?;

        let begin_info = vk::CommandBufferBeginInfo::default().flags(vk::CommandBufferUsageFlags::ONE_TIME_SUBMIT);
        if let Err(e) = unsafe { self.device.begin_command_buffer(cmd, &begin_info) } {
            self.free_command_buffer(cmd);
            return Err(e.into());
        }
        Ok(cmd)
    }

    fn submit_and_wait(&self, cmd: vk::CommandBuffer, name: &str) -> GfxResult<()> {
        crate::gfx_span!("VulkanDevice::submit_and_wait");

        let to_submission_error = |e: vk::Result| GfxError::Submission {
            name: name.to_string(),
            reason: e.to_string(),
        };
        unsafe {
            self.device.end_command_buffer(cmd).map_err(to_submission_error)?;

            let cmd_infos = [vk::CommandBufferSubmitInfo::default().command_buffer(cmd)];
            let submit_info = vk::SubmitInfo2::default().command_buffer_infos(&cmd_infos);
            self.device
                .queue_submit2(self.queue, std::slice::from_ref(&submit_info), vk::Fence::null())
                .map_err(to_submission_error)?;

            // vkQueueWaitIdle is as good as a fence for a single blocking submission
            self.device.queue_wait_idle(self.queue).map_err(to_submission_error)?;
        }
        Ok(())
    }

    fn free_command_buffer(&self, cmd: vk::CommandBuffer) {
        unsafe { self.device.free_command_buffers(self.transient_pool, &[cmd]) };
    }

    fn cmd_pipeline_barrier(
        &self,
        cmd: vk::CommandBuffer,
        image_barriers: &[GfxImageBarrier],
        buffer_barriers: &[GfxBufferBarrier],
    ) {
        let image_barriers: Vec<_> = image_barriers.iter().map(|b| *b.raw()).collect();
        let buffer_barriers: Vec<_> = buffer_barriers.iter().map(|b| *b.raw()).collect();
        let dependency_info = vk::DependencyInfo::default()
            .image_memory_barriers(&image_barriers)
            .buffer_memory_barriers(&buffer_barriers);
        unsafe { self.device.cmd_pipeline_barrier2(cmd, &dependency_info) };
    }

    fn cmd_copy_buffer_to_image(
        &self,
        cmd: vk::CommandBuffer,
        src: vk::Buffer,
        dst: vk::Image,
        dst_layout: vk::ImageLayout,
        regions: &[vk::BufferImageCopy],
    ) {
        unsafe { self.device.cmd_copy_buffer_to_image(cmd, src, dst, dst_layout, regions) };
    }

    fn cmd_copy_buffer(&self, cmd: vk::CommandBuffer, src: vk::Buffer, dst: vk::Buffer, regions: &[vk::BufferCopy]) {
        unsafe { self.device.cmd_copy_buffer(cmd, src, dst, regions) };
    }

    fn cmd_fill_buffer(
        &self,
        cmd: vk::CommandBuffer,
        buffer: vk::Buffer,
        offset: vk::DeviceSize,
        size: vk::DeviceSize,
        data: u32,
    ) {
        unsafe { self.device.cmd_fill_buffer(cmd, buffer, offset, size, data) };
    }

    fn cmd_bind_pipeline(&self, cmd: vk::CommandBuffer, bind_point: vk::PipelineBindPoint, pipeline: vk::Pipeline) {
        unsafe { self.device.cmd_bind_pipeline(cmd, bind_point, pipeline) };
    }

    fn cmd_dispatch(&self, cmd: vk::CommandBuffer, group_count: glam::UVec3) {
        unsafe { self.device.cmd_dispatch(cmd, group_count.x, group_count.y, group_count.z) };
    }

    fn cmd_draw(
        &self,
        cmd: vk::CommandBuffer,
        vertex_count: u32,
        instance_count: u32,
        first_vertex: u32,
        first_instance: u32,
    ) {
        unsafe { self.device.cmd_draw(cmd, vertex_count, instance_count, first_vertex, first_instance) };
    }

    fn cmd_begin_label(&self, cmd: vk::CommandBuffer, label: &str, color: glam::Vec4) {
        let Some(debug_utils) = &self.debug_utils else {
            return;
        };
        let Ok(name) = CString::new(label) else {
            log::warn!("debug label <{}> contains a nul byte, skipped", label);
            return;
        };
        unsafe {
            debug_utils.cmd_begin_debug_utils_label(
                cmd,
                &vk::DebugUtilsLabelEXT::default().label_name(name.as_c_str()).color(color.into()),
            );
        }
    }

    fn cmd_end_label(&self, cmd: vk::CommandBuffer) {
        if let Some(debug_utils) = &self.debug_utils {
            unsafe { debug_utils.cmd_end_debug_utils_label(cmd) };
        }
    }

    fn swapchain_extent(&self) -> vk::Extent2D {
        self.swapchain_extent.get()
    }

    fn is_format_supported(&self, format: vk::Format, usage: vk::ImageUsageFlags) -> bool {
        let props = unsafe { self.instance.get_physical_device_format_properties(self.physical_device, format) };
        props.optimal_tiling_features.contains(Self::required_format_features(usage))
    }
}
