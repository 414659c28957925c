use ash::vk;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct GfxBufferCreateInfo {
    pub name: String,
    pub size: vk::DeviceSize,
    pub usage: vk::BufferUsageFlags,
    /// Mapped memory, writable through `GfxDevice::write_buffer`.
    pub host_visible: bool,
}

impl GfxBufferCreateInfo {
    pub fn new(name: impl Into<String>, size: vk::DeviceSize, usage: vk::BufferUsageFlags) -> Self {
        Self {
            name: name.into(),
            size,
            usage,
            host_visible: false,
        }
    }

    /// Host-visible transfer source sized for `size` bytes.
    pub fn staging(name: impl Into<String>, size: vk::DeviceSize) -> Self {
        Self {
            name: name.into(),
            size,
            usage: vk::BufferUsageFlags::TRANSFER_SRC,
            host_visible: true,
        }
    }

    #[inline]
    pub fn host_visible(mut self, host_visible: bool) -> Self {
        self.host_visible = host_visible;
        self
    }
}

#[derive(Clone, Debug)]
pub struct GfxBuffer {
    handle: vk::Buffer,
    info: GfxBufferCreateInfo,
}

impl GfxBuffer {
    pub fn new(handle: vk::Buffer, info: GfxBufferCreateInfo) -> Self {
        Self { handle, info }
    }

    #[inline]
    pub fn handle(&self) -> vk::Buffer {
        self.handle
    }

    #[inline]
    pub fn size(&self) -> vk::DeviceSize {
        self.info.size
    }

    #[inline]
    pub fn info(&self) -> &GfxBufferCreateInfo {
        &self.info
    }
}
