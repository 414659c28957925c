use ash::vk;

use crate::frame_counter::FrameCounter;

/// Formats the engine prefers, in order of preference.
pub struct DefaultFrameSettings;
impl DefaultFrameSettings {
    pub const COLOR_FORMAT: vk::Format = vk::Format::R8G8B8A8_UNORM;
    pub const HDR_FORMAT: vk::Format = vk::Format::R16G16B16A16_SFLOAT;
    pub const DEPTH_FORMAT_CANDIDATES: &'static [vk::Format] = &[
        vk::Format::D32_SFLOAT_S8_UINT,
        vk::Format::D32_SFLOAT,
        vk::Format::D24_UNORM_S8_UINT,
        vk::Format::D16_UNORM_S8_UINT,
        vk::Format::D16_UNORM,
    ];
}

/// Frame-level settings handed to every pass at registration.
#[derive(Copy, Clone, Debug)]
pub struct FrameSettings {
    pub color_format: vk::Format,
    pub depth_format: vk::Format,
    /// Format of the lighting accumulation targets.
    pub hdr_format: vk::Format,
    pub frame_extent: vk::Extent2D,
    pub fif_count: usize,
    /// Point lights that get a cube shadow map.
    pub max_point_light_shadows: u32,
}

impl Default for FrameSettings {
    fn default() -> Self {
        Self {
            color_format: DefaultFrameSettings::COLOR_FORMAT,
            depth_format: DefaultFrameSettings::DEPTH_FORMAT_CANDIDATES[1],
            hdr_format: DefaultFrameSettings::HDR_FORMAT,
            frame_extent: vk::Extent2D {
                width: 1280,
                height: 720,
            },
            fif_count: FrameCounter::DEFAULT_FIF_COUNT,
            max_point_light_shadows: 4,
        }
    }
}

impl FrameSettings {
    /// First depth candidate the device can use as a depth attachment.
    pub fn pick_depth_format(device: &dyn ember_gfx::device::GfxDevice) -> Option<vk::Format> {
        DefaultFrameSettings::DEPTH_FORMAT_CANDIDATES
            .iter()
            .copied()
            .find(|&format| device.is_format_supported(format, vk::ImageUsageFlags::DEPTH_STENCIL_ATTACHMENT))
    }
}
