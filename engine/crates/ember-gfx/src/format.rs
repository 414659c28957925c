//! Format helpers shared by the vault and the upload path.

use ash::vk;

/// Depth formats, with or without a stencil channel.
#[inline]
pub fn is_depth_format(format: vk::Format) -> bool {
    matches!(
        format,
        vk::Format::D16_UNORM
            | vk::Format::D32_SFLOAT
            | vk::Format::X8_D24_UNORM_PACK32
            | vk::Format::D16_UNORM_S8_UINT
            | vk::Format::D24_UNORM_S8_UINT
            | vk::Format::D32_SFLOAT_S8_UINT
    )
}

#[inline]
pub fn has_stencil_component(format: vk::Format) -> bool {
    matches!(
        format,
        vk::Format::S8_UINT
            | vk::Format::D16_UNORM_S8_UINT
            | vk::Format::D24_UNORM_S8_UINT
            | vk::Format::D32_SFLOAT_S8_UINT
    )
}

/// Aspect used by views and barriers of an image created with `format`.
pub fn infer_aspect(format: vk::Format) -> vk::ImageAspectFlags {
    match format {
        vk::Format::D16_UNORM | vk::Format::D32_SFLOAT | vk::Format::X8_D24_UNORM_PACK32 => {
            vk::ImageAspectFlags::DEPTH
        }
        vk::Format::S8_UINT => vk::ImageAspectFlags::STENCIL,
        vk::Format::D16_UNORM_S8_UINT | vk::Format::D24_UNORM_S8_UINT | vk::Format::D32_SFLOAT_S8_UINT => {
            vk::ImageAspectFlags::DEPTH | vk::ImageAspectFlags::STENCIL
        }
        _ => vk::ImageAspectFlags::COLOR,
    }
}

/// Bytes per texel for the uncompressed formats the engine uploads.
///
/// Block-compressed formats return `None`; their size depends on the block layout.
pub fn texel_size(format: vk::Format) -> Option<u32> {
    let size = match format {
        vk::Format::R8_UNORM | vk::Format::S8_UINT => 1,
        vk::Format::R8G8_UNORM | vk::Format::R16_UNORM | vk::Format::R16_SFLOAT | vk::Format::D16_UNORM => 2,
        vk::Format::R8G8B8_UNORM | vk::Format::R8G8B8_SRGB => 3,
        vk::Format::R8G8B8A8_UNORM
        | vk::Format::R8G8B8A8_SRGB
        | vk::Format::B8G8R8A8_UNORM
        | vk::Format::B8G8R8A8_SRGB
        | vk::Format::R32_SFLOAT
        | vk::Format::R32_UINT
        | vk::Format::D32_SFLOAT
        | vk::Format::D24_UNORM_S8_UINT
        | vk::Format::X8_D24_UNORM_PACK32
        | vk::Format::A2B10G10R10_UNORM_PACK32
        | vk::Format::B10G11R11_UFLOAT_PACK32 => 4,
        vk::Format::R16G16B16A16_SFLOAT | vk::Format::R32G32_SFLOAT | vk::Format::D32_SFLOAT_S8_UINT => 8,
        vk::Format::R32G32B32A32_SFLOAT => 16,
        _ => return None,
    };
    Some(size)
}

/// Size in bytes of one mip level of a `width` x `height` image.
///
/// BC5/BC7 use 16-byte 4x4 blocks, i.e. one byte per texel.
pub fn image_byte_size(width: u32, height: u32, format: vk::Format) -> Option<vk::DeviceSize> {
    let texels = width as vk::DeviceSize * height as vk::DeviceSize;
    match format {
        vk::Format::BC7_UNORM_BLOCK | vk::Format::BC7_SRGB_BLOCK | vk::Format::BC5_UNORM_BLOCK => {
            let blocks_x = width.div_ceil(4) as vk::DeviceSize;
            let blocks_y = height.div_ceil(4) as vk::DeviceSize;
            Some(blocks_x * blocks_y * 16)
        }
        _ => texel_size(format).map(|size| texels * size as vk::DeviceSize),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_depth_aspect() {
        assert_eq!(infer_aspect(vk::Format::D32_SFLOAT), vk::ImageAspectFlags::DEPTH);
        assert_eq!(
            infer_aspect(vk::Format::D24_UNORM_S8_UINT),
            vk::ImageAspectFlags::DEPTH | vk::ImageAspectFlags::STENCIL
        );
        assert_eq!(infer_aspect(vk::Format::R16G16B16A16_SFLOAT), vk::ImageAspectFlags::COLOR);
        assert!(has_stencil_component(vk::Format::D32_SFLOAT_S8_UINT));
        assert!(!has_stencil_component(vk::Format::D32_SFLOAT));
    }

    #[test]
    fn test_image_byte_size() {
        assert_eq!(image_byte_size(400, 400, vk::Format::R8G8B8A8_UNORM), Some(640_000));
        assert_eq!(image_byte_size(4, 4, vk::Format::R16G16B16A16_SFLOAT), Some(128));
        // 5x5 texels need 2x2 blocks
        assert_eq!(image_byte_size(5, 5, vk::Format::BC7_UNORM_BLOCK), Some(64));
        assert_eq!(image_byte_size(4, 4, vk::Format::ASTC_4X4_UNORM_BLOCK), None);
    }
}
