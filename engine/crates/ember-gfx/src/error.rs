use ash::vk;
use thiserror::Error;

pub type GfxResult<T> = Result<T, GfxError>;

/// Errors reported by a [`crate::device::GfxDevice`] backend.
///
/// All of them are fatal for the resource or submission that triggered them.
#[derive(Debug, Error)]
pub enum GfxError {
    #[error("vulkan call failed: {0}")]
    Vk(#[from] vk::Result),

    #[error("allocation of `{name}` failed: {reason}")]
    Allocation { name: String, reason: String },

    #[error("buffer `{name}` is not host visible")]
    NotHostVisible { name: String },

    #[error("write of {size} bytes at offset {offset} overflows buffer `{name}` ({capacity} bytes)")]
    BufferOverflow {
        name: String,
        offset: vk::DeviceSize,
        size: usize,
        capacity: vk::DeviceSize,
    },

    #[error("submission of one-time command `{name}` failed: {reason}")]
    Submission { name: String, reason: String },
}
