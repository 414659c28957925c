//! Ember GFX layer
//!
//! The frame graph never talks to Vulkan directly. Everything it needs from the
//! device (allocation, one-shot submission, barriers, copies, capability queries)
//! goes through [`device::GfxDevice`]. Two backends implement it:
//!
//! - [`backend::vulkan::VulkanDevice`]: ash + vk-mem on top of an externally created device
//! - [`backend::headless::HeadlessDevice`]: records every call, no GPU required
//!
//! Device, queue and swapchain creation are owned by the application.

pub mod backend;
pub mod commands;
pub mod device;
pub mod error;
pub mod format;
pub mod profiling;
pub mod resources;

pub use ash::vk;
