#![allow(dead_code)]

use ember_frame_graph::{
    FrameGraph, ResourceVault, RgAccess, RgCreationSpec, RgFrameData, RgImageSpec, RgResult,
};
use ember_gfx::{
    backend::headless::{HeadlessDevice, HeadlessImageBarrier},
    commands::one_time::one_time_exec,
    vk,
};

pub const FIF_COUNT: usize = 3;

pub fn extent() -> vk::Extent2D {
    vk::Extent2D {
        width: 320,
        height: 180,
    }
}

pub fn init_logger() {
    let _ = env_logger::builder().is_test(true).try_init();
}

pub fn setup() -> (HeadlessDevice, ResourceVault) {
    init_logger();
    (HeadlessDevice::new(extent()), ResourceVault::new(FIF_COUNT))
}

pub fn frame(frame_id: u64) -> RgFrameData {
    RgFrameData {
        frame_id,
        fif_index: (frame_id % FIF_COUNT as u64) as usize,
        extent: extent(),
        delta_time: 1.0 / 60.0,
        total_time: frame_id as f32 / 60.0,
        shadow_caster_lights: Vec::new(),
    }
}

/// Records one frame on its own command buffer.
pub fn run_frame(
    device: &HeadlessDevice,
    graph: &mut FrameGraph,
    vault: &mut ResourceVault,
    frame_id: u64,
) -> RgResult<()> {
    let data = frame(frame_id);
    one_time_exec(device, "frame", |cmd| graph.execute(vault, cmd, &data))?
}

pub fn storage_image(width: u32, height: u32) -> RgCreationSpec {
    RgCreationSpec::image(RgImageSpec::fixed(width, height, vk::Format::R8G8B8A8_UNORM))
}

pub fn barriers_for(device: &HeadlessDevice, image: vk::Image) -> Vec<HeadlessImageBarrier> {
    device.image_barriers().into_iter().filter(|b| b.image == image).collect()
}

pub fn labels(device: &HeadlessDevice) -> Vec<String> {
    device
        .commands()
        .into_iter()
        .filter_map(|c| match c {
            ember_gfx::backend::headless::HeadlessCommand::BeginLabel { label, .. } => Some(label),
            _ => None,
        })
        .collect()
}

pub const RW: RgAccess = RgAccess::READ_WRITE;
