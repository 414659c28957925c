//! Passes of the deferred frame, in registration order.

pub mod cull_pass;
pub mod deferred_lighting_pass;
pub mod geometry_pass;
pub mod present_pass;

use ember_frame_graph::RgExecutionContext;

/// Logical resource names shared between passes.
pub mod names {
    pub const RENDERABLE_BUFFER: &str = "RenderableBuffer";
    pub const INDIRECT_DRAW_ARGS: &str = "IndirectDrawArgs";
    pub const GEOMETRY: [&str; 3] = ["Geometry0", "Geometry1", "Geometry2"];
    pub const DEPTH: &str = "Depth";
    pub const BRDF_LUT: &str = "BrdfLut";
    pub const FINAL_IMAGE: &str = "FinalImage";
    pub const SWAPCHAIN: &str = "SwapchainImage";

    pub fn point_shadow_map(index: u32) -> String {
        format!("PointShadowMap{}", index)
    }
}

/// Binds the pass pipeline, when one was created for it.
fn bind_pipeline(ctx: &RgExecutionContext<'_>) {
    if let Some(pipeline) = ctx.pipeline() {
        ctx.cmd().cmd_bind_pipeline(pipeline.bind_point, pipeline.pipeline);
    }
}

/// Work groups covering `extent` with square groups of `group_size`.
fn dispatch_size(extent: ash::vk::Extent2D, group_size: u32) -> glam::UVec3 {
    glam::UVec3::new(extent.width.div_ceil(group_size), extent.height.div_ceil(group_size), 1)
}
