use ember_frame_graph::{
    FrameGraphBuilder, FrameSettings, RgGraphicsPassDesc, RgPass, RgPassRegistration, RgResourceUsage, RgResult,
    RgSamplerPolicy, RgStage, RgUsageType,
};

use super::names;

/// Tonemaps `FinalImage` onto the imported swapchain image.
pub struct PresentPass;

impl RgPass for PresentPass {
    fn register_to_graph(&mut self, builder: &mut FrameGraphBuilder<'_>, settings: &FrameSettings) -> RgResult<()> {
        let desc = RgGraphicsPassDesc::new("post/fullscreen.vert.spv", "post/tonemap.frag.spv")
            .color_formats([settings.color_format]);

        builder.register_render_pass(
            RgPassRegistration::graphics("Tonemap", desc)
                .group("Post")
                .usage(
                    RgResourceUsage::read(names::FINAL_IMAGE, RgUsageType::SampledTexture, RgStage::FRAGMENT)
                        .sampler(RgSamplerPolicy::NoFiltering),
                )
                .usage(RgResourceUsage::write(names::SWAPCHAIN, RgUsageType::ColorAttachment, RgStage::FRAGMENT))
                .execute(|ctx| {
                    super::bind_pipeline(ctx);
                    // full-screen triangle
                    ctx.cmd().cmd_draw(3, 1, 0, 0);
                    Ok(())
                }),
        )
    }
}
