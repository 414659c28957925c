use anyhow::ensure;
use ember_frame_graph::{
    FrameGraphBuilder, FrameSettings, RgAccess, RgCreationSpec, RgGraphicsPassDesc, RgImageSpec, RgPass,
    RgPassRegistration, RgResourceUsage, RgResult, RgStage, RgUsageType, RgVertexLayout,
};
use itertools::Itertools;

use super::names;

/// Rasterizes the culled renderables into the GBuffer.
///
/// Geometry0 holds HDR albedo, Geometry1 normals, Geometry2 roughness and metalness.
pub struct GeometryPass {
    renderable_count: u32,
}

impl GeometryPass {
    pub fn new(renderable_count: u32) -> Self {
        Self { renderable_count }
    }

    fn gbuffer_formats(settings: &FrameSettings) -> [ash::vk::Format; 3] {
        [settings.hdr_format, settings.color_format, settings.color_format]
    }
}

impl RgPass for GeometryPass {
    fn register_to_graph(&mut self, builder: &mut FrameGraphBuilder<'_>, settings: &FrameSettings) -> RgResult<()> {
        let formats = Self::gbuffer_formats(settings);
        let desc = RgGraphicsPassDesc::new("gbuffer/gbuffer.vert.spv", "gbuffer/gbuffer.frag.spv")
            .color_formats(formats)
            .depth_format(settings.depth_format)
            .vertex_layout(RgVertexLayout {
                uv_location: Some(1),
                tangent_location: Some(2),
                ..Default::default()
            });

        let gbuffer = names::GEOMETRY.iter().zip(formats).map(|(&name, format)| {
            RgResourceUsage::write(name, RgUsageType::ColorAttachment, RgStage::FRAGMENT)
                .create(RgCreationSpec::image(RgImageSpec::swapchain_sized(format)))
        });

        let draw_count = self.renderable_count;
        builder.register_render_pass(
            RgPassRegistration::graphics("GBuffer", desc)
                .group("Scene")
                .usages(gbuffer)
                .usage(
                    RgResourceUsage::new(
                        names::DEPTH,
                        RgUsageType::DepthAttachment,
                        RgAccess::READ_WRITE,
                        RgStage::FRAGMENT,
                    )
                    .create(RgCreationSpec::image(RgImageSpec::swapchain_sized(settings.depth_format))),
                )
                .usage(RgResourceUsage::read(names::RENDERABLE_BUFFER, RgUsageType::StructuredBuffer, RgStage::VERTEX))
                .usage(RgResourceUsage::read(
                    names::INDIRECT_DRAW_ARGS,
                    RgUsageType::StructuredBuffer,
                    RgStage::INDIRECT_DRAW,
                ))
                .execute(move |ctx| {
                    let color = ctx.color_attachment_views();
                    ensure!(color.len() == names::GEOMETRY.len(), "GBuffer bound {} color attachments", color.len());
                    ensure!(ctx.depth_attachment_view().is_some(), "GBuffer has no depth attachment");
                    log::trace!("GBuffer targets: {}", color.iter().map(|v| format!("{:?}", v)).join(", "));

                    super::bind_pipeline(ctx);
                    ctx.cmd().cmd_draw(3, draw_count, 0, 0);
                    Ok(())
                }),
        )
    }
}
