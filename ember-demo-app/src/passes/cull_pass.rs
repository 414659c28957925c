use ash::vk;
use ember_frame_graph::{
    FrameGraphBuilder, FrameSettings, RgBufferSpec, RgComputePassDesc, RgCreationSpec, RgInitialData, RgPass,
    RgPassRegistration, RgResourceUsage, RgResult, RgStage, RgUsageType,
};

use super::names;

/// `VkDrawIndirectCommand`: vertex_count, instance_count, first_vertex, first_instance.
pub const DRAW_ARGS_STRIDE: vk::DeviceSize = 16;
/// Bytes per renderable: transform index, mesh index, material index, flags.
pub const RENDERABLE_STRIDE: vk::DeviceSize = 16;

/// GPU culling: walks the renderables and writes this frame's indirect draws.
pub struct CullPass {
    renderable_count: u32,
}

impl CullPass {
    pub fn new(renderable_count: u32) -> Self {
        Self { renderable_count }
    }

    fn renderables(count: u32) -> Vec<u8> {
        (0..count).flat_map(|i| [i, i % 4, i % 8, 1]).flat_map(u32::to_le_bytes).collect()
    }
}

impl RgPass for CullPass {
    fn register_to_graph(&mut self, builder: &mut FrameGraphBuilder<'_>, _settings: &FrameSettings) -> RgResult<()> {
        let count = self.renderable_count;
        let renderables = RgCreationSpec::buffer(RgBufferSpec::new(count as vk::DeviceSize * RENDERABLE_STRIDE))
            .with_initial_data(move |_| Ok(RgInitialData::Bytes(Self::renderables(count))));
        let draw_args = RgCreationSpec::buffer(RgBufferSpec::new(count as vk::DeviceSize * DRAW_ARGS_STRIDE))
            .with_initial_data(|_| Ok(RgInitialData::Fill(0)));

        builder.register_render_pass(
            RgPassRegistration::compute("Cull", RgComputePassDesc::new("cull/cull.comp.spv"))
                .group("Scene")
                .usage(
                    RgResourceUsage::read(names::RENDERABLE_BUFFER, RgUsageType::StructuredBuffer, RgStage::COMPUTE)
                        .create(renderables)
                        .owned_by_engine(),
                )
                .usage(
                    RgResourceUsage::write(names::INDIRECT_DRAW_ARGS, RgUsageType::StructuredBuffer, RgStage::COMPUTE)
                        .create(draw_args)
                        .multi_buffered(),
                )
                .execute(move |ctx| {
                    let args = ctx.buffer(names::INDIRECT_DRAW_ARGS)?;
                    log::trace!("{} culling {} renderables into {:?}", ctx.frame_id(), count, args.handle());
                    super::bind_pipeline(ctx);
                    ctx.cmd().cmd_dispatch(glam::UVec3::new(count.div_ceil(64), 1, 1));
                    Ok(())
                }),
        )
    }
}
