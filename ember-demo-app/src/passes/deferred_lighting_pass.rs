use std::path::PathBuf;

use ash::vk;
use ember_frame_graph::{
    FrameGraphBuilder, FrameSettings, RgComputePassDesc, RgCreationSpec, RgImageChannels, RgImageSpec,
    RgInitialData, RgInitialDataRequest, RgPass, RgPassRegistration, RgResourceUsage, RgResult, RgSamplerPolicy,
    RgStage, RgUsageType, image_file_initial_data,
};

use super::names;

pub const BRDF_LUT_SIZE: u32 = 64;
pub const SHADOW_MAP_SIZE: u32 = 256;
pub const SHADOW_MAP_FORMAT: vk::Format = vk::Format::D32_SFLOAT;
/// Bindless array the point shadow maps are written into.
pub const SHADOW_MAP_ARRAY: u32 = 0;

/// Full-screen PBR lighting from the GBuffer into `FinalImage`.
pub struct DeferredLightingPass {
    brdf_lut: Option<PathBuf>,
}

impl DeferredLightingPass {
    pub fn new(brdf_lut: Option<PathBuf>) -> Self {
        Self { brdf_lut }
    }

    /// Split-sum approximation stand-in: red ramps with NdotV, green with roughness.
    fn generated_brdf_lut(request: &RgInitialDataRequest) -> anyhow::Result<RgInitialData> {
        let Some(extent) = request.extent else {
            anyhow::bail!("`{}` is not an image", request.name);
        };
        let ramp = |i: u32, n: u32| (i * 255 / n.saturating_sub(1).max(1)) as u8;
        let texels = (0..extent.height)
            .flat_map(|y| (0..extent.width).map(move |x| [ramp(x, extent.width), ramp(y, extent.height), 0, 255]))
            .flatten()
            .collect();
        Ok(RgInitialData::Bytes(texels))
    }

    fn brdf_lut_spec(&self) -> RgCreationSpec {
        let spec =
            RgCreationSpec::image(RgImageSpec::fixed(BRDF_LUT_SIZE, BRDF_LUT_SIZE, vk::Format::R8G8B8A8_UNORM));
        match &self.brdf_lut {
            Some(path) => RgCreationSpec {
                initial_data: Some(image_file_initial_data(path.clone(), RgImageChannels::Rgba)),
                ..spec
            },
            None => spec.with_initial_data(Self::generated_brdf_lut),
        }
    }
}

impl RgPass for DeferredLightingPass {
    fn register_to_graph(&mut self, builder: &mut FrameGraphBuilder<'_>, settings: &FrameSettings) -> RgResult<()> {
        let gbuffer = names::GEOMETRY.iter().map(|&name| {
            RgResourceUsage::read(name, RgUsageType::SampledTexture, RgStage::COMPUTE)
                .sampler(RgSamplerPolicy::ClampToEdge)
        });

        let shadow_maps = (0..settings.max_point_light_shadows).map(|light| {
            let cleared = RgCreationSpec::image(RgImageSpec::fixed(SHADOW_MAP_SIZE, SHADOW_MAP_SIZE, SHADOW_MAP_FORMAT))
                .with_initial_data(|_| Ok(RgInitialData::Fill(1.0f32.to_bits())));
            RgResourceUsage::read(names::point_shadow_map(light), RgUsageType::SampledDepthTexture, RgStage::COMPUTE)
                .create(cleared)
                .sampler(RgSamplerPolicy::ClampToBorder)
                .array_slot(SHADOW_MAP_ARRAY, light)
                .owned_by_engine()
        });

        let shadow_slots = settings.max_point_light_shadows;
        builder.register_render_pass(
            RgPassRegistration::compute("DeferredPbrLight", RgComputePassDesc::new("lighting/deferred_pbr.comp.spv"))
                .group("Lighting")
                .usages(gbuffer)
                .usage(
                    RgResourceUsage::read(names::DEPTH, RgUsageType::SampledDepthTexture, RgStage::COMPUTE)
                        .sampler(RgSamplerPolicy::NoFiltering),
                )
                .usage(
                    RgResourceUsage::read(names::BRDF_LUT, RgUsageType::SampledTexture, RgStage::COMPUTE)
                        .create(self.brdf_lut_spec())
                        .sampler(RgSamplerPolicy::ClampToEdge),
                )
                .usages(shadow_maps)
                .usage(
                    RgResourceUsage::write(names::FINAL_IMAGE, RgUsageType::ImageStorage, RgStage::COMPUTE)
                        .create(RgCreationSpec::image(RgImageSpec::swapchain_sized(settings.hdr_format))),
                )
                .execute(move |ctx| {
                    let casters = &ctx.frame().shadow_caster_lights;
                    for &light in casters.iter().filter(|&&light| light < shadow_slots) {
                        let name = names::point_shadow_map(light);
                        let slot = ctx.array_slot(&name)?;
                        log::trace!("light {} shadows from {:?}", light, slot);
                    }
                    if casters.iter().any(|&light| light >= shadow_slots) {
                        log::warn!("only {} point lights can cast shadows, got {:?}", shadow_slots, casters);
                    }

                    let extent = ctx.image(names::FINAL_IMAGE)?.extent();
                    super::bind_pipeline(ctx);
                    ctx.cmd().cmd_dispatch(super::dispatch_size(extent, 8));
                    Ok(())
                }),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generated_brdf_lut() {
        let request = RgInitialDataRequest {
            name: names::BRDF_LUT.to_string(),
            extent: Some(vk::Extent2D { width: 4, height: 2 }),
            format: Some(vk::Format::R8G8B8A8_UNORM),
            byte_size: Some(32),
        };
        let RgInitialData::Bytes(texels) = DeferredLightingPass::generated_brdf_lut(&request).unwrap() else {
            panic!("expected texels");
        };
        assert_eq!(texels.len(), 32);
        assert_eq!(&texels[..4], &[0, 0, 0, 255]);
        assert_eq!(&texels[12..16], &[255, 0, 0, 255]);
        assert_eq!(&texels[28..32], &[255, 255, 0, 255]);
    }
}
