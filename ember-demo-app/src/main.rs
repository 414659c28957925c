mod config;
mod passes;

use std::io::Write;
use std::path::PathBuf;

use anyhow::Context;
use ash::vk;
use ember_frame_graph::{
    FrameCounter, FrameGraph, FrameGraphBuilder, FrameSettings, ResourceVault, RgComputePassDesc, RgFrameData,
    RgGraphicsPassDesc, RgPass, RgPipeline, RgPipelineFactory, RgResourceState,
};
use ember_gfx::{
    backend::headless::HeadlessDevice,
    commands::one_time::one_time_exec,
    device::GfxDevice,
    resources::image::{GfxImage, GfxImageCreateInfo},
};

use config::DemoConfig;
use passes::{
    cull_pass::CullPass, deferred_lighting_pass::DeferredLightingPass, geometry_pass::GeometryPass,
    present_pass::PresentPass,
};

fn init_log() {
    env_logger::Builder::new()
        .format(|buf, record| {
            let level_style = buf.default_level_style(record.level());
            let time = buf.timestamp_seconds();
            let file = record.file().unwrap_or("").rsplit(['/', '\\']).next().unwrap_or("");
            let line = record.line().unwrap_or(!0);

            writeln!(
                buf,
                "{level_style}[{time}] {}{level_style:#} [{file}:{line}] {}",
                record.level(),
                record.args()
            )
        })
        .filter(None, log::LevelFilter::Info)
        .parse_default_env()
        .init();
}

/// Hands out handle-less pipelines; the headless device never executes them.
#[derive(Default)]
struct DemoPipelines {
    created: usize,
}

impl RgPipelineFactory for DemoPipelines {
    fn create_graphics_pipeline(&mut self, pass: &str, desc: &RgGraphicsPassDesc) -> anyhow::Result<RgPipeline> {
        self.created += 1;
        log::info!("pipeline <{}>: {} + {}", pass, desc.vertex_shader, desc.fragment_shader);
        Ok(RgPipeline {
            bind_point: vk::PipelineBindPoint::GRAPHICS,
            ..Default::default()
        })
    }

    fn create_compute_pipeline(&mut self, pass: &str, desc: &RgComputePassDesc) -> anyhow::Result<RgPipeline> {
        self.created += 1;
        log::info!("pipeline <{}>: {}", pass, desc.shader);
        Ok(RgPipeline {
            bind_point: vk::PipelineBindPoint::COMPUTE,
            ..Default::default()
        })
    }
}

/// Stand-in for the window swapchain: one image per frame in flight.
struct DemoSwapchain {
    images: Vec<GfxImage>,
}

impl DemoSwapchain {
    fn new(device: &dyn GfxDevice, extent: vk::Extent2D, settings: &FrameSettings) -> anyhow::Result<Self> {
        let images = (0..settings.fif_count)
            .map(|i| {
                device.create_image(&GfxImageCreateInfo::new_2d(
                    format!("swapchain-{}", i),
                    extent,
                    settings.color_format,
                    vk::ImageUsageFlags::COLOR_ATTACHMENT | vk::ImageUsageFlags::TRANSFER_DST,
                ))
            })
            .collect::<Result<Vec<_>, _>>()
            .context("failed to create swapchain images")?;
        Ok(Self { images })
    }

    /// Gives the images to the vault as they come back from presentation.
    fn import(&self, vault: &mut ResourceVault) -> anyhow::Result<()> {
        vault.import_image(passes::names::SWAPCHAIN, self.images.clone(), RgResourceState::Present)?;
        Ok(())
    }

    fn destroy(self, device: &dyn GfxDevice) {
        for image in self.images {
            device.destroy_image(image);
        }
    }
}

struct DemoApp {
    config: DemoConfig,
    device: HeadlessDevice,
    settings: FrameSettings,
    vault: ResourceVault,
    frame_counter: FrameCounter,
    swapchain: DemoSwapchain,
}

impl DemoApp {
    fn new(config: DemoConfig) -> anyhow::Result<Self> {
        let device = HeadlessDevice::new(config.extent());
        let depth_format = FrameSettings::pick_depth_format(&device).context("no usable depth format")?;
        let settings = FrameSettings {
            depth_format,
            frame_extent: config.extent(),
            fif_count: config.fif_count,
            ..Default::default()
        };
        log::info!("frame settings: {:?}", settings);

        let vault = ResourceVault::new(settings.fif_count);
        let swapchain = DemoSwapchain::new(&device, settings.frame_extent, &settings)?;
        Ok(Self {
            frame_counter: FrameCounter::new(0, settings.fif_count),
            config,
            device,
            settings,
            vault,
            swapchain,
        })
    }

    fn build_graph(&mut self) -> anyhow::Result<FrameGraph> {
        self.swapchain.import(&mut self.vault)?;

        let mut passes: Vec<Box<dyn RgPass>> = vec![
            Box::new(CullPass::new(self.config.renderable_count)),
            Box::new(GeometryPass::new(self.config.renderable_count)),
            Box::new(DeferredLightingPass::new(self.config.brdf_lut.clone())),
            Box::new(PresentPass),
        ];

        let mut builder = FrameGraphBuilder::new(&self.device, &mut self.vault);
        for pass in &mut passes {
            builder.add_pass(pass.as_mut(), &self.settings)?;
        }

        let mut pipelines = DemoPipelines::default();
        let graph = builder.build(Some(&mut pipelines))?;
        log::info!("{} pipelines created", pipelines.created);
        graph.print_execution_plan();
        Ok(graph)
    }

    fn frame_data(&self) -> RgFrameData {
        let frame_id = self.frame_counter.frame_id();
        RgFrameData {
            frame_id,
            fif_index: self.frame_counter.fif_index(),
            extent: self.settings.frame_extent,
            delta_time: 1.0 / 60.0,
            total_time: frame_id as f32 / 60.0,
            shadow_caster_lights: self.config.shadow_caster_lights.clone(),
        }
    }

    fn render_frame(&mut self, graph: &mut FrameGraph) -> anyhow::Result<()> {
        let frame = self.frame_data();
        let name = self.frame_counter.frame_name();
        let vault = &mut self.vault;
        one_time_exec(&self.device, &name, |cmd| graph.execute(vault, cmd, &frame))?
            .with_context(|| format!("frame {} failed", name))?;

        // presentation hands the images back in the present layout
        self.swapchain.import(&mut self.vault)?;
        log::info!("{} recorded", name);
        Ok(())
    }

    fn resize(&mut self, extent: vk::Extent2D) -> anyhow::Result<()> {
        log::info!("resize to {}x{}", extent.width, extent.height);
        self.device.set_swapchain_extent(extent);
        self.settings.frame_extent = extent;

        let swapchain = DemoSwapchain::new(&self.device, extent, &self.settings)?;
        std::mem::replace(&mut self.swapchain, swapchain).destroy(&self.device);
        self.swapchain.import(&mut self.vault)?;

        self.vault.resize(&self.device, extent)?;
        Ok(())
    }

    fn run(&mut self) -> anyhow::Result<()> {
        let mut graph = self.build_graph()?;

        for _ in 0..self.config.frame_count {
            self.render_frame(&mut graph)?;

            let finished = self.frame_counter.frame_id();
            if let Some(resize) = self.config.resize.filter(|r| r.after_frame == finished) {
                self.resize(resize.extent())?;
            }
            self.frame_counter.next_frame();
        }

        log::info!(
            "{} frames done: {} images, {} buffers alive",
            self.config.frame_count,
            self.device.live_image_count(),
            self.device.live_buffer_count()
        );
        Ok(())
    }

    fn destroy(self) {
        let Self {
            device,
            mut vault,
            swapchain,
            ..
        } = self;
        vault.destroy(&device);
        swapchain.destroy(&device);
    }
}

fn main() -> anyhow::Result<()> {
    init_log();

    let config = match std::env::args().nth(1).map(PathBuf::from) {
        Some(path) => DemoConfig::from_file(path)?,
        None => DemoConfig::default(),
    };
    log::info!("demo config: {:?}", config);

    let mut app = DemoApp::new(config)?;
    let result = app.run();
    app.destroy();
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use config::ResizeEvent;
    use ember_gfx::backend::headless::HeadlessCommand;

    fn config() -> DemoConfig {
        DemoConfig {
            frame_count: 4,
            width: 64,
            height: 32,
            renderable_count: 8,
            shadow_caster_lights: vec![0, 1],
            ..Default::default()
        }
    }

    #[test]
    fn test_demo_frames_record_every_pass() {
        let _ = env_logger::builder().is_test(true).try_init();
        let mut app = DemoApp::new(config()).unwrap();
        let mut graph = app.build_graph().unwrap();
        assert_eq!(graph.pass_names().collect::<Vec<_>>(), vec!["Cull", "GBuffer", "DeferredPbrLight", "Tonemap"]);
        assert!(graph.pass_names().all(|name| graph.is_pass_enabled(name) == Some(true)));

        app.device.take_commands();
        app.render_frame(&mut graph).unwrap();

        let commands = app.device.take_commands();
        let dispatches = commands.iter().filter(|c| matches!(c, HeadlessCommand::Dispatch { .. })).count();
        let draws = commands.iter().filter(|c| matches!(c, HeadlessCommand::Draw { .. })).count();
        assert_eq!(dispatches, 2);
        assert_eq!(draws, 2);

        app.destroy();
    }

    #[test]
    fn test_demo_survives_resize() {
        let _ = env_logger::builder().is_test(true).try_init();
        let mut app = DemoApp::new(DemoConfig {
            resize: Some(ResizeEvent {
                after_frame: 1,
                width: 96,
                height: 48,
            }),
            ..config()
        })
        .unwrap();
        app.run().unwrap();

        let final_image = app.vault.get(passes::names::FINAL_IMAGE, 0).and_then(|p| p.image()).unwrap();
        assert_eq!(final_image.extent(), vk::Extent2D { width: 96, height: 48 });
        app.destroy();
    }
}
