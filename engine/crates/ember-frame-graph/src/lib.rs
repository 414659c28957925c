//! Ember frame graph
//!
//! Passes declare, by name, which images and buffers they read or write and in
//! which stage. The graph then
//!
//! - creates those resources on first declaration ([`vault::ResourceVault`]),
//! - derives the barriers between producers and consumers ([`transition::RgTransitionTable`]),
//! - keeps one instance per frame in flight for multi-buffered resources,
//! - runs the passes in registration order every frame ([`executor::FrameGraph`]).
//!
//! # Usage
//!
//! ```ignore
//! let mut vault = ResourceVault::new(settings.fif_count);
//! let mut builder = FrameGraphBuilder::new(&device, &mut vault);
//! builder.register_render_pass(
//!     RgPassRegistration::compute("Lighting", RgComputePassDesc::new("lighting.comp.spv"))
//!         .usage(RgResourceUsage::write("FinalImage", RgUsageType::ImageStorage, RgStage::COMPUTE).create(spec))
//!         .execute(|ctx| {
//!             ctx.cmd().cmd_dispatch(glam::UVec3::new(80, 45, 1));
//!             Ok(())
//!         }),
//! )?;
//! let mut graph = builder.build(None)?;
//!
//! one_time_exec(&device, "frame", |cmd| graph.execute(&mut vault, cmd, &frame))??;
//! ```

pub mod builder;
pub mod error;
pub mod executor;
pub mod frame_counter;
pub mod initial_data;
pub mod pass;
pub mod settings;
pub mod state;
pub mod transition;
pub mod usage;
pub mod vault;

pub use builder::FrameGraphBuilder;
pub use error::{FrameGraphError, RgResult};
pub use executor::FrameGraph;
pub use frame_counter::FrameCounter;
pub use initial_data::{RgImageChannels, RgInitialData, RgInitialDataRequest, image_file_initial_data, load_image_file};
pub use pass::{
    RgComputePassDesc, RgExecutionContext, RgFrameData, RgGraphicsPassDesc, RgPass, RgPassKind, RgPassRegistration,
    RgPipeline, RgPipelineFactory, RgVertexLayout,
};
pub use settings::FrameSettings;
pub use state::{RgAccess, RgResourceState, RgStage, RgUsageType};
pub use transition::{RgBarrierParams, RgTransitionTable};
pub use usage::{
    RgArraySlot, RgBufferSpec, RgCreationSpec, RgExtent, RgImageSpec, RgResourceDesc, RgResourceUsage,
    RgSamplerPolicy,
};
pub use vault::{ResourceId, ResourceVault, RgOrigin, RgPhysical, RgResourceSpec};
