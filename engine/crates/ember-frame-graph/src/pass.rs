//! Pass contract: what a pass hands the builder, and what it gets back when it runs.

use ash::vk;
use ember_gfx::{
    commands::command_buffer::GfxCommandBuffer,
    resources::{buffer::GfxBuffer, image::GfxImage},
};

use crate::{
    builder::FrameGraphBuilder,
    error::{FrameGraphError, RgResult},
    settings::FrameSettings,
    state::{RgResourceState, RgUsageType},
    usage::{RgArraySlot, RgResourceUsage, RgSamplerPolicy},
    vault::RgPhysical,
};

/// Vertex attribute locations of the engine's vertex layout a graphics pass consumes.
///
/// `None` means the shader does not read that attribute.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct RgVertexLayout {
    pub uv_location: Option<u32>,
    pub tangent_location: Option<u32>,
    pub joint_location: Option<u32>,
    pub joint_weight_location: Option<u32>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RgGraphicsPassDesc {
    pub vertex_shader: String,
    pub fragment_shader: String,
    /// One entry per color attachment usage, in declaration order.
    pub color_formats: Vec<vk::Format>,
    pub depth_format: Option<vk::Format>,
    pub vertex_layout: RgVertexLayout,
}

impl RgGraphicsPassDesc {
    pub fn new(vertex_shader: impl Into<String>, fragment_shader: impl Into<String>) -> Self {
        Self {
            vertex_shader: vertex_shader.into(),
            fragment_shader: fragment_shader.into(),
            color_formats: Vec::new(),
            depth_format: None,
            vertex_layout: RgVertexLayout::default(),
        }
    }

    #[inline]
    pub fn color_formats(mut self, formats: impl IntoIterator<Item = vk::Format>) -> Self {
        self.color_formats = formats.into_iter().collect();
        self
    }

    #[inline]
    pub fn depth_format(mut self, format: vk::Format) -> Self {
        self.depth_format = Some(format);
        self
    }

    #[inline]
    pub fn vertex_layout(mut self, layout: RgVertexLayout) -> Self {
        self.vertex_layout = layout;
        self
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RgComputePassDesc {
    pub shader: String,
}

impl RgComputePassDesc {
    pub fn new(shader: impl Into<String>) -> Self {
        Self { shader: shader.into() }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum RgPassKind {
    Graphics(RgGraphicsPassDesc),
    Compute(RgComputePassDesc),
}

impl RgPassKind {
    #[inline]
    pub fn bind_point(&self) -> vk::PipelineBindPoint {
        match self {
            Self::Graphics(_) => vk::PipelineBindPoint::GRAPHICS,
            Self::Compute(_) => vk::PipelineBindPoint::COMPUTE,
        }
    }
}

/// Per-pass work recorded every frame.
pub type RgPassCallback = Box<dyn FnMut(&RgExecutionContext<'_>) -> anyhow::Result<()>>;

/// Everything the builder needs to know about one pass.
pub struct RgPassRegistration {
    pub name: String,
    /// Label shared by related passes; only used for diagnostics.
    pub group: Option<String>,
    pub usages: Vec<RgResourceUsage>,
    pub kind: RgPassKind,
    pub execute: Option<RgPassCallback>,
}

impl RgPassRegistration {
    pub fn new(name: impl Into<String>, kind: RgPassKind) -> Self {
        Self {
            name: name.into(),
            group: None,
            usages: Vec::new(),
            kind,
            execute: None,
        }
    }

    pub fn graphics(name: impl Into<String>, desc: RgGraphicsPassDesc) -> Self {
        Self::new(name, RgPassKind::Graphics(desc))
    }

    pub fn compute(name: impl Into<String>, desc: RgComputePassDesc) -> Self {
        Self::new(name, RgPassKind::Compute(desc))
    }

    #[inline]
    pub fn group(mut self, group: impl Into<String>) -> Self {
        self.group = Some(group.into());
        self
    }

    #[inline]
    pub fn usage(mut self, usage: RgResourceUsage) -> Self {
        self.usages.push(usage);
        self
    }

    #[inline]
    pub fn usages(mut self, usages: impl IntoIterator<Item = RgResourceUsage>) -> Self {
        self.usages.extend(usages);
        self
    }

    pub fn execute(mut self, callback: impl FnMut(&RgExecutionContext<'_>) -> anyhow::Result<()> + 'static) -> Self {
        self.execute = Some(Box::new(callback));
        self
    }
}

impl std::fmt::Debug for RgPassRegistration {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RgPassRegistration")
            .field("name", &self.name)
            .field("group", &self.group)
            .field("usages", &self.usages)
            .field("kind", &self.kind)
            .field("execute", &self.execute.is_some())
            .finish()
    }
}

/// A pass that knows how to register itself.
///
/// Passes are registered once; the callback they attach runs every frame.
pub trait RgPass {
    fn register_to_graph(&mut self, builder: &mut FrameGraphBuilder<'_>, settings: &FrameSettings) -> RgResult<()>;
}

/// Pipeline created for a pass by an [`RgPipelineFactory`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct RgPipeline {
    pub pipeline: vk::Pipeline,
    pub layout: vk::PipelineLayout,
    pub bind_point: vk::PipelineBindPoint,
}

/// Shader compilation and pipeline creation, owned outside the graph.
pub trait RgPipelineFactory {
    fn create_graphics_pipeline(&mut self, pass: &str, desc: &RgGraphicsPassDesc) -> anyhow::Result<RgPipeline>;

    fn create_compute_pipeline(&mut self, pass: &str, desc: &RgComputePassDesc) -> anyhow::Result<RgPipeline>;
}

/// Values that change every frame.
#[derive(Clone, Debug, Default)]
pub struct RgFrameData {
    pub frame_id: u64,
    pub fif_index: usize,
    pub extent: vk::Extent2D,
    /// Seconds since the previous frame.
    pub delta_time: f32,
    pub total_time: f32,
    /// Indices of point lights that cast shadows this frame.
    pub shadow_caster_lights: Vec<u32>,
}

/// One declared usage resolved to the instance serving this frame.
#[derive(Debug)]
pub(crate) struct RgBoundResource<'a> {
    pub name: &'a str,
    pub usage_type: RgUsageType,
    pub state: RgResourceState,
    pub physical: &'a RgPhysical,
    pub sampler: RgSamplerPolicy,
    pub array_slot: Option<RgArraySlot>,
}

/// What a pass callback sees while it records.
///
/// Only the resources the pass declared are reachable; asking for any other
/// name is an [`FrameGraphError::UndeclaredAccess`].
pub struct RgExecutionContext<'a> {
    pub(crate) cmd: &'a GfxCommandBuffer<'a>,
    pub(crate) pass_name: &'a str,
    pub(crate) frame: &'a RgFrameData,
    pub(crate) resources: Vec<RgBoundResource<'a>>,
    pub(crate) pipeline: Option<RgPipeline>,
}

// getters
impl<'a> RgExecutionContext<'a> {
    #[inline]
    pub fn cmd(&self) -> &GfxCommandBuffer<'a> {
        self.cmd
    }

    #[inline]
    pub fn pass_name(&self) -> &str {
        self.pass_name
    }

    #[inline]
    pub fn frame(&self) -> &RgFrameData {
        self.frame
    }

    #[inline]
    pub fn fif_index(&self) -> usize {
        self.frame.fif_index
    }

    #[inline]
    pub fn frame_id(&self) -> u64 {
        self.frame.frame_id
    }

    #[inline]
    pub fn pipeline(&self) -> Option<&RgPipeline> {
        self.pipeline.as_ref()
    }
}

// resource access
impl RgExecutionContext<'_> {
    fn bound(&self, name: &str) -> RgResult<&RgBoundResource<'_>> {
        self.resources.iter().find(|r| r.name == name).ok_or_else(|| FrameGraphError::UndeclaredAccess {
            pass: self.pass_name.to_string(),
            resource: name.to_string(),
        })
    }

    fn wrong_kind(&self, name: &str, reason: &str) -> FrameGraphError {
        FrameGraphError::InvalidUsage {
            pass: self.pass_name.to_string(),
            resource: name.to_string(),
            reason: reason.to_string(),
        }
    }

    pub fn image(&self, name: &str) -> RgResult<&GfxImage> {
        let bound = self.bound(name)?;
        bound.physical.image().ok_or_else(|| self.wrong_kind(name, "resource is a buffer"))
    }

    #[inline]
    pub fn image_view(&self, name: &str) -> RgResult<vk::ImageView> {
        self.image(name).map(GfxImage::view)
    }

    pub fn buffer(&self, name: &str) -> RgResult<&GfxBuffer> {
        let bound = self.bound(name)?;
        bound.physical.buffer().ok_or_else(|| self.wrong_kind(name, "resource is an image"))
    }

    /// State the resource is in while this pass runs.
    pub fn state(&self, name: &str) -> RgResult<RgResourceState> {
        self.bound(name).map(|r| r.state)
    }

    pub fn sampler_policy(&self, name: &str) -> RgResult<RgSamplerPolicy> {
        self.bound(name).map(|r| r.sampler)
    }

    pub fn array_slot(&self, name: &str) -> RgResult<Option<RgArraySlot>> {
        self.bound(name).map(|r| r.array_slot)
    }

    /// Views of the color attachment usages, in declaration order.
    pub fn color_attachment_views(&self) -> Vec<vk::ImageView> {
        self.resources
            .iter()
            .filter(|r| r.usage_type == RgUsageType::ColorAttachment)
            .filter_map(|r| r.physical.image().map(GfxImage::view))
            .collect()
    }

    pub fn depth_attachment_view(&self) -> Option<vk::ImageView> {
        self.resources
            .iter()
            .find(|r| r.usage_type == RgUsageType::DepthAttachment)
            .and_then(|r| r.physical.image().map(GfxImage::view))
    }

    /// Every declared name, in declaration order.
    pub fn declared(&self) -> impl Iterator<Item = &str> {
        self.resources.iter().map(|r| r.name)
    }
}
