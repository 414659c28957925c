//! Resource Vault: the single owner of every physical resource the graph touches.
//!
//! Resources are keyed by their logical name. The first declaration with a
//! creation spec allocates them; later declarations must agree with that spec.
//! Multi-buffered resources own one instance per frame in flight, each with its
//! own tracked state.

use std::collections::HashMap;

use ash::vk;
use ember_gfx::{
    commands::{
        barrier::{GfxBufferBarrier, GfxImageBarrier, GfxSyncScope},
        command_buffer::GfxCommandBuffer,
        one_time::one_time_exec,
    },
    device::GfxDevice,
    resources::{
        buffer::{GfxBuffer, GfxBufferCreateInfo},
        image::{GfxImage, GfxImageCreateInfo},
    },
};
use slotmap::SlotMap;

use crate::{
    error::{FrameGraphError, RgResult},
    initial_data::{self, RgInitialData, RgInitialDataRequest},
    state::{RgAccess, RgResourceState, RgUsageType},
    transition::{RgBarrierParams, RgTransitionTable},
    usage::{RgCreationSpec, RgExtent, RgResourceDesc, RgResourceUsage},
};

slotmap::new_key_type! {
    /// Stable key of a vault resource; never reused while the vault lives.
    pub struct ResourceId;
}

/// Physical backing of one instance.
#[derive(Clone, Debug)]
pub enum RgPhysical {
    Image(GfxImage),
    Buffer(GfxBuffer),
}

impl RgPhysical {
    #[inline]
    pub fn image(&self) -> Option<&GfxImage> {
        match self {
            Self::Image(image) => Some(image),
            Self::Buffer(_) => None,
        }
    }

    #[inline]
    pub fn buffer(&self) -> Option<&GfxBuffer> {
        match self {
            Self::Buffer(buffer) => Some(buffer),
            Self::Image(_) => None,
        }
    }

    /// `None` for buffers.
    #[inline]
    pub fn format(&self) -> Option<vk::Format> {
        self.image().map(GfxImage::format)
    }
}

#[derive(Clone, Debug)]
pub struct RgInstance {
    pub physical: RgPhysical,
    pub state: RgResourceState,
    /// Access of the last pass that used this instance; `None` since creation.
    pub last_access: Option<RgAccess>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RgOrigin {
    /// Allocated (and destroyed) by the vault.
    Created,
    /// Owned elsewhere; the vault only tracks its state.
    Imported,
}

/// Everything the vault needs to create a resource.
#[derive(Clone, Debug)]
pub struct RgResourceSpec {
    pub usage_type: RgUsageType,
    pub creation: RgCreationSpec,
    pub multi_buffered: bool,
    pub owned_by_engine: bool,
}

impl RgResourceUsage {
    /// Creation request carried by this usage, if any.
    pub fn resource_spec(&self) -> Option<RgResourceSpec> {
        self.creation.as_ref().map(|creation| RgResourceSpec {
            usage_type: self.usage_type,
            creation: creation.clone(),
            multi_buffered: self.multi_buffered,
            owned_by_engine: self.owned_by_engine,
        })
    }
}

#[derive(Debug)]
pub struct RgVaultResource {
    name: String,
    origin: RgOrigin,
    /// `None` for imported resources.
    spec: Option<RgResourceSpec>,
    multi_buffered: bool,
    owned_by_engine: bool,
    creation_state: RgResourceState,
    instances: Vec<RgInstance>,
    /// Content error of the last creation attempt.
    failure: Option<String>,
}

// getters
impl RgVaultResource {
    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[inline]
    pub fn origin(&self) -> RgOrigin {
        self.origin
    }

    #[inline]
    pub fn spec(&self) -> Option<&RgResourceSpec> {
        self.spec.as_ref()
    }

    #[inline]
    pub fn is_multi_buffered(&self) -> bool {
        self.multi_buffered
    }

    #[inline]
    pub fn is_owned_by_engine(&self) -> bool {
        self.owned_by_engine
    }

    #[inline]
    pub fn creation_state(&self) -> RgResourceState {
        self.creation_state
    }

    #[inline]
    pub fn instances(&self) -> &[RgInstance] {
        &self.instances
    }

    #[inline]
    pub fn instance(&self, index: usize) -> Option<&RgInstance> {
        self.instances.get(index)
    }

    /// Content error that prevented creation, if any.
    #[inline]
    pub fn failure(&self) -> Option<&str> {
        self.failure.as_deref()
    }

    #[inline]
    pub fn is_image(&self) -> bool {
        match &self.spec {
            Some(spec) => spec.creation.desc.is_image(),
            None => matches!(self.instances.first().map(|i| &i.physical), Some(RgPhysical::Image(_))),
        }
    }

    /// Format of an image resource.
    pub fn format(&self) -> Option<vk::Format> {
        match &self.spec {
            Some(spec) => spec.creation.desc.format(),
            None => self.instances.first().and_then(|i| i.physical.format()),
        }
    }

    /// Instance serving frame-in-flight slot `fif_index`.
    #[inline]
    pub fn instance_index(&self, fif_index: usize) -> usize {
        if self.multi_buffered { fif_index } else { 0 }
    }

    fn follows_swapchain(&self) -> bool {
        matches!(
            self.spec.as_ref().map(|s| &s.creation.desc),
            Some(RgResourceDesc::Image(image)) if image.extent == RgExtent::Swapchain
        )
    }
}

pub struct ResourceVault {
    fif_count: usize,
    resources: SlotMap<ResourceId, RgVaultResource>,
    names: HashMap<String, ResourceId>,
}

// new & init
impl ResourceVault {
    pub fn new(fif_count: usize) -> Self {
        Self {
            fif_count: fif_count.max(1),
            resources: SlotMap::with_key(),
            names: HashMap::new(),
        }
    }
}

// getters
impl ResourceVault {
    #[inline]
    pub fn fif_count(&self) -> usize {
        self.fif_count
    }

    #[inline]
    pub fn lookup(&self, name: &str) -> Option<ResourceId> {
        self.names.get(name).copied()
    }

    #[inline]
    pub fn resource(&self, id: ResourceId) -> Option<&RgVaultResource> {
        self.resources.get(id)
    }

    #[inline]
    pub fn resource_by_name(&self, name: &str) -> Option<&RgVaultResource> {
        self.lookup(name).and_then(|id| self.resources.get(id))
    }

    /// Physical handle of instance `instance` (always 0 for single-instance resources).
    pub fn get(&self, name: &str, instance: usize) -> Option<&RgPhysical> {
        self.resource_by_name(name)?.instances.get(instance).map(|i| &i.physical)
    }

    pub fn state(&self, id: ResourceId, instance: usize) -> Option<RgResourceState> {
        self.resources.get(id)?.instances.get(instance).map(|i| i.state)
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.resources.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.resources.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (ResourceId, &RgVaultResource)> {
        self.resources.iter()
    }

    /// Records the state a pass left an instance in.
    pub(crate) fn set_state(&mut self, id: ResourceId, instance: usize, state: RgResourceState, access: RgAccess) {
        if let Some(instance) = self.resources.get_mut(id).and_then(|r| r.instances.get_mut(instance)) {
            instance.state = state;
            instance.last_access = Some(access);
        }
    }
}

// ensure & create
impl ResourceVault {
    /// Returns the resource named `name`, creating it on first call.
    ///
    /// Later calls return the same id without allocating, provided `spec`
    /// describes the same resource. A content error from the initial-data
    /// callback does not fail this call; the resource is marked failed instead.
    pub fn ensure(&mut self, device: &dyn GfxDevice, name: &str, spec: &RgResourceSpec) -> RgResult<ResourceId> {
        if let Some(id) = self.lookup(name) {
            self.check_compatible(id, spec)?;
            if let Some(resource) = self.resources.get_mut(id) {
                resource.owned_by_engine |= spec.owned_by_engine;
            }
            return Ok(id);
        }

        let resource = self.create_resource(device, name, spec, device.swapchain_extent())?;
        let id = self.resources.insert(resource);
        self.names.insert(name.to_string(), id);
        Ok(id)
    }

    fn check_compatible(&self, id: ResourceId, spec: &RgResourceSpec) -> RgResult<()> {
        let Some(existing) = self.resources.get(id) else {
            return Ok(());
        };
        let incompatible = |reason: &str| FrameGraphError::IncompatibleSpec {
            name: existing.name.clone(),
            reason: reason.to_string(),
        };

        let Some(existing_spec) = &existing.spec else {
            return Err(incompatible("resource is imported and cannot be created by a pass"));
        };
        if existing_spec.creation.desc != spec.creation.desc {
            return Err(incompatible(&format!(
                "{:?} differs from {:?}",
                spec.creation.desc, existing_spec.creation.desc
            )));
        }
        if existing.multi_buffered != spec.multi_buffered {
            return Err(incompatible("multi-buffering differs"));
        }
        Ok(())
    }

    fn validate_spec(device: &dyn GfxDevice, name: &str, spec: &RgResourceSpec) -> RgResult<()> {
        let invalid = |reason: &str| FrameGraphError::IncompatibleSpec {
            name: name.to_string(),
            reason: reason.to_string(),
        };

        match (&spec.creation.desc, spec.usage_type) {
            (RgResourceDesc::Buffer(_), usage_type) if usage_type.is_image() => {
                Err(invalid("image usage declares a buffer creation spec"))
            }
            (RgResourceDesc::Image(_), RgUsageType::StructuredBuffer) => {
                Err(invalid("buffer usage declares an image creation spec"))
            }
            (RgResourceDesc::Buffer(buffer), _) if buffer.size == 0 => Err(invalid("zero-sized buffer")),
            (RgResourceDesc::Image(image), usage_type) => {
                let depth = ember_gfx::format::is_depth_format(image.format);
                let wants_depth =
                    matches!(usage_type, RgUsageType::DepthAttachment | RgUsageType::SampledDepthTexture);
                if depth != wants_depth {
                    return Err(invalid(&format!("format {:?} does not fit a {:?} usage", image.format, usage_type)));
                }
                if image.mip_levels == 0 || image.array_layers == 0 {
                    return Err(invalid("image needs at least one mip level and one layer"));
                }
                let usage = Self::image_usage_flags(spec);
                if !device.is_format_supported(image.format, usage) {
                    return Err(FrameGraphError::UnsupportedFormat {
                        name: name.to_string(),
                        format: image.format,
                    });
                }
                Ok(())
            }
            _ => Ok(()),
        }
    }

    /// Flags of a vault-created image: implied by the declaring type, plus
    /// sampling, copy-out, the spec's extras, and copy-in when it has initial data.
    fn image_usage_flags(spec: &RgResourceSpec) -> vk::ImageUsageFlags {
        let RgResourceDesc::Image(image) = &spec.creation.desc else {
            return vk::ImageUsageFlags::empty();
        };
        let mut usage = spec.usage_type.required_image_usage()
            | vk::ImageUsageFlags::SAMPLED
            | vk::ImageUsageFlags::TRANSFER_SRC
            | image.extra_usage;
        if spec.creation.initial_data.is_some() {
            usage |= vk::ImageUsageFlags::TRANSFER_DST;
        }
        usage
    }

    fn buffer_usage_flags(spec: &RgResourceSpec) -> vk::BufferUsageFlags {
        let RgResourceDesc::Buffer(buffer) = &spec.creation.desc else {
            return vk::BufferUsageFlags::empty();
        };
        vk::BufferUsageFlags::STORAGE_BUFFER
            | vk::BufferUsageFlags::INDIRECT_BUFFER
            | vk::BufferUsageFlags::TRANSFER_SRC
            | vk::BufferUsageFlags::TRANSFER_DST
            | buffer.extra_usage
    }

    fn create_resource(
        &self,
        device: &dyn GfxDevice,
        name: &str,
        spec: &RgResourceSpec,
        swapchain_extent: vk::Extent2D,
    ) -> RgResult<RgVaultResource> {
        ember_gfx::gfx_span!("ResourceVault::create_resource");
        Self::validate_spec(device, name, spec)?;

        let creation_state = spec.usage_type.creation_state();
        let mut resource = RgVaultResource {
            name: name.to_string(),
            origin: RgOrigin::Created,
            spec: Some(spec.clone()),
            multi_buffered: spec.multi_buffered,
            owned_by_engine: spec.owned_by_engine,
            creation_state,
            instances: Vec::new(),
            failure: None,
        };

        let request = Self::initial_data_request(name, &spec.creation.desc, swapchain_extent);
        let initial_data = match Self::produce_initial_data(spec, &request) {
            Ok(data) => data,
            Err(err) => {
                log::error!("resource <{}> failed to initialise, dependent passes will be skipped: {:#}", name, err);
                resource.failure = Some(format!("{:#}", err));
                return Ok(resource);
            }
        };

        let instance_count = if spec.multi_buffered { self.fif_count } else { 1 };
        let mut physicals = Vec::with_capacity(instance_count);
        for index in 0..instance_count {
            match Self::allocate_instance(device, name, index, spec, swapchain_extent) {
                Ok(physical) => physicals.push(physical),
                Err(err) => {
                    physicals.into_iter().for_each(|p| Self::destroy_physical(device, p));
                    return Err(err);
                }
            }
        }

        if let Err(err) = Self::initialise_instances(device, name, creation_state, &physicals, initial_data.as_ref()) {
            physicals.into_iter().for_each(|p| Self::destroy_physical(device, p));
            return Err(err);
        }

        log::info!(
            "vault: created <{}> ({} instance{}, {})",
            name,
            instance_count,
            if instance_count > 1 { "s" } else { "" },
            creation_state
        );
        resource.instances = physicals
            .into_iter()
            .map(|physical| RgInstance {
                physical,
                state: creation_state,
                last_access: None,
            })
            .collect();
        Ok(resource)
    }

    fn initial_data_request(name: &str, desc: &RgResourceDesc, swapchain_extent: vk::Extent2D) -> RgInitialDataRequest {
        match desc {
            RgResourceDesc::Image(image) => {
                let extent = image.extent.resolve(swapchain_extent);
                RgInitialDataRequest {
                    name: name.to_string(),
                    extent: Some(extent),
                    format: Some(image.format),
                    byte_size: initial_data::image_byte_size(extent, image.format)
                        .map(|size| size * image.array_layers as vk::DeviceSize),
                }
            }
            RgResourceDesc::Buffer(buffer) => RgInitialDataRequest {
                name: name.to_string(),
                extent: None,
                format: None,
                byte_size: Some(buffer.size),
            },
        }
    }

    fn produce_initial_data(
        spec: &RgResourceSpec,
        request: &RgInitialDataRequest,
    ) -> anyhow::Result<Option<RgInitialData>> {
        let Some(callback) = &spec.creation.initial_data else {
            return Ok(None);
        };
        let data = callback(request)?;
        data.validate(request)?;
        Ok(Some(data))
    }

    fn allocate_instance(
        device: &dyn GfxDevice,
        name: &str,
        index: usize,
        spec: &RgResourceSpec,
        swapchain_extent: vk::Extent2D,
    ) -> RgResult<RgPhysical> {
        let debug_name = if spec.multi_buffered { format!("{}[{}]", name, index) } else { name.to_string() };
        match &spec.creation.desc {
            RgResourceDesc::Image(image) => {
                let info = GfxImageCreateInfo::new_2d(
                    debug_name,
                    image.extent.resolve(swapchain_extent),
                    image.format,
                    Self::image_usage_flags(spec),
                )
                .with_mips(image.mip_levels)
                .with_layers(image.array_layers);
                Ok(RgPhysical::Image(device.create_image(&info)?))
            }
            RgResourceDesc::Buffer(buffer) => {
                let info = GfxBufferCreateInfo::new(debug_name, buffer.size, Self::buffer_usage_flags(spec))
                    .host_visible(buffer.host_visible);
                Ok(RgPhysical::Buffer(device.create_buffer(&info)?))
            }
        }
    }

    /// Moves every instance from `Undefined` to its creation state on one
    /// blocking command buffer, uploading the initial data on the way.
    fn initialise_instances(
        device: &dyn GfxDevice,
        name: &str,
        creation_state: RgResourceState,
        physicals: &[RgPhysical],
        initial_data: Option<&RgInitialData>,
    ) -> RgResult<()> {
        let Some(first) = physicals.first() else {
            return Ok(());
        };
        let format = first.format();
        let table = RgTransitionTable::global();
        let lookup = |old: RgResourceState, new: RgResourceState| {
            table.lookup(old, new, format).map_err(|e| FrameGraphError::UnsupportedTransition {
                pass: "<creation>".to_string(),
                resource: name.to_string(),
                old: e.old,
                new: e.new,
            })
        };

        let Some(data) = initial_data else {
            let to_creation = lookup(RgResourceState::Undefined, creation_state)?;
            one_time_exec(device, &format!("create-{}", name), |cmd| {
                record_barrier(cmd, physicals, &to_creation);
            })?;
            return Ok(());
        };

        let to_transfer = lookup(RgResourceState::Undefined, RgResourceState::TransferDst)?;
        let to_creation = lookup(RgResourceState::TransferDst, creation_state)?;

        let staging_size = match (first, data) {
            (RgPhysical::Buffer(_), RgInitialData::Fill(_)) => None,
            (RgPhysical::Buffer(_), RgInitialData::Bytes(bytes)) => Some(bytes.len() as vk::DeviceSize),
            (RgPhysical::Image(_), RgInitialData::Bytes(bytes)) => Some(bytes.len() as vk::DeviceSize),
            (RgPhysical::Image(image), RgInitialData::Fill(_)) => {
                let size = initial_data::image_byte_size(image.extent(), image.format()).unwrap_or_default();
                Some(size * image.info().array_layers as vk::DeviceSize)
            }
        };

        let staging = match staging_size {
            Some(size) => {
                let mut info = GfxBufferCreateInfo::staging(format!("{}-staging", name), size);
                if matches!(data, RgInitialData::Fill(_)) {
                    info.usage |= vk::BufferUsageFlags::TRANSFER_DST;
                }
                Some(device.create_buffer(&info)?)
            }
            None => None,
        };
        let staging = scopeguard::guard(staging, |staging| {
            if let Some(staging) = staging {
                device.destroy_buffer(staging);
            }
        });

        let staging: Option<&GfxBuffer> = (*staging).as_ref();
        if let (Some(staging), RgInitialData::Bytes(bytes)) = (staging, data) {
            device.write_buffer(staging, 0, bytes)?;
        }

        one_time_exec(device, &format!("upload-{}", name), |cmd| {
            if let (Some(staging), RgInitialData::Fill(value)) = (staging, data) {
                cmd.cmd_fill_buffer(staging, *value);
                let fill_to_copy = GfxBufferBarrier::whole(
                    staging,
                    GfxSyncScope::new(vk::PipelineStageFlags2::TRANSFER, vk::AccessFlags2::TRANSFER_WRITE),
                    GfxSyncScope::new(vk::PipelineStageFlags2::TRANSFER, vk::AccessFlags2::TRANSFER_READ),
                );
                cmd.buffer_memory_barrier(&[fill_to_copy]);
            }

            record_barrier(cmd, physicals, &to_transfer);
            for physical in physicals {
                match (physical, staging, data) {
                    (RgPhysical::Image(image), Some(staging), _) => cmd.cmd_copy_buffer_to_image(staging, image),
                    (RgPhysical::Buffer(buffer), Some(staging), _) => {
                        let region = vk::BufferCopy {
                            src_offset: 0,
                            dst_offset: 0,
                            size: staging.size(),
                        };
                        cmd.cmd_copy_buffer(staging, buffer, &[region]);
                    }
                    (RgPhysical::Buffer(buffer), None, RgInitialData::Fill(value)) => {
                        cmd.cmd_fill_buffer(buffer, *value)
                    }
                    (RgPhysical::Image(_), None, _) | (RgPhysical::Buffer(_), None, RgInitialData::Bytes(_)) => {}
                }
            }
            record_barrier(cmd, physicals, &to_creation);
        })?;

        Ok(())
    }

    fn destroy_physical(device: &dyn GfxDevice, physical: RgPhysical) {
        match physical {
            RgPhysical::Image(image) => device.destroy_image(image),
            RgPhysical::Buffer(buffer) => device.destroy_buffer(buffer),
        }
    }
}

/// Records `params` for every instance, in one pipeline barrier.
fn record_barrier(cmd: &GfxCommandBuffer, physicals: &[RgPhysical], params: &RgBarrierParams) {
    let mut image_barriers = Vec::new();
    let mut buffer_barriers = Vec::new();
    for physical in physicals {
        match physical {
            RgPhysical::Image(image) => image_barriers.push(image_barrier(image, params)),
            RgPhysical::Buffer(buffer) => buffer_barriers.push(buffer_barrier(buffer, params)),
        }
    }
    cmd.pipeline_barrier(&image_barriers, &buffer_barriers);
}

pub(crate) fn image_barrier(image: &GfxImage, params: &RgBarrierParams) -> GfxImageBarrier {
    GfxImageBarrier::transition(
        image,
        params.aspect,
        params.old_layout,
        params.new_layout,
        GfxSyncScope::new(params.src_stage, params.src_access),
        GfxSyncScope::new(params.dst_stage, params.dst_access),
    )
}

pub(crate) fn buffer_barrier(buffer: &GfxBuffer, params: &RgBarrierParams) -> GfxBufferBarrier {
    GfxBufferBarrier::whole(
        buffer,
        GfxSyncScope::new(params.src_stage, params.src_access),
        GfxSyncScope::new(params.dst_stage, params.dst_access),
    )
}

// import
impl ResourceVault {
    /// Registers images owned by someone else (swapchain images, engine textures).
    ///
    /// One image for a single-instance resource, `fif_count` images for a
    /// multi-buffered one. Re-importing a name replaces the handles, which is
    /// how the owner hands over recreated images.
    pub fn import_image(
        &mut self,
        name: &str,
        images: Vec<GfxImage>,
        state: RgResourceState,
    ) -> RgResult<ResourceId> {
        self.import(name, images.into_iter().map(RgPhysical::Image).collect(), state)
    }

    /// Registers buffers owned by someone else (bindless scene buffers, readbacks).
    pub fn import_buffer(
        &mut self,
        name: &str,
        buffers: Vec<GfxBuffer>,
        state: RgResourceState,
    ) -> RgResult<ResourceId> {
        self.import(name, buffers.into_iter().map(RgPhysical::Buffer).collect(), state)
    }

    fn import(&mut self, name: &str, physicals: Vec<RgPhysical>, state: RgResourceState) -> RgResult<ResourceId> {
        let multi_buffered = match physicals.len() {
            1 => false,
            n if n == self.fif_count => true,
            n => {
                return Err(FrameGraphError::IncompatibleSpec {
                    name: name.to_string(),
                    reason: format!("imported {} instances, expected 1 or {}", n, self.fif_count),
                });
            }
        };
        let instances = physicals
            .into_iter()
            .map(|physical| RgInstance {
                physical,
                state,
                last_access: None,
            })
            .collect();

        if let Some(id) = self.lookup(name) {
            let Some(existing) = self.resources.get_mut(id) else {
                return Err(FrameGraphError::NoSuchResource(name.to_string()));
            };
            if existing.origin != RgOrigin::Imported {
                return Err(FrameGraphError::IncompatibleSpec {
                    name: name.to_string(),
                    reason: "a vault-created resource cannot be replaced by an import".to_string(),
                });
            }
            existing.instances = instances;
            existing.multi_buffered = multi_buffered;
            existing.creation_state = state;
            log::info!("vault: re-imported <{}>", name);
            return Ok(id);
        }

        let id = self.resources.insert(RgVaultResource {
            name: name.to_string(),
            origin: RgOrigin::Imported,
            spec: None,
            multi_buffered,
            owned_by_engine: true,
            creation_state: state,
            instances,
            failure: None,
        });
        self.names.insert(name.to_string(), id);
        log::info!("vault: imported <{}>", name);
        Ok(id)
    }
}

// release & resize & destroy
impl ResourceVault {
    /// Destroys a vault-created resource that the engine does not own.
    pub fn release(&mut self, device: &dyn GfxDevice, name: &str) -> RgResult<()> {
        let id = self.lookup(name).ok_or_else(|| FrameGraphError::NoSuchResource(name.to_string()))?;
        let Some(resource) = self.resources.get(id) else {
            return Err(FrameGraphError::NoSuchResource(name.to_string()));
        };
        if resource.origin == RgOrigin::Imported {
            return Err(FrameGraphError::ReleaseRefused {
                name: name.to_string(),
                reason: "resource is imported",
            });
        }
        if resource.owned_by_engine {
            return Err(FrameGraphError::ReleaseRefused {
                name: name.to_string(),
                reason: "resource is owned by the engine",
            });
        }

        if let Some(resource) = self.resources.remove(id) {
            resource.instances.into_iter().for_each(|i| Self::destroy_physical(device, i.physical));
        }
        self.names.remove(name);
        log::info!("vault: released <{}>", name);
        Ok(())
    }

    /// Recreates every swapchain-sized resource at `extent`.
    ///
    /// Recreated resources get fresh handles, their creation state, and their
    /// initial data again. Ids stay valid. On error, the resource being
    /// recreated and every one after it keep their previous instances.
    pub fn resize(&mut self, device: &dyn GfxDevice, extent: vk::Extent2D) -> RgResult<()> {
        ember_gfx::gfx_span!("ResourceVault::resize");

        let targets: Vec<ResourceId> = self
            .resources
            .iter()
            .filter(|(_, r)| r.origin == RgOrigin::Created && r.follows_swapchain())
            .map(|(id, _)| id)
            .collect();

        for id in targets {
            let Some(resource) = self.resources.get_mut(id) else {
                continue;
            };
            let same_extent = resource
                .instances
                .first()
                .and_then(|i| i.physical.image())
                .is_some_and(|image| image.extent() == extent);
            if same_extent {
                continue;
            }

            let name = resource.name.clone();
            let Some(spec) = resource.spec.clone() else {
                continue;
            };
            let owned_by_engine = resource.owned_by_engine;

            // the old instances stay untouched until the replacement exists
            let mut recreated = self.create_resource(device, &name, &spec, extent)?;
            recreated.owned_by_engine = owned_by_engine;
            if let Some(slot) = self.resources.get_mut(id) {
                let old = std::mem::replace(slot, recreated);
                old.instances.into_iter().for_each(|i| Self::destroy_physical(device, i.physical));
            }
        }
        log::info!("vault: resized to {}x{}", extent.width, extent.height);
        Ok(())
    }

    /// Destroys every vault-created resource. Imported resources are forgotten, not destroyed.
    pub fn destroy(&mut self, device: &dyn GfxDevice) {
        for (_, resource) in self.resources.drain() {
            if resource.origin == RgOrigin::Created {
                resource.instances.into_iter().for_each(|i| Self::destroy_physical(device, i.physical));
            }
        }
        self.names.clear();
    }
}

impl Drop for ResourceVault {
    fn drop(&mut self) {
        let leaked = self.resources.values().filter(|r| r.origin == RgOrigin::Created && !r.instances.is_empty()).count();
        if leaked > 0 && !std::thread::panicking() {
            log::error!("ResourceVault dropped with {} live resources; call destroy() first", leaked);
        }
    }
}
