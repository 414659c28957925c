//! Frame Graph Builder: collects pass registrations and compiles them into a [`FrameGraph`].
//!
//! Passes run in registration order. `build` walks them once, derives the
//! state every usage needs, and validates every transition the frame (and the
//! wrap into the next frame) will perform.

use std::collections::HashMap;

use ember_gfx::device::GfxDevice;
use indexmap::IndexMap;
use itertools::Itertools;

use crate::{
    error::{FrameGraphError, RgResult},
    executor::{FrameGraph, RgCompiledPass, RgCompiledUsage},
    pass::{
        RgExecutionContext, RgGraphicsPassDesc, RgPass, RgPassKind, RgPassRegistration, RgPipeline,
        RgPipelineFactory,
    },
    settings::FrameSettings,
    state::{RgAccess, RgResourceState, RgUsageType},
    transition::{RgBarrierParams, RgTransitionTable},
    usage::RgResourceUsage,
    vault::{ResourceId, ResourceVault, RgVaultResource},
};

/// Whether moving from `from` to `to` needs a barrier.
///
/// Different states always do. Staying in a writable state does too when a
/// previous access exists and either side writes.
pub(crate) fn needs_barrier(
    from: RgResourceState,
    to: RgResourceState,
    previous_access: Option<RgAccess>,
    access: RgAccess,
) -> bool {
    if from != to {
        return true;
    }
    match previous_access {
        Some(previous) => {
            to.is_writable() && (previous.contains(RgAccess::WRITE) || access.contains(RgAccess::WRITE))
        }
        None => false,
    }
}

pub struct FrameGraphBuilder<'a> {
    device: &'a dyn GfxDevice,
    vault: &'a mut ResourceVault,
    passes: IndexMap<String, RgPassRegistration>,
}

// new & init
impl<'a> FrameGraphBuilder<'a> {
    pub fn new(device: &'a dyn GfxDevice, vault: &'a mut ResourceVault) -> Self {
        Self {
            device,
            vault,
            passes: IndexMap::new(),
        }
    }
}

// getters
impl FrameGraphBuilder<'_> {
    #[inline]
    pub fn device(&self) -> &dyn GfxDevice {
        self.device
    }

    #[inline]
    pub fn vault(&self) -> &ResourceVault {
        self.vault
    }

    /// For importing external resources while passes register.
    #[inline]
    pub fn vault_mut(&mut self) -> &mut ResourceVault {
        self.vault
    }

    #[inline]
    pub fn pass_count(&self) -> usize {
        self.passes.len()
    }

    /// Pass names in registration order.
    pub fn pass_names(&self) -> impl Iterator<Item = &str> {
        self.passes.keys().map(String::as_str)
    }

    #[inline]
    pub fn has_pass(&self, name: &str) -> bool {
        self.passes.contains_key(name)
    }
}

// registration
impl FrameGraphBuilder<'_> {
    /// Appends a pass and creates every resource it declares with a creation spec.
    pub fn register_render_pass(&mut self, registration: RgPassRegistration) -> RgResult<()> {
        ember_gfx::gfx_span!("FrameGraphBuilder::register_render_pass");

        if self.passes.contains_key(&registration.name) {
            return Err(FrameGraphError::DuplicatePass(registration.name));
        }

        for usage in &registration.usages {
            if let Some(spec) = usage.resource_spec() {
                self.vault.ensure(self.device, &usage.name, &spec).map_err(|err| match err {
                    FrameGraphError::IncompatibleSpec { .. } | FrameGraphError::UnsupportedFormat { .. } => {
                        FrameGraphError::Declaration {
                            pass: registration.name.clone(),
                            resource: usage.name.clone(),
                            source: Box::new(err),
                        }
                    }
                    err => err,
                })?;
            }
        }

        log::info!(
            "register pass <{}>{}: [{}]",
            registration.name,
            registration.group.as_deref().map(|g| format!(" ({})", g)).unwrap_or_default(),
            registration.usages.iter().map(|u| u.name.as_str()).join(", ")
        );
        self.passes.insert(registration.name.clone(), registration);
        Ok(())
    }

    /// Attaches the execute callback of a pass registered without one.
    pub fn register_render_pass_exe(
        &mut self,
        name: &str,
        callback: impl FnMut(&RgExecutionContext<'_>) -> anyhow::Result<()> + 'static,
    ) -> RgResult<()> {
        let pass = self.passes.get_mut(name).ok_or_else(|| FrameGraphError::UnknownPass(name.to_string()))?;
        if pass.execute.is_some() {
            return Err(FrameGraphError::CallbackAlreadySet(name.to_string()));
        }
        pass.execute = Some(Box::new(callback));
        Ok(())
    }

    /// Removes a pass. The resources it created stay in the vault.
    pub fn unregister_render_pass(&mut self, name: &str) -> RgResult<RgPassRegistration> {
        self.passes.shift_remove(name).ok_or_else(|| FrameGraphError::UnknownPass(name.to_string()))
    }

    #[inline]
    pub fn add_pass(&mut self, pass: &mut dyn RgPass, settings: &FrameSettings) -> RgResult<()> {
        pass.register_to_graph(self, settings)
    }
}

/// A usage after validation, before barrier planning.
struct RgResolvedUsage {
    resource: ResourceId,
    requested: RgResourceState,
    access: RgAccess,
    usage: RgResourceUsage,
}

// build
impl FrameGraphBuilder<'_> {
    /// Validates the registered passes and plans their barriers.
    ///
    /// `pipelines` creates one pipeline per executed pass when given.
    pub fn build(self, mut pipelines: Option<&mut dyn RgPipelineFactory>) -> RgResult<FrameGraph> {
        ember_gfx::gfx_span!("FrameGraphBuilder::build");

        let vault: &ResourceVault = self.vault;
        let mut resolved_passes = Vec::with_capacity(self.passes.len());
        for (name, registration) in &self.passes {
            if registration.execute.is_none() {
                return Err(FrameGraphError::MissingCallback(name.clone()));
            }
            let usages = Self::resolve_usages(vault, registration)?;
            Self::validate_pass_kind(vault, registration, &usages)?;

            let failed = usages
                .iter()
                .filter_map(|u| vault.resource(u.resource))
                .find(|r| r.failure().is_some())
                .map(|r| r.name().to_string());
            if let Some(resource) = &failed {
                log::warn!("pass <{}> skipped: resource <{}> failed to initialise", name, resource);
            }
            resolved_passes.push((usages, failed.is_none()));
        }

        let transitions = Self::plan_transitions(vault, &self.passes, &resolved_passes)?;

        let mut compiled = Vec::with_capacity(self.passes.len());
        for (((name, registration), (usages, enabled)), pass_transitions) in
            self.passes.into_iter().zip(resolved_passes).zip(transitions)
        {
            let pipeline = match (&mut pipelines, enabled) {
                (Some(factory), true) => Some(Self::create_pipeline(&mut **factory, &name, &registration.kind)?),
                _ => None,
            };

            let usages = usages
                .into_iter()
                .zip(pass_transitions)
                .map(|(resolved, transitions)| RgCompiledUsage {
                    resource: resolved.resource,
                    name: resolved.usage.name,
                    usage_type: resolved.usage.usage_type,
                    requested: resolved.requested,
                    access: resolved.access,
                    sampler: resolved.usage.sampler,
                    array_slot: resolved.usage.array_slot,
                    transitions,
                })
                .collect();

            let Some(execute) = registration.execute else {
                return Err(FrameGraphError::MissingCallback(name));
            };
            compiled.push(RgCompiledPass {
                name,
                group: registration.group,
                kind: registration.kind,
                usages,
                execute,
                pipeline,
                enabled,
            });
        }

        log::info!("frame graph built: {} passes", compiled.len());
        Ok(FrameGraph::new(compiled))
    }

    /// Looks up every usage, derives its requested state and merges repeated names.
    fn resolve_usages(vault: &ResourceVault, registration: &RgPassRegistration) -> RgResult<Vec<RgResolvedUsage>> {
        let pass = &registration.name;
        let invalid = |resource: &str, reason: String| FrameGraphError::InvalidUsage {
            pass: pass.clone(),
            resource: resource.to_string(),
            reason,
        };

        let mut resolved: Vec<RgResolvedUsage> = Vec::with_capacity(registration.usages.len());
        for usage in &registration.usages {
            let id = vault.lookup(&usage.name).ok_or_else(|| FrameGraphError::UnknownResource {
                pass: pass.clone(),
                resource: usage.name.clone(),
            })?;
            let resource = vault.resource(id).ok_or_else(|| FrameGraphError::NoSuchResource(usage.name.clone()))?;

            let requested =
                usage.usage_type.requested_state(usage.access, usage.stage).map_err(|e| invalid(&usage.name, e.to_string()))?;
            if usage.usage_type.is_image() != resource.is_image() {
                return Err(invalid(
                    &usage.name,
                    format!("{:?} usage of a {}", usage.usage_type, if resource.is_image() { "image" } else { "buffer" }),
                ));
            }
            Self::check_usage_flags(resource, usage).map_err(|reason| invalid(&usage.name, reason))?;

            if let Some(existing) = resolved.iter_mut().find(|r| r.resource == id) {
                if existing.requested != requested {
                    return Err(invalid(
                        &usage.name,
                        format!("declared twice, as {} and as {}", existing.requested, requested),
                    ));
                }
                existing.access |= usage.access;
                continue;
            }
            resolved.push(RgResolvedUsage {
                resource: id,
                requested,
                access: usage.access,
                usage: usage.clone(),
            });
        }
        Ok(resolved)
    }

    fn check_usage_flags(resource: &RgVaultResource, usage: &RgResourceUsage) -> Result<(), String> {
        let Some(instance) = resource.instance(0) else {
            return Ok(());
        };
        if let Some(image) = instance.physical.image() {
            let required = usage.usage_type.required_image_usage();
            if !image.info().usage.contains(required) {
                return Err(format!("image was created without {:?}", required));
            }
        }
        if let Some(buffer) = instance.physical.buffer() {
            let required = usage.usage_type.required_buffer_usage(usage.stage);
            if !buffer.info().usage.contains(required) {
                return Err(format!("buffer was created without {:?}", required));
            }
        }
        Ok(())
    }

    fn validate_pass_kind(
        vault: &ResourceVault,
        registration: &RgPassRegistration,
        usages: &[RgResolvedUsage],
    ) -> RgResult<()> {
        let invalid = |reason: String| FrameGraphError::InvalidPass {
            pass: registration.name.clone(),
            reason,
        };
        let attachments = |usage_type: RgUsageType| {
            usages.iter().filter(move |u| u.usage.usage_type == usage_type).collect_vec()
        };
        let color = attachments(RgUsageType::ColorAttachment);
        let depth = attachments(RgUsageType::DepthAttachment);

        match &registration.kind {
            RgPassKind::Compute(_) => {
                if !color.is_empty() || !depth.is_empty() {
                    return Err(invalid("compute passes cannot declare attachments".to_string()));
                }
            }
            RgPassKind::Graphics(desc) => {
                Self::validate_attachments(vault, desc, &color, &depth).map_err(invalid)?;
            }
        }
        Ok(())
    }

    fn validate_attachments(
        vault: &ResourceVault,
        desc: &RgGraphicsPassDesc,
        color: &[&RgResolvedUsage],
        depth: &[&RgResolvedUsage],
    ) -> Result<(), String> {
        let format_of = |id: ResourceId| vault.resource(id).and_then(RgVaultResource::format);

        if color.len() != desc.color_formats.len() {
            return Err(format!(
                "{} color attachments declared, pipeline expects {}",
                color.len(),
                desc.color_formats.len()
            ));
        }
        for (usage, &expected) in color.iter().zip(&desc.color_formats) {
            let actual = format_of(usage.resource);
            if actual != Some(expected) {
                return Err(format!(
                    "color attachment `{}` is {:?}, pipeline expects {:?}",
                    usage.usage.name, actual, expected
                ));
            }
        }

        match (depth, desc.depth_format) {
            ([], None) => Ok(()),
            ([usage], Some(expected)) => {
                let actual = format_of(usage.resource);
                if actual == Some(expected) {
                    Ok(())
                } else {
                    Err(format!(
                        "depth attachment `{}` is {:?}, pipeline expects {:?}",
                        usage.usage.name, actual, expected
                    ))
                }
            }
            ([], Some(_)) => Err("pipeline expects a depth attachment, none declared".to_string()),
            ([_], None) => Err("depth attachment declared, pipeline has no depth format".to_string()),
            _ => Err(format!("{} depth attachments declared, at most one allowed", depth.len())),
        }
    }

    /// Plans, for every usage of every enabled pass, the barriers it may need
    /// keyed by the state the resource arrives in.
    ///
    /// The first user of a resource can see the state the resource has now
    /// (first frame) or the state the last user leaves it in (every later frame).
    fn plan_transitions(
        vault: &ResourceVault,
        passes: &IndexMap<String, RgPassRegistration>,
        resolved_passes: &[(Vec<RgResolvedUsage>, bool)],
    ) -> RgResult<Vec<Vec<Vec<(RgResourceState, RgBarrierParams)>>>> {
        let table = RgTransitionTable::global();
        let mut planned: Vec<Vec<Vec<(RgResourceState, RgBarrierParams)>>> =
            resolved_passes.iter().map(|(usages, _)| vec![Vec::new(); usages.len()]).collect();

        // resource -> (state, access) after its latest user
        let mut last_use: HashMap<ResourceId, (RgResourceState, RgAccess)> = HashMap::new();
        // resource -> (pass, usage) of its first user
        let mut first_use: HashMap<ResourceId, (usize, usize)> = HashMap::new();

        let plan = |pass_idx: usize,
                        usage: &RgResolvedUsage,
                        from: RgResourceState,
                        previous_access: Option<RgAccess>|
         -> RgResult<Option<(RgResourceState, RgBarrierParams)>> {
            if !needs_barrier(from, usage.requested, previous_access, usage.access) {
                return Ok(None);
            }
            let format = vault.resource(usage.resource).and_then(RgVaultResource::format);
            let params = table.lookup(from, usage.requested, format).map_err(|e| {
                FrameGraphError::UnsupportedTransition {
                    pass: passes.get_index(pass_idx).map(|(name, _)| name.clone()).unwrap_or_default(),
                    resource: usage.usage.name.clone(),
                    old: e.old,
                    new: e.new,
                }
            })?;
            Ok(Some((from, params)))
        };

        for (pass_idx, (usages, enabled)) in resolved_passes.iter().enumerate() {
            if !enabled {
                continue;
            }
            for (usage_idx, usage) in usages.iter().enumerate() {
                let entries = match last_use.get(&usage.resource) {
                    Some(&(from, previous_access)) => vec![plan(pass_idx, usage, from, Some(previous_access))?],
                    None => {
                        first_use.insert(usage.resource, (pass_idx, usage_idx));
                        let instances = vault.resource(usage.resource).map(|r| r.instances()).unwrap_or_default();
                        instances
                            .iter()
                            .map(|instance| plan(pass_idx, usage, instance.state, instance.last_access))
                            .collect::<RgResult<Vec<_>>>()?
                    }
                };
                let slot = &mut planned[pass_idx][usage_idx];
                for (from, params) in entries.into_iter().flatten() {
                    if !slot.iter().any(|(state, _)| *state == from) {
                        slot.push((from, params));
                    }
                }
                last_use.insert(usage.resource, (usage.requested, usage.access));
            }
        }

        // wrap-around: the last user of frame N hands over to the first user of frame N + 1
        for (resource, (pass_idx, usage_idx)) in first_use {
            let Some(&(from, previous_access)) = last_use.get(&resource) else {
                continue;
            };
            let usage = &resolved_passes[pass_idx].0[usage_idx];
            if let Some((from, params)) = plan(pass_idx, usage, from, Some(previous_access))? {
                let slot = &mut planned[pass_idx][usage_idx];
                match slot.iter_mut().find(|(state, _)| *state == from) {
                    Some(entry) => entry.1 = params,
                    None => slot.push((from, params)),
                }
            }
        }

        Ok(planned)
    }

    fn create_pipeline(factory: &mut dyn RgPipelineFactory, pass: &str, kind: &RgPassKind) -> RgResult<RgPipeline> {
        let result = match kind {
            RgPassKind::Graphics(desc) => factory.create_graphics_pipeline(pass, desc),
            RgPassKind::Compute(desc) => factory.create_compute_pipeline(pass, desc),
        };
        result.map_err(|e| FrameGraphError::Pipeline {
            pass: pass.to_string(),
            reason: format!("{:#}", e),
        })
    }
}

/// Formats the usages of a pass for logs.
pub(crate) fn describe_usage(usage: &RgCompiledUsage) -> String {
    let access = match (usage.access.contains(RgAccess::READ), usage.access.contains(RgAccess::WRITE)) {
        (true, true) => "rw",
        (false, true) => "w",
        _ => "r",
    };
    format!("\"{}\" {} @ {}", usage.name, access, usage.requested)
}

impl std::fmt::Debug for FrameGraphBuilder<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FrameGraphBuilder").field("passes", &self.passes.keys().collect_vec()).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_needs_barrier() {
        use RgResourceState::*;
        let (r, w) = (RgAccess::READ, RgAccess::WRITE);

        assert!(needs_barrier(General, ShaderReadOnly, None, r));
        // first use after creation
        assert!(!needs_barrier(General, General, None, w));
        // write after write
        assert!(needs_barrier(General, General, Some(w), w));
        // read after write in a writable state
        assert!(needs_barrier(StorageReadWrite, StorageReadWrite, Some(w), r));
        // read after read
        assert!(!needs_barrier(ShaderReadOnly, ShaderReadOnly, Some(r), r));
        // non-writable state never re-syncs
        assert!(!needs_barrier(StorageRead, StorageRead, Some(r), r));
    }
}
