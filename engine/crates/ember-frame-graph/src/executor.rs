//! Frame Executor: replays a built [`FrameGraph`] once per frame.

use ember_gfx::commands::{
    barrier::{GfxBufferBarrier, GfxImageBarrier},
    command_buffer::GfxCommandBuffer,
    label_color::LabelColor,
};
use itertools::Itertools;

use crate::{
    builder::{describe_usage, needs_barrier},
    error::{FrameGraphError, RgResult},
    pass::{RgBoundResource, RgExecutionContext, RgFrameData, RgPassCallback, RgPassKind, RgPipeline},
    state::{RgAccess, RgResourceState, RgUsageType},
    transition::{RgBarrierParams, RgTransitionTable},
    usage::{RgArraySlot, RgSamplerPolicy},
    vault::{self, RgPhysical, ResourceId, ResourceVault},
};

pub(crate) struct RgCompiledUsage {
    pub resource: ResourceId,
    pub name: String,
    pub usage_type: RgUsageType,
    pub requested: RgResourceState,
    pub access: RgAccess,
    pub sampler: RgSamplerPolicy,
    pub array_slot: Option<RgArraySlot>,
    /// Barriers validated at build time, keyed by the state the resource arrives in.
    pub transitions: Vec<(RgResourceState, RgBarrierParams)>,
}

pub(crate) struct RgCompiledPass {
    pub name: String,
    pub group: Option<String>,
    pub kind: RgPassKind,
    pub usages: Vec<RgCompiledUsage>,
    pub execute: RgPassCallback,
    pub pipeline: Option<RgPipeline>,
    /// `false` when a resource it uses failed to initialise.
    pub enabled: bool,
}

/// A usage bound to the instance serving the current frame.
struct RgFrameUsage<'v> {
    usage_idx: usize,
    instance: usize,
    from: RgResourceState,
    previous_access: Option<RgAccess>,
    physical: &'v RgPhysical,
}

/// The compiled pass list. Built once, executed every frame.
pub struct FrameGraph {
    passes: Vec<RgCompiledPass>,
}

impl std::fmt::Debug for FrameGraph {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list()
            .entries(self.passes.iter().map(|p| (p.name.as_str(), p.enabled)))
            .finish()
    }
}

impl FrameGraph {
    pub(crate) fn new(passes: Vec<RgCompiledPass>) -> Self {
        Self { passes }
    }

    #[inline]
    pub fn pass_count(&self) -> usize {
        self.passes.len()
    }

    /// Pass names in execution order.
    pub fn pass_names(&self) -> impl Iterator<Item = &str> {
        self.passes.iter().map(|p| p.name.as_str())
    }

    /// Whether the pass runs; `None` for unknown names.
    pub fn is_pass_enabled(&self, name: &str) -> Option<bool> {
        self.passes.iter().find(|p| p.name == name).map(|p| p.enabled)
    }

    pub fn pipeline(&self, name: &str) -> Option<&RgPipeline> {
        self.passes.iter().find(|p| p.name == name).and_then(|p| p.pipeline.as_ref())
    }
}

// execute
impl FrameGraph {
    /// Records every enabled pass into `cmd`, in registration order.
    ///
    /// Each pass gets one batched pipeline barrier bringing its resources from
    /// their actual state to the requested one, a debug label around its
    /// callback, and its resulting states written back to the vault.
    pub fn execute(
        &mut self,
        vault: &mut ResourceVault,
        cmd: &GfxCommandBuffer,
        frame: &RgFrameData,
    ) -> RgResult<()> {
        ember_gfx::gfx_span!("FrameGraph::execute");

        if frame.fif_index >= vault.fif_count() {
            return Err(FrameGraphError::InvalidFrame {
                fif_index: frame.fif_index,
                fif_count: vault.fif_count(),
            });
        }

        for pass in &mut self.passes {
            if !pass.enabled {
                continue;
            }

            let (updates, result) = {
                let Some(bound) = Self::bind_pass(vault, pass, frame.fif_index)? else {
                    log::debug!("pass <{}> skipped this frame: a resource failed to initialise", pass.name);
                    continue;
                };

                Self::record_barriers(cmd, pass, &bound)?;

                let context = RgExecutionContext {
                    cmd,
                    pass_name: &pass.name,
                    frame,
                    resources: bound
                        .iter()
                        .map(|b| {
                            let usage = &pass.usages[b.usage_idx];
                            RgBoundResource {
                                name: &usage.name,
                                usage_type: usage.usage_type,
                                state: usage.requested,
                                physical: b.physical,
                                sampler: usage.sampler,
                                array_slot: usage.array_slot,
                            }
                        })
                        .collect(),
                    pipeline: pass.pipeline,
                };

                cmd.begin_label(&pass.name, LabelColor::COLOR_PASS);
                let result = (pass.execute)(&context);
                cmd.end_label();

                (bound.iter().map(|b| (b.usage_idx, b.instance)).collect_vec(), result)
            };

            // the barriers are recorded even when the callback fails
            for (usage_idx, instance) in updates {
                let usage = &pass.usages[usage_idx];
                vault.set_state(usage.resource, instance, usage.requested, usage.access);
            }
            result.map_err(|e| FrameGraphError::PassExecution {
                pass: pass.name.clone(),
                reason: format!("{:#}", e),
            })?;
        }
        Ok(())
    }

    /// Resolves every usage of `pass` to this frame's instance.
    ///
    /// `None` when a resource failed to initialise after the graph was built.
    /// A healthy resource without the instance is an error.
    fn bind_pass<'v>(
        vault: &'v ResourceVault,
        pass: &RgCompiledPass,
        fif_index: usize,
    ) -> RgResult<Option<Vec<RgFrameUsage<'v>>>> {
        let mut bound = Vec::with_capacity(pass.usages.len());
        for (usage_idx, usage) in pass.usages.iter().enumerate() {
            let resource =
                vault.resource(usage.resource).ok_or_else(|| FrameGraphError::NoSuchResource(usage.name.clone()))?;
            if resource.failure().is_some() {
                return Ok(None);
            }
            let instance = resource.instance_index(fif_index);
            let Some(current) = resource.instance(instance) else {
                return Err(FrameGraphError::MissingInstance {
                    pass: pass.name.clone(),
                    resource: usage.name.clone(),
                    instance,
                });
            };
            bound.push(RgFrameUsage {
                usage_idx,
                instance,
                from: current.state,
                previous_access: current.last_access,
                physical: &current.physical,
            });
        }
        Ok(Some(bound))
    }

    fn record_barriers(cmd: &GfxCommandBuffer, pass: &RgCompiledPass, bound: &[RgFrameUsage<'_>]) -> RgResult<()> {
        let mut image_barriers: Vec<GfxImageBarrier> = Vec::new();
        let mut buffer_barriers: Vec<GfxBufferBarrier> = Vec::new();

        for b in bound {
            let usage = &pass.usages[b.usage_idx];
            if !needs_barrier(b.from, usage.requested, b.previous_access, usage.access) {
                continue;
            }

            let params = match usage.transitions.iter().find(|(from, _)| *from == b.from) {
                Some((_, params)) => *params,
                None => RgTransitionTable::global().lookup(b.from, usage.requested, b.physical.format()).map_err(
                    |e| FrameGraphError::UnsupportedTransition {
                        pass: pass.name.clone(),
                        resource: usage.name.clone(),
                        old: e.old,
                        new: e.new,
                    },
                )?,
            };

            log::debug!("<{}> barrier {}: {} -> {}", pass.name, usage.name, b.from, usage.requested);
            match b.physical {
                RgPhysical::Image(image) => image_barriers.push(vault::image_barrier(image, &params)),
                RgPhysical::Buffer(buffer) => buffer_barriers.push(vault::buffer_barrier(buffer, &params)),
            }
        }

        cmd.pipeline_barrier(&image_barriers, &buffer_barriers);
        Ok(())
    }
}

// debug
impl FrameGraph {
    /// Dumps the pass list, declared usages and planned barriers to the log.
    pub fn print_execution_plan(&self) {
        log::info!("╔══════════════════════════════════════════════════════════════════╗");
        log::info!("║              FrameGraph Execution Plan                           ║");
        log::info!("╠══════════════════════════════════════════════════════════════════╣");
        log::info!(
            "║ Total Passes: {}  |  Execution Order: [{}]",
            self.passes.len(),
            self.passes.iter().map(|p| p.name.as_str()).join(" → ")
        );
        log::info!("╚══════════════════════════════════════════════════════════════════╝");

        for (order, pass) in self.passes.iter().enumerate() {
            log::info!("");
            log::info!("┌─────────────────────────────────────────────────────────────────┐");
            log::info!(
                "│ [{}/{}] Pass: \"{}\"{} ({})",
                order + 1,
                self.passes.len(),
                pass.name,
                pass.group.as_deref().map(|g| format!(" in \"{}\"", g)).unwrap_or_default(),
                match &pass.kind {
                    RgPassKind::Graphics(_) => "graphics",
                    RgPassKind::Compute(_) => "compute",
                }
            );
            log::info!("├─────────────────────────────────────────────────────────────────┤");
            if !pass.enabled {
                log::info!("│ Skipped: a resource failed to initialise");
            }

            for usage in &pass.usages {
                log::info!("│   {}", describe_usage(usage));
            }

            let barriers = pass.usages.iter().flat_map(|u| u.transitions.iter().map(move |t| (u, t))).collect_vec();
            if barriers.is_empty() {
                log::info!("│ No barriers required");
            } else {
                log::info!("├─────────────────────────────────────────────────────────────────┤");
                log::info!("│ Barriers: {}", barriers.len());
                for (usage, (from, params)) in barriers {
                    log::info!("│   🔒 \"{}\": {} → {}", usage.name, from, usage.requested);
                    if params.old_layout != params.new_layout {
                        log::info!("│       Layout: {:?} → {:?}", params.old_layout, params.new_layout);
                    }
                    log::info!("│       Stage:  {:?} → {:?}", params.src_stage, params.dst_stage);
                    log::info!("│       Access: {:?} → {:?}", params.src_access, params.dst_access);
                }
            }
            log::info!("└─────────────────────────────────────────────────────────────────┘");
        }

        log::info!("");
        log::info!("═══════════════════════ End of Execution Plan ═══════════════════════");
    }
}
