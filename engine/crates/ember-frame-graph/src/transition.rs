//! Transition table: the finite set of state changes the engine knows how to synchronise.
//!
//! Every allowed `(old, new)` pair is listed in [`RgTransitionTable::PAIRS`].
//! The masks of an entry come from the source scope of `old` and the
//! destination scope of `new`. A pair that is not listed is an error; the
//! graph fails at build time instead of guessing a barrier.

use std::collections::HashMap;
use std::sync::OnceLock;

use ash::vk;
use ember_gfx::format;

use crate::state::RgResourceState;

/// Everything one barrier needs, besides the resource handle.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RgBarrierParams {
    pub src_access: vk::AccessFlags2,
    pub dst_access: vk::AccessFlags2,
    pub src_stage: vk::PipelineStageFlags2,
    pub dst_stage: vk::PipelineStageFlags2,
    /// Empty for buffers.
    pub aspect: vk::ImageAspectFlags,
    pub old_layout: vk::ImageLayout,
    pub new_layout: vk::ImageLayout,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, thiserror::Error)]
#[error("no transition {old} -> {new}")]
pub struct RgTransitionError {
    pub old: RgResourceState,
    pub new: RgResourceState,
}

#[derive(Clone, Copy, Debug)]
struct RgTransitionEntry {
    src_stage: vk::PipelineStageFlags2,
    src_access: vk::AccessFlags2,
    dst_stage: vk::PipelineStageFlags2,
    dst_access: vk::AccessFlags2,
}

/// Every shader stage a declared usage can map to.
const SHADER_STAGES: vk::PipelineStageFlags2 = vk::PipelineStageFlags2::from_raw(
    vk::PipelineStageFlags2::VERTEX_SHADER.as_raw()
        | vk::PipelineStageFlags2::FRAGMENT_SHADER.as_raw()
        | vk::PipelineStageFlags2::COMPUTE_SHADER.as_raw()
        | vk::PipelineStageFlags2::RAY_TRACING_SHADER_KHR.as_raw(),
);

const FRAGMENT_TESTS: vk::PipelineStageFlags2 = vk::PipelineStageFlags2::from_raw(
    vk::PipelineStageFlags2::EARLY_FRAGMENT_TESTS.as_raw() | vk::PipelineStageFlags2::LATE_FRAGMENT_TESTS.as_raw(),
);

const fn stages(a: vk::PipelineStageFlags2, b: vk::PipelineStageFlags2) -> vk::PipelineStageFlags2 {
    vk::PipelineStageFlags2::from_raw(a.as_raw() | b.as_raw())
}

const fn accesses(a: vk::AccessFlags2, b: vk::AccessFlags2) -> vk::AccessFlags2 {
    vk::AccessFlags2::from_raw(a.as_raw() | b.as_raw())
}

/// Stages and writes that must complete before leaving `state`.
///
/// Read-only states have no access to make available; their scope is an
/// execution dependency only.
fn src_scope(state: RgResourceState) -> (vk::PipelineStageFlags2, vk::AccessFlags2) {
    use RgResourceState as S;
    match state {
        S::Undefined => (vk::PipelineStageFlags2::TOP_OF_PIPE, vk::AccessFlags2::NONE),
        S::General => (
            stages(SHADER_STAGES, vk::PipelineStageFlags2::TRANSFER),
            accesses(vk::AccessFlags2::SHADER_STORAGE_WRITE, vk::AccessFlags2::TRANSFER_WRITE),
        ),
        S::ColorAttachment => {
            (vk::PipelineStageFlags2::COLOR_ATTACHMENT_OUTPUT, vk::AccessFlags2::COLOR_ATTACHMENT_WRITE)
        }
        S::DepthAttachment => (FRAGMENT_TESTS, vk::AccessFlags2::DEPTH_STENCIL_ATTACHMENT_WRITE),
        S::DepthReadOnly => (stages(FRAGMENT_TESTS, SHADER_STAGES), vk::AccessFlags2::NONE),
        S::ShaderReadOnly => (SHADER_STAGES, vk::AccessFlags2::NONE),
        S::TransferSrc => (vk::PipelineStageFlags2::TRANSFER, vk::AccessFlags2::NONE),
        S::TransferDst => (vk::PipelineStageFlags2::TRANSFER, vk::AccessFlags2::TRANSFER_WRITE),
        // the acquire semaphore waits on color output
        S::Present => (vk::PipelineStageFlags2::COLOR_ATTACHMENT_OUTPUT, vk::AccessFlags2::NONE),
        S::StorageRead => (SHADER_STAGES, vk::AccessFlags2::NONE),
        S::StorageReadWrite => (SHADER_STAGES, vk::AccessFlags2::SHADER_STORAGE_WRITE),
        S::IndirectRead => (vk::PipelineStageFlags2::DRAW_INDIRECT, vk::AccessFlags2::NONE),
    }
}

/// Stages and accesses that must wait before using `state`.
fn dst_scope(state: RgResourceState) -> (vk::PipelineStageFlags2, vk::AccessFlags2) {
    use RgResourceState as S;
    match state {
        S::Undefined => (vk::PipelineStageFlags2::TOP_OF_PIPE, vk::AccessFlags2::NONE),
        S::General => (
            stages(SHADER_STAGES, vk::PipelineStageFlags2::TRANSFER),
            vk::AccessFlags2::SHADER_STORAGE_READ
                | vk::AccessFlags2::SHADER_STORAGE_WRITE
                | vk::AccessFlags2::SHADER_SAMPLED_READ
                | vk::AccessFlags2::TRANSFER_READ
                | vk::AccessFlags2::TRANSFER_WRITE,
        ),
        S::ColorAttachment => (
            vk::PipelineStageFlags2::COLOR_ATTACHMENT_OUTPUT,
            accesses(vk::AccessFlags2::COLOR_ATTACHMENT_READ, vk::AccessFlags2::COLOR_ATTACHMENT_WRITE),
        ),
        S::DepthAttachment => (
            FRAGMENT_TESTS,
            accesses(
                vk::AccessFlags2::DEPTH_STENCIL_ATTACHMENT_READ,
                vk::AccessFlags2::DEPTH_STENCIL_ATTACHMENT_WRITE,
            ),
        ),
        S::DepthReadOnly => (
            stages(FRAGMENT_TESTS, SHADER_STAGES),
            accesses(vk::AccessFlags2::DEPTH_STENCIL_ATTACHMENT_READ, vk::AccessFlags2::SHADER_SAMPLED_READ),
        ),
        S::ShaderReadOnly => (SHADER_STAGES, vk::AccessFlags2::SHADER_SAMPLED_READ),
        S::TransferSrc => (vk::PipelineStageFlags2::TRANSFER, vk::AccessFlags2::TRANSFER_READ),
        S::TransferDst => (vk::PipelineStageFlags2::TRANSFER, vk::AccessFlags2::TRANSFER_WRITE),
        S::Present => (vk::PipelineStageFlags2::BOTTOM_OF_PIPE, vk::AccessFlags2::NONE),
        S::StorageRead => (SHADER_STAGES, vk::AccessFlags2::SHADER_STORAGE_READ),
        S::StorageReadWrite => (
            SHADER_STAGES,
            accesses(vk::AccessFlags2::SHADER_STORAGE_READ, vk::AccessFlags2::SHADER_STORAGE_WRITE),
        ),
        S::IndirectRead => (vk::PipelineStageFlags2::DRAW_INDIRECT, vk::AccessFlags2::INDIRECT_COMMAND_READ),
    }
}

pub struct RgTransitionTable {
    entries: HashMap<(RgResourceState, RgResourceState), RgTransitionEntry>,
}

impl RgTransitionTable {
    /// The allowed transitions.
    pub const PAIRS: &'static [(RgResourceState, RgResourceState)] = {
        use RgResourceState::*;
        &[
            // creation
            (Undefined, TransferDst),
            (Undefined, General),
            (Undefined, ColorAttachment),
            (Undefined, DepthAttachment),
            (Undefined, DepthReadOnly),
            (Undefined, ShaderReadOnly),
            (Undefined, Present),
            (Undefined, StorageRead),
            (Undefined, StorageReadWrite),
            (Undefined, IndirectRead),
            // uploads and copies
            (TransferDst, TransferDst),
            (TransferDst, TransferSrc),
            (TransferDst, General),
            (TransferDst, ColorAttachment),
            (TransferDst, DepthAttachment),
            (TransferDst, DepthReadOnly),
            (TransferDst, ShaderReadOnly),
            (TransferDst, Present),
            (TransferDst, StorageRead),
            (TransferDst, StorageReadWrite),
            (TransferDst, IndirectRead),
            (TransferSrc, TransferDst),
            (TransferSrc, General),
            (TransferSrc, ColorAttachment),
            (TransferSrc, DepthAttachment),
            (TransferSrc, DepthReadOnly),
            (TransferSrc, ShaderReadOnly),
            // color
            (ColorAttachment, ColorAttachment),
            (ColorAttachment, General),
            (ColorAttachment, ShaderReadOnly),
            (ColorAttachment, TransferSrc),
            (ColorAttachment, Present),
            (Present, ColorAttachment),
            (Present, TransferDst),
            // depth
            (DepthAttachment, DepthAttachment),
            (DepthAttachment, DepthReadOnly),
            (DepthAttachment, ShaderReadOnly),
            (DepthAttachment, TransferSrc),
            (DepthReadOnly, DepthAttachment),
            (DepthReadOnly, TransferSrc),
            // sampled
            (ShaderReadOnly, General),
            (ShaderReadOnly, ColorAttachment),
            (ShaderReadOnly, DepthAttachment),
            (ShaderReadOnly, TransferSrc),
            (ShaderReadOnly, TransferDst),
            // storage images
            (General, General),
            (General, ColorAttachment),
            (General, ShaderReadOnly),
            (General, TransferSrc),
            (General, TransferDst),
            // buffers
            (StorageReadWrite, StorageReadWrite),
            (StorageReadWrite, StorageRead),
            (StorageReadWrite, IndirectRead),
            (StorageReadWrite, TransferSrc),
            (StorageReadWrite, TransferDst),
            (StorageRead, StorageReadWrite),
            (StorageRead, IndirectRead),
            (StorageRead, TransferDst),
            (IndirectRead, StorageReadWrite),
            (IndirectRead, StorageRead),
            (IndirectRead, TransferDst),
        ]
    };

    pub fn new() -> Self {
        let entries = Self::PAIRS
            .iter()
            .map(|&(old, new)| {
                let (src_stage, src_access) = src_scope(old);
                let (dst_stage, dst_access) = dst_scope(new);
                let entry = RgTransitionEntry {
                    src_stage,
                    src_access,
                    dst_stage,
                    dst_access,
                };
                ((old, new), entry)
            })
            .collect();
        Self { entries }
    }

    /// Process-wide instance.
    pub fn global() -> &'static Self {
        static TABLE: OnceLock<RgTransitionTable> = OnceLock::new();
        TABLE.get_or_init(Self::new)
    }

    #[inline]
    pub fn contains(&self, old: RgResourceState, new: RgResourceState) -> bool {
        self.entries.contains_key(&(old, new))
    }

    /// Barrier parameters for `old -> new`.
    ///
    /// `format` is `None` for buffers. Depth targets and depth formats get the
    /// depth aspect (plus stencil when the format has one).
    pub fn lookup(
        &self,
        old: RgResourceState,
        new: RgResourceState,
        format: Option<vk::Format>,
    ) -> Result<RgBarrierParams, RgTransitionError> {
        let entry = self.entries.get(&(old, new)).ok_or(RgTransitionError { old, new })?;

        let aspect = match format {
            None => vk::ImageAspectFlags::empty(),
            Some(format) => {
                let depth_target = matches!(new, RgResourceState::DepthAttachment | RgResourceState::DepthReadOnly);
                if depth_target || format::is_depth_format(format) {
                    let mut aspect = vk::ImageAspectFlags::DEPTH;
                    if format::has_stencil_component(format) {
                        aspect |= vk::ImageAspectFlags::STENCIL;
                    }
                    aspect
                } else {
                    vk::ImageAspectFlags::COLOR
                }
            }
        };

        Ok(RgBarrierParams {
            src_access: entry.src_access,
            dst_access: entry.dst_access,
            src_stage: entry.src_stage,
            dst_stage: entry.dst_stage,
            aspect,
            old_layout: old.layout(),
            new_layout: new.layout(),
        })
    }
}

impl Default for RgTransitionTable {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use RgResourceState as S;

    #[test]
    fn test_general_to_shader_read() {
        let table = RgTransitionTable::new();
        let params = table.lookup(S::General, S::ShaderReadOnly, Some(vk::Format::R16G16B16A16_SFLOAT)).unwrap();

        assert_eq!(params.old_layout, vk::ImageLayout::GENERAL);
        assert_eq!(params.new_layout, vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL);
        assert_eq!(params.aspect, vk::ImageAspectFlags::COLOR);
        assert!(params.src_access.contains(vk::AccessFlags2::SHADER_STORAGE_WRITE));
        assert_eq!(params.dst_access, vk::AccessFlags2::SHADER_SAMPLED_READ);
        assert!(params.dst_stage.contains(vk::PipelineStageFlags2::FRAGMENT_SHADER));
    }

    #[test]
    fn test_depth_aspect() {
        let table = RgTransitionTable::new();

        let params = table.lookup(S::Undefined, S::DepthAttachment, Some(vk::Format::D32_SFLOAT)).unwrap();
        assert_eq!(params.aspect, vk::ImageAspectFlags::DEPTH);

        let params = table.lookup(S::Undefined, S::DepthAttachment, Some(vk::Format::D24_UNORM_S8_UINT)).unwrap();
        assert_eq!(params.aspect, vk::ImageAspectFlags::DEPTH | vk::ImageAspectFlags::STENCIL);

        // a depth image sampled through SHADER_READ_ONLY still uses the depth aspect
        let params = table.lookup(S::DepthAttachment, S::ShaderReadOnly, Some(vk::Format::D32_SFLOAT)).unwrap();
        assert_eq!(params.aspect, vk::ImageAspectFlags::DEPTH);
    }

    #[test]
    fn test_buffer_has_no_aspect() {
        let params = RgTransitionTable::global().lookup(S::StorageReadWrite, S::IndirectRead, None).unwrap();
        assert!(params.aspect.is_empty());
        assert_eq!(params.dst_stage, vk::PipelineStageFlags2::DRAW_INDIRECT);
        assert_eq!(params.dst_access, vk::AccessFlags2::INDIRECT_COMMAND_READ);
    }

    #[test]
    fn test_undeclared_pair_fails() {
        let table = RgTransitionTable::new();
        let err = table.lookup(S::Present, S::General, Some(vk::Format::B8G8R8A8_SRGB)).unwrap_err();
        assert_eq!(err, RgTransitionError { old: S::Present, new: S::General });
        assert!(!table.contains(S::StorageRead, S::ShaderReadOnly));
    }

    #[test]
    fn test_pairs_are_unique() {
        let table = RgTransitionTable::new();
        assert_eq!(table.entries.len(), RgTransitionTable::PAIRS.len());
    }
}
