use ember_gfx::error::GfxError;
use thiserror::Error;

use crate::state::RgResourceState;

pub type RgResult<T> = Result<T, FrameGraphError>;

/// Errors of graph construction and execution.
///
/// Everything except [`FrameGraphError::Gfx`] and [`FrameGraphError::PassExecution`]
/// is a configuration error: the registered passes do not describe a valid graph.
#[derive(Debug, Error)]
pub enum FrameGraphError {
    #[error("resource `{name}` re-declared with an incompatible creation spec: {reason}")]
    IncompatibleSpec { name: String, reason: String },

    #[error("format {format:?} of resource `{name}` does not support the requested usage")]
    UnsupportedFormat { name: String, format: ash::vk::Format },

    #[error("pass `{pass}`: resource `{resource}` cannot transition {old} -> {new}")]
    UnsupportedTransition {
        pass: String,
        resource: String,
        old: RgResourceState,
        new: RgResourceState,
    },

    #[error("pass `{pass}` uses resource `{resource}`, which no pass creates and nothing imported")]
    UnknownResource { pass: String, resource: String },

    #[error("no resource named `{0}`")]
    NoSuchResource(String),

    #[error("no pass named `{0}`")]
    UnknownPass(String),

    #[error("pass `{0}` is already registered")]
    DuplicatePass(String),

    #[error("pass `{0}` already has an execute callback")]
    CallbackAlreadySet(String),

    #[error("pass `{0}` has no execute callback")]
    MissingCallback(String),

    #[error("pass `{pass}` accessed `{resource}` without declaring it")]
    UndeclaredAccess { pass: String, resource: String },

    #[error("pass `{pass}`, resource `{resource}`: {reason}")]
    InvalidUsage { pass: String, resource: String, reason: String },

    #[error("pass `{pass}`: {reason}")]
    InvalidPass { pass: String, reason: String },

    #[error("resource `{name}` cannot be released: {reason}")]
    ReleaseRefused { name: String, reason: &'static str },

    #[error("pipeline creation for pass `{pass}` failed: {reason}")]
    Pipeline { pass: String, reason: String },

    #[error("pass `{pass}` declares resource `{resource}`: {source}")]
    Declaration {
        pass: String,
        resource: String,
        source: Box<FrameGraphError>,
    },

    #[error("pass `{pass}`: resource `{resource}` has no instance {instance}")]
    MissingInstance { pass: String, resource: String, instance: usize },

    #[error("frame-in-flight index {fif_index} out of range, the vault holds {fif_count} frames")]
    InvalidFrame { fif_index: usize, fif_count: usize },

    #[error("pass `{pass}` failed: {reason}")]
    PassExecution { pass: String, reason: String },

    #[error(transparent)]
    Gfx(#[from] GfxError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transition_error_names_everything() {
        let err = FrameGraphError::UnsupportedTransition {
            pass: "Present".to_string(),
            resource: "FinalImage".to_string(),
            old: RgResourceState::StorageRead,
            new: RgResourceState::ShaderReadOnly,
        };
        let message = err.to_string();
        assert!(message.contains("Present"));
        assert!(message.contains("FinalImage"));
        assert!(message.contains("StorageRead -> ShaderReadOnly"));
    }
}
