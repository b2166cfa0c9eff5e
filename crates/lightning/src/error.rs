use crate::types::ShaderStage;

/// Failures of the `Uninitialized → Ready` transition.
///
/// All of them are terminal for the mounted instance: the effect draws nothing
/// and a fresh mount is the only way to recover.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SetupError {
    #[error("GPU context unavailable: {reason}")]
    ContextUnavailable { reason: String },
    #[error("{stage} shader failed to compile: {log}")]
    ShaderCompile { stage: ShaderStage, log: String },
    #[error("shader program failed to link: {log}")]
    ProgramLink { log: String },
}

impl SetupError {
    pub(crate) fn context(reason: impl Into<String>) -> Self {
        SetupError::ContextUnavailable {
            reason: reason.into(),
        }
    }
}
