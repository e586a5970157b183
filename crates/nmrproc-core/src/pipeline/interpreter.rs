use super::cancel::CancellationToken;
use crate::domain::WorkingVectors;
use crate::script::BodyLine;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum InterpreterError {
    /// Rejected before any operation ran.
    #[error("interpreter setup failed: {0}")]
    Setup(String),
    /// Operation `index` (0-based, counting operation lines only) failed.
    #[error("operation {index} failed: {message}")]
    Operation { index: usize, message: String },
    #[error("processing cancelled")]
    Cancelled,
}

/// The processing engine that script text is submitted to.
///
/// Calls are blocking and not reentrant: `configure`, then `load`, then
/// optionally `run` for the submitted script.
pub trait ScriptInterpreter {
    fn configure(&mut self, header: &[String]) -> Result<(), InterpreterError>;

    fn load(&mut self, body: &[BodyLine]) -> Result<(), InterpreterError>;

    fn run(
        &mut self,
        vectors: &mut WorkingVectors,
        cancel: &CancellationToken,
    ) -> Result<(), InterpreterError>;
}
