use super::cancel::CancellationToken;
use super::interpreter::{InterpreterError, ScriptInterpreter};
use crate::domain::{ProcessingError, ProcessingResult, WorkingVectors};
use crate::script::split_script;
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecutorState {
    Idle,
    Running,
    Succeeded,
    PartiallyFailed,
    FatallyFailed,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExecutionOutcome {
    Succeeded,
    /// Operation `op_index` failed; the working vectors were restored.
    PartiallyFailed { op_index: usize, message: String },
    /// Nothing ran; the working vectors were restored.
    FatallyFailed { message: String },
}

impl ExecutionOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Succeeded)
    }

    pub fn state(&self) -> ExecutorState {
        match self {
            Self::Succeeded => ExecutorState::Succeeded,
            Self::PartiallyFailed { .. } => ExecutorState::PartiallyFailed,
            Self::FatallyFailed { .. } => ExecutorState::FatallyFailed,
        }
    }

    pub fn into_result(self) -> ProcessingResult<()> {
        match self {
            Self::Succeeded => Ok(()),
            Self::PartiallyFailed { op_index, message } => Err(ProcessingError::pipeline(
                "RUN.OPERATION",
                format!("operation {} failed: {}", op_index, message),
            )),
            Self::FatallyFailed { message } => {
                Err(ProcessingError::pipeline("RUN.FATAL", message))
            }
        }
    }
}

/// Copy of the working vectors taken before a script is submitted.
#[derive(Debug, Clone, PartialEq)]
pub struct VectorSnapshot(WorkingVectors);

impl VectorSnapshot {
    pub fn take(vectors: &WorkingVectors) -> Self {
        Self(vectors.clone())
    }

    pub fn restore_into(&self, vectors: &mut WorkingVectors) {
        vectors.clone_from(&self.0);
    }
}

/// Submits scripts to an interpreter and keeps the working vectors
/// consistent: any failure leaves them exactly as they were before the call.
///
/// Callers own the vectors exclusively for the duration of `execute`.
pub struct PipelineExecutor<I> {
    interpreter: I,
    state: ExecutorState,
    cancel: CancellationToken,
}

impl<I: ScriptInterpreter> PipelineExecutor<I> {
    pub fn new(interpreter: I) -> Self {
        Self::with_cancellation(interpreter, CancellationToken::new())
    }

    pub fn with_cancellation(interpreter: I, cancel: CancellationToken) -> Self {
        Self {
            interpreter,
            state: ExecutorState::Idle,
            cancel,
        }
    }

    pub fn state(&self) -> ExecutorState {
        self.state
    }

    pub fn cancellation(&self) -> &CancellationToken {
        &self.cancel
    }

    pub fn interpreter(&self) -> &I {
        &self.interpreter
    }

    pub fn execute(
        &mut self,
        script: &str,
        vectors: &mut WorkingVectors,
        run: bool,
    ) -> ExecutionOutcome {
        self.state = ExecutorState::Idle;
        let snapshot = VectorSnapshot::take(vectors);
        let sections = split_script(script);

        if let Err(error) = self.interpreter.configure(&sections.header) {
            return self.fail(&snapshot, vectors, error);
        }
        if let Err(error) = self.interpreter.load(&sections.body) {
            return self.fail(&snapshot, vectors, error);
        }

        if run {
            self.transition(ExecutorState::Running);
            snapshot.restore_into(vectors);
            if let Err(error) = self.interpreter.run(vectors, &self.cancel) {
                return self.fail(&snapshot, vectors, error);
            }
        }

        self.transition(ExecutorState::Succeeded);
        ExecutionOutcome::Succeeded
    }

    fn fail(
        &mut self,
        snapshot: &VectorSnapshot,
        vectors: &mut WorkingVectors,
        error: InterpreterError,
    ) -> ExecutionOutcome {
        snapshot.restore_into(vectors);
        let outcome = match error {
            InterpreterError::Operation { index, message } => ExecutionOutcome::PartiallyFailed {
                op_index: index,
                message,
            },
            other => ExecutionOutcome::FatallyFailed {
                message: other.to_string(),
            },
        };
        self.transition(outcome.state());
        outcome
    }

    fn transition(&mut self, next: ExecutorState) {
        debug!(from = ?self.state, to = ?next, "executor state");
        self.state = next;
    }
}
