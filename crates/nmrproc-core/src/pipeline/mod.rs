//! Script execution: interpreter seam, executor, sessions and batch jobs.

pub mod batch;
pub mod cancel;
pub mod executor;
pub mod interpreter;
pub mod native;
pub mod output;
pub mod session;

pub use batch::{BatchFailure, BatchJob, BatchReport};
pub use cancel::CancellationToken;
pub use executor::{ExecutionOutcome, ExecutorState, PipelineExecutor, VectorSnapshot};
pub use interpreter::{InterpreterError, ScriptInterpreter};
pub use native::NativeInterpreter;
pub use output::{
    MergedOutput, ProcessedOutput, merge_outputs, read_processed_output, write_processed_output,
};
pub use session::ProcessingSession;
