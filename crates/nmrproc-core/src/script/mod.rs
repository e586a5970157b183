pub mod assembler;
pub mod header;
pub mod naming;
pub mod parser;
pub mod persist;

pub use assembler::{BatchPlan, ScriptAssembler};
pub use header::{DatasetHeader, DimensionHeader};
pub use naming::{
    dataset_base_name, default_script_path, derive_output_path, derive_output_paths,
};
pub use parser::{
    BodyLine, ParsedBatchScript, ParsedScript, ScriptSections, parse_batch_script, parse_script,
    split_script,
};
pub use persist::{ScriptIoError, read_script, write_bytes_atomically, write_script};

/// Statement that triggers execution of everything submitted before it.
pub const RUN_STATEMENT: &str = "RUN()";
