//! Runs one registry script over many datasets.

use super::executor::{ExecutionOutcome, PipelineExecutor};
use super::interpreter::ScriptInterpreter;
use super::output::{merge_outputs, write_processed_output};
use super::session::ProcessingSession;
use crate::config::ProcessingConfig;
use crate::domain::{ProcessingError, ProcessingResult};
use crate::provider::RawDataProvider;
use crate::registry::DimensionalOperationRegistry;
use crate::registry::ArgValue;
use crate::script::{BatchPlan, derive_output_path, parse_batch_script, parse_script};
use globset::{Glob, GlobSet, GlobSetBuilder};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchFailure {
    pub input: PathBuf,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct BatchReport {
    pub outputs: Vec<PathBuf>,
    pub skipped: Vec<PathBuf>,
    pub failures: Vec<BatchFailure>,
    pub merged: Option<PathBuf>,
    pub cancelled: bool,
}

#[derive(Debug, Clone)]
pub struct BatchJob {
    registry: DimensionalOperationRegistry,
    config: ProcessingConfig,
    output_dir: PathBuf,
    merge_output: Option<PathBuf>,
    filter: Option<GlobSet>,
}

impl BatchJob {
    /// Parses `script` up front so a malformed script fails before any file
    /// is touched. Header statements of the script are replaced per dataset.
    pub fn new(
        script: &str,
        output_dir: impl Into<PathBuf>,
        config: &ProcessingConfig,
    ) -> ProcessingResult<Self> {
        Ok(Self {
            registry: parse_script(script)?.registry,
            config: config.clone(),
            output_dir: output_dir.into(),
            merge_output: None,
            filter: None,
        })
    }

    /// Rebuilds a job from a script written by
    /// [`ScriptAssembler::batch_script`](crate::script::ScriptAssembler::batch_script),
    /// returning it with the script's inputs. Every section must share one
    /// processing body and name the destination this job would derive.
    pub fn from_batch_script(
        script: &str,
        config: &ProcessingConfig,
    ) -> ProcessingResult<(Self, Vec<PathBuf>)> {
        let batch = parse_batch_script(script)?;
        let mut inputs = Vec::new();
        let mut destinations = Vec::new();
        for (position, dataset) in batch.datasets.iter().enumerate() {
            let section = position + 1;
            if dataset.registry != batch.datasets[0].registry {
                return Err(invalid_batch(format!(
                    "section {} does not share the processing body of section 1",
                    section
                )));
            }
            for (name, paths) in [("SOURCE", &mut inputs), ("DESTINATION", &mut destinations)] {
                let file = dataset.file_argument(name).ok_or_else(|| {
                    invalid_batch(format!("section {} has no {}(file=...)", section, name))
                })?;
                paths.push(PathBuf::from(file));
            }
        }

        let first = &destinations[0];
        let mut config = config.clone();
        config.output_extension = first
            .extension()
            .and_then(|value| value.to_str())
            .unwrap_or_default()
            .to_string();
        let mut job = Self {
            registry: batch.datasets[0].registry.clone(),
            config,
            output_dir: first.parent().map(Path::to_path_buf).unwrap_or_default(),
            merge_output: None,
            filter: None,
        };

        if job.plan(&inputs).output_paths() != destinations {
            return Err(invalid_batch(
                "destinations do not follow the batch output naming",
            ));
        }
        if let Some(merge) = &batch.merge {
            let files = merge.arg("files").and_then(ArgValue::as_text_list);
            if files.map(|files| files.iter().map(PathBuf::from).collect::<Vec<_>>())
                != Some(destinations)
            {
                return Err(invalid_batch("MERGE files must list every destination in order"));
            }
            let output = merge.arg("output").and_then(ArgValue::as_text).ok_or_else(|| {
                invalid_batch("MERGE needs an output='...' argument")
            })?;
            job.merge_output = Some(PathBuf::from(output));
        }
        Ok((job, inputs))
    }

    pub fn with_merge(mut self, merge: bool) -> Self {
        self.merge_output = merge.then(|| self.output_dir.join(self.config.merged_output_file()));
        self
    }

    /// Keeps only inputs matching at least one glob pattern.
    pub fn with_patterns(mut self, patterns: &[String]) -> ProcessingResult<Self> {
        if patterns.is_empty() {
            self.filter = None;
            return Ok(self);
        }
        let mut builder = GlobSetBuilder::new();
        for pattern in patterns {
            let glob = Glob::new(pattern).map_err(|source| {
                ProcessingError::input_validation(
                    "INPUT.GLOB",
                    format!("invalid glob pattern '{}': {}", pattern, source),
                )
            })?;
            builder.add(glob);
        }
        let filter = builder.build().map_err(|source| {
            ProcessingError::input_validation("INPUT.GLOB", source.to_string())
        })?;
        self.filter = Some(filter);
        Ok(self)
    }

    pub fn accepts(&self, input: &Path) -> bool {
        self.filter
            .as_ref()
            .is_none_or(|filter| filter.is_match(input))
    }

    pub fn merged_output_path(&self) -> Option<PathBuf> {
        self.merge_output.clone()
    }

    pub fn plan(&self, inputs: &[PathBuf]) -> BatchPlan {
        BatchPlan {
            inputs: inputs
                .iter()
                .filter(|input| self.accepts(input))
                .cloned()
                .collect(),
            output_dir: self.output_dir.clone(),
            output_extension: self.config.output_extension.clone(),
            merge_output: self.merged_output_path(),
        }
    }

    /// Processes `inputs` in order. Cancellation is checked between files and
    /// between operations; a cancelled file writes nothing, and outputs are
    /// only ever created complete.
    pub fn run<I, F>(
        &self,
        inputs: &[PathBuf],
        executor: &mut PipelineExecutor<I>,
        mut open: F,
    ) -> ProcessingResult<BatchReport>
    where
        I: ScriptInterpreter,
        F: FnMut(&Path) -> ProcessingResult<Box<dyn RawDataProvider>>,
    {
        let mut report = BatchReport::default();
        let mut planned = self.plan(inputs).output_paths().into_iter();
        let targets: Vec<Option<PathBuf>> = inputs
            .iter()
            .map(|input| if self.accepts(input) { planned.next() } else { None })
            .collect();

        for (input, target) in inputs.iter().zip(targets) {
            if executor.cancellation().is_cancelled() {
                report.cancelled = true;
                break;
            }
            let Some(output) = target else {
                report.skipped.push(input.clone());
                continue;
            };
            if output != derive_output_path(input, &self.output_dir, &self.config.output_extension) {
                warn!(
                    input = %input.display(),
                    output = %output.display(),
                    "output name already taken, using a numbered one"
                );
            }

            match self.process_one(input, &output, executor, &mut open) {
                Ok(()) => {
                    info!(input = %input.display(), output = %output.display(), "dataset processed");
                    report.outputs.push(output);
                }
                Err(_) if executor.cancellation().is_cancelled() => {
                    report.cancelled = true;
                    break;
                }
                Err(error) => {
                    warn!(input = %input.display(), error = %error, "dataset failed");
                    report.failures.push(BatchFailure {
                        input: input.clone(),
                        message: error.to_string(),
                    });
                }
            }
        }

        if report.cancelled {
            info!(processed = report.outputs.len(), "batch cancelled");
            return Ok(report);
        }
        if let Some(merged) = self.merged_output_path()
            && !report.outputs.is_empty()
        {
            merge_outputs(&report.outputs, &merged)?;
            report.merged = Some(merged);
        }
        Ok(report)
    }

    fn process_one<I, F>(
        &self,
        input: &Path,
        output: &Path,
        executor: &mut PipelineExecutor<I>,
        open: &mut F,
    ) -> ProcessingResult<()>
    where
        I: ScriptInterpreter,
        F: FnMut(&Path) -> ProcessingResult<Box<dyn RawDataProvider>>,
    {
        let mut session = ProcessingSession::open(open(input)?, &self.config)?;
        session.header_mut().source = Some(input.display().to_string());
        session.header_mut().destination = Some(output.display().to_string());
        session.replace_registry(self.registry.clone());
        session.load_all_rows()?;

        let script = session.script(true);
        match session.process_script(executor, &script, true) {
            ExecutionOutcome::Succeeded => {}
            failed => failed.into_result()?,
        }
        write_processed_output(output, &session.output(input.display().to_string()))
    }
}

fn invalid_batch(message: impl Into<String>) -> ProcessingError {
    ProcessingError::input_validation("INPUT.BATCH_SCRIPT", message)
}
