//! An open dataset with its operation registry and working vectors.
//!
//! Every core call takes the session explicitly, so several sessions can be
//! open at once. The working vectors belong to exactly one session and are
//! only touched through `&mut self`.

use super::executor::{ExecutionOutcome, PipelineExecutor};
use super::interpreter::ScriptInterpreter;
use super::output::ProcessedOutput;
use crate::acquisition::AcquisitionOrder;
use crate::config::ProcessingConfig;
use crate::domain::{
    DimensionSizes, ProcessingError, ProcessingResult, ProcessingVector, WorkingVectors,
};
use crate::indexing::{VectorGroup, VectorGroupIndexer};
use crate::numerics::{PhaseCycleMode, combine_group};
use crate::provider::RawDataProvider;
use crate::registry::{
    DimensionSelector, DimensionalOperationRegistry, OperationEntry, RegistryHistory,
};
use crate::script::{DatasetHeader, ScriptAssembler};
use tracing::{debug, info};

const NO_DATASET: &str = "no dataset is open";

#[derive(Default)]
pub struct ProcessingSession {
    dataset: Option<Box<dyn RawDataProvider>>,
    header: DatasetHeader,
    registry: DimensionalOperationRegistry,
    history: RegistryHistory,
    indexer: Option<VectorGroupIndexer>,
    modes: Vec<PhaseCycleMode>,
    vectors: WorkingVectors,
}

impl ProcessingSession {
    /// A session without a dataset. Registry edits work; processing does not.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn open(
        dataset: Box<dyn RawDataProvider>,
        config: &ProcessingConfig,
    ) -> ProcessingResult<Self> {
        let dims = dataset.dimensions();
        if dims.len() != dataset.n_dim() {
            return Err(ProcessingError::input_validation(
                "INPUT.DIMENSIONS",
                format!(
                    "dataset reports {} dimensions but describes {}",
                    dataset.n_dim(),
                    dims.len()
                ),
            ));
        }

        let order = match dataset.acquisition_order() {
            Some(text) if !text.trim().is_empty() => AcquisitionOrder::parse(text, dims.len())?,
            _ => AcquisitionOrder::default_for(dims.len(), &arrayed_dims(&dims)),
        };
        let mut indexer = VectorGroupIndexer::configure(&dims, &order)?;
        if let Some(schedule) = dataset.sample_schedule()? {
            indexer = indexer.with_schedule(schedule)?;
        }

        let modes = (1..dims.len())
            .filter(|dim| dims[*dim].complex)
            .map(|dim| config.mode_for(dim + 1))
            .collect();
        let header = dataset.dataset_header();
        info!(
            n_dim = dims.len(),
            rows = indexer.total_groups(),
            group_size = indexer.group_size(),
            order = %order,
            "dataset opened"
        );

        Ok(Self {
            dataset: Some(dataset),
            header,
            indexer: Some(indexer),
            modes,
            ..Self::default()
        })
    }

    pub fn has_dataset(&self) -> bool {
        self.dataset.is_some()
    }

    pub fn header(&self) -> &DatasetHeader {
        &self.header
    }

    pub fn header_mut(&mut self) -> &mut DatasetHeader {
        &mut self.header
    }

    pub fn indexer(&self) -> Option<&VectorGroupIndexer> {
        self.indexer.as_ref()
    }

    pub fn modes(&self) -> &[PhaseCycleMode] {
        &self.modes
    }

    pub fn registry(&self) -> &DimensionalOperationRegistry {
        &self.registry
    }

    pub fn replace_registry(&mut self, registry: DimensionalOperationRegistry) {
        self.history.record(&self.registry);
        self.registry = registry;
    }

    pub fn set_operation(
        &mut self,
        selector: &DimensionSelector,
        operation_text: &str,
        append_mode: bool,
        at_index: Option<isize>,
    ) -> ProcessingResult<Option<usize>> {
        let before = self.registry.clone();
        let index = self
            .registry
            .set_operation(selector, operation_text, append_mode, at_index)?;
        if index.is_some() {
            self.history.record(&before);
        }
        Ok(index)
    }

    pub fn remove_operation(
        &mut self,
        selector: &DimensionSelector,
        index: usize,
    ) -> Option<OperationEntry> {
        let before = self.registry.clone();
        let removed = self.registry.remove_operation(selector, index)?;
        self.history.record(&before);
        Some(removed)
    }

    pub fn undo(&mut self) -> bool {
        self.history.undo(&mut self.registry)
    }

    pub fn redo(&mut self) -> bool {
        self.history.redo(&mut self.registry)
    }

    pub fn vectors(&self) -> &WorkingVectors {
        &self.vectors
    }

    pub fn take_vectors(&mut self) -> WorkingVectors {
        std::mem::take(&mut self.vectors)
    }

    /// Replaces the working vectors with the combined vectors of one row.
    /// Out-of-range rows are clamped; returns the row actually loaded.
    pub fn load_row(&mut self, row: usize) -> ProcessingResult<usize> {
        let (dataset, indexer) = self.open_parts()?;
        let row = indexer.clamp_row(row);
        let vectors = read_row(dataset, indexer, &self.modes, row)?;
        self.vectors = vectors;
        Ok(row)
    }

    /// Loads every row of the dataset into the working vectors.
    pub fn load_all_rows(&mut self) -> ProcessingResult<usize> {
        let (dataset, indexer) = self.open_parts()?;
        let mut vectors = Vec::with_capacity(indexer.total_groups() * indexer.group_size());
        for row in 0..indexer.total_groups() {
            vectors.extend(read_row(dataset, indexer, &self.modes, row)?);
        }
        debug!(vectors = vectors.len(), "all rows loaded");
        self.vectors = vectors;
        Ok(self.vectors.len())
    }

    /// Full script for the registry and header.
    pub fn script(&self, include_trigger: bool) -> String {
        ScriptAssembler::new(&self.registry, &self.header).full_script(include_trigger)
    }

    /// Runs the operations of `selector` on the current working vectors.
    pub fn reprocess<I: ScriptInterpreter>(
        &mut self,
        executor: &mut PipelineExecutor<I>,
        selector: &DimensionSelector,
    ) -> ExecutionOutcome {
        let mut script: String = self
            .header
            .parameter_statements()
            .iter()
            .map(|statement| format!("{}\n", statement))
            .collect();
        script.push_str(&ScriptAssembler::new(&self.registry, &self.header).fragment(selector, true));
        self.process_script(executor, &script, true)
    }

    pub fn process_script<I: ScriptInterpreter>(
        &mut self,
        executor: &mut PipelineExecutor<I>,
        script: &str,
        run: bool,
    ) -> ExecutionOutcome {
        if self.dataset.is_none() {
            return ExecutionOutcome::FatallyFailed {
                message: NO_DATASET.to_string(),
            };
        }
        executor.execute(script, &mut self.vectors, run)
    }

    pub fn output(&self, source: impl Into<String>) -> ProcessedOutput {
        ProcessedOutput {
            source: source.into(),
            header: self.header.clone(),
            vectors: self.vectors.clone(),
        }
    }

    fn open_parts(&self) -> ProcessingResult<(&dyn RawDataProvider, &VectorGroupIndexer)> {
        match (&self.dataset, &self.indexer) {
            (Some(dataset), Some(indexer)) => Ok((dataset.as_ref(), indexer)),
            _ => Err(ProcessingError::pipeline("RUN.NO_DATASET", NO_DATASET)),
        }
    }
}

fn arrayed_dims(dims: &[DimensionSizes]) -> Vec<usize> {
    (1..dims.len()).filter(|dim| dims[*dim].is_arrayed()).collect()
}

fn read_row(
    dataset: &dyn RawDataProvider,
    indexer: &VectorGroupIndexer,
    modes: &[PhaseCycleMode],
    row: usize,
) -> ProcessingResult<WorkingVectors> {
    let group = indexer.get_next_group(row)?;
    let direct_size = dataset.dimension(0).map(|dim| dim.size).unwrap_or_default();

    let sampled: Option<VectorGroup> = if indexer.schedule().is_some() {
        indexer.convert_to_nus_group(&group, row)
    } else {
        Some(group.clone())
    };
    let Some(sampled) = sampled else {
        return Ok((0..indexer.group_size())
            .map(|_| ProcessingVector::zeros(direct_size).with_row(group.coordinates.clone()))
            .collect());
    };

    let raw = sampled
        .offsets
        .iter()
        .map(|offset| dataset.read_vector(0, *offset))
        .collect::<ProcessingResult<Vec<_>>>()?;
    Ok(combine_group(modes, &raw)?
        .into_iter()
        .map(|points| ProcessingVector::new(points).with_row(sampled.coordinates.clone()))
        .collect())
}

#[cfg(test)]
mod tests {
    use super::ProcessingSession;
    use crate::config::ProcessingConfig;
    use crate::numerics::PhaseCycleMode;
    use crate::pipeline::executor::{ExecutionOutcome, PipelineExecutor};
    use crate::pipeline::native::NativeInterpreter;
    use crate::provider::JsonRawDataset;
    use crate::registry::DimensionSelector;
    use num_complex::Complex64;

    fn dataset(order: &str, schedule: Option<&str>) -> Box<JsonRawDataset> {
        let vectors: Vec<Vec<Complex64>> = (0..8)
            .map(|index| vec![Complex64::new(index as f64, 0.0); 2])
            .collect();
        let schedule = schedule
            .map(|text| serde_json::from_str(text).expect("schedule json"))
            .unwrap_or(None);
        Box::new(JsonRawDataset {
            dims: vec![
                crate::domain::DimensionSizes::new(2, true),
                crate::domain::DimensionSizes::new(4, true),
            ],
            acquisition_order: Some(order.to_string()),
            schedule,
            labels: Vec::new(),
            sweep_widths: Vec::new(),
            vectors,
        })
    }

    #[test]
    fn rows_are_read_and_decombined() {
        let config = ProcessingConfig {
            decombination: vec![PhaseCycleMode::EchoAntiecho],
            ..ProcessingConfig::default()
        };
        let mut session =
            ProcessingSession::open(dataset("p1,d1", None), &config).expect("session should open");
        assert_eq!(session.modes(), &[PhaseCycleMode::EchoAntiecho]);

        let row = session.load_row(1).expect("row should load");
        assert_eq!(row, 1);
        let vectors = session.vectors();
        assert_eq!(vectors.len(), 2);
        assert_eq!(vectors[0].row, vec![1]);
        // echo-antiecho: real = X1 - X2, imag = i*X1 + i*X2 with X1 = 2, X2 = 3
        assert_eq!(vectors[0].points[0], Complex64::new(-1.0, 0.0));
        assert_eq!(vectors[1].points[0], Complex64::new(0.0, 5.0));
    }

    #[test]
    fn out_of_range_rows_clamp_to_last_row() {
        let mut session = ProcessingSession::open(dataset("p1,d1", None), &ProcessingConfig::default())
            .expect("session should open");
        assert_eq!(session.load_row(99).expect("row should load"), 3);
        assert_eq!(session.vectors()[0].points[0], Complex64::new(6.0, 0.0));
    }

    #[test]
    fn unsampled_rows_are_zero_filled() {
        let mut session = ProcessingSession::open(
            dataset("p1,d1", Some("[[0],[2],[3]]")),
            &ProcessingConfig::default(),
        )
        .expect("session should open");

        session.load_row(1).expect("row should load");
        assert!(session.vectors().iter().all(|vector| {
            vector.points.iter().all(|point| *point == Complex64::new(0.0, 0.0))
        }));

        session.load_row(2).expect("row should load");
        assert_eq!(session.vectors()[0].points[0], Complex64::new(2.0, 0.0));
        assert_eq!(session.vectors()[1].points[0], Complex64::new(3.0, 0.0));
    }

    #[test]
    fn all_rows_load_in_row_order() {
        let mut session = ProcessingSession::open(dataset("d1,p1", None), &ProcessingConfig::default())
            .expect("session should open");
        assert_eq!(session.load_all_rows().expect("rows should load"), 8);
        let rows: Vec<usize> = session.vectors().iter().map(|vector| vector.row[0]).collect();
        assert_eq!(rows, vec![0, 0, 1, 1, 2, 2, 3, 3]);
        // d1 fastest: the imaginary scans follow all four real ones.
        assert_eq!(session.vectors()[2].points[0], Complex64::new(1.0, 0.0));
        assert_eq!(session.vectors()[3].points[0], Complex64::new(5.0, 0.0));
    }

    #[test]
    fn reprocess_without_dataset_is_fatal() {
        let mut session = ProcessingSession::new();
        let d1 = DimensionSelector::dimension(1);
        session.set_operation(&d1, "FT()", false, None).expect("set");
        let mut executor = PipelineExecutor::new(NativeInterpreter::new());

        let outcome = session.reprocess(&mut executor, &d1);
        assert!(matches!(outcome, ExecutionOutcome::FatallyFailed { .. }));
        assert!(session.load_row(0).is_err());
    }

    #[test]
    fn reprocess_runs_the_selector_fragment() {
        let mut session = ProcessingSession::open(dataset("p1,d1", None), &ProcessingConfig::default())
            .expect("session should open");
        session.load_row(0).expect("row should load");
        let d1 = DimensionSelector::dimension(1);
        session.set_operation(&d1, "SCALE(factor=10)", false, None).expect("set");
        session
            .set_operation(&DimensionSelector::dimension(2), "SCALE(factor=0)", false, None)
            .expect("set");

        let mut executor = PipelineExecutor::new(NativeInterpreter::new());
        let outcome = session.reprocess(&mut executor, &d1);
        assert_eq!(outcome, ExecutionOutcome::Succeeded);
        assert_eq!(session.vectors()[1].points[0], Complex64::new(10.0, 0.0));
    }

    #[test]
    fn edits_are_undoable() {
        let mut session = ProcessingSession::new();
        let d1 = DimensionSelector::dimension(1);
        session.set_operation(&d1, "ZF()", false, None).expect("set");
        session.set_operation(&d1, "FT()", false, None).expect("set");
        assert_eq!(session.set_operation(&d1, "SB()", false, Some(-2)).expect("no-op"), None);

        assert!(session.undo());
        assert_eq!(session.registry().get(&d1).len(), 1);
        assert!(session.redo());
        assert_eq!(session.registry().get(&d1).len(), 2);
        assert!(session.remove_operation(&d1, 0).is_some());
        assert!(session.undo());
        assert_eq!(session.registry().get(&d1)[0].name(), "ZF");
    }
}
