use nmrproc_core::config::ProcessingConfig;
use nmrproc_core::domain::ProcessingResult;
use nmrproc_core::pipeline::{
    BatchJob, ExecutionOutcome, NativeInterpreter, PipelineExecutor, ProcessingSession,
    read_processed_output,
};
use nmrproc_core::provider::{JsonRawDataset, RawDataProvider};
use nmrproc_core::registry::DimensionSelector;
use num_complex::Complex64;
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

const HSQC: &str = r#"{
  "dims": [
    { "size": 4, "complex": true },
    { "size": 2, "complex": true }
  ],
  "acquisitionOrder": "p1,d1",
  "labels": ["H1", "N15"],
  "sweepWidths": [4000.0, 1000.0],
  "vectors": [
    [[1.0, 0.0], [0.5, 0.0], [0.25, 0.0], [0.125, 0.0]],
    [[0.0, 1.0], [0.0, 0.5], [0.0, 0.25], [0.0, 0.125]],
    [[2.0, 0.0], [1.0, 0.0], [0.5, 0.0], [0.25, 0.0]],
    [[0.0, 2.0], [0.0, 1.0], [0.0, 0.5], [0.0, 0.25]]
  ]
}"#;

fn open_dataset(_path: &Path) -> ProcessingResult<Box<dyn RawDataProvider>> {
    Ok(Box::new(JsonRawDataset::from_json(HSQC)?))
}

fn dir_entries(dir: &Path) -> Vec<PathBuf> {
    let mut entries: Vec<PathBuf> = fs::read_dir(dir)
        .expect("directory should be readable")
        .map(|entry| entry.expect("entry").path())
        .collect();
    entries.sort();
    entries
}

#[test]
fn session_processes_script_end_to_end() {
    let dataset = JsonRawDataset::from_json(HSQC).expect("dataset");
    let mut session =
        ProcessingSession::open(Box::new(dataset), &ProcessingConfig::default()).expect("open");
    let d1: DimensionSelector = "D1".parse().expect("selector");
    for operation in ["ZF(size=8)", "SCALE(factor=0.5)"] {
        session
            .set_operation(&d1, operation, true, None)
            .expect("operation should be added");
    }
    assert_eq!(session.load_all_rows().expect("rows"), 4);

    let mut executor = PipelineExecutor::new(NativeInterpreter::new());
    let script = session.script(true);
    assert_eq!(
        session.process_script(&mut executor, &script, true),
        ExecutionOutcome::Succeeded
    );
    assert!(session.vectors().iter().all(|vector| vector.len() == 8));
    assert_eq!(session.vectors()[0].points[0], Complex64::new(0.5, 0.0));
}

#[test]
fn failed_reprocess_keeps_the_loaded_row() {
    let dataset = JsonRawDataset::from_json(HSQC).expect("dataset");
    let mut session =
        ProcessingSession::open(Box::new(dataset), &ProcessingConfig::default()).expect("open");
    session.load_row(0).expect("row 0");
    let before = session.vectors().clone();

    let d1: DimensionSelector = "D1".parse().expect("selector");
    for operation in ["SB()", "ZF(size=2)"] {
        session
            .set_operation(&d1, operation, true, None)
            .expect("operation should be added");
    }
    let mut executor = PipelineExecutor::new(NativeInterpreter::new());
    let outcome = session.reprocess(&mut executor, &d1);

    assert!(matches!(
        outcome,
        ExecutionOutcome::PartiallyFailed { op_index: 1, .. }
    ));
    assert_eq!(session.vectors(), &before);
}

#[test]
fn batch_writes_outputs_and_merges() {
    let temp = TempDir::new().expect("tempdir");
    let output_dir = temp.path().join("out");
    fs::create_dir_all(&output_dir).expect("output dir");
    let inputs = vec![temp.path().join("exp1.json"), temp.path().join("exp2.json")];

    let job = BatchJob::new("DIM(1)\nFT()\nRUN()\n", &output_dir, &ProcessingConfig::default())
        .expect("job")
        .with_merge(true);
    let mut executor = PipelineExecutor::new(NativeInterpreter::new());
    let report = job.run(&inputs, &mut executor, open_dataset).expect("batch");

    assert!(!report.cancelled);
    assert!(report.failures.is_empty());
    assert_eq!(report.outputs.len(), 2);
    assert_eq!(report.merged, Some(output_dir.join("merged.nv")));
    let processed = read_processed_output(&output_dir.join("exp1.nv")).expect("output");
    assert!(processed.vectors.iter().all(|vector| vector.frequency_domain));
}

#[test]
fn cancelled_batch_leaves_no_partial_outputs() {
    let temp = TempDir::new().expect("tempdir");
    let output_dir = temp.path().join("out");
    fs::create_dir_all(&output_dir).expect("output dir");
    let inputs = vec![
        temp.path().join("exp1.json"),
        temp.path().join("exp2.json"),
        temp.path().join("exp3.json"),
    ];
    let stale = output_dir.join("exp2.nv");
    fs::write(&stale, "previous run").expect("stale output");

    let job = BatchJob::new(
        "DIM(1)\nSB()\nFT()\nRUN()\n",
        &output_dir,
        &ProcessingConfig::default(),
    )
    .expect("job")
    .with_merge(true);
    let mut executor = PipelineExecutor::new(NativeInterpreter::new());
    let token = executor.cancellation().clone();
    let report = job
        .run(&inputs, &mut executor, |path| {
            if path.ends_with("exp2.json") {
                token.cancel();
            }
            open_dataset(path)
        })
        .expect("batch");

    assert!(report.cancelled);
    assert_eq!(report.outputs, vec![output_dir.join("exp1.nv")]);
    assert_eq!(report.merged, None);
    assert_eq!(
        fs::read_to_string(&stale).expect("stale output"),
        "previous run"
    );
    assert_eq!(
        dir_entries(&output_dir),
        vec![output_dir.join("exp1.nv"), stale]
    );
}
