use super::CliError;
use super::helpers::*;
use nmrproc_core::acquisition::AcquisitionOrder;
use nmrproc_core::config::ProcessingConfig;
use nmrproc_core::domain::{DimensionSizes, ProcessingError, parse_array_sizes};
use nmrproc_core::indexing::{SampleSchedule, VectorGroupIndexer};
use nmrproc_core::pipeline::{
    BatchJob, NativeInterpreter, PipelineExecutor, ProcessingSession, write_processed_output,
};
use nmrproc_core::provider::{JsonRawDataset, RawDataProvider};
use nmrproc_core::registry::DimensionSelector;
use nmrproc_core::script::{
    BatchPlan, ScriptAssembler, default_script_path, parse_script, read_script, write_script,
};
use std::path::PathBuf;
use tracing::info;

#[derive(clap::Args)]
pub(super) struct OrderArgs {
    /// Number of dataset dimensions
    #[arg(long)]
    ndim: usize,

    /// Acquisition order, e.g. `p1,d1,p2,d2` or a legacy token such as `321`
    order: String,
}

#[derive(clap::Args)]
pub(super) struct GroupsArgs {
    /// Comma separated sizes, acquisition dimension first
    #[arg(long)]
    sizes: String,

    /// Comma separated complex flags, one per dimension
    #[arg(long)]
    complex: String,

    /// Acquisition order; defaults to phases, then delays, then arrays
    #[arg(long)]
    order: Option<String>,

    /// Comma separated array sizes, 0 for dimensions that are not arrayed
    #[arg(long)]
    arrays: Option<String>,

    /// Non-uniform sampling schedule file
    #[arg(long)]
    schedule: Option<PathBuf>,

    /// Row range `A..B` (end exclusive) or a single row
    #[arg(long, default_value = "0..1")]
    rows: String,
}

#[derive(clap::Args)]
pub(super) struct CheckScriptArgs {
    /// Script file
    script: PathBuf,
}

#[derive(clap::ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub(super) enum ScriptVariant {
    Full,
    Fragment,
    Batch,
}

#[derive(clap::Args)]
pub(super) struct AssembleArgs {
    /// Script whose DIM blocks provide the operations
    #[arg(long)]
    registry_script: PathBuf,

    /// Dataset header (JSON)
    #[arg(long)]
    header: Option<PathBuf>,

    #[arg(long, value_enum, default_value_t = ScriptVariant::Full)]
    variant: ScriptVariant,

    /// Selector rendered by the fragment variant, e.g. `D1`
    #[arg(long)]
    selector: Option<String>,

    /// Leave out the trailing RUN()
    #[arg(long)]
    no_trigger: bool,

    /// Input datasets of the batch variant
    #[arg(long, num_args = 1..)]
    inputs: Vec<PathBuf>,

    /// Output directory of the batch variant
    #[arg(long, default_value = ".")]
    output_dir: PathBuf,

    /// Merge per-file outputs in the batch variant
    #[arg(long)]
    merge: bool,

    /// Write the script here instead of stdout
    #[arg(long)]
    output: Option<PathBuf>,
}

#[derive(clap::Args)]
pub(super) struct ProcessArgs {
    /// JSON raw dataset
    #[arg(long)]
    dataset: PathBuf,

    /// Processing script
    #[arg(long)]
    script: PathBuf,

    /// Processed output file
    #[arg(long)]
    output: PathBuf,

    /// Also save the full script next to the dataset
    #[arg(long)]
    save_script: bool,
}

#[derive(clap::Args)]
pub(super) struct BatchArgs {
    /// Processing script, or a batch script from `assemble --variant batch`
    /// with `--datasets-from-script`
    #[arg(long)]
    script: PathBuf,

    /// Directory receiving one output per dataset
    #[arg(long, required_unless_present = "datasets_from_script")]
    output_dir: Option<PathBuf>,

    /// Take datasets, destinations and merge target from the batch script
    #[arg(long, conflicts_with_all = ["output_dir", "merge", "datasets"])]
    datasets_from_script: bool,

    /// Merge all outputs into one file
    #[arg(long)]
    merge: bool,

    /// Only process datasets matching one of these glob patterns
    #[arg(long)]
    pattern: Vec<String>,

    /// JSON raw datasets
    #[arg(required_unless_present = "datasets_from_script")]
    datasets: Vec<PathBuf>,
}

pub(super) fn run_order_command(args: OrderArgs) -> Result<(), CliError> {
    let order = AcquisitionOrder::parse(&args.order, args.ndim)?;
    println!("{}", order.short_form());
    if order.is_legacy() {
        match order.legacy_delay_order(args.ndim) {
            Some(delays) => println!(
                "legacy delay nesting: {}",
                delays
                    .iter()
                    .map(ToString::to_string)
                    .collect::<Vec<_>>()
                    .join(",")
            ),
            None => println!("legacy token not interpreted; default order applies"),
        }
    }
    Ok(())
}

pub(super) fn run_groups_command(args: GroupsArgs) -> Result<(), CliError> {
    let sizes = parse_sizes(&args.sizes, "--sizes")?;
    let complex = parse_flags(&args.complex, "--complex")?;
    if complex.len() != sizes.len() {
        return Err(CliError::Usage(format!(
            "--complex lists {} flags for {} dimensions",
            complex.len(),
            sizes.len()
        )));
    }
    let arrays = match &args.arrays {
        Some(text) => parse_array_sizes(text)?,
        None => vec![0; sizes.len()],
    };
    if arrays.len() != sizes.len() {
        return Err(CliError::Usage(format!(
            "--arrays lists {} sizes for {} dimensions",
            arrays.len(),
            sizes.len()
        )));
    }

    let dims: Vec<DimensionSizes> = sizes
        .iter()
        .zip(&complex)
        .zip(&arrays)
        .map(|((size, complex), array)| DimensionSizes::arrayed(*size, *complex, *array))
        .collect();
    let order = match &args.order {
        Some(text) => AcquisitionOrder::parse(text, dims.len())?,
        None => {
            let arrayed: Vec<usize> = (1..dims.len())
                .filter(|dim| dims[*dim].is_arrayed())
                .collect();
            AcquisitionOrder::default_for(dims.len(), &arrayed)
        }
    };

    let mut indexer = VectorGroupIndexer::configure(&dims, &order)?;
    if let Some(path) = &args.schedule {
        let schedule = SampleSchedule::parse(&read_text(path, "schedule")?)?;
        indexer = indexer.with_schedule(schedule)?;
    }

    for row in parse_row_range(&args.rows)? {
        let group = indexer.get_next_group(row)?;
        let group = match indexer.schedule() {
            Some(_) => indexer.convert_to_nus_group(&group, row),
            None => Some(group),
        };
        match group {
            Some(group) => println!(
                "row {}: {}",
                row,
                group
                    .offsets
                    .iter()
                    .map(ToString::to_string)
                    .collect::<Vec<_>>()
                    .join(" ")
            ),
            None => println!("row {}: not sampled", row),
        }
    }
    Ok(())
}

pub(super) fn run_check_script_command(args: CheckScriptArgs) -> Result<(), CliError> {
    let text = read_script(&args.script).map_err(|error| CliError::Processing(error.into()))?;
    let parsed = parse_script(&text)?;
    for statement in &parsed.header {
        println!("header {}", statement);
    }
    for (selector, operations) in parsed.registry.iter() {
        println!("{}\t{} operations", selector, operations.len());
    }
    println!("trigger: {}", if parsed.has_trigger { "yes" } else { "no" });
    Ok(())
}

pub(super) fn run_assemble_command(
    args: AssembleArgs,
    config: &ProcessingConfig,
) -> Result<(), CliError> {
    let text =
        read_script(&args.registry_script).map_err(|error| CliError::Processing(error.into()))?;
    let registry = parse_script(&text)?.registry;
    let header = read_header(args.header.as_deref())?;
    let assembler = ScriptAssembler::new(&registry, &header);
    let include_trigger = !args.no_trigger;

    let script = match args.variant {
        ScriptVariant::Full => assembler.full_script(include_trigger),
        ScriptVariant::Fragment => {
            let selector: DimensionSelector = args
                .selector
                .as_deref()
                .ok_or_else(|| CliError::Usage("--selector is required for fragments".to_string()))?
                .parse()?;
            assembler.fragment(&selector, include_trigger)
        }
        ScriptVariant::Batch => {
            if args.inputs.is_empty() {
                return Err(CliError::Usage(
                    "--inputs is required for batch scripts".to_string(),
                ));
            }
            let merge_output = args
                .merge
                .then(|| args.output_dir.join(config.merged_output_file()));
            assembler.batch_script(&BatchPlan {
                inputs: args.inputs.clone(),
                output_dir: args.output_dir.clone(),
                output_extension: config.output_extension.clone(),
                merge_output,
            })
        }
    };

    match &args.output {
        Some(path) => {
            write_script(path, &script).map_err(|error| CliError::Processing(error.into()))?
        }
        None => print!("{}", script),
    }
    Ok(())
}

pub(super) fn run_process_command(
    args: ProcessArgs,
    config: &ProcessingConfig,
) -> Result<(), CliError> {
    let dataset = JsonRawDataset::load(&args.dataset)?;
    let text = read_script(&args.script).map_err(|error| CliError::Processing(error.into()))?;
    let registry = parse_script(&text)?.registry;

    let mut session = ProcessingSession::open(Box::new(dataset), config)?;
    session.header_mut().source = Some(args.dataset.display().to_string());
    session.header_mut().destination = Some(args.output.display().to_string());
    session.replace_registry(registry);
    session.load_all_rows()?;

    let script = session.script(true);
    if args.save_script {
        let path = default_script_path(
            &args.dataset,
            &config.script_suffix,
            &config.script_extension,
        );
        write_script(&path, &script).map_err(|error| CliError::Processing(error.into()))?;
        println!("script saved to {}", path.display());
    }

    info!(dataset = %args.dataset.display(), vectors = session.vectors().len(), "processing dataset");
    let mut executor = PipelineExecutor::new(NativeInterpreter::new());
    session
        .process_script(&mut executor, &script, true)
        .into_result()?;
    write_processed_output(
        &args.output,
        &session.output(args.dataset.display().to_string()),
    )?;
    println!(
        "processed {} vectors -> {}",
        session.vectors().len(),
        args.output.display()
    );
    Ok(())
}

pub(super) fn run_batch_command(args: BatchArgs, config: &ProcessingConfig) -> Result<(), CliError> {
    let text = read_script(&args.script).map_err(|error| CliError::Processing(error.into()))?;
    let (job, datasets) = match &args.output_dir {
        Some(output_dir) if !args.datasets_from_script => (
            BatchJob::new(&text, output_dir, config)?.with_merge(args.merge),
            args.datasets.clone(),
        ),
        _ => BatchJob::from_batch_script(&text, config)?,
    };
    let job = job.with_patterns(&args.pattern)?;

    info!(
        datasets = datasets.len(),
        script = %args.script.display(),
        "batch started"
    );
    let mut executor = PipelineExecutor::new(NativeInterpreter::new());
    let report = job.run(&datasets, &mut executor, |path| {
        JsonRawDataset::load(path).map(|dataset| Box::new(dataset) as Box<dyn RawDataProvider>)
    })?;

    for output in &report.outputs {
        println!("wrote {}", output.display());
    }
    for skipped in &report.skipped {
        println!("skipped {}", skipped.display());
    }
    if let Some(merged) = &report.merged {
        println!("merged {}", merged.display());
    }
    for failure in &report.failures {
        eprintln!("failed {}: {}", failure.input.display(), failure.message);
    }
    println!(
        "batch: {} processed, {} skipped, {} failed",
        report.outputs.len(),
        report.skipped.len(),
        report.failures.len()
    );

    if report.failures.is_empty() {
        return Ok(());
    }
    Err(ProcessingError::pipeline(
        "RUN.BATCH",
        format!(
            "{} of {} datasets failed",
            report.failures.len(),
            report.failures.len() + report.outputs.len()
        ),
    )
    .into())
}
