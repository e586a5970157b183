//! Renders a registry into script text.

use super::RUN_STATEMENT;
use super::header::{DatasetHeader, file_statement};
use super::naming::derive_output_paths;
use crate::registry::{ArgValue, DimensionSelector, DimensionalOperationRegistry, OperationEntry};
use std::path::PathBuf;
use tracing::debug;

/// Inputs of a multi-file script.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchPlan {
    pub inputs: Vec<PathBuf>,
    pub output_dir: PathBuf,
    pub output_extension: String,
    /// Combined output written from every per-file output, when set.
    pub merge_output: Option<PathBuf>,
}

impl BatchPlan {
    /// One distinct output per input, numbered when base names collide.
    pub fn output_paths(&self) -> Vec<PathBuf> {
        derive_output_paths(&self.inputs, &self.output_dir, &self.output_extension)
    }
}

pub struct ScriptAssembler<'a> {
    registry: &'a DimensionalOperationRegistry,
    header: &'a DatasetHeader,
}

impl<'a> ScriptAssembler<'a> {
    pub fn new(registry: &'a DimensionalOperationRegistry, header: &'a DatasetHeader) -> Self {
        Self { registry, header }
    }

    /// Emits one `DIM(<payload>)` block per non-empty selector, in registry
    /// order. Selectors naming a dimension above `dimension_count` are left out.
    pub fn build(&self, dimension_count: usize, include_trigger: bool) -> String {
        let mut lines = Vec::new();
        for (selector, operations) in self.registry.iter() {
            if operations.is_empty() {
                continue;
            }
            if selector.dims().iter().any(|dim| *dim > dimension_count) {
                debug!(selector = %selector, dimension_count, "selector beyond dataset skipped");
                continue;
            }
            push_block(&mut lines, selector, operations);
        }
        if include_trigger {
            lines.push(RUN_STATEMENT.to_string());
        }
        to_text(lines)
    }

    /// Output position of every raw dimension, `None` for skipped ones.
    pub fn map_to_dataset(&self) -> Vec<Option<usize>> {
        let mut next = 0;
        self.header
            .dims
            .iter()
            .map(|dim| {
                if dim.skip {
                    None
                } else {
                    next += 1;
                    Some(next - 1)
                }
            })
            .collect()
    }

    pub fn full_script(&self, include_trigger: bool) -> String {
        let mut text = to_text(
            self.header
                .statements()
                .iter()
                .map(OperationEntry::to_line)
                .collect(),
        );
        text.push_str(&self.build(self.header.dims.len(), include_trigger));
        text
    }

    /// Operations of one selector without any header, for reprocessing a
    /// single working vector.
    pub fn fragment(&self, selector: &DimensionSelector, include_trigger: bool) -> String {
        let mut lines = Vec::new();
        let operations = self.registry.get(selector);
        if !operations.is_empty() {
            push_block(&mut lines, selector, operations);
        }
        if include_trigger {
            lines.push(RUN_STATEMENT.to_string());
        }
        to_text(lines)
    }

    /// One section per input (files, parameters, blocks, trigger) followed by
    /// an optional `MERGE(...)` of the per-file outputs.
    pub fn batch_script(&self, plan: &BatchPlan) -> String {
        let body = self.build(self.header.dims.len(), true);
        let parameters: Vec<String> = self
            .header
            .parameter_statements()
            .iter()
            .map(OperationEntry::to_line)
            .collect();
        let outputs = plan.output_paths();

        let mut text = String::new();
        for (input, output) in plan.inputs.iter().zip(&outputs) {
            text.push_str(&format!("# {}\n", input.display()));
            let mut lines = vec![
                file_statement("SOURCE", &input.display().to_string()).to_line(),
                file_statement("DESTINATION", &output.display().to_string()).to_line(),
            ];
            lines.extend(parameters.iter().cloned());
            text.push_str(&to_text(lines));
            text.push_str(&body);
        }

        if let Some(merged) = &plan.merge_output {
            let files = outputs
                .iter()
                .map(|output| ArgValue::Quoted(output.display().to_string()).to_string())
                .collect();
            let merge = OperationEntry::new("MERGE")
                .with_arg("files", ArgValue::List(files))
                .with_arg("output", ArgValue::Quoted(merged.display().to_string()));
            text.push_str(&merge.to_line());
            text.push('\n');
        }
        text
    }
}

fn push_block(lines: &mut Vec<String>, selector: &DimensionSelector, operations: &[OperationEntry]) {
    lines.push(format!("DIM({})", selector.payload()));
    lines.extend(operations.iter().map(OperationEntry::to_line));
}

fn to_text(lines: Vec<String>) -> String {
    lines.into_iter().map(|line| line + "\n").collect()
}

#[cfg(test)]
mod tests {
    use super::{BatchPlan, ScriptAssembler};
    use crate::registry::{ArgValue, DimensionSelector, DimensionalOperationRegistry};
    use crate::script::header::{DatasetHeader, DimensionHeader};
    use crate::script::parser::{parse_batch_script, parse_script};
    use proptest::prelude::*;
    use std::path::PathBuf;

    fn registry() -> DimensionalOperationRegistry {
        let mut registry = DimensionalOperationRegistry::new();
        for (selector, operation) in [
            ("D2", "FT()"),
            ("D1", "SB(offset=0.5)"),
            ("D1", "FT()"),
            ("D_ALL", "SCALE(factor=2)"),
            ("D4", "FT()"),
            ("P2", "PHASE(ph0=90)"),
        ] {
            let selector: DimensionSelector = selector.parse().expect("selector");
            registry
                .set_operation(&selector, operation, false, None)
                .expect("operation");
        }
        registry
    }

    fn header() -> DatasetHeader {
        DatasetHeader {
            source: Some("data/hsqc/fid".to_string()),
            destination: None,
            acquisition_order: None,
            dims: vec![
                DimensionHeader::new("H1", 1024, 8000.0),
                DimensionHeader {
                    skip: true,
                    ..DimensionHeader::new("N15", 64, 2000.0)
                },
                DimensionHeader::new("C13", 32, 4000.0),
            ],
        }
    }

    #[test]
    fn build_emits_blocks_in_selector_order() {
        let registry = registry();
        let header = header();
        let text = ScriptAssembler::new(&registry, &header).build(3, true);
        assert_eq!(
            text,
            "DIM(1)\nSB(offset=0.5)\nFT()\nDIM(2)\nFT()\nDIM()\nSCALE(factor=2)\nDIM(P2)\nPHASE(ph0=90)\nRUN()\n"
        );
    }

    #[test]
    fn skipped_dimensions_map_to_none() {
        let registry = registry();
        let header = header();
        assert_eq!(
            ScriptAssembler::new(&registry, &header).map_to_dataset(),
            vec![Some(0), None, Some(1)]
        );
    }

    #[test]
    fn full_script_starts_with_header_statements() {
        let registry = registry();
        let header = header();
        let text = ScriptAssembler::new(&registry, &header).full_script(false);
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0], "SOURCE(file='data/hsqc/fid')");
        assert!(lines[1].starts_with("PARAMS(dim=1, label='H1'"));
        assert_eq!(lines[4], "DIM(1)");
        assert!(!text.contains("RUN()"));
        assert!(!text.contains("DIM(4)"));
    }

    #[test]
    fn fragment_has_no_header() {
        let registry = registry();
        let header = header();
        let assembler = ScriptAssembler::new(&registry, &header);
        let d1: DimensionSelector = "D1".parse().expect("selector");
        assert_eq!(
            assembler.fragment(&d1, true),
            "DIM(1)\nSB(offset=0.5)\nFT()\nRUN()\n"
        );
        let d9: DimensionSelector = "D9".parse().expect("selector");
        assert_eq!(assembler.fragment(&d9, false), "");
    }

    #[test]
    fn batch_script_derives_outputs_and_merges() {
        let registry = registry();
        let header = header();
        let plan = BatchPlan {
            inputs: vec![
                PathBuf::from("runs/exp1/fid"),
                PathBuf::from("runs/exp2.json"),
            ],
            output_dir: PathBuf::from("out"),
            output_extension: "nv".to_string(),
            merge_output: Some(PathBuf::from("out/merged.nv")),
        };
        let text = ScriptAssembler::new(&registry, &header).batch_script(&plan);

        assert!(text.contains("SOURCE(file='runs/exp1/fid')\nDESTINATION(file='out/exp1.nv')\n"));
        assert!(text.contains("DESTINATION(file='out/exp2.nv')"));
        assert_eq!(text.matches("RUN()").count(), 2);
        assert!(text.ends_with("MERGE(files=['out/exp1.nv','out/exp2.nv'], output='out/merged.nv')\n"));
    }

    #[test]
    fn batch_script_parses_back_into_its_plan() {
        let registry = registry();
        let header = header();
        let assembler = ScriptAssembler::new(&registry, &header);
        let plan = BatchPlan {
            inputs: vec![
                PathBuf::from("runs/a/fid"),
                PathBuf::from("other/a.json"),
                PathBuf::from("runs/it's.json"),
            ],
            output_dir: PathBuf::from("out"),
            output_extension: "nv".to_string(),
            merge_output: Some(PathBuf::from("out/merged.nv")),
        };
        let batch = parse_batch_script(&assembler.batch_script(&plan))
            .expect("batch script should parse");

        let body = parse_script(&assembler.build(3, false)).expect("body should parse");
        assert_eq!(batch.datasets.len(), 3);
        assert!(batch.datasets.iter().all(|dataset| dataset.registry == body.registry));

        let sources: Vec<PathBuf> = batch
            .datasets
            .iter()
            .filter_map(|dataset| dataset.file_argument("SOURCE").map(PathBuf::from))
            .collect();
        let destinations: Vec<PathBuf> = batch
            .datasets
            .iter()
            .filter_map(|dataset| dataset.file_argument("DESTINATION").map(PathBuf::from))
            .collect();
        assert_eq!(sources, plan.inputs);
        assert_eq!(destinations, plan.output_paths());
        assert_eq!(
            destinations,
            vec![
                PathBuf::from("out/a.nv"),
                PathBuf::from("out/a_2.nv"),
                PathBuf::from("out/it's.nv"),
            ]
        );

        let merge = batch.merge.expect("merge statement");
        assert_eq!(
            merge.arg("files").and_then(ArgValue::as_text_list),
            Some(vec![
                "out/a.nv".to_string(),
                "out/a_2.nv".to_string(),
                "out/it's.nv".to_string(),
            ])
        );
        assert_eq!(merge.arg("output").and_then(ArgValue::as_text), Some("out/merged.nv"));
    }

    #[test]
    fn parse_reconstructs_built_registry() {
        let registry = registry();
        let header = header();
        let text = ScriptAssembler::new(&registry, &header).build(usize::MAX, true);
        let parsed = parse_script(&text).expect("built script should parse");
        assert_eq!(parsed.registry, registry);
    }

    fn selector_strategy() -> impl Strategy<Value = DimensionSelector> {
        prop_oneof![
            (1_usize..12).prop_map(DimensionSelector::dimension),
            (1_usize..12).prop_map(DimensionSelector::plane),
            Just(DimensionSelector::all()),
            (1_usize..6, 6_usize..12).prop_map(|(first, second)| {
                DimensionSelector::combined(&[first, second]).expect("distinct dims")
            }),
        ]
    }

    fn operation_strategy() -> impl Strategy<Value = String> {
        prop_oneof![
            Just("FT()".to_string()),
            (0_u32..4096).prop_map(|size| format!("ZF(size={})", size)),
            (-180_i32..180).prop_map(|ph0| format!("PHASE(ph0={}, ph1=0)", ph0)),
            "[a-z]{1,6}".prop_map(|label| format!("NOTE(text='{}', tags=[a,b])", label)),
        ]
    }

    proptest! {
        #[test]
        fn assemble_then_parse_is_identity(
            edits in prop::collection::vec((selector_strategy(), operation_strategy()), 0..24)
        ) {
            let mut registry = DimensionalOperationRegistry::new();
            for (selector, operation) in &edits {
                registry.set_operation(selector, operation, true, None).expect("operation");
            }
            let header = DatasetHeader::default();
            let text = ScriptAssembler::new(&registry, &header).build(usize::MAX, true);
            let parsed = parse_script(&text).expect("built script should parse");

            prop_assert_eq!(&parsed.registry, &registry);
            let original: Vec<String> = registry.iter().map(|(selector, _)| selector.to_string()).collect();
            let rebuilt: Vec<String> = parsed.registry.iter().map(|(selector, _)| selector.to_string()).collect();
            prop_assert_eq!(original, rebuilt);
        }
    }
}
