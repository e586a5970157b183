//! Reference interpreter that runs scripts with the built-in vector kernels.
//!
//! Each block's operations are applied to every working vector, in script
//! order. The dwell time used by `EXPD` comes from the `sw` of the block's
//! leading dimension in the `PARAMS` header statements.

use super::cancel::CancellationToken;
use super::interpreter::{InterpreterError, ScriptInterpreter};
use crate::domain::WorkingVectors;
use crate::numerics::kernels;
use crate::registry::{DimensionSelector, OperationEntry};
use crate::script::BodyLine;
use std::collections::HashMap;
use tracing::debug;

/// A validated statement of the native operation set.
#[derive(Debug, Clone, Copy, PartialEq)]
enum NativeOperation {
    ZeroFill { size: Option<usize> },
    Exponential { line_broadening: f64 },
    SineBell { offset: f64, end: f64, power: f64 },
    Phase { ph0: f64, ph1: f64 },
    Fourier,
    Real,
    Scale { factor: f64 },
}

impl NativeOperation {
    fn from_entry(entry: &OperationEntry) -> Result<Self, String> {
        let name = entry.name().to_ascii_uppercase();
        let operation = match name.as_str() {
            "ZF" => {
                accept_only(entry, &["size"])?;
                let size = match entry.arg("size") {
                    Some(value) => Some(
                        value
                            .as_usize()
                            .ok_or_else(|| format!("size of {} must be an integer", entry))?,
                    ),
                    None => None,
                };
                if let Some(size) = size
                    && size > kernels::MAX_ZERO_FILL_POINTS
                {
                    return Err(format!(
                        "ZF size {} exceeds the {} point limit",
                        size,
                        kernels::MAX_ZERO_FILL_POINTS
                    ));
                }
                Self::ZeroFill { size }
            }
            "EXPD" => {
                accept_only(entry, &["lb"])?;
                Self::Exponential {
                    line_broadening: number(entry, "lb")?.unwrap_or(0.0),
                }
            }
            "SB" => {
                accept_only(entry, &["offset", "end", "power"])?;
                Self::SineBell {
                    offset: number(entry, "offset")?.unwrap_or(0.5),
                    end: number(entry, "end")?.unwrap_or(1.0),
                    power: number(entry, "power")?.unwrap_or(1.0),
                }
            }
            "PHASE" => {
                accept_only(entry, &["ph0", "ph1"])?;
                Self::Phase {
                    ph0: number(entry, "ph0")?.unwrap_or(0.0),
                    ph1: number(entry, "ph1")?.unwrap_or(0.0),
                }
            }
            "FT" => {
                accept_only(entry, &[])?;
                Self::Fourier
            }
            "REAL" => {
                accept_only(entry, &[])?;
                Self::Real
            }
            "SCALE" => {
                accept_only(entry, &["factor"])?;
                Self::Scale {
                    factor: number(entry, "factor")?
                        .ok_or_else(|| format!("{} needs a factor argument", entry))?,
                }
            }
            _ => return Err(format!("unknown operation '{}'", entry.name())),
        };
        Ok(operation)
    }

    fn apply(self, vectors: &mut WorkingVectors, dwell: f64) -> Result<(), String> {
        for vector in vectors.iter_mut() {
            match self {
                Self::ZeroFill { size } => {
                    let target = match size {
                        Some(size) => size,
                        None => vector
                            .len()
                            .checked_mul(2)
                            .and_then(usize::checked_next_power_of_two)
                            .filter(|target| *target <= kernels::MAX_ZERO_FILL_POINTS)
                            .ok_or_else(|| {
                                format!("ZF of a {} point vector exceeds the point limit", vector.len())
                            })?,
                    };
                    if target < vector.len() {
                        return Err(format!(
                            "ZF size {} is smaller than the {} point vector",
                            target,
                            vector.len()
                        ));
                    }
                    kernels::zero_fill(&mut vector.points, target)
                        .map_err(|error| format!("ZF to {} points failed: {}", target, error))?;
                }
                Self::Exponential { line_broadening } => {
                    kernels::apply_exponential(&mut vector.points, line_broadening, dwell)
                }
                Self::SineBell { offset, end, power } => {
                    kernels::apply_sine_bell(&mut vector.points, offset, end, power)
                }
                Self::Phase { ph0, ph1 } => kernels::apply_phase(&mut vector.points, ph0, ph1),
                Self::Fourier => {
                    kernels::fourier_transform(&mut vector.points);
                    vector.frequency_domain = true;
                }
                Self::Real => kernels::real_part(&mut vector.points),
                Self::Scale { factor } => kernels::scale(&mut vector.points, factor),
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone)]
struct PlannedOperation {
    index: usize,
    selector: DimensionSelector,
    entry: OperationEntry,
    operation: NativeOperation,
}

#[derive(Debug, Clone, Default)]
pub struct NativeInterpreter {
    sweep_widths: HashMap<usize, f64>,
    program: Vec<PlannedOperation>,
}

impl NativeInterpreter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn operation_count(&self) -> usize {
        self.program.len()
    }

    fn dwell_for(&self, selector: &DimensionSelector) -> f64 {
        let dim = selector.leading_number().unwrap_or(1);
        match self.sweep_widths.get(&dim) {
            Some(sweep_width) if *sweep_width > 0.0 => 1.0 / sweep_width,
            _ => 1.0,
        }
    }
}

impl ScriptInterpreter for NativeInterpreter {
    fn configure(&mut self, header: &[String]) -> Result<(), InterpreterError> {
        self.sweep_widths.clear();
        for statement in header {
            let entry = OperationEntry::parse(statement)
                .map_err(|error| InterpreterError::Setup(error.message().to_string()))?;
            match entry.name().to_ascii_uppercase().as_str() {
                "SOURCE" | "DESTINATION" | "ACQORDER" => {}
                "PARAMS" => {
                    let dim = entry
                        .arg("dim")
                        .and_then(|value| value.as_usize())
                        .ok_or_else(|| {
                            InterpreterError::Setup(format!(
                                "'{}' needs an integer dim argument",
                                statement
                            ))
                        })?;
                    if let Some(sweep_width) = entry.arg("sw").and_then(|value| value.as_f64()) {
                        self.sweep_widths.insert(dim, sweep_width);
                    }
                }
                _ => {
                    return Err(InterpreterError::Setup(format!(
                        "unsupported header statement '{}'",
                        statement
                    )));
                }
            }
        }
        Ok(())
    }

    /// Validates every operation; the first bad one fails with its index.
    fn load(&mut self, body: &[BodyLine]) -> Result<(), InterpreterError> {
        self.program.clear();
        let mut current: Option<DimensionSelector> = None;
        let mut index = 0;
        for line in body {
            match line {
                BodyLine::Block {
                    source_line,
                    payload,
                } => {
                    let selector = DimensionSelector::from_payload(payload).map_err(|error| {
                        InterpreterError::Setup(format!(
                            "line {}: {}",
                            source_line,
                            error.message()
                        ))
                    })?;
                    current = Some(selector);
                }
                BodyLine::Operation { source_line, text } => {
                    let Some(selector) = current.clone() else {
                        return Err(InterpreterError::Setup(format!(
                            "line {}: operation outside a DIM block",
                            source_line
                        )));
                    };
                    let failed = |message: String| InterpreterError::Operation {
                        index,
                        message: format!("line {}: {}", source_line, message),
                    };
                    let entry = OperationEntry::parse(text)
                        .map_err(|error| failed(error.message().to_string()))?;
                    let operation = NativeOperation::from_entry(&entry).map_err(failed)?;
                    self.program.push(PlannedOperation {
                        index,
                        selector,
                        entry,
                        operation,
                    });
                    index += 1;
                }
            }
        }
        Ok(())
    }

    fn run(
        &mut self,
        vectors: &mut WorkingVectors,
        cancel: &CancellationToken,
    ) -> Result<(), InterpreterError> {
        for planned in &self.program {
            if cancel.is_cancelled() {
                return Err(InterpreterError::Cancelled);
            }
            debug!(index = planned.index, selector = %planned.selector, operation = %planned.entry, "applying operation");
            planned
                .operation
                .apply(vectors, self.dwell_for(&planned.selector))
                .map_err(|message| InterpreterError::Operation {
                    index: planned.index,
                    message,
                })?;
        }
        Ok(())
    }
}

fn accept_only(entry: &OperationEntry, keys: &[&str]) -> Result<(), String> {
    match entry.args().iter().find(|arg| !keys.contains(&arg.key.as_str())) {
        Some(arg) => Err(format!("{} does not accept argument '{}'", entry.name(), arg.key)),
        None => Ok(()),
    }
}

fn number(entry: &OperationEntry, key: &str) -> Result<Option<f64>, String> {
    match entry.arg(key) {
        Some(value) => value
            .as_f64()
            .map(Some)
            .ok_or_else(|| format!("{} of {} must be a number", key, entry.name())),
        None => Ok(None),
    }
}

#[cfg(test)]
mod tests {
    use super::NativeInterpreter;
    use crate::domain::ProcessingVector;
    use crate::pipeline::cancel::CancellationToken;
    use crate::pipeline::interpreter::{InterpreterError, ScriptInterpreter};
    use crate::script::split_script;
    use num_complex::Complex64;

    fn vectors() -> Vec<ProcessingVector> {
        vec![ProcessingVector::new(vec![Complex64::new(1.0, 0.0); 4])]
    }

    fn submit(interpreter: &mut NativeInterpreter, script: &str) -> Result<(), InterpreterError> {
        let sections = split_script(script);
        interpreter.configure(&sections.header)?;
        interpreter.load(&sections.body)
    }

    #[test]
    fn operations_run_in_order_on_every_vector() {
        let mut interpreter = NativeInterpreter::new();
        submit(&mut interpreter, "DIM(1)\nZF(size=8)\nSCALE(factor=2)\nDIM()\nREAL()\n")
            .expect("script should load");
        assert_eq!(interpreter.operation_count(), 3);

        let mut vectors = vectors();
        vectors.push(ProcessingVector::new(vec![Complex64::new(0.0, 1.0); 4]));
        interpreter
            .run(&mut vectors, &CancellationToken::new())
            .expect("run should succeed");

        assert_eq!(vectors[0].len(), 8);
        assert_eq!(vectors[0].points[0], Complex64::new(2.0, 0.0));
        assert_eq!(vectors[0].points[7], Complex64::new(0.0, 0.0));
        assert_eq!(vectors[1].points[0], Complex64::new(0.0, 0.0));
    }

    #[test]
    fn malformed_operations_fail_at_load_with_their_index() {
        let mut interpreter = NativeInterpreter::new();
        let error = submit(&mut interpreter, "DIM(1)\nZF()\nFT()\nSB(((\nRUN()\n")
            .expect_err("malformed operation should be rejected");
        assert!(matches!(error, InterpreterError::Operation { index: 2, .. }));

        let error = submit(&mut interpreter, "DIM(1)\nWARP(speed=9)\n")
            .expect_err("unknown operation should be rejected");
        assert_eq!(
            error,
            InterpreterError::Operation {
                index: 0,
                message: "line 2: unknown operation 'WARP'".to_string()
            }
        );
    }

    #[test]
    fn bad_arguments_fail_the_operation() {
        for script in [
            "DIM(1)\nSCALE()\n",
            "DIM(1)\nSCALE(factor=abc)\n",
            "DIM(1)\nFT(inverse=1)\n",
            "DIM(1)\nZF(size=1152921504606846976)\n",
        ] {
            let mut interpreter = NativeInterpreter::new();
            let error = submit(&mut interpreter, script).expect_err(script);
            assert!(matches!(error, InterpreterError::Operation { index: 0, .. }), "{script}");
        }

        let mut interpreter = NativeInterpreter::new();
        submit(&mut interpreter, "DIM(1)\nFT()\nZF(size=2)\n").expect("sizes are checked at run");
        let error = interpreter
            .run(&mut vectors(), &CancellationToken::new())
            .expect_err("shrinking zero fill should fail");
        assert!(matches!(error, InterpreterError::Operation { index: 1, .. }));
    }

    #[test]
    fn unsupported_header_and_orphan_operations_are_setup_errors() {
        let mut interpreter = NativeInterpreter::new();
        let error = submit(&mut interpreter, "LAUNCH(now=1)\nDIM(1)\nFT()\n")
            .expect_err("unknown header statement");
        assert!(matches!(error, InterpreterError::Setup(_)));

        let error = submit(&mut interpreter, "PARAMS(sw=100)\n").expect_err("missing dim");
        assert!(matches!(error, InterpreterError::Setup(_)));

        let error = interpreter
            .load(&split_script("DIM(0)\nFT()\n").body)
            .expect_err("dimension 0 is invalid");
        assert!(matches!(error, InterpreterError::Setup(_)));
    }

    #[test]
    fn cancellation_stops_before_the_next_operation() {
        let mut interpreter = NativeInterpreter::new();
        submit(&mut interpreter, "DIM(1)\nSCALE(factor=3)\n").expect("script should load");
        let cancel = CancellationToken::new();
        cancel.cancel();

        let mut vectors = vectors();
        let error = interpreter
            .run(&mut vectors, &cancel)
            .expect_err("cancelled run should stop");
        assert_eq!(error, InterpreterError::Cancelled);
        assert_eq!(vectors[0].points[0], Complex64::new(1.0, 0.0));
    }

    #[test]
    fn exponential_uses_sweep_width_from_params() {
        let mut interpreter = NativeInterpreter::new();
        submit(
            &mut interpreter,
            "PARAMS(dim=1, label='H1', size=4, sw=10, sf=0, ref=0, skip=0)\nDIM(1)\nEXPD(lb=1)\n",
        )
        .expect("script should load");

        let mut vectors = vectors();
        interpreter
            .run(&mut vectors, &CancellationToken::new())
            .expect("run should succeed");
        let expected = (-std::f64::consts::PI * 0.1).exp();
        assert!((vectors[0].points[1].re - expected).abs() < 1.0e-12);
    }
}
