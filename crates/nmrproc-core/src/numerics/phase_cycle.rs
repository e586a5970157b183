//! Phase-cycle decombination of interleaved raw scans.
//!
//! Every mode is a fixed linear map from two raw complex scans `X1`, `X2` to the
//! real and imaginary components of one indirect dimension. The map is stored
//! as eight coefficients applied to the sub-vectors `[X1, i*X1, X2, i*X2]`:
//! the first four produce the real component, the last four the imaginary one.

use crate::domain::{ProcessingError, ProcessingResult};
use num_complex::Complex64;
use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};
use std::str::FromStr;

const HYPERCOMPLEX: [f64; 8] = [1.0, 0.0, 0.0, 0.0, 0.0, 0.0, 1.0, 0.0];
const HYPERCOMPLEX_REVERSED: [f64; 8] = [1.0, 0.0, 0.0, 0.0, 0.0, 0.0, -1.0, 0.0];
const ECHO_ANTIECHO: [f64; 8] = [1.0, 0.0, -1.0, 0.0, 0.0, 1.0, 0.0, 1.0];
const ECHO_ANTIECHO_REVERSED: [f64; 8] = [1.0, 0.0, 1.0, 0.0, 0.0, 1.0, 0.0, -1.0];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum PhaseCycleMode {
    #[serde(rename = "hyper")]
    Hypercomplex,
    #[serde(rename = "hyper-r")]
    HypercomplexReversed,
    #[serde(rename = "echo-antiecho")]
    EchoAntiecho,
    #[serde(rename = "echo-antiecho-r")]
    EchoAntiechoReversed,
    #[default]
    #[serde(rename = "default")]
    Default,
}

impl PhaseCycleMode {
    pub const ALL: [Self; 5] = [
        Self::Hypercomplex,
        Self::HypercomplexReversed,
        Self::EchoAntiecho,
        Self::EchoAntiechoReversed,
        Self::Default,
    ];

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Hypercomplex => "hyper",
            Self::HypercomplexReversed => "hyper-r",
            Self::EchoAntiecho => "echo-antiecho",
            Self::EchoAntiechoReversed => "echo-antiecho-r",
            Self::Default => "default",
        }
    }

    /// The coefficient table, or `None` for plain real/imaginary pairing.
    pub const fn coefficients(self) -> Option<&'static [f64; 8]> {
        match self {
            Self::Hypercomplex => Some(&HYPERCOMPLEX),
            Self::HypercomplexReversed => Some(&HYPERCOMPLEX_REVERSED),
            Self::EchoAntiecho => Some(&ECHO_ANTIECHO),
            Self::EchoAntiechoReversed => Some(&ECHO_ANTIECHO_REVERSED),
            Self::Default => None,
        }
    }

    /// Coefficient positions negated relative to the non-reversed table.
    pub const fn sign_flipped_positions(self) -> &'static [usize] {
        match self {
            Self::HypercomplexReversed => &[6],
            Self::EchoAntiechoReversed => &[2, 7],
            _ => &[],
        }
    }

    /// Applies the transform to one pair of raw scans.
    fn transform(self, first: &[Complex64], second: &[Complex64]) -> CombinedVector {
        let Some(coefficients) = self.coefficients() else {
            return CombinedVector {
                real: first.to_vec(),
                imag: second.to_vec(),
            };
        };

        let apply = |weights: &[f64]| -> Vec<Complex64> {
            let first_weight = Complex64::new(weights[0], weights[1]);
            let second_weight = Complex64::new(weights[2], weights[3]);
            first
                .iter()
                .zip(second)
                .map(|(x1, x2)| first_weight * x1 + second_weight * x2)
                .collect()
        };

        CombinedVector {
            real: apply(&coefficients[..4]),
            imag: apply(&coefficients[4..]),
        }
    }
}

impl Display for PhaseCycleMode {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str((*self).as_str())
    }
}

impl FromStr for PhaseCycleMode {
    type Err = ProcessingError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let normalized = value.trim().to_ascii_lowercase();
        Self::ALL
            .into_iter()
            .find(|mode| mode.as_str() == normalized)
            .ok_or_else(|| {
                ProcessingError::input_validation(
                    "INPUT.PHASE_MODE",
                    format!("unknown phase-cycle mode '{}'", value),
                )
            })
    }
}

/// Real and imaginary components of one indirect dimension, each a complex
/// vector along the acquisition dimension.
#[derive(Debug, Clone, PartialEq)]
pub struct CombinedVector {
    pub real: Vec<Complex64>,
    pub imag: Vec<Complex64>,
}

impl CombinedVector {
    pub fn len(&self) -> usize {
        self.real.len()
    }

    pub fn is_empty(&self) -> bool {
        self.real.is_empty()
    }
}

/// Combines the two raw scans of a single complex indirect dimension.
pub fn combine(mode: PhaseCycleMode, raw: &[Vec<Complex64>]) -> ProcessingResult<CombinedVector> {
    let [first, second] = raw else {
        return Err(ProcessingError::input_validation(
            "INPUT.DECOMBINE_COUNT",
            format!("{} mode combines 2 raw vectors, got {}", mode, raw.len()),
        ));
    };
    check_lengths(raw)?;
    Ok(mode.transform(first, second))
}

/// Combines a full vector group of `2^m` raw scans, one mode per complex
/// indirect dimension. Bit `k` of a vector's position selects the imaginary
/// component of dimension `k`, both in the input and in the output.
pub fn combine_group(
    modes: &[PhaseCycleMode],
    raw: &[Vec<Complex64>],
) -> ProcessingResult<Vec<Vec<Complex64>>> {
    let expected = 1_usize << modes.len();
    if raw.len() != expected {
        return Err(ProcessingError::input_validation(
            "INPUT.DECOMBINE_COUNT",
            format!(
                "{} complex dimensions need {} raw vectors, got {}",
                modes.len(),
                expected,
                raw.len()
            ),
        ));
    }
    check_lengths(raw)?;

    let mut combined = raw.to_vec();
    for (axis, mode) in modes.iter().enumerate() {
        let bit = 1 << axis;
        for index in (0..expected).filter(|index| index & bit == 0) {
            let pair = mode.transform(&combined[index], &combined[index | bit]);
            combined[index] = pair.real;
            combined[index | bit] = pair.imag;
        }
    }
    Ok(combined)
}

fn check_lengths(raw: &[Vec<Complex64>]) -> ProcessingResult<()> {
    let Some(first) = raw.first() else {
        return Ok(());
    };
    if let Some((position, vector)) = raw
        .iter()
        .enumerate()
        .find(|(_, vector)| vector.len() != first.len())
    {
        return Err(ProcessingError::input_validation(
            "INPUT.DECOMBINE_LENGTH",
            format!(
                "raw vector {} has {} points, expected {}",
                position,
                vector.len(),
                first.len()
            ),
        ));
    }
    Ok(())
}
