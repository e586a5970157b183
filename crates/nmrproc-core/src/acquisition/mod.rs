//! Acquisition-order model for raw multi-dimensional datasets.
//!
//! An acquisition order lists the loop variables of the raw file from the
//! fastest varying to the slowest: `p<n>` toggles the phase (real/imaginary)
//! of indirect dimension `n`, `d<n>` increments its evolution delay and
//! `a<n>` steps its array. Dimension numbers count indirect dimensions from 1.

use crate::domain::{ProcessingError, ProcessingResult};
use std::fmt::{Display, Formatter};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AcquisitionRole {
    Phase,
    Delay,
    Array,
}

impl AcquisitionRole {
    pub const fn code_char(self) -> char {
        match self {
            Self::Phase => 'p',
            Self::Delay => 'd',
            Self::Array => 'a',
        }
    }

    fn from_code_char(value: char) -> Option<Self> {
        match value.to_ascii_lowercase() {
            'p' => Some(Self::Phase),
            'd' => Some(Self::Delay),
            'a' => Some(Self::Array),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct AcquisitionCode {
    pub role: AcquisitionRole,
    pub dim: usize,
}

impl AcquisitionCode {
    pub const fn new(role: AcquisitionRole, dim: usize) -> Self {
        Self { role, dim }
    }

    pub const fn phase(dim: usize) -> Self {
        Self::new(AcquisitionRole::Phase, dim)
    }

    pub const fn delay(dim: usize) -> Self {
        Self::new(AcquisitionRole::Delay, dim)
    }

    pub const fn array(dim: usize) -> Self {
        Self::new(AcquisitionRole::Array, dim)
    }

    fn parse_token(token: &str) -> Option<Self> {
        let mut chars = token.chars();
        let role = AcquisitionRole::from_code_char(chars.next()?)?;
        let digits = chars.as_str();
        if digits.is_empty() || !digits.chars().all(|value| value.is_ascii_digit()) {
            return None;
        }
        let dim = digits.parse().ok()?;
        Some(Self::new(role, dim))
    }
}

impl Display for AcquisitionCode {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}{}", self.role.code_char(), self.dim)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct AcquisitionOrder {
    codes: Vec<AcquisitionCode>,
    legacy_token: Option<String>,
    supplied_short_form: Option<String>,
}

impl AcquisitionOrder {
    /// Parses a comma separated order such as `"p1,d1,p2,d2"`.
    ///
    /// A single token that is not a structural code is accepted verbatim as a
    /// legacy vendor order when its length is consistent with `n_dim`.
    pub fn parse(order: &str, n_dim: usize) -> ProcessingResult<Self> {
        let expected_delays = n_dim.saturating_sub(1);
        let tokens: Vec<&str> = order
            .split(',')
            .map(str::trim)
            .filter(|token| !token.is_empty())
            .collect();

        if let [token] = tokens.as_slice()
            && AcquisitionCode::parse_token(token).is_none()
        {
            let length = token.chars().count();
            if n_dim == 0 || (length != n_dim && length != expected_delays) {
                return Err(ProcessingError::input_validation(
                    "INPUT.ACQ_ORDER",
                    format!(
                        "legacy acquisition order '{}' is inconsistent with {} dimensions",
                        token, n_dim
                    ),
                ));
            }
            return Ok(Self {
                codes: Vec::new(),
                legacy_token: Some((*token).to_string()),
                supplied_short_form: None,
            });
        }

        let mut codes = Vec::with_capacity(tokens.len());
        for (position, token) in tokens.iter().enumerate() {
            let code = AcquisitionCode::parse_token(token).ok_or_else(|| {
                ProcessingError::input_validation(
                    "INPUT.ACQ_ORDER",
                    format!(
                        "invalid acquisition code '{}' at position {}",
                        token,
                        position + 1
                    ),
                )
            })?;
            codes.push(code);
        }

        let delays = codes
            .iter()
            .filter(|code| code.role == AcquisitionRole::Delay)
            .count();
        if delays != expected_delays {
            return Err(ProcessingError::input_validation(
                "INPUT.ACQ_ORDER",
                format!(
                    "acquisition order '{}' has {} delay codes, expected {} for {} dimensions",
                    order, delays, expected_delays, n_dim
                ),
            ));
        }

        Ok(Self {
            codes,
            legacy_token: None,
            supplied_short_form: None,
        })
    }

    /// The order used when a dataset does not record one: all phases, then
    /// all delays, then the arrays of arrayed dimensions.
    pub fn default_for(n_dim: usize, arrayed_dims: &[usize]) -> Self {
        let indirect = 1..n_dim.max(1);
        let codes = indirect
            .clone()
            .map(AcquisitionCode::phase)
            .chain(indirect.map(AcquisitionCode::delay))
            .chain(arrayed_dims.iter().copied().map(AcquisitionCode::array))
            .collect();
        Self {
            codes,
            legacy_token: None,
            supplied_short_form: None,
        }
    }

    pub fn with_short_form(mut self, short_form: impl Into<String>) -> Self {
        let short_form = short_form.into();
        self.supplied_short_form = (!short_form.trim().is_empty()).then_some(short_form);
        self
    }

    pub fn codes(&self) -> &[AcquisitionCode] {
        &self.codes
    }

    pub fn is_legacy(&self) -> bool {
        self.legacy_token.is_some()
    }

    pub fn legacy_token(&self) -> Option<&str> {
        self.legacy_token.as_deref()
    }

    pub fn delay_count(&self) -> usize {
        self.codes
            .iter()
            .filter(|code| code.role == AcquisitionRole::Delay)
            .count()
    }

    pub fn short_form(&self) -> String {
        if let Some(short_form) = &self.supplied_short_form {
            return short_form.clone();
        }
        if let Some(token) = &self.legacy_token {
            return token.clone();
        }
        self.codes
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join(",")
    }

    /// Delay nesting encoded by a legacy digit token, fastest first.
    ///
    /// Digits name dimensions the vendor way (`n_dim` is the direct dimension,
    /// `1` the outermost indirect one); `"321"` on a 3D dataset yields `[1, 2]`.
    /// Returns `None` when the token is not a permutation of dimension digits.
    pub fn legacy_delay_order(&self, n_dim: usize) -> Option<Vec<usize>> {
        let token = self.legacy_token.as_deref()?;
        let mut order = Vec::new();
        for value in token.chars() {
            let digit = value.to_digit(10)? as usize;
            if digit == 0 || digit > n_dim {
                return None;
            }
            if digit == n_dim {
                continue;
            }
            let indirect = n_dim - digit;
            if order.contains(&indirect) {
                return None;
            }
            order.push(indirect);
        }
        (order.len() == n_dim.saturating_sub(1)).then_some(order)
    }
}

impl Display for AcquisitionOrder {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.short_form())
    }
}
