use crate::domain::{ProcessingError, ProcessingResult};
use std::cmp::Ordering;
use std::fmt::{Display, Formatter};
use std::str::FromStr;

/// Kind of a selector; the declaration order matches the text order of the
/// selector prefixes (`D<n>` < `D_ALL` < `P<n>`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum SelectorKind {
    Dimension,
    All,
    Plane,
}

/// Key naming the dimension(s) a block of operations applies to:
/// `D<n>`, a combined `D<n>,<m>`, `P<n>` or `D_ALL`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DimensionSelector {
    kind: SelectorKind,
    dims: Vec<usize>,
}

impl DimensionSelector {
    pub fn dimension(dim: usize) -> Self {
        Self {
            kind: SelectorKind::Dimension,
            dims: vec![dim],
        }
    }

    pub fn combined(dims: &[usize]) -> ProcessingResult<Self> {
        Self::new(SelectorKind::Dimension, dims.to_vec())
    }

    pub fn plane(dim: usize) -> Self {
        Self {
            kind: SelectorKind::Plane,
            dims: vec![dim],
        }
    }

    pub fn all() -> Self {
        Self {
            kind: SelectorKind::All,
            dims: Vec::new(),
        }
    }

    fn new(kind: SelectorKind, dims: Vec<usize>) -> ProcessingResult<Self> {
        if kind != SelectorKind::All && dims.is_empty() {
            return Err(invalid_selector("selector names no dimension"));
        }
        if dims.contains(&0) {
            return Err(invalid_selector("dimension numbers start at 1"));
        }
        for (position, dim) in dims.iter().enumerate() {
            if dims[..position].contains(dim) {
                return Err(invalid_selector(format!("dimension {} is listed twice", dim)));
            }
        }
        Ok(Self { kind, dims })
    }

    /// Parses the payload of a `DIM(...)` script header: empty for all
    /// dimensions, `2` or `2,3` for dimensions, `P2` for a plane.
    pub fn from_payload(payload: &str) -> ProcessingResult<Self> {
        let payload = payload.trim();
        if payload.is_empty() {
            return Ok(Self::all());
        }
        match payload.strip_prefix(['P', 'p']) {
            Some(rest) => Self::new(SelectorKind::Plane, parse_dims(rest)?),
            None => Self::new(SelectorKind::Dimension, parse_dims(payload)?),
        }
    }

    pub fn kind(&self) -> SelectorKind {
        self.kind
    }

    pub fn dims(&self) -> &[usize] {
        &self.dims
    }

    pub fn leading_number(&self) -> Option<usize> {
        self.dims.first().copied()
    }

    pub fn is_combined(&self) -> bool {
        self.dims.len() > 1
    }

    pub fn payload(&self) -> String {
        let dims = join_dims(&self.dims);
        match self.kind {
            SelectorKind::All => String::new(),
            SelectorKind::Dimension => dims,
            SelectorKind::Plane => format!("P{}", dims),
        }
    }
}

impl Ord for DimensionSelector {
    fn cmp(&self, other: &Self) -> Ordering {
        self.kind
            .cmp(&other.kind)
            .then_with(|| self.leading_number().cmp(&other.leading_number()))
            .then_with(|| self.is_combined().cmp(&other.is_combined()))
            .then_with(|| self.dims.cmp(&other.dims))
    }
}

impl PartialOrd for DimensionSelector {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Display for DimensionSelector {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self.kind {
            SelectorKind::All => f.write_str("D_ALL"),
            SelectorKind::Dimension => write!(f, "D{}", join_dims(&self.dims)),
            SelectorKind::Plane => write!(f, "P{}", join_dims(&self.dims)),
        }
    }
}

impl FromStr for DimensionSelector {
    type Err = ProcessingError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let normalized = value.trim().to_ascii_uppercase();
        if normalized == "D_ALL" {
            return Ok(Self::all());
        }
        if let Some(rest) = normalized.strip_prefix('D') {
            return Self::new(SelectorKind::Dimension, parse_dims(rest)?);
        }
        if let Some(rest) = normalized.strip_prefix('P') {
            return Self::new(SelectorKind::Plane, parse_dims(rest)?);
        }
        Err(invalid_selector(format!("unknown selector '{}'", value)))
    }
}

fn parse_dims(text: &str) -> ProcessingResult<Vec<usize>> {
    text.split(',')
        .map(str::trim)
        .map(|token| {
            token
                .parse::<usize>()
                .map_err(|_| invalid_selector(format!("invalid dimension number '{}'", token)))
        })
        .collect()
}

fn join_dims(dims: &[usize]) -> String {
    dims.iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(",")
}

fn invalid_selector(message: impl Into<String>) -> ProcessingError {
    ProcessingError::input_validation("INPUT.SELECTOR", message)
}

#[cfg(test)]
mod tests {
    use super::{DimensionSelector, SelectorKind};
    use proptest::prelude::*;

    fn selector(text: &str) -> DimensionSelector {
        text.parse().expect("selector should parse")
    }

    #[test]
    fn selectors_parse_and_render_canonically() {
        assert_eq!(selector("d2").to_string(), "D2");
        assert_eq!(selector("D2, 3").to_string(), "D2,3");
        assert_eq!(selector("p1").kind(), SelectorKind::Plane);
        assert_eq!(selector("D_ALL"), DimensionSelector::all());
        assert!(selector("D2,3").is_combined());
        assert_eq!(selector("D2,3").leading_number(), Some(2));

        assert!("D".parse::<DimensionSelector>().is_err());
        assert!("D0".parse::<DimensionSelector>().is_err());
        assert!("D2,2".parse::<DimensionSelector>().is_err());
        assert!("X2".parse::<DimensionSelector>().is_err());
    }

    #[test]
    fn payload_round_trips_through_header_form() {
        for text in ["D1", "D2,3", "P2", "D_ALL"] {
            let parsed = selector(text);
            let reparsed =
                DimensionSelector::from_payload(&parsed.payload()).expect("payload should parse");
            assert_eq!(reparsed, parsed);
        }
        assert_eq!(selector("D_ALL").payload(), "");
        assert_eq!(selector("D2,3").payload(), "2,3");
    }

    #[test]
    fn single_dimension_precedes_its_combined_form() {
        let mut selectors = vec![selector("D10"), selector("D2,3"), selector("D2")];
        selectors.sort();
        let rendered: Vec<String> = selectors.iter().map(ToString::to_string).collect();
        assert_eq!(rendered, vec!["D2", "D2,3", "D10"]);
    }

    #[test]
    fn selectors_without_numerals_sort_like_text() {
        let mut selectors = vec![selector("P1"), selector("D_ALL"), selector("D3")];
        selectors.sort();
        let rendered: Vec<String> = selectors.iter().map(ToString::to_string).collect();
        assert_eq!(rendered, vec!["D3", "D_ALL", "P1"]);
    }

    fn arbitrary_selector() -> impl Strategy<Value = DimensionSelector> {
        prop_oneof![
            (1usize..12).prop_map(DimensionSelector::dimension),
            (1usize..12).prop_map(DimensionSelector::plane),
            (1usize..12, 1usize..12)
                .prop_filter("distinct", |(a, b)| a != b)
                .prop_map(|(a, b)| DimensionSelector::combined(&[a, b]).expect("combined")),
            Just(DimensionSelector::all()),
        ]
    }

    proptest! {
        #[test]
        fn ordering_is_total_and_transitive(
            a in arbitrary_selector(),
            b in arbitrary_selector(),
            c in arbitrary_selector(),
        ) {
            prop_assert_eq!(a.cmp(&b), b.cmp(&a).reverse());
            prop_assert_eq!(a.cmp(&b) == std::cmp::Ordering::Equal, a == b);
            if a <= b && b <= c {
                prop_assert!(a <= c);
            }
        }
    }
}
