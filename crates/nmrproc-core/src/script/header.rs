use crate::registry::{ArgValue, OperationEntry};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DimensionHeader {
    #[serde(default)]
    pub label: String,
    pub size: usize,
    #[serde(default)]
    pub sweep_width: f64,
    #[serde(default)]
    pub spectrometer_freq: f64,
    #[serde(default)]
    pub reference: f64,
    /// Dimension is dropped from the processed dataset.
    #[serde(default)]
    pub skip: bool,
}

impl DimensionHeader {
    pub fn new(label: impl Into<String>, size: usize, sweep_width: f64) -> Self {
        Self {
            label: label.into(),
            size,
            sweep_width,
            spectrometer_freq: 0.0,
            reference: 0.0,
            skip: false,
        }
    }
}

/// Parameters rendered ahead of the operation blocks of a full script.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DatasetHeader {
    #[serde(default)]
    pub source: Option<String>,
    #[serde(default)]
    pub destination: Option<String>,
    #[serde(default)]
    pub acquisition_order: Option<String>,
    #[serde(default)]
    pub dims: Vec<DimensionHeader>,
}

impl DatasetHeader {
    pub fn statements(&self) -> Vec<OperationEntry> {
        let mut statements = Vec::new();
        if let Some(source) = &self.source {
            statements.push(file_statement("SOURCE", source));
        }
        if let Some(destination) = &self.destination {
            statements.push(file_statement("DESTINATION", destination));
        }
        statements.extend(self.parameter_statements());
        statements
    }

    /// `ACQORDER` and per-dimension `PARAMS` statements, without file names.
    pub fn parameter_statements(&self) -> Vec<OperationEntry> {
        let mut statements = Vec::new();
        if let Some(order) = &self.acquisition_order {
            statements.push(
                OperationEntry::new("ACQORDER").with_arg("order", ArgValue::Quoted(order.clone())),
            );
        }
        for (index, dim) in self.dims.iter().enumerate() {
            statements.push(
                OperationEntry::new("PARAMS")
                    .with_arg("dim", bare(index + 1))
                    .with_arg("label", ArgValue::Quoted(dim.label.clone()))
                    .with_arg("size", bare(dim.size))
                    .with_arg("sw", bare(dim.sweep_width))
                    .with_arg("sf", bare(dim.spectrometer_freq))
                    .with_arg("ref", bare(dim.reference))
                    .with_arg("skip", bare(u8::from(dim.skip))),
            );
        }
        statements
    }
}

pub(crate) fn file_statement(name: &str, path: &str) -> OperationEntry {
    OperationEntry::new(name).with_arg("file", ArgValue::Quoted(path.to_string()))
}

fn bare(value: impl ToString) -> ArgValue {
    ArgValue::Bare(value.to_string())
}

#[cfg(test)]
mod tests {
    use super::{DatasetHeader, DimensionHeader};

    #[test]
    fn header_statements_render_files_then_parameters() {
        let header = DatasetHeader {
            source: Some("data/hsqc/fid".to_string()),
            destination: Some("data/hsqc.nv".to_string()),
            acquisition_order: Some("p1,d1".to_string()),
            dims: vec![
                DimensionHeader::new("H1", 1024, 8000.0),
                DimensionHeader::new("N15", 64, 2000.5),
            ],
        };
        let lines: Vec<String> = header
            .statements()
            .iter()
            .map(|entry| entry.to_line())
            .collect();

        assert_eq!(
            lines,
            vec![
                "SOURCE(file='data/hsqc/fid')",
                "DESTINATION(file='data/hsqc.nv')",
                "ACQORDER(order='p1,d1')",
                "PARAMS(dim=1, label='H1', size=1024, sw=8000, sf=0, ref=0, skip=0)",
                "PARAMS(dim=2, label='N15', size=64, sw=2000.5, sf=0, ref=0, skip=0)",
            ]
        );
    }

    #[test]
    fn header_deserializes_from_camel_case_json() {
        let header: DatasetHeader = serde_json::from_str(
            r#"{ "source": "fid", "dims": [ { "label": "H1", "size": 512, "sweepWidth": 5000.0, "skip": true } ] }"#,
        )
        .expect("header should deserialize");
        assert_eq!(header.dims[0].sweep_width, 5000.0);
        assert!(header.dims[0].skip);
        assert!(header.destination.is_none());
    }
}
