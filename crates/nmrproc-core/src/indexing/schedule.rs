use crate::domain::{ProcessingError, ProcessingResult};
use std::collections::HashMap;

/// Non-uniform sampling schedule: the indirect delay coordinates that were
/// actually acquired, in acquisition order.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SampleSchedule {
    entries: Vec<Vec<usize>>,
    positions: HashMap<Vec<usize>, usize>,
}

impl SampleSchedule {
    pub fn from_entries(entries: Vec<Vec<usize>>) -> ProcessingResult<Self> {
        let width = entries.first().map(Vec::len).unwrap_or_default();
        let mut positions = HashMap::with_capacity(entries.len());
        for (position, entry) in entries.iter().enumerate() {
            if entry.len() != width {
                return Err(ProcessingError::input_validation(
                    "INPUT.SCHEDULE",
                    format!(
                        "schedule entry {} has {} coordinates, expected {}",
                        position + 1,
                        entry.len(),
                        width
                    ),
                ));
            }
            if positions.insert(entry.clone(), position).is_some() {
                return Err(ProcessingError::input_validation(
                    "INPUT.SCHEDULE",
                    format!("schedule entry {:?} is listed more than once", entry),
                ));
            }
        }

        Ok(Self { entries, positions })
    }

    /// Parses the text form: one acquired coordinate tuple per line,
    /// whitespace separated, `#` starting a comment.
    pub fn parse(source: &str) -> ProcessingResult<Self> {
        let mut entries = Vec::new();
        for (index, line) in source.lines().enumerate() {
            let content = line.split('#').next().unwrap_or_default().trim();
            if content.is_empty() {
                continue;
            }
            let entry = content
                .split_whitespace()
                .map(|token| {
                    token.parse::<usize>().map_err(|_| {
                        ProcessingError::input_validation(
                            "INPUT.SCHEDULE",
                            format!(
                                "invalid schedule coordinate '{}' at line {}",
                                token,
                                index + 1
                            ),
                        )
                    })
                })
                .collect::<ProcessingResult<Vec<_>>>()?;
            entries.push(entry);
        }
        Self::from_entries(entries)
    }

    pub fn entries(&self) -> &[Vec<usize>] {
        &self.entries
    }

    pub fn sampled_count(&self) -> usize {
        self.entries.len()
    }

    pub fn width(&self) -> usize {
        self.entries.first().map(Vec::len).unwrap_or_default()
    }

    pub fn position_of(&self, coordinates: &[usize]) -> Option<usize> {
        self.positions.get(coordinates).copied()
    }
}

#[cfg(test)]
mod tests {
    use super::SampleSchedule;

    #[test]
    fn text_schedule_skips_comments_and_blank_lines() {
        let schedule = SampleSchedule::parse("# t1 t2\n0 0\n\n3 1 # late\n1 2\n")
            .expect("schedule should parse");

        assert_eq!(schedule.sampled_count(), 3);
        assert_eq!(schedule.width(), 2);
        assert_eq!(schedule.position_of(&[3, 1]), Some(1));
        assert_eq!(schedule.position_of(&[2, 2]), None);
    }

    #[test]
    fn ragged_or_duplicate_entries_are_rejected() {
        assert!(SampleSchedule::parse("0 0\n1\n").is_err());
        assert!(SampleSchedule::parse("0 0\n0 0\n").is_err());
        assert!(SampleSchedule::parse("0 x\n").is_err());
    }
}
