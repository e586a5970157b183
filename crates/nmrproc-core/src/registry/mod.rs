//! Ordered, per-dimension lists of processing operations.

pub mod operation;
pub mod selector;

pub use operation::{ArgValue, OperationArg, OperationEntry};
pub use selector::{DimensionSelector, SelectorKind};

use crate::domain::ProcessingResult;
use std::collections::BTreeMap;
use tracing::warn;

/// Operation lists keyed by selector, always iterated in selector order.
/// Selectors whose list becomes empty are dropped.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct DimensionalOperationRegistry {
    entries: BTreeMap<DimensionSelector, Vec<OperationEntry>>,
}

/// Deep copy of a registry's contents.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegistrySnapshot(BTreeMap<DimensionSelector, Vec<OperationEntry>>);

impl DimensionalOperationRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, selector: &DimensionSelector) -> &[OperationEntry] {
        self.entries
            .get(selector)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&DimensionSelector, &[OperationEntry])> {
        self.entries
            .iter()
            .map(|(selector, operations)| (selector, operations.as_slice()))
    }

    pub fn selectors(&self) -> Vec<&DimensionSelector> {
        self.entries.keys().collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Sets an operation for `selector`.
    ///
    /// The target index is `at_index` when given, otherwise the position of
    /// the first operation with the same base name (or the end of the list),
    /// whether or not `append_mode` is set. An
    /// operation of the same base name at the target is replaced unless
    /// `append_mode` is set; in every other case the new operation is
    /// inserted there. Returns the index used, or `None` when a negative
    /// index made the call a no-op.
    pub fn set_operation(
        &mut self,
        selector: &DimensionSelector,
        operation_text: &str,
        append_mode: bool,
        at_index: Option<isize>,
    ) -> ProcessingResult<Option<usize>> {
        let entry = OperationEntry::parse(operation_text)?;
        let operations = self.get(selector);

        let index = match at_index {
            Some(index) if index < 0 => {
                warn!(
                    selector = %selector,
                    index,
                    operation = entry.name(),
                    "negative operation index ignored"
                );
                return Ok(None);
            }
            Some(index) => index as usize,
            None => operations
                .iter()
                .position(|existing| existing.same_base_name(&entry))
                .unwrap_or(operations.len()),
        };

        let operations = self.entries.entry(selector.clone()).or_default();
        let index = index.min(operations.len());
        match operations.get_mut(index) {
            Some(existing) if !append_mode && existing.same_base_name(&entry) => *existing = entry,
            _ => operations.insert(index, entry),
        }
        Ok(Some(index))
    }

    /// Appends an already parsed operation.
    pub fn push_operation(&mut self, selector: DimensionSelector, entry: OperationEntry) {
        self.entries.entry(selector).or_default().push(entry);
    }

    pub fn remove_operation(
        &mut self,
        selector: &DimensionSelector,
        index: usize,
    ) -> Option<OperationEntry> {
        let operations = self.entries.get_mut(selector)?;
        if index >= operations.len() {
            return None;
        }
        let removed = operations.remove(index);
        if operations.is_empty() {
            self.entries.remove(selector);
        }
        Some(removed)
    }

    pub fn clear_selector(&mut self, selector: &DimensionSelector) {
        self.entries.remove(selector);
    }

    pub fn clear_all(&mut self) {
        self.entries.clear();
    }

    pub fn snapshot(&self) -> RegistrySnapshot {
        RegistrySnapshot(self.entries.clone())
    }

    pub fn restore(&mut self, snapshot: RegistrySnapshot) {
        self.entries = snapshot.0;
    }
}

/// Undo/redo stacks of registry snapshots.
#[derive(Debug, Clone, Default)]
pub struct RegistryHistory {
    undo: Vec<RegistrySnapshot>,
    redo: Vec<RegistrySnapshot>,
}

impl RegistryHistory {
    /// Records the registry state before an edit; clears the redo stack.
    pub fn record(&mut self, registry: &DimensionalOperationRegistry) {
        self.undo.push(registry.snapshot());
        self.redo.clear();
    }

    pub fn undo(&mut self, registry: &mut DimensionalOperationRegistry) -> bool {
        let Some(previous) = self.undo.pop() else {
            return false;
        };
        self.redo.push(registry.snapshot());
        registry.restore(previous);
        true
    }

    pub fn redo(&mut self, registry: &mut DimensionalOperationRegistry) -> bool {
        let Some(next) = self.redo.pop() else {
            return false;
        };
        self.undo.push(registry.snapshot());
        registry.restore(next);
        true
    }

    pub fn can_undo(&self) -> bool {
        !self.undo.is_empty()
    }

    pub fn can_redo(&self) -> bool {
        !self.redo.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::{DimensionSelector, DimensionalOperationRegistry, RegistryHistory};

    fn selector(text: &str) -> DimensionSelector {
        text.parse().expect("selector should parse")
    }

    fn lines(registry: &DimensionalOperationRegistry, text: &str) -> Vec<String> {
        registry
            .get(&selector(text))
            .iter()
            .map(|entry| entry.to_line())
            .collect()
    }

    #[test]
    fn iteration_follows_selector_order_not_insertion_order() {
        let orders = [
            ["D2", "D2,3", "D10"],
            ["D10", "D2,3", "D2"],
            ["D2,3", "D10", "D2"],
        ];
        for order in orders {
            let mut registry = DimensionalOperationRegistry::new();
            for text in order {
                registry
                    .set_operation(&selector(text), "FT()", false, None)
                    .expect("set should succeed");
            }
            let iterated: Vec<String> = registry
                .iter()
                .map(|(selector, _)| selector.to_string())
                .collect();
            assert_eq!(iterated, vec!["D2", "D2,3", "D10"]);
        }
    }

    #[test]
    fn same_base_name_is_replaced_in_place() {
        let mut registry = DimensionalOperationRegistry::new();
        let d1 = selector("D1");
        registry.set_operation(&d1, "SB(offset=0.5)", false, None).expect("set");
        registry.set_operation(&d1, "ZF()", false, None).expect("set");
        registry.set_operation(&d1, "FT()", false, None).expect("set");

        let index = registry
            .set_operation(&d1, "SB(offset=0.3)", false, None)
            .expect("set");
        assert_eq!(index, Some(0));
        assert_eq!(
            lines(&registry, "D1"),
            vec!["SB(offset=0.3)", "ZF()", "FT()"]
        );
    }

    #[test]
    fn append_mode_inserts_instead_of_replacing() {
        let mut registry = DimensionalOperationRegistry::new();
        let d1 = selector("D1");
        registry.set_operation(&d1, "ZF()", false, None).expect("set");
        registry.set_operation(&d1, "FT()", false, None).expect("set");

        registry.set_operation(&d1, "ZF(size=4096)", true, Some(0)).expect("set");
        assert_eq!(lines(&registry, "D1"), vec!["ZF(size=4096)", "ZF()", "FT()"]);

        let index = registry.set_operation(&d1, "FT()", true, None).expect("set");
        assert_eq!(index, Some(2));
        assert_eq!(
            lines(&registry, "D1"),
            vec!["ZF(size=4096)", "ZF()", "FT()", "FT()"]
        );
    }

    #[test]
    fn append_without_index_lands_beside_same_named_operation() {
        let mut registry = DimensionalOperationRegistry::new();
        let d1 = selector("D1");
        for operation in ["SB()", "ZF()", "FT()"] {
            registry.set_operation(&d1, operation, false, None).expect("set");
        }

        let index = registry
            .set_operation(&d1, "ZF(size=8192)", true, None)
            .expect("set");
        assert_eq!(index, Some(1));
        assert_eq!(
            lines(&registry, "D1"),
            vec!["SB()", "ZF(size=8192)", "ZF()", "FT()"]
        );

        let index = registry.set_operation(&d1, "PHASE(ph0=5)", true, None).expect("set");
        assert_eq!(index, Some(4));
    }

    #[test]
    fn explicit_index_inserts_or_appends_beyond_end() {
        let mut registry = DimensionalOperationRegistry::new();
        let d2 = selector("D2");
        registry.set_operation(&d2, "ZF()", false, None).expect("set");
        registry.set_operation(&d2, "SB()", false, Some(0)).expect("set");
        registry.set_operation(&d2, "FT()", false, Some(42)).expect("set");
        assert_eq!(lines(&registry, "D2"), vec!["SB()", "ZF()", "FT()"]);

        registry.set_operation(&d2, "ZF(size=512)", false, Some(1)).expect("set");
        assert_eq!(lines(&registry, "D2"), vec!["SB()", "ZF(size=512)", "FT()"]);
    }

    #[test]
    fn negative_index_is_a_no_op() {
        let mut registry = DimensionalOperationRegistry::new();
        let d1 = selector("D1");
        let result = registry
            .set_operation(&d1, "FT()", false, Some(-1))
            .expect("negative index is not an error");
        assert_eq!(result, None);
        assert!(registry.is_empty());
    }

    #[test]
    fn malformed_operation_leaves_registry_unchanged() {
        let mut registry = DimensionalOperationRegistry::new();
        let d1 = selector("D1");
        registry.set_operation(&d1, "FT()", false, None).expect("set");
        let before = registry.clone();

        assert!(registry.set_operation(&d1, "SB(((", false, None).is_err());
        assert!(
            registry
                .set_operation(&selector("D3"), "bad op", false, None)
                .is_err()
        );
        assert_eq!(registry, before);
    }

    #[test]
    fn textually_identical_selectors_share_one_key() {
        let mut registry = DimensionalOperationRegistry::new();
        registry.set_operation(&selector("d2"), "ZF()", false, None).expect("set");
        registry.set_operation(&selector("D2"), "FT()", false, None).expect("set");
        assert_eq!(registry.len(), 1);
        assert_eq!(lines(&registry, "D2"), vec!["ZF()", "FT()"]);
    }

    #[test]
    fn removing_last_operation_drops_selector() {
        let mut registry = DimensionalOperationRegistry::new();
        let d1 = selector("D1");
        registry.set_operation(&d1, "FT()", false, None).expect("set");
        assert!(registry.remove_operation(&d1, 3).is_none());
        assert_eq!(
            registry.remove_operation(&d1, 0).map(|entry| entry.to_line()),
            Some("FT()".to_string())
        );
        assert!(registry.is_empty());
        assert!(registry.get(&d1).is_empty());
    }

    #[test]
    fn snapshot_restore_and_history_support_undo() {
        let mut registry = DimensionalOperationRegistry::new();
        let mut history = RegistryHistory::default();
        let d1 = selector("D1");

        history.record(&registry);
        registry.set_operation(&d1, "FT()", false, None).expect("set");
        history.record(&registry);
        registry.set_operation(&d1, "ZF()", false, Some(0)).expect("set");

        assert!(history.undo(&mut registry));
        assert_eq!(lines(&registry, "D1"), vec!["FT()"]);
        assert!(history.redo(&mut registry));
        assert_eq!(lines(&registry, "D1"), vec!["ZF()", "FT()"]);
        assert!(history.undo(&mut registry));
        assert!(history.undo(&mut registry));
        assert!(registry.is_empty());
        assert!(!history.can_undo());

        let snapshot = registry.snapshot();
        registry.set_operation(&d1, "FT()", false, None).expect("set");
        registry.clear_all();
        registry.set_operation(&d1, "SB()", false, None).expect("set");
        registry.restore(snapshot);
        assert!(registry.is_empty());
    }
}
