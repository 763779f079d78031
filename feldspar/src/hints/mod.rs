//! Plan hints supplied by the user.
//!
//! Hints never make optimization fail. A hint that matches nothing is simply left unused, which
//! callers can report through [`RowHint::is_used`]. Hints naming a set of tables match the join
//! over exactly those tables, in any order.
mod join;
pub use join::*;
mod row;
pub use row::*;
mod scan;
pub use scan::*;

use serde::{Deserialize, Serialize};

use crate::catalog::TableDescriptorSet;

#[derive(Debug, Default, Serialize, Deserialize)]
pub struct PlanHint {
    #[serde(default)]
    row_hints: Vec<RowHint>,
    #[serde(default)]
    scan_hints: Vec<ScanHint>,
    #[serde(default)]
    join_type_hints: Vec<JoinTypeHint>,
}

impl PlanHint {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_row_hint(&mut self, hint: RowHint) {
        self.row_hints.push(hint);
    }

    pub fn add_scan_hint(&mut self, hint: ScanHint) {
        self.scan_hints.push(hint);
    }

    pub fn add_join_type_hint(&mut self, hint: JoinTypeHint) {
        self.join_type_hints.push(hint);
    }

    pub fn row_hints(&self) -> &[RowHint] {
        &self.row_hints
    }

    pub fn join_type_hints(&self) -> &[JoinTypeHint] {
        &self.join_type_hints
    }

    /// Finds the row hint whose aliases are exactly the aliases of `tables`, in any order.
    ///
    /// The matched hint is marked as used.
    pub fn row_hint(&self, tables: &TableDescriptorSet) -> Option<&RowHint> {
        if tables.is_empty() {
            return None;
        }

        let aliases = tables.sorted_aliases();
        let hint = self.row_hints.iter().find(|h| h.aliases() == aliases)?;
        hint.mark_used();
        Some(hint)
    }

    /// Finds the join type hint whose aliases are exactly the aliases of `tables`.
    pub fn join_type_hint(&self, tables: &TableDescriptorSet) -> Option<&JoinTypeHint> {
        if tables.is_empty() {
            return None;
        }

        let aliases = tables.sorted_aliases();
        self.join_type_hints.iter().find(|h| h.aliases() == aliases)
    }

    pub fn scan_hint(&self, alias: &str) -> Option<&ScanHint> {
        self.scan_hints.iter().find(|h| h.alias() == alias)
    }

    pub(crate) fn normalize(&mut self) {
        self.row_hints.iter_mut().for_each(RowHint::normalize);
        self.join_type_hints
            .iter_mut()
            .for_each(JoinTypeHint::normalize);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::table_with_alias;

    #[test]
    fn test_row_hint_lookup_is_order_agnostic() {
        let mut plan_hint = PlanHint::new();
        plan_hint.add_row_hint(RowHint::new(vec!["t2", "t1"], RowHintKind::Absolute, 5.0));

        let tables: TableDescriptorSet =
            vec![table_with_alias(2, "t2"), table_with_alias(1, "t1")]
                .into_iter()
                .collect();

        let hint = plan_hint.row_hint(&tables).unwrap();
        assert!(hint.is_used());
        assert_eq!(5.0, hint.compute_rows(100.0));
    }

    #[test]
    fn test_row_hint_lookup_misses() {
        let mut plan_hint = PlanHint::new();
        plan_hint.add_row_hint(RowHint::new(vec!["t1", "t2"], RowHintKind::Add, 5.0));

        assert!(plan_hint.row_hint(&TableDescriptorSet::new()).is_none());

        let subset: TableDescriptorSet = vec![table_with_alias(1, "t1")].into_iter().collect();
        assert!(plan_hint.row_hint(&subset).is_none());
        assert!(!plan_hint.row_hints()[0].is_used());
    }

    #[test]
    fn test_join_type_hint_lookup() {
        let mut plan_hint = PlanHint::new();
        plan_hint.add_join_type_hint(JoinTypeHint::new(
            vec!["t2", "t1"],
            JoinTypeHintKind::NestLoop,
        ));

        let both: TableDescriptorSet = vec![table_with_alias(1, "t1"), table_with_alias(2, "t2")]
            .into_iter()
            .collect();
        let hint = plan_hint.join_type_hint(&both).unwrap();
        assert_eq!(JoinTypeHintKind::NestLoop, hint.kind());

        let subset: TableDescriptorSet = vec![table_with_alias(1, "t1")].into_iter().collect();
        assert!(plan_hint.join_type_hint(&subset).is_none());
    }
}
