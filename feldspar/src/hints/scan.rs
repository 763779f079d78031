use serde::{Deserialize, Serialize};

use crate::operator::OperatorId;

#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub enum ScanHintKind {
    SeqScan,
    NoSeqScan,
    BitmapScan,
    NoBitmapScan,
    IndexOnlyScan,
    NoIndexOnlyScan,
}

/// Restricts the access paths of the relation referenced by `alias`.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ScanHint {
    alias: String,
    kinds: Vec<ScanHintKind>,
}

impl ScanHint {
    pub fn new<S: Into<String>>(alias: S, kinds: Vec<ScanHintKind>) -> Self {
        Self {
            alias: alias.into(),
            kinds,
        }
    }

    pub fn alias(&self) -> &str {
        &self.alias
    }

    /// Whether an access path rooted at `op` is allowed. All kinds must agree.
    pub fn satisfies_operator(&self, op: OperatorId) -> bool {
        let is_seq_scan = matches!(op, OperatorId::LogicalGet | OperatorId::LogicalDynamicGet);
        let is_bitmap = op == OperatorId::ScalarBitmapIndexProbe;
        let is_index_only = matches!(
            op,
            OperatorId::LogicalIndexOnlyGet | OperatorId::LogicalDynamicIndexOnlyGet
        );

        self.kinds.iter().all(|kind| match kind {
            ScanHintKind::SeqScan => is_seq_scan,
            ScanHintKind::NoSeqScan => !is_seq_scan,
            ScanHintKind::BitmapScan => is_bitmap,
            ScanHintKind::NoBitmapScan => !is_bitmap,
            ScanHintKind::IndexOnlyScan => is_index_only,
            ScanHintKind::NoIndexOnlyScan => !is_index_only,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_satisfies_operator() {
        let no_seq = ScanHint::new("t1", vec![ScanHintKind::NoSeqScan]);
        assert!(!no_seq.satisfies_operator(OperatorId::LogicalGet));
        assert!(!no_seq.satisfies_operator(OperatorId::LogicalDynamicGet));
        assert!(no_seq.satisfies_operator(OperatorId::ScalarBitmapIndexProbe));

        let bitmap = ScanHint::new("t1", vec![ScanHintKind::BitmapScan]);
        assert!(bitmap.satisfies_operator(OperatorId::ScalarBitmapIndexProbe));
        assert!(!bitmap.satisfies_operator(OperatorId::LogicalGet));
        assert!(!bitmap.satisfies_operator(OperatorId::LogicalIndexOnlyGet));

        let no_index_only = ScanHint::new("t1", vec![ScanHintKind::NoIndexOnlyScan]);
        assert!(!no_index_only.satisfies_operator(OperatorId::LogicalDynamicIndexOnlyGet));
        assert!(no_index_only.satisfies_operator(OperatorId::ScalarBitmapIndexProbe));
    }
}
