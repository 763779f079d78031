use std::cmp::Ordering;
use std::collections::BTreeSet;
use std::fmt::{Debug, Display, Formatter};
use std::hash::{Hash, Hasher};
use std::sync::atomic::{AtomicU32, Ordering as AtomicOrdering};
use std::sync::Arc;

use arrow_schema::DataType;

/// Identifier of a column reference, unique within one optimization session.
#[derive(Clone, Copy, Hash, Eq, PartialEq, Ord, PartialOrd)]
pub struct ColId(pub u32);

impl Debug for ColId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// A column produced by some operator of the query.
///
/// Two references are the same column iff their ids are equal, names are only for display.
#[derive(Clone)]
pub struct ColRef {
    id: ColId,
    name: Arc<str>,
    data_type: DataType,
}

impl ColRef {
    pub fn id(&self) -> ColId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn data_type(&self) -> &DataType {
        &self.data_type
    }
}

impl PartialEq for ColRef {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for ColRef {}

impl Hash for ColRef {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state)
    }
}

impl PartialOrd for ColRef {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for ColRef {
    fn cmp(&self, other: &Self) -> Ordering {
        self.id.cmp(&other.id)
    }
}

impl Debug for ColRef {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}{:?}", self.name, self.id)
    }
}

impl Display for ColRef {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name)
    }
}

pub type ColRefSet = BTreeSet<ColRef>;

/// Hands out column references with fresh ids.
#[derive(Default)]
pub struct ColumnFactory {
    next_id: AtomicU32,
}

impl ColumnFactory {
    pub fn new_col_ref<S: AsRef<str>>(&self, name: S, data_type: DataType) -> ColRef {
        let id = self.next_id.fetch_add(1, AtomicOrdering::Relaxed);
        ColRef {
            id: ColId(id),
            name: Arc::from(name.as_ref()),
            data_type,
        }
    }

    /// Creates a new column with the name and type of `col`.
    pub fn copy_of(&self, col: &ColRef) -> ColRef {
        self.new_col_ref(col.name(), col.data_type().clone())
    }
}
