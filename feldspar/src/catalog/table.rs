use std::collections::BTreeMap;
use std::fmt::{Debug, Formatter};
use std::hash::{Hash, Hasher};
use std::sync::Arc;

use anyhow::anyhow;
use serde::{Deserialize, Serialize};

use crate::catalog::ColumnDescriptor;
use crate::error::OptResult;

#[derive(Clone, Copy, Hash, Eq, PartialEq, Ord, PartialOrd, Debug, Serialize, Deserialize)]
pub struct TableId(pub u64);

/// How rows of a table are spread over segments.
#[derive(Clone, Copy, Debug, Hash, Eq, PartialEq)]
pub enum DistributionPolicy {
    /// Hashed by the distribution columns.
    Hashed,
    Random,
    /// Every segment holds a full copy.
    Replicated,
    /// Stored on the coordinator only, e.g. catalog tables.
    CoordinatorOnly,
}

/// Server holding external partitions of a table.
#[derive(Clone, Debug, Hash, Eq, PartialEq, Ord, PartialOrd)]
pub struct ForeignServer {
    pub id: u32,
    pub name: String,
    /// Scans must run on the coordinator instead of all segments.
    pub coordinator_only: bool,
}

#[derive(Clone, Debug, Hash, Eq, PartialEq)]
pub struct PartitionDescriptor {
    pub id: u32,
    pub foreign_server: Option<ForeignServer>,
}

impl PartitionDescriptor {
    pub fn local(id: u32) -> Self {
        Self {
            id,
            foreign_server: None,
        }
    }

    pub fn foreign(id: u32, server: ForeignServer) -> Self {
        Self {
            id,
            foreign_server: Some(server),
        }
    }

    pub fn is_foreign(&self) -> bool {
        self.foreign_server.is_some()
    }
}

#[derive(Clone, Copy, Debug, Hash, Eq, PartialEq)]
pub enum IndexKind {
    Btree,
    Bitmap,
}

#[derive(Clone, Debug, Hash, Eq, PartialEq)]
pub struct IndexDescriptor {
    pub id: u32,
    pub name: String,
    pub kind: IndexKind,
    /// Positions of key columns in the table's column list.
    pub key_columns: Vec<usize>,
    /// Positions of non-key columns stored in the index.
    pub included_columns: Vec<usize>,
}

impl IndexDescriptor {
    /// Whether the index stores every column at `positions`, so a scan never visits the table.
    pub fn covers(&self, positions: impl IntoIterator<Item = usize>) -> bool {
        positions
            .into_iter()
            .all(|pos| self.key_columns.contains(&pos) || self.included_columns.contains(&pos))
    }
}

/// Metadata of a table referenced by a query.
///
/// Identity is the table id. The alias tells apart two references to the same table in hints,
/// but not in descriptor sets.
#[derive(Clone)]
pub struct TableDescriptor {
    id: TableId,
    name: String,
    alias: String,
    columns: Vec<ColumnDescriptor>,
    distribution: DistributionPolicy,
    dist_columns: Vec<usize>,
    part_columns: Vec<usize>,
    partitions: Vec<PartitionDescriptor>,
    indexes: Vec<IndexDescriptor>,
    /// Each entry is a set of column positions unique in the table.
    keys: Vec<Vec<usize>>,
    has_security_quals: bool,
    foreign_server: Option<ForeignServer>,
    rows: f64,
}

impl TableDescriptor {
    pub fn builder<S: Into<String>>(id: TableId, name: S) -> TableDescriptorBuilder {
        let name = name.into();
        TableDescriptorBuilder {
            desc: TableDescriptor {
                id,
                alias: name.clone(),
                name,
                columns: vec![],
                distribution: DistributionPolicy::Random,
                dist_columns: vec![],
                part_columns: vec![],
                partitions: vec![],
                indexes: vec![],
                keys: vec![],
                has_security_quals: false,
                foreign_server: None,
                rows: 0.0,
            },
            dist_names: vec![],
            part_names: vec![],
            key_names: vec![],
        }
    }

    /// Same table referenced under another alias.
    pub fn with_alias<S: Into<String>>(&self, alias: S) -> Arc<TableDescriptor> {
        let mut desc = self.clone();
        desc.alias = alias.into();
        Arc::new(desc)
    }

    pub fn id(&self) -> TableId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn alias(&self) -> &str {
        &self.alias
    }

    pub fn columns(&self) -> &[ColumnDescriptor] {
        &self.columns
    }

    pub fn distribution(&self) -> DistributionPolicy {
        self.distribution
    }

    pub fn dist_columns(&self) -> &[usize] {
        &self.dist_columns
    }

    pub fn part_columns(&self) -> &[usize] {
        &self.part_columns
    }

    pub fn partitions(&self) -> &[PartitionDescriptor] {
        &self.partitions
    }

    pub fn is_partitioned(&self) -> bool {
        !self.part_columns.is_empty()
    }

    pub fn contains_foreign_parts(&self) -> bool {
        self.partitions.iter().any(PartitionDescriptor::is_foreign)
    }

    pub fn indexes(&self) -> &[IndexDescriptor] {
        &self.indexes
    }

    pub fn keys(&self) -> &[Vec<usize>] {
        &self.keys
    }

    pub fn has_security_quals(&self) -> bool {
        self.has_security_quals
    }

    pub fn foreign_server(&self) -> Option<&ForeignServer> {
        self.foreign_server.as_ref()
    }

    pub fn rows(&self) -> f64 {
        self.rows
    }
}

impl PartialEq for TableDescriptor {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id && self.alias == other.alias
    }
}

impl Eq for TableDescriptor {}

impl Hash for TableDescriptor {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
        self.alias.hash(state);
    }
}

impl Debug for TableDescriptor {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        if self.alias == self.name {
            write!(f, "{}", self.name)
        } else {
            write!(f, "{} as {}", self.name, self.alias)
        }
    }
}

pub struct TableDescriptorBuilder {
    desc: TableDescriptor,
    dist_names: Vec<String>,
    part_names: Vec<String>,
    key_names: Vec<Vec<String>>,
}

impl TableDescriptorBuilder {
    pub fn column(mut self, column: ColumnDescriptor) -> Self {
        self.desc.columns.push(column);
        self
    }

    pub fn distributed_by<S: AsRef<str>>(mut self, columns: &[S]) -> Self {
        self.desc.distribution = DistributionPolicy::Hashed;
        self.dist_names = columns.iter().map(|c| c.as_ref().to_string()).collect();
        self
    }

    pub fn distribution(mut self, policy: DistributionPolicy) -> Self {
        self.desc.distribution = policy;
        self
    }

    pub fn partitioned_by<S: AsRef<str>>(mut self, columns: &[S]) -> Self {
        self.part_names = columns.iter().map(|c| c.as_ref().to_string()).collect();
        self
    }

    pub fn partition(mut self, partition: PartitionDescriptor) -> Self {
        self.desc.partitions.push(partition);
        self
    }

    pub fn index<S: Into<String>>(
        mut self,
        id: u32,
        name: S,
        kind: IndexKind,
        key_columns: &[&str],
    ) -> OptResult<Self> {
        let key_columns = key_columns
            .iter()
            .map(|c| self.position_of(c))
            .collect::<OptResult<Vec<_>>>()?;
        self.desc.indexes.push(IndexDescriptor {
            id,
            name: name.into(),
            kind,
            key_columns,
            included_columns: vec![],
        });
        Ok(self)
    }

    /// Stores `columns` in the last added index, besides its keys.
    pub fn include(mut self, columns: &[&str]) -> OptResult<Self> {
        let included = columns
            .iter()
            .map(|c| self.position_of(c))
            .collect::<OptResult<Vec<_>>>()?;
        let index = self
            .desc
            .indexes
            .last_mut()
            .ok_or_else(|| anyhow!("no index to include {:?} in", columns))?;
        index.included_columns.extend(included);
        Ok(self)
    }

    pub fn key<S: AsRef<str>>(mut self, columns: &[S]) -> Self {
        self.key_names
            .push(columns.iter().map(|c| c.as_ref().to_string()).collect());
        self
    }

    pub fn security_quals(mut self, has_security_quals: bool) -> Self {
        self.desc.has_security_quals = has_security_quals;
        self
    }

    pub fn foreign_server(mut self, server: ForeignServer) -> Self {
        self.desc.foreign_server = Some(server);
        self
    }

    pub fn rows(mut self, rows: f64) -> Self {
        self.desc.rows = rows;
        self
    }

    /// Resolves distribution and partition columns and marks their descriptors.
    pub fn build(mut self) -> OptResult<TableDescriptor> {
        for name in std::mem::take(&mut self.dist_names) {
            let pos = self.position_of(&name)?;
            self.desc.columns[pos].set_as_dist_col();
            self.desc.dist_columns.push(pos);
        }

        for name in std::mem::take(&mut self.part_names) {
            let pos = self.position_of(&name)?;
            self.desc.columns[pos].set_as_part_col();
            self.desc.part_columns.push(pos);
        }

        for names in std::mem::take(&mut self.key_names) {
            let key = names
                .iter()
                .map(|name| self.position_of(name))
                .collect::<OptResult<Vec<_>>>()?;
            self.desc.keys.push(key);
        }

        Ok(self.desc)
    }

    fn position_of(&self, name: &str) -> OptResult<usize> {
        self.desc
            .columns
            .iter()
            .position(|c| c.name() == name)
            .ok_or_else(|| anyhow!("column {} not found in table {}", name, self.desc.name))
    }
}

/// Tables referenced by an expression, deduplicated by table id.
#[derive(Clone, Default, PartialEq)]
pub struct TableDescriptorSet {
    tables: BTreeMap<TableId, Arc<TableDescriptor>>,
}

impl TableDescriptorSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns false if a descriptor with the same id is already present.
    pub fn insert(&mut self, table: Arc<TableDescriptor>) -> bool {
        if self.tables.contains_key(&table.id()) {
            return false;
        }
        self.tables.insert(table.id(), table);
        true
    }

    pub fn union_with(&mut self, other: &TableDescriptorSet) {
        for table in other.iter() {
            self.insert(table.clone());
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = &Arc<TableDescriptor>> {
        self.tables.values()
    }

    pub fn len(&self) -> usize {
        self.tables.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tables.is_empty()
    }

    pub fn contains(&self, id: TableId) -> bool {
        self.tables.contains_key(&id)
    }

    /// Aliases of all tables in lexical order.
    pub fn sorted_aliases(&self) -> Vec<String> {
        let mut aliases: Vec<String> = self.iter().map(|t| t.alias().to_string()).collect();
        aliases.sort();
        aliases
    }
}

impl Debug for TableDescriptorSet {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_set().entries(self.tables.values()).finish()
    }
}

impl FromIterator<Arc<TableDescriptor>> for TableDescriptorSet {
    fn from_iter<T: IntoIterator<Item = Arc<TableDescriptor>>>(iter: T) -> Self {
        let mut set = TableDescriptorSet::new();
        for table in iter {
            set.insert(table);
        }
        set
    }
}
