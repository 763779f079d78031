use std::fmt::{Debug, Formatter};

use crate::expr::ColRef;
use crate::properties::PhysicalProp;

#[derive(Hash, Debug, Clone, Copy, Eq, PartialEq)]
pub enum SingletonKind {
    /// All rows on the coordinator.
    Coordinator,
    /// All rows on one segment.
    Segment,
}

/// How rows are spread over the segments of a cluster.
#[derive(Hash, Debug, Clone, Eq, PartialEq, Default)]
pub enum DistributionSpec {
    /// No requirement.
    #[default]
    Any,
    /// The data set is not partitioned and has only one partition.
    Singleton(SingletonKind),
    /// The data set is partitioned according to hash values of columns.
    Hashed(HashedSpec),
    /// The data set has several partitions, but the partitioning doesn't follow any rule.
    ///
    /// A duplicate sensitive spec additionally promises that no row appears twice.
    Random { duplicate_sensitive: bool },
    /// Every segment holds all rows.
    Replicated,
    /// Every segment can produce all rows, e.g. a constant table.
    Universal,
    /// Anything but replicated. Only used as a requirement.
    NonReplicated,
}

impl DistributionSpec {
    pub fn hashed(columns: Vec<ColRef>, nulls_colocated: bool) -> Self {
        DistributionSpec::Hashed(HashedSpec::new(columns, nulls_colocated))
    }

    pub fn is_derivable(&self) -> bool {
        !matches!(self, DistributionSpec::NonReplicated)
    }

    /// Panics when a required-only spec shows up as a delivered property, which means some
    /// operator derived it.
    pub fn assert_derivable(&self) {
        assert!(
            self.is_derivable(),
            "{:?} is a required-only distribution and can't be derived",
            self
        );
    }

    pub fn is_replicated_or_universal(&self) -> bool {
        matches!(self, DistributionSpec::Replicated | DistributionSpec::Universal)
    }
}

impl PhysicalProp for DistributionSpec {
    fn satisfies(&self, required: &Self) -> bool {
        use DistributionSpec::*;
        self.assert_derivable();

        match (self, required) {
            (Any, Any) => true,
            (Any, _) => false,
            (_, Any) => true,
            (Universal, Random { duplicate_sensitive }) => !duplicate_sensitive,
            (Universal, _) => true,
            (Singleton(kind), Singleton(required_kind)) => kind == required_kind,
            (Singleton(_), NonReplicated) => true,
            (Singleton(_), _) => false,
            (Hashed(spec), Hashed(required_spec)) => spec.satisfies_hashed(required_spec),
            (Hashed(_), Random { .. } | NonReplicated) => true,
            (Hashed(_), _) => false,
            (
                Random {
                    duplicate_sensitive,
                },
                Random {
                    duplicate_sensitive: required_sensitive,
                },
            ) => *duplicate_sensitive || !required_sensitive,
            (Random { .. }, NonReplicated) => true,
            (Random { .. }, _) => false,
            (Replicated, Replicated) => true,
            (Replicated, Random { duplicate_sensitive }) => !duplicate_sensitive,
            (Replicated, Singleton(kind)) => *kind == SingletonKind::Segment,
            (Replicated, _) => false,
            (NonReplicated, _) => unreachable!("checked by assert_derivable"),
        }
    }
}

/// Rows are hashed on `columns`.
///
/// `equiv` chains other specs describing the same placement, e.g. the inner keys of an equi
/// join whose output is hashed on the outer keys.
#[derive(Hash, Clone, Eq, PartialEq)]
pub struct HashedSpec {
    columns: Vec<ColRef>,
    nulls_colocated: bool,
    equiv: Option<Box<HashedSpec>>,
}

impl HashedSpec {
    pub fn new(columns: Vec<ColRef>, nulls_colocated: bool) -> Self {
        Self {
            columns,
            nulls_colocated,
            equiv: None,
        }
    }

    pub fn columns(&self) -> &[ColRef] {
        &self.columns
    }

    pub fn nulls_colocated(&self) -> bool {
        self.nulls_colocated
    }

    pub fn equiv(&self) -> Option<&HashedSpec> {
        self.equiv.as_deref()
    }

    /// This spec followed by its equivalents.
    pub fn chain(&self) -> impl Iterator<Item = &HashedSpec> {
        std::iter::successors(Some(self), |spec| spec.equiv())
    }

    /// Whether the placement matches, ignoring equivalents.
    pub fn matches_hashed(&self, other: &HashedSpec) -> bool {
        self.columns == other.columns && self.nulls_colocated == other.nulls_colocated
    }

    /// Hashing on a subset of the required columns colocates rows equal on all of them.
    fn satisfies_hashed(&self, required: &HashedSpec) -> bool {
        self.chain().any(|spec| {
            (spec.nulls_colocated || !required.nulls_colocated)
                && !spec.columns.is_empty()
                && spec.columns.iter().all(|c| required.columns.contains(c))
        })
    }

    /// Whether every column of this spec is in `columns`.
    pub fn is_covered_by(&self, columns: &[ColRef]) -> bool {
        self.columns.iter().all(|c| columns.contains(c))
    }

    /// Chains the reversed specs of `self` behind the reversed specs of `other`.
    pub fn combine(&self, other: &HashedSpec) -> HashedSpec {
        let mut combined: Option<HashedSpec> = None;
        for spec in self.chain().chain(other.chain()) {
            combined = Some(HashedSpec {
                columns: spec.columns.clone(),
                nulls_colocated: spec.nulls_colocated,
                equiv: combined.map(Box::new),
            });
        }
        // Both chains have at least their head.
        combined.unwrap_or_else(|| self.clone())
    }

    /// Copies the chain, overriding nulls colocation of every member.
    pub fn copy_with_nulls_colocated(&self, nulls_colocated: bool) -> HashedSpec {
        HashedSpec {
            columns: self.columns.clone(),
            nulls_colocated,
            equiv: self
                .equiv
                .as_ref()
                .map(|e| Box::new(e.copy_with_nulls_colocated(nulls_colocated))),
        }
    }

    /// Drops equivalents that don't describe the placement with the same number of columns.
    pub fn strip_incomplete_equiv(&self) -> HashedSpec {
        let arity = self.columns.len();
        let mut stripped = HashedSpec::new(self.columns.clone(), self.nulls_colocated);
        let complete: Vec<&HashedSpec> = self
            .chain()
            .skip(1)
            .filter(|spec| spec.columns.len() == arity)
            .collect();
        for spec in complete.into_iter().rev() {
            stripped.equiv = Some(Box::new(HashedSpec {
                columns: spec.columns.clone(),
                nulls_colocated: spec.nulls_colocated,
                equiv: stripped.equiv.take(),
            }));
        }
        stripped
    }
}

impl Debug for HashedSpec {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?}", self.columns)?;
        if !self.nulls_colocated {
            write!(f, " nulls apart")?;
        }
        if let Some(equiv) = &self.equiv {
            write!(f, " -> {:?}", equiv)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::DistributionSpec::*;
    use super::*;
    use crate::expr::ColumnFactory;
    use arrow_schema::DataType;

    fn columns(names: &[&str]) -> Vec<ColRef> {
        let factory = ColumnFactory::default();
        names
            .iter()
            .map(|n| factory.new_col_ref(n, DataType::Int32))
            .collect()
    }

    const RANDOM: DistributionSpec = Random {
        duplicate_sensitive: false,
    };
    const RANDOM_DUPLICATE_SENSITIVE: DistributionSpec = Random {
        duplicate_sensitive: true,
    };

    #[test]
    fn test_any() {
        assert!(Any.satisfies(&Any));
        assert!(!Any.satisfies(&RANDOM_DUPLICATE_SENSITIVE));
        assert!(!Any.satisfies(&Replicated));
        assert!(!Any.satisfies(&Singleton(SingletonKind::Segment)));
        assert!(RANDOM_DUPLICATE_SENSITIVE.satisfies(&Any));
    }

    #[test]
    fn test_random() {
        assert!(RANDOM_DUPLICATE_SENSITIVE.satisfies(&RANDOM_DUPLICATE_SENSITIVE));
        assert!(RANDOM_DUPLICATE_SENSITIVE.satisfies(&RANDOM));
        assert!(!RANDOM.satisfies(&RANDOM_DUPLICATE_SENSITIVE));

        assert!(Universal.satisfies(&RANDOM));
        assert!(!Universal.satisfies(&RANDOM_DUPLICATE_SENSITIVE));
    }

    #[test]
    fn test_replicated() {
        assert!(Replicated.satisfies(&Replicated));
        assert!(Replicated.satisfies(&RANDOM));
        assert!(!RANDOM.satisfies(&Replicated));
        assert!(Replicated.satisfies(&Any));
        assert!(!Any.satisfies(&Replicated));
        assert!(!Replicated.satisfies(&NonReplicated));
    }

    #[test]
    fn test_singleton() {
        let segment = Singleton(SingletonKind::Segment);
        let coordinator = Singleton(SingletonKind::Coordinator);

        assert!(coordinator.satisfies(&coordinator));
        assert!(segment.satisfies(&segment));
        assert!(!coordinator.satisfies(&segment) && !segment.satisfies(&coordinator));

        assert!(Replicated.satisfies(&segment));
        assert!(!Replicated.satisfies(&coordinator));
        assert!(!segment.satisfies(&Replicated));

        assert!(!RANDOM.satisfies(&segment));
        assert!(!RANDOM.satisfies(&coordinator));
        assert!(!segment.satisfies(&RANDOM));
        assert!(!coordinator.satisfies(&RANDOM));

        assert!(segment.satisfies(&Any));
        assert!(segment.satisfies(&NonReplicated));
    }

    #[test]
    fn test_universal() {
        assert!(Universal.satisfies(&Universal));
        assert!(Universal.satisfies(&Singleton(SingletonKind::Segment)));
        assert!(Universal.satisfies(&Replicated));
        assert!(Universal.satisfies(&Any));
    }

    #[test]
    fn test_hashed_satisfies() {
        let cols = columns(&["a", "b"]);
        let ab = HashedSpec::new(cols.clone(), true);
        let a = HashedSpec::new(vec![cols[0].clone()], true);
        let a_nulls_apart = HashedSpec::new(vec![cols[0].clone()], false);

        assert!(Hashed(ab.clone()).satisfies(&Hashed(ab.clone())));
        assert!(!Hashed(ab.clone()).satisfies(&Hashed(a.clone())));
        assert!(Hashed(a.clone()).satisfies(&Hashed(ab.clone())));
        assert!(Hashed(a.clone()).satisfies(&Hashed(a_nulls_apart.clone())));
        assert!(!Hashed(a_nulls_apart).satisfies(&Hashed(a)));
        assert!(Hashed(ab.clone()).satisfies(&NonReplicated));
        assert!(!Hashed(ab).satisfies(&Replicated));
    }

    #[test]
    fn test_hashed_combine_and_copy() {
        let cols = columns(&["a", "b", "c", "d"]);
        let a = HashedSpec::new(vec![cols[0].clone()], true);
        let b = HashedSpec::new(vec![cols[1].clone()], true);
        let c = HashedSpec::new(vec![cols[2].clone()], false);
        let d = HashedSpec::new(vec![cols[3].clone()], false);

        // {c} -> {a}
        let ca = a.combine(&c);
        assert!(ca.matches_hashed(&c));
        assert!(ca.equiv().unwrap().matches_hashed(&a));

        // {b} -> {d}
        let bd = d.combine(&b);

        // {d} -> {b} -> {a} -> {c}
        let dbac = ca.combine(&bd);
        let chain: Vec<&HashedSpec> = dbac.chain().collect();
        assert_eq!(4, chain.len());
        assert!(chain[0].matches_hashed(&d));
        assert!(chain[1].matches_hashed(&b));
        assert!(chain[2].matches_hashed(&a));
        assert!(chain[3].matches_hashed(&c));

        let copied = ca.copy_with_nulls_colocated(true);
        assert!(copied.chain().all(HashedSpec::nulls_colocated));

        // Satisfied through the equivalent spec.
        assert!(Hashed(ca).satisfies(&Hashed(a)));
    }

    #[test]
    fn test_strip_incomplete_equiv() {
        let cols = columns(&["a", "b", "c", "d"]);
        let ab = HashedSpec::new(cols[0..2].to_vec(), true);
        let c = HashedSpec::new(vec![cols[2].clone()], true);
        let cd = HashedSpec::new(cols[2..4].to_vec(), true);

        let with_incomplete = c.combine(&ab);
        assert!(with_incomplete.strip_incomplete_equiv().equiv().is_none());

        let with_complete = cd.combine(&ab);
        let stripped = with_complete.strip_incomplete_equiv();
        assert_eq!(with_complete, stripped);
    }

    #[test]
    #[should_panic]
    fn test_non_replicated_is_not_derivable() {
        NonReplicated.satisfies(&Any);
    }
}
