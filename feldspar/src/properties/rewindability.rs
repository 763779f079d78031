use crate::properties::PhysicalProp;

/// Whether an operator can rescan its output without recomputing its inputs.
#[derive(Hash, Debug, Clone, Copy, Eq, PartialEq, Default)]
pub enum RewindabilitySpec {
    #[default]
    NotRewindable,
    Rewindable,
}

impl PhysicalProp for RewindabilitySpec {
    fn satisfies(&self, required: &Self) -> bool {
        *self == RewindabilitySpec::Rewindable || *required == RewindabilitySpec::NotRewindable
    }
}
