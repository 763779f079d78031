use crate::operator::OperatorId;

/// Operators of rule patterns. They never appear in the memo.
#[derive(Clone, Copy, Debug, Hash, Eq, PartialEq)]
pub enum PatternOperator {
    /// Matches an operator by id. Without child patterns all its children bind as group leaves.
    Node(OperatorId),
    /// Binds any single child as a group leaf.
    Leaf,
    /// Binds any single child with its whole subtree. Only scalar subtrees are extracted,
    /// relational children still bind as group leaves.
    Tree,
    /// Binds all remaining children as group leaves. Must be the last child pattern.
    MultiLeaf,
}

impl PatternOperator {
    pub fn id(&self) -> OperatorId {
        match self {
            PatternOperator::Node(id) => *id,
            PatternOperator::Leaf => OperatorId::PatternLeaf,
            PatternOperator::Tree => OperatorId::PatternTree,
            PatternOperator::MultiLeaf => OperatorId::PatternMultiLeaf,
        }
    }
}
