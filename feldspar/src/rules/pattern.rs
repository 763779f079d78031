use crate::expr::Expression;
use crate::operator::{Operator, OperatorId, PatternOperator};
use crate::utils::{RootBuilder, TreeBuilder};

/// A pattern defines how to match a sub tree of the memo.
///
/// If we want to match `Select(DynamicGet, <predicate>)`, the pattern tree should be defined
/// like:
/// ```
/// use feldspar::operator::{OperatorId, PatternOperator};
/// use feldspar::rules::pattern;
/// use feldspar::utils::TreeBuilder;
///
/// pattern(OperatorId::LogicalSelect)
///   .leaf(PatternOperator::Node(OperatorId::LogicalDynamicGet))
///   .leaf(PatternOperator::Tree)
/// .end_node();
/// ```
///
/// The root node matches a select, the first child a dynamic get whose children bind as group
/// leaves, and the last binds the whole predicate tree.
pub type Pattern = Expression;

pub fn pattern(root: OperatorId) -> RootBuilder<Pattern, Operator> {
    Expression::new_builder(PatternOperator::Node(root))
}

/// Pattern matching any expression of `id`, with all children bound as group leaves.
pub fn node(id: OperatorId) -> Pattern {
    pattern(id).end_node()
}

/// Whether a bound expression has the shape of `pattern`.
pub fn matches_pattern(pattern: &Pattern, input: &Expression) -> bool {
    match pattern.operator().map(|op| op.as_ref()) {
        Some(Operator::Pattern(PatternOperator::Node(id))) => {
            let op_matches = input.operator().map(|op| op.id()) == Some(*id);
            if !op_matches {
                return false;
            }
            let children = pattern.children();
            if children.is_empty() {
                return true;
            }
            let multi_leaf = matches!(
                children.last().and_then(|p| p.operator()).map(|op| op.as_ref()),
                Some(Operator::Pattern(PatternOperator::MultiLeaf))
            );
            let arity_matches = if multi_leaf {
                input.arity() + 1 >= children.len()
            } else {
                input.arity() == children.len()
            };
            arity_matches
                && input.children().iter().enumerate().all(|(idx, child)| {
                    children
                        .get(idx)
                        .or_else(|| children.last())
                        .map(|p| matches_pattern(p, child))
                        .unwrap_or(false)
                })
        }
        Some(Operator::Pattern(_)) => true,
        _ => panic!("{:?} is not a pattern", pattern),
    }
}

/// # Panics
///
/// If `input` was not bound by `pattern`.
pub fn assert_matches(pattern: &Pattern, input: &Expression) {
    assert!(
        matches_pattern(pattern, input),
        "{:?} does not match pattern {:?}",
        input,
        pattern
    );
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::cascades::GroupId;
    use crate::operator::{LogicalSelect, ScalarConst};
    use crate::utils::TreeBuilder;

    #[test]
    fn test_matches_pattern() {
        let select_pattern = pattern(OperatorId::LogicalSelect)
            .leaf(PatternOperator::Leaf)
            .leaf(PatternOperator::Tree)
            .end_node();

        let select = Expression::new(
            LogicalSelect,
            vec![
                Arc::new(Expression::group(GroupId(0))),
                Arc::new(Expression::new(ScalarConst::boolean(true), vec![])),
            ],
        );
        assert!(matches_pattern(&select_pattern, &select));
        assert!(matches_pattern(&node(OperatorId::LogicalSelect), &select));
        assert!(!matches_pattern(&node(OperatorId::LogicalGet), &select));

        let too_few = Expression::new(LogicalSelect, vec![Arc::new(Expression::group(GroupId(0)))]);
        assert!(!matches_pattern(&select_pattern, &too_few));
    }

    #[test]
    #[should_panic]
    fn test_assert_matches_panics_on_mismatch() {
        let select = Expression::new(LogicalSelect, vec![]);
        assert_matches(&node(OperatorId::LogicalGet), &select);
    }
}
