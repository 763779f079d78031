//! Builders for operator trees.

/// Builds an operator tree top down. Both initial [`Expression`]s and rule patterns are written
/// this way:
///
/// ```
/// use feldspar::expr::Expression;
/// use feldspar::operator::{LogicalSelect, PatternOperator};
/// use feldspar::utils::TreeBuilder;
///
/// let select = Expression::new_builder(LogicalSelect)
///     .leaf(PatternOperator::Leaf)
///     .leaf(PatternOperator::Tree)
///     .end_node();
/// assert_eq!(2, select.arity());
/// ```
///
/// `begin_node` opens a child that the matching `end_node` attaches to its parent. The last
/// `end_node` closes the root and returns the tree.
///
/// [`Expression`]: crate::expr::Expression
pub trait TreeBuilder: Sized {
    type Node;
    type Tree: From<(Self::Node, Vec<Self::Tree>)>;
    /// The finished tree when closing the root, the parent builder otherwise.
    type Output;

    /// Attaches an already built subtree, e.g. a cloned [`Expression`].
    ///
    /// [`Expression`]: crate::expr::Expression
    fn add_child(self, tree: Self::Tree) -> Self;

    fn end_node(self) -> Self::Output;

    fn begin_node<K: Into<Self::Node>>(self, node: K) -> ChildBuilder<Self> {
        ChildBuilder {
            parent: self,
            open: OpenNode::new(node.into()),
        }
    }

    fn leaf<K: Into<Self::Node>>(self, node: K) -> Self {
        self.add_child(OpenNode::new(node.into()).close())
    }
}

/// A node still collecting its children.
struct OpenNode<T, N> {
    node: N,
    children: Vec<T>,
}

impl<T: From<(N, Vec<T>)>, N> OpenNode<T, N> {
    fn new(node: N) -> Self {
        Self {
            node,
            children: vec![],
        }
    }

    fn close(self) -> T {
        T::from((self.node, self.children))
    }
}

/// Builder of the root, see [`Expression::new_builder`].
///
/// [`Expression::new_builder`]: crate::expr::Expression::new_builder
pub struct RootBuilder<T, N> {
    open: OpenNode<T, N>,
}

impl<T: From<(N, Vec<T>)>, N> RootBuilder<T, N> {
    pub fn new(node: N) -> Self {
        Self {
            open: OpenNode::new(node),
        }
    }
}

impl<T: From<(N, Vec<T>)>, N> TreeBuilder for RootBuilder<T, N> {
    type Node = N;
    type Tree = T;
    type Output = T;

    fn add_child(mut self, tree: T) -> Self {
        self.open.children.push(tree);
        self
    }

    fn end_node(self) -> T {
        self.open.close()
    }
}

/// Builder of a node below the root, handing control back to `P` once closed.
pub struct ChildBuilder<P: TreeBuilder> {
    parent: P,
    open: OpenNode<P::Tree, P::Node>,
}

impl<P: TreeBuilder> TreeBuilder for ChildBuilder<P> {
    type Node = P::Node;
    type Tree = P::Tree;
    type Output = P;

    fn add_child(mut self, tree: P::Tree) -> Self {
        self.open.children.push(tree);
        self
    }

    fn end_node(self) -> P {
        let tree = self.open.close();
        self.parent.add_child(tree)
    }
}
