use std::fmt::Formatter;

use arrow_schema::DataType;
use datafusion_common::ScalarValue;
use datafusion_expr::Operator as BinaryOp;
use enum_as_inner::EnumAsInner;
use enum_dispatch::enum_dispatch;

use crate::catalog::IndexDescriptor;
use crate::expr::ColRef;
use crate::operator::{DisplayFields, OperatorId};

/// Scalar operator, evaluated per row.
#[derive(Clone, Debug, Hash, Eq, PartialEq, EnumAsInner)]
#[enum_dispatch]
pub enum ScalarOperator {
    ScalarIdent(ScalarIdent),
    ScalarConst(ScalarConst),
    ScalarCmp(ScalarCmp),
    ScalarBoolOp(ScalarBoolOp),
    ScalarBitmapIndexProbe(ScalarBitmapIndexProbe),
    ScalarBitmapBoolOp(ScalarBitmapBoolOp),
}

/// Type modifier of values without one.
pub const DEFAULT_TYPE_MODIFIER: i32 = -1;

#[enum_dispatch(ScalarOperator)]
pub trait ScalarOperatorTrait {
    /// Type of the value computed.
    fn data_type(&self) -> DataType;

    fn type_modifier(&self) -> i32 {
        DEFAULT_TYPE_MODIFIER
    }

    fn is_input_order_sensitive(&self) -> bool {
        true
    }
}

impl ScalarOperator {
    pub fn id(&self) -> OperatorId {
        match self {
            ScalarOperator::ScalarIdent(_) => OperatorId::ScalarIdent,
            ScalarOperator::ScalarConst(_) => OperatorId::ScalarConst,
            ScalarOperator::ScalarCmp(_) => OperatorId::ScalarCmp,
            ScalarOperator::ScalarBoolOp(_) => OperatorId::ScalarBoolOp,
            ScalarOperator::ScalarBitmapIndexProbe(_) => OperatorId::ScalarBitmapIndexProbe,
            ScalarOperator::ScalarBitmapBoolOp(_) => OperatorId::ScalarBitmapBoolOp,
        }
    }
}

/// Reference to a column.
#[derive(Clone, Debug, Hash, Eq, PartialEq)]
pub struct ScalarIdent {
    column: ColRef,
}

impl ScalarIdent {
    pub fn new(column: ColRef) -> Self {
        Self { column }
    }

    pub fn column(&self) -> &ColRef {
        &self.column
    }
}

impl ScalarOperatorTrait for ScalarIdent {
    fn data_type(&self) -> DataType {
        self.column.data_type().clone()
    }
}

impl DisplayFields for ScalarIdent {
    fn display(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "({:?})", self.column)
    }
}

#[derive(Clone, Debug, Hash, Eq, PartialEq)]
pub struct ScalarConst {
    value: ScalarValue,
}

impl ScalarConst {
    pub fn new(value: ScalarValue) -> Self {
        Self { value }
    }

    pub fn boolean(value: bool) -> Self {
        Self::new(ScalarValue::Boolean(Some(value)))
    }

    pub fn value(&self) -> &ScalarValue {
        &self.value
    }
}

impl ScalarOperatorTrait for ScalarConst {
    fn data_type(&self) -> DataType {
        self.value.get_datatype()
    }
}

impl DisplayFields for ScalarConst {
    fn display(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "({})", self.value)
    }
}

/// Comparison of its two children.
#[derive(Clone, Debug, Hash, Eq, PartialEq)]
pub struct ScalarCmp {
    op: BinaryOp,
}

impl ScalarCmp {
    pub fn new(op: BinaryOp) -> Self {
        Self { op }
    }

    pub fn op(&self) -> BinaryOp {
        self.op
    }
}

impl ScalarOperatorTrait for ScalarCmp {
    fn data_type(&self) -> DataType {
        DataType::Boolean
    }
}

impl DisplayFields for ScalarCmp {
    fn display(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "({})", self.op)
    }
}

#[derive(Clone, Copy, Debug, Hash, Eq, PartialEq)]
pub enum BoolOpKind {
    And,
    Or,
    Not,
}

#[derive(Clone, Debug, Hash, Eq, PartialEq)]
pub struct ScalarBoolOp {
    kind: BoolOpKind,
}

impl ScalarBoolOp {
    pub fn new(kind: BoolOpKind) -> Self {
        Self { kind }
    }

    pub fn kind(&self) -> BoolOpKind {
        self.kind
    }
}

impl ScalarOperatorTrait for ScalarBoolOp {
    fn data_type(&self) -> DataType {
        DataType::Boolean
    }

    /// Conjunctions and disjunctions commute.
    fn is_input_order_sensitive(&self) -> bool {
        self.kind == BoolOpKind::Not
    }
}

impl DisplayFields for ScalarBoolOp {
    fn display(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "({:?})", self.kind)
    }
}

/// Bitmap of the rows whose index keys satisfy the single child, an index condition.
#[derive(Clone, Debug, Hash, Eq, PartialEq)]
pub struct ScalarBitmapIndexProbe {
    index: IndexDescriptor,
}

impl ScalarBitmapIndexProbe {
    pub fn new(index: IndexDescriptor) -> Self {
        Self { index }
    }

    pub fn index(&self) -> &IndexDescriptor {
        &self.index
    }
}

impl ScalarOperatorTrait for ScalarBitmapIndexProbe {
    fn data_type(&self) -> DataType {
        DataType::Binary
    }
}

impl DisplayFields for ScalarBitmapIndexProbe {
    fn display(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "({})", self.index.name)
    }
}

#[derive(Clone, Copy, Debug, Hash, Eq, PartialEq)]
pub enum BitmapBoolOpKind {
    And,
    Or,
}

/// Combines two bitmaps.
#[derive(Clone, Debug, Hash, Eq, PartialEq)]
pub struct ScalarBitmapBoolOp {
    kind: BitmapBoolOpKind,
}

impl ScalarBitmapBoolOp {
    pub fn new(kind: BitmapBoolOpKind) -> Self {
        Self { kind }
    }

    pub fn kind(&self) -> BitmapBoolOpKind {
        self.kind
    }
}

impl ScalarOperatorTrait for ScalarBitmapBoolOp {
    fn data_type(&self) -> DataType {
        DataType::Binary
    }

    fn is_input_order_sensitive(&self) -> bool {
        false
    }
}

impl DisplayFields for ScalarBitmapBoolOp {
    fn display(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "({:?})", self.kind)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::expr::ColumnFactory;
    use crate::operator::Operator;

    #[test]
    fn test_scalar_types() {
        let factory = ColumnFactory::default();
        let a = factory.new_col_ref("a", DataType::Utf8);

        assert_eq!(DataType::Utf8, ScalarIdent::new(a).data_type());
        assert_eq!(
            DataType::Int64,
            ScalarConst::new(ScalarValue::Int64(Some(1))).data_type()
        );
        assert_eq!(DataType::Boolean, ScalarCmp::new(BinaryOp::Eq).data_type());
        assert_eq!(
            DEFAULT_TYPE_MODIFIER,
            ScalarCmp::new(BinaryOp::Eq).type_modifier()
        );
    }

    #[test]
    fn test_operator_display() {
        let op: Operator = ScalarCmp::new(BinaryOp::LtEq).into();
        assert_eq!("ScalarCmp(<=)", op.to_string());
        assert!(!Operator::from(ScalarBoolOp::new(BoolOpKind::And)).is_input_order_sensitive());
    }
}
