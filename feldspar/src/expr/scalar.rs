//! Helpers building and taking apart scalar expressions.
use std::sync::Arc;

use datafusion_common::ScalarValue;
use datafusion_expr::Operator as BinaryOp;

use crate::expr::{ColRef, ColRefSet, ExprRef, Expression};
use crate::operator::Operator::Scalar;
use crate::operator::ScalarOperator::{ScalarBoolOp, ScalarCmp, ScalarConst, ScalarIdent};
use crate::operator::{BoolOpKind, ScalarBoolOp as BoolOp, ScalarCmp as Cmp};
use crate::operator::{ScalarConst as Const, ScalarIdent as Ident};

pub fn ident(column: &ColRef) -> Expression {
    Expression::new(Ident::new(column.clone()), vec![])
}

pub fn constant(value: ScalarValue) -> Expression {
    Expression::new(Const::new(value), vec![])
}

pub fn cmp(op: BinaryOp, left: Expression, right: Expression) -> Expression {
    Expression::new(Cmp::new(op), vec![Arc::new(left), Arc::new(right)])
}

pub fn and(children: Vec<Expression>) -> Expression {
    Expression::new(
        BoolOp::new(BoolOpKind::And),
        children.into_iter().map(Arc::new).collect(),
    )
}

pub fn or(children: Vec<Expression>) -> Expression {
    Expression::new(
        BoolOp::new(BoolOpKind::Or),
        children.into_iter().map(Arc::new).collect(),
    )
}

/// Splits nested conjunctions into their members.
pub fn conjuncts(expr: &ExprRef) -> Vec<ExprRef> {
    match expr.operator().map(|op| &**op) {
        Some(Scalar(ScalarBoolOp(op))) if op.kind() == BoolOpKind::And => {
            expr.children().iter().flat_map(conjuncts).collect()
        }
        _ if is_true(expr) => vec![],
        _ => vec![expr.clone()],
    }
}

/// Inverse of [`conjuncts`]. An empty list is the constant `true`.
pub fn conjunction(mut exprs: Vec<ExprRef>) -> ExprRef {
    match exprs.len() {
        0 => Arc::new(Expression::new(Const::boolean(true), vec![])),
        1 => exprs.remove(0),
        _ => Arc::new(Expression::new(BoolOp::new(BoolOpKind::And), exprs)),
    }
}

pub fn is_true(expr: &Expression) -> bool {
    matches!(
        expr.operator().map(|op| &**op),
        Some(Scalar(ScalarConst(c))) if c.value() == &ScalarValue::Boolean(Some(true))
    )
}

/// Columns referenced anywhere in `expr`.
pub fn used_columns(expr: &Expression) -> ColRefSet {
    let mut columns = ColRefSet::new();
    collect_columns(expr, &mut columns);
    columns
}

fn collect_columns(expr: &Expression, columns: &mut ColRefSet) {
    if let Some(Scalar(ScalarIdent(ident))) = expr.operator().map(|op| &**op) {
        columns.insert(ident.column().clone());
    }
    for child in expr.children() {
        collect_columns(child, columns);
    }
}

/// Recognizes `col op const` and `const op col`, the latter returned with the operator swapped.
pub fn column_cmp_const(expr: &Expression) -> Option<(ColRef, BinaryOp, ScalarValue)> {
    let op = match expr.operator().map(|op| &**op) {
        Some(Scalar(ScalarCmp(cmp))) => cmp.op(),
        _ => return None,
    };

    match (scalar_ident(&expr[0]), scalar_const(&expr[1])) {
        (Some(col), Some(value)) => Some((col.clone(), op, value.clone())),
        _ => match (scalar_const(&expr[0]), scalar_ident(&expr[1])) {
            (Some(value), Some(col)) => Some((col.clone(), op.swap()?, value.clone())),
            _ => None,
        },
    }
}

/// Recognizes `a = b` between two columns.
pub fn column_eq_column(expr: &Expression) -> Option<(&ColRef, &ColRef)> {
    match expr.operator().map(|op| &**op) {
        Some(Scalar(ScalarCmp(cmp))) if cmp.op() == BinaryOp::Eq => {
            Some((scalar_ident(&expr[0])?, scalar_ident(&expr[1])?))
        }
        _ => None,
    }
}

fn scalar_ident(expr: &Expression) -> Option<&ColRef> {
    match expr.operator().map(|op| &**op) {
        Some(Scalar(ScalarIdent(ident))) => Some(ident.column()),
        _ => None,
    }
}

fn scalar_const(expr: &Expression) -> Option<&ScalarValue> {
    match expr.operator().map(|op| &**op) {
        Some(Scalar(ScalarConst(c))) => Some(c.value()),
        _ => None,
    }
}

/// Equality conjuncts usable as hash join keys, split from the rest of `predicate`.
pub struct EquiJoinKeys {
    pub outer: Vec<ColRef>,
    pub inner: Vec<ColRef>,
    pub residual: Vec<ExprRef>,
}

impl EquiJoinKeys {
    pub fn is_empty(&self) -> bool {
        self.outer.is_empty()
    }
}

pub fn equi_join_keys(
    predicate: &ExprRef,
    outer_columns: &ColRefSet,
    inner_columns: &ColRefSet,
) -> EquiJoinKeys {
    let mut keys = EquiJoinKeys {
        outer: vec![],
        inner: vec![],
        residual: vec![],
    };

    for conjunct in conjuncts(predicate) {
        match column_eq_column(&conjunct) {
            Some((l, r)) if outer_columns.contains(l) && inner_columns.contains(r) => {
                keys.outer.push(l.clone());
                keys.inner.push(r.clone());
            }
            Some((l, r)) if outer_columns.contains(r) && inner_columns.contains(l) => {
                keys.outer.push(r.clone());
                keys.inner.push(l.clone());
            }
            _ => keys.residual.push(conjunct),
        }
    }

    keys
}
