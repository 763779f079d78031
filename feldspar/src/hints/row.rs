use std::fmt::{Display, Formatter};
use std::sync::atomic::{AtomicBool, Ordering};

use serde::{Deserialize, Serialize};

/// How a row hint combines with the estimated row count.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub enum RowHintKind {
    #[serde(rename = "#")]
    Absolute,
    #[serde(rename = "+")]
    Add,
    #[serde(rename = "-")]
    Sub,
    #[serde(rename = "*")]
    Multiply,
}

/// Overrides the row estimate of the join over exactly `aliases`.
#[derive(Debug, Serialize, Deserialize)]
pub struct RowHint {
    aliases: Vec<String>,
    kind: RowHintKind,
    rows: f64,
    #[serde(skip)]
    used: AtomicBool,
}

impl RowHint {
    pub fn new<S: Into<String>>(aliases: Vec<S>, kind: RowHintKind, rows: f64) -> Self {
        let mut aliases: Vec<String> = aliases.into_iter().map(Into::into).collect();
        aliases.sort();
        Self {
            aliases,
            kind,
            rows,
            used: AtomicBool::new(false),
        }
    }

    pub fn compute_rows(&self, input: f64) -> f64 {
        match self.kind {
            RowHintKind::Absolute => self.rows,
            RowHintKind::Add => input + self.rows,
            RowHintKind::Sub => input - self.rows,
            RowHintKind::Multiply => input * self.rows,
        }
    }

    /// Aliases in lexical order.
    pub fn aliases(&self) -> &[String] {
        &self.aliases
    }

    pub fn kind(&self) -> RowHintKind {
        self.kind
    }

    pub fn is_used(&self) -> bool {
        self.used.load(Ordering::Relaxed)
    }

    pub(super) fn mark_used(&self) {
        self.used.store(true, Ordering::Relaxed)
    }

    /// Hints read from config files list aliases in any order.
    pub(super) fn normalize(&mut self) {
        self.aliases.sort();
    }
}

impl Display for RowHint {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let op = match self.kind {
            RowHintKind::Absolute => "#",
            RowHintKind::Add => "+",
            RowHintKind::Sub => "-",
            RowHintKind::Multiply => "*",
        };
        write!(f, "RowHint: {} {}{}", self.aliases.join(","), op, self.rows)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_compute_rows() {
        let cases = vec![
            (RowHintKind::Absolute, 42.0),
            (RowHintKind::Add, 142.0),
            (RowHintKind::Sub, 58.0),
            (RowHintKind::Multiply, 4200.0),
        ];

        for (kind, expected) in cases {
            let hint = RowHint::new(vec!["t1"], kind, 42.0);
            assert_eq!(expected, hint.compute_rows(100.0), "{:?}", kind);
        }
    }

    #[test]
    fn test_display() {
        let hint = RowHint::new(vec!["t2", "t1"], RowHintKind::Multiply, 2.0);
        assert_eq!("RowHint: t1,t2 *2", hint.to_string());
    }
}
