use std::fmt::{Display, Formatter};
use std::sync::atomic::{AtomicBool, Ordering};

use serde::{Deserialize, Serialize};

use crate::operator::OperatorId;

#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub enum JoinTypeHintKind {
    NestLoop,
    NoNestLoop,
    HashJoin,
    NoHashJoin,
}

/// Restricts how the inner join over exactly `aliases` is implemented.
#[derive(Debug, Serialize, Deserialize)]
pub struct JoinTypeHint {
    aliases: Vec<String>,
    kind: JoinTypeHintKind,
    #[serde(skip)]
    used: AtomicBool,
}

impl JoinTypeHint {
    pub fn new<S: Into<String>>(aliases: Vec<S>, kind: JoinTypeHintKind) -> Self {
        let mut aliases: Vec<String> = aliases.into_iter().map(Into::into).collect();
        aliases.sort();
        Self {
            aliases,
            kind,
            used: AtomicBool::new(false),
        }
    }

    /// Aliases in lexical order.
    pub fn aliases(&self) -> &[String] {
        &self.aliases
    }

    pub fn kind(&self) -> JoinTypeHintKind {
        self.kind
    }

    /// Whether a join implemented by `op` is allowed. Marks the hint used when it is.
    pub fn satisfies_operator(&self, op: OperatorId) -> bool {
        let is_nest_loop = op == OperatorId::PhysicalInnerNLJoin;
        let is_hash_join = matches!(
            op,
            OperatorId::PhysicalInnerHashJoin
                | OperatorId::PhysicalLeftOuterHashJoin
                | OperatorId::PhysicalFullHashJoin
        );

        let satisfied = match self.kind {
            JoinTypeHintKind::NestLoop => is_nest_loop,
            JoinTypeHintKind::NoNestLoop => !is_nest_loop,
            JoinTypeHintKind::HashJoin => is_hash_join,
            JoinTypeHintKind::NoHashJoin => !is_hash_join,
        };
        if satisfied {
            self.used.store(true, Ordering::Relaxed);
        }
        satisfied
    }

    pub fn is_used(&self) -> bool {
        self.used.load(Ordering::Relaxed)
    }

    pub(super) fn normalize(&mut self) {
        self.aliases.sort();
    }
}

impl Display for JoinTypeHint {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "JoinTypeHint: {} {:?}",
            self.aliases.join(","),
            self.kind
        )
    }
}
