//! Optimizer configuration.
//!
//! A config is usually written by hand in YAML:
//!
//! ```yaml
//! search:
//!   max_tasks: 100000
//! disabled_rules: [InnerJoinCommutativity]
//! plan_hint:
//!   row_hints:
//!     - aliases: [t1, t2]
//!       kind: "*"
//!       rows: 2.0
//!   join_type_hints:
//!     - aliases: [t1, t2]
//!       kind: NestLoop
//! ```
use serde::{Deserialize, Serialize};

use crate::cost::CostParams;
use crate::error::{OptError, OptResult};
use crate::hints::PlanHint;
use crate::rules::RuleId;

#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct OptimizerConfig {
    pub search: SearchConfig,
    pub cost: CostParams,
    /// Rules never applied in this session.
    pub disabled_rules: Vec<RuleId>,
    pub plan_hint: Option<PlanHint>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchConfig {
    /// Upper limit of tasks executed by the scheduler.
    pub max_tasks: usize,
    /// When false only implementation rules run.
    pub enable_exploration: bool,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            max_tasks: 1_000_000,
            enable_exploration: true,
        }
    }
}

impl OptimizerConfig {
    pub fn from_yaml(yaml: &str) -> OptResult<Self> {
        let config: OptimizerConfig = serde_yaml::from_str(yaml)
            .map_err(|e| OptError::InvalidConfig(e.to_string()))?;
        config.validated()
    }

    pub fn from_json(json: &str) -> OptResult<Self> {
        let config: OptimizerConfig = serde_json::from_str(json)
            .map_err(|e| OptError::InvalidConfig(e.to_string()))?;
        config.validated()
    }

    pub fn with_plan_hint(mut self, plan_hint: PlanHint) -> Self {
        self.plan_hint = Some(plan_hint);
        self
    }

    pub fn is_rule_enabled(&self, rule_id: RuleId) -> bool {
        !self.disabled_rules.contains(&rule_id)
    }

    fn validated(mut self) -> OptResult<Self> {
        if self.search.max_tasks == 0 {
            return Err(OptError::InvalidConfig("search.max_tasks must be positive".into()).into());
        }
        if let Some(plan_hint) = self.plan_hint.as_mut() {
            plan_hint.normalize();
        }
        Ok(self)
    }
}
