use std::sync::Arc;

use crate::catalog::{Catalog, MemoryCatalog};
use crate::config::OptimizerConfig;
use crate::cost::{CostModel, SimpleCostModel};
use crate::error::OptResult;
use crate::expr::ColumnFactory;
use crate::hints::PlanHint;
use crate::operator::TableRef;
use crate::stat::{SimpleStatsEstimator, StatsEstimator};

/// Context for optimization. Includes access to catalog, session config and the pluggable
/// models.
///
/// One context serves one optimization. It is shared by reference with rules, derivations and
/// tasks, so everything in it is `Send + Sync`.
pub struct OptimizerContext {
    catalog: Arc<dyn Catalog>,
    config: OptimizerConfig,
    cost_model: Box<dyn CostModel>,
    stats_estimator: Box<dyn StatsEstimator>,
    column_factory: ColumnFactory,
}

impl Default for OptimizerContext {
    fn default() -> Self {
        Self::new(Arc::new(MemoryCatalog::default()), OptimizerConfig::default())
    }
}

impl OptimizerContext {
    /// Uses [`SimpleCostModel`] weighted by `config.cost` and [`SimpleStatsEstimator`].
    pub fn new(catalog: Arc<dyn Catalog>, config: OptimizerConfig) -> Self {
        let cost_model = Box::new(SimpleCostModel::new(config.cost.clone()));
        Self {
            catalog,
            config,
            cost_model,
            stats_estimator: Box::new(SimpleStatsEstimator::default()),
            column_factory: ColumnFactory::default(),
        }
    }

    pub fn with_cost_model(mut self, cost_model: Box<dyn CostModel>) -> Self {
        self.cost_model = cost_model;
        self
    }

    pub fn with_stats_estimator(mut self, stats_estimator: Box<dyn StatsEstimator>) -> Self {
        self.stats_estimator = stats_estimator;
        self
    }

    pub fn catalog(&self) -> &dyn Catalog {
        self.catalog.as_ref()
    }

    pub fn config(&self) -> &OptimizerConfig {
        &self.config
    }

    pub fn plan_hint(&self) -> Option<&PlanHint> {
        self.config.plan_hint.as_ref()
    }

    pub fn cost_model(&self) -> &dyn CostModel {
        self.cost_model.as_ref()
    }

    pub fn stats_estimator(&self) -> &dyn StatsEstimator {
        self.stats_estimator.as_ref()
    }

    pub fn column_factory(&self) -> &ColumnFactory {
        &self.column_factory
    }

    /// Looks up `name` in the catalog and creates fresh column references for it.
    pub fn table_ref(&self, name: &str) -> OptResult<TableRef> {
        let desc = self.catalog.table(name)?;
        Ok(TableRef::new(desc, &self.column_factory))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{ColumnDescriptor, TableDescriptor, TableId};
    use crate::error::OptError;
    use arrow_schema::DataType;

    #[test]
    fn test_table_ref_columns_are_fresh() {
        let catalog = MemoryCatalog::new();
        catalog.register_table(
            TableDescriptor::builder(TableId(1), "t1")
                .column(ColumnDescriptor::new("a", DataType::Int32, -1, 1, true))
                .build()
                .unwrap(),
        );
        let ctx = OptimizerContext::new(Arc::new(catalog), OptimizerConfig::default());

        let first = ctx.table_ref("t1").unwrap();
        let second = ctx.table_ref("t1").unwrap();
        assert_eq!(first.desc().id(), second.desc().id());
        assert_ne!(first.column("a"), second.column("a"));

        let err = ctx.table_ref("t2").unwrap_err();
        assert!(matches!(
            err.downcast_ref::<OptError>(),
            Some(OptError::TableNotFound(_))
        ));
    }
}
