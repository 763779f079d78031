//! ## Background
//!
//! A cost based query optimizer accepts a logical expression tree and outputs the cheapest
//! physical plan satisfying the required physical properties of the query, for example the
//! distribution of rows across segments of a cluster or their sort order.
//!
//! The search strategy implemented in this crate is the top-down, memoized search proposed by
//! the cascades framework [1] and refined for massively parallel databases by Orca [2]. Logically
//! equivalent expressions are collected into groups of a [`cascades::Memo`], so that an
//! exponential number of alternative plans is represented in polynomial space. Rules generate
//! alternatives inside groups, properties are derived bottom-up and requirements pushed
//! top-down, and a branch-and-bound enumeration keeps the cheapest plan per group and required
//! property set.
//!
//! ## Design
//!
//! * [`cascades`] Memo, groups, pattern binding and the task scheduler driving the search.
//! * [`operator`] Logical, physical, scalar and pattern operators.
//! * [`expr`] Expression trees and column references.
//! * [`properties`] Logical properties, distribution, order and rewindability specs.
//! * [`rules`] Exploration and implementation rules.
//! * [`stat`] Statistics and the pluggable cardinality estimator.
//! * [`cost`] Cost and the pluggable cost model.
//! * [`catalog`] Table and column descriptors consumed from the host database.
//! * [`hints`] Plan hints overriding row estimates and restricting scans and join types.
//! * [`config`] Optimizer configuration.
//!
//! ## Reference
//!
//! 1. Graefe, G., 1995. The cascades framework for query optimization. IEEE Data Eng. Bull., 18(3),
//! pp.19-29.
//! 2. Soliman, M.A., Antova, L., Raghavan, V., El-Helw, A., Gu, Z., Shen, E., Caragea, G.C.,
//! Garcia-Alvarado, C., Rahman, F., Petropoulos, M. and Waas, F., 2014, June.  Orca: a modular
//! query optimizer architecture for big data. In Proceedings of the 2014 ACM SIGMOD
//! international  conference on Management of data (pp. 337-348).
//! 3. Columnbia Project, https://github.com/yongwen/columbia

#[macro_use]
extern crate prettytable;
#[macro_use]
extern crate lazy_static;

pub mod cascades;
pub mod catalog;
pub mod config;
pub mod cost;
pub mod error;
pub mod expr;
pub mod hints;
pub mod operator;
pub mod optimizer;
pub mod plan;
pub mod properties;
pub mod rules;
pub mod stat;
pub mod utils;

#[cfg(test)]
mod test_utils;

pub use error::{OptError, OptResult};
