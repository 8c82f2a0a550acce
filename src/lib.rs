//! League statistics engine: a catalogue of grouped queries over the league
//! tables, tabular reshaping of their results, per-column summaries and the
//! chart and JSON documents built from them.

pub mod aggregator;
pub mod api;
pub mod chart;
pub mod config;
pub mod error;
pub mod expressions;
pub mod filter;
pub mod model;
pub mod query;
pub mod reader;
pub mod repository;
pub mod stats;
pub mod store;
pub mod transform;
pub mod utils;
pub mod value;

pub use api::{DashboardApi, DashboardResponse, Endpoint, QueryParams};
pub use chart::{dashboard_charts, ChartKind, ChartSpec, ColumnRoles};
pub use config::{ChartSettings, Config};
pub use error::{Result, StatsError};
pub use query::{DashboardQuery, QuerySpec, WinsFilter};
pub use repository::{Catalog, Repository, SimpleStatsReport};
pub use stats::{summarize, ColumnStatistics};
pub use store::{ParquetStore, RelationalStore};
pub use transform::{Pipeline, Transform};
