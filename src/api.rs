//! Transport-agnostic dashboard JSON API
//!
//! A request is an endpoint path (relative to the API root) plus a flat map
//! of query parameters. Malformed parameters never fail a request: they are
//! replaced by their defaults and the substitution is logged at debug level.

use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::str::FromStr;

use arrow::array::RecordBatch;
use serde::Serialize;
use serde_json::{Map, Value as JsonValue};
use tracing::{debug, info};

use crate::config::Config;
use crate::error::{Result, StatsError};
use crate::query::{DashboardQuery, WinsFilter};
use crate::repository::SimpleStatsReport;
use crate::stats::{summarize, ColumnStatistics};
use crate::store::RelationalStore;
use crate::value::batch_to_records;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Endpoint {
    TeamsGoalDifference,
    PlayersAvgAge,
    HistoryWinsByYear,
    PlayersTop,
    MatchesByMonth,
    CoachesByCountry,
    SimpleStats,
}

impl Endpoint {
    pub const ALL: [Endpoint; 7] = [
        Endpoint::TeamsGoalDifference,
        Endpoint::PlayersAvgAge,
        Endpoint::HistoryWinsByYear,
        Endpoint::PlayersTop,
        Endpoint::MatchesByMonth,
        Endpoint::CoachesByCountry,
        Endpoint::SimpleStats,
    ];

    pub fn path(&self) -> &'static str {
        match self {
            Endpoint::TeamsGoalDifference => "teams/goal-difference",
            Endpoint::PlayersAvgAge => "players/avg-age",
            Endpoint::HistoryWinsByYear => "history/wins-by-year",
            Endpoint::PlayersTop => "players/top",
            Endpoint::MatchesByMonth => "matches/by-month",
            Endpoint::CoachesByCountry => "coaches/by-country",
            Endpoint::SimpleStats => "report/simple-stats",
        }
    }

    /// Leading and trailing slashes are ignored
    pub fn from_path(path: &str) -> Result<Self> {
        let trimmed = path.trim_matches('/');
        Self::ALL
            .into_iter()
            .find(|e| e.path() == trimmed)
            .ok_or_else(|| StatsError::UnknownEndpoint(path.to_string()))
    }

    /// The catalogue query behind this endpoint; `None` for the record-count report
    pub fn query(&self, params: &QueryParams) -> Option<DashboardQuery> {
        let query = match self {
            Endpoint::TeamsGoalDifference => {
                DashboardQuery::TeamsBestGoalDifference { min_points: params.min_points }
            }
            Endpoint::PlayersAvgAge => DashboardQuery::AvgPlayerAgeByTeam,
            Endpoint::HistoryWinsByYear => DashboardQuery::TeamWinsByYear(WinsFilter {
                team: params.team.clone(),
                year_from: params.year_from,
                year_to: params.year_to,
            }),
            Endpoint::PlayersTop => DashboardQuery::TopPlayersByContributions { limit: params.limit },
            Endpoint::MatchesByMonth => DashboardQuery::MatchesByMonth,
            Endpoint::CoachesByCountry => DashboardQuery::CoachesByCountry,
            Endpoint::SimpleStats => return None,
        };
        Some(query)
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.path())
    }
}

/// Parsed request parameters with defaults already substituted
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryParams {
    pub min_points: i64,
    pub limit: usize,
    pub team: Option<String>,
    pub year_from: Option<i64>,
    pub year_to: Option<i64>,
}

impl QueryParams {
    pub fn parse(raw: &HashMap<String, String>, config: &Config) -> Self {
        Self {
            min_points: parse_or(raw, "min_points", config.default_min_points),
            limit: parse_or(raw, "limit", config.default_limit),
            team: raw
                .get("team")
                .map(|t| t.trim())
                .filter(|t| !t.is_empty())
                .map(str::to_string),
            year_from: parse_optional(raw, "year_from"),
            year_to: parse_optional(raw, "year_to"),
        }
    }
}

fn parse_or<T: FromStr>(raw: &HashMap<String, String>, key: &str, default: T) -> T {
    parse_optional(raw, key).unwrap_or(default)
}

fn parse_optional<T: FromStr>(raw: &HashMap<String, String>, key: &str) -> Option<T> {
    let value = raw.get(key)?;
    match value.trim().parse() {
        Ok(parsed) => Some(parsed),
        Err(_) => {
            debug!(key, value = %value, "ignoring malformed parameter");
            None
        }
    }
}

/// Parse `a=1&b=2` into a parameter map. Keys and values are
/// form-decoded (`+` and `%XX`); later keys win.
pub fn parse_query_string(query: &str) -> HashMap<String, String> {
    query
        .split('&')
        .filter(|s| !s.is_empty())
        .filter_map(|pair| {
            let (key, value) = pair.split_once('=').unwrap_or((pair, ""));
            Some((decode_component(key)?, decode_component(value)?))
        })
        .collect()
}

/// `None` when the decoded bytes are not UTF-8
fn decode_component(raw: &str) -> Option<String> {
    let spaced = raw.replace('+', " ");
    match urlencoding::decode(&spaced) {
        Ok(decoded) => Some(decoded.into_owned()),
        Err(_) => {
            debug!(component = raw, "dropping undecodable query component");
            None
        }
    }
}

/// Body returned by every query endpoint
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DashboardResponse {
    pub data: Vec<Map<String, JsonValue>>,
    pub columns: Vec<String>,
    /// `[rows, columns]`
    pub shape: [usize; 2],
    pub statistics: BTreeMap<String, ColumnStatistics>,
    pub info: String,
}

impl DashboardResponse {
    pub fn from_table(table: &RecordBatch) -> Result<Self> {
        let columns = table.schema().fields().iter().map(|f| f.name().clone()).collect();
        Ok(Self {
            data: batch_to_records(table)?,
            columns,
            shape: [table.num_rows(), table.num_columns()],
            statistics: summarize(table),
            info: format!("Total records: {}", table.num_rows()),
        })
    }
}

/// Routes requests to the query catalogue over one store
pub struct DashboardApi<S> {
    store: S,
    config: Config,
}

impl<S: RelationalStore> DashboardApi<S> {
    pub fn new(store: S, config: Config) -> Self {
        Self { store, config }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Run the query behind `endpoint` and return its table
    pub fn query_table(&self, endpoint: Endpoint, raw: &HashMap<String, String>) -> Result<RecordBatch> {
        let params = QueryParams::parse(raw, &self.config);
        let query = endpoint
            .query(&params)
            .ok_or_else(|| StatsError::UnknownEndpoint(format!("{endpoint} has no result table")))?;
        query.execute(&self.store)
    }

    pub fn respond(&self, endpoint: Endpoint, raw: &HashMap<String, String>) -> Result<DashboardResponse> {
        let table = self.query_table(endpoint, raw)?;
        DashboardResponse::from_table(&table)
    }

    /// Route `path` and serialize the response body
    pub fn handle(&self, path: &str, raw: &HashMap<String, String>) -> Result<JsonValue> {
        let endpoint = Endpoint::from_path(path)?;
        let body = match endpoint {
            Endpoint::SimpleStats => serde_json::to_value(SimpleStatsReport::from_store(&self.store)?)?,
            _ => serde_json::to_value(self.respond(endpoint, raw)?)?,
        };
        info!(endpoint = %endpoint, "handled request");
        Ok(body)
    }
}
