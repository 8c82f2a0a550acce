//! Declarative chart specifications for the dashboard
//!
//! Each builder runs one catalogue query, shapes the result with a transform
//! pipeline and names the columns a renderer should bind to its visual
//! channels. Nothing here draws anything.

use std::collections::BTreeMap;
use std::fmt;

use arrow::array::RecordBatch;
use serde::Serialize;
use serde_json::{Map, Value as JsonValue};
use tracing::debug;

use crate::config::ChartSettings;
use crate::error::Result;
use crate::query::{DashboardQuery, WinsFilter};
use crate::store::RelationalStore;
use crate::transform::{Pipeline, Transform};
use crate::value::batch_to_records;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ChartKind {
    Bar,
    Pie,
    Line,
    Scatter,
    Area,
    Heatmap,
}

impl fmt::Display for ChartKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ChartKind::Bar => "bar",
            ChartKind::Pie => "pie",
            ChartKind::Line => "line",
            ChartKind::Scatter => "scatter",
            ChartKind::Area => "area",
            ChartKind::Heatmap => "heatmap",
        };
        f.write_str(name)
    }
}

/// Which columns feed which visual channel
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ColumnRoles {
    pub x: String,
    pub y: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub size: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub hover: Vec<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ChartSpec {
    pub id: &'static str,
    pub title: String,
    pub kind: ChartKind,
    pub roles: ColumnRoles,
    /// Axis and legend captions keyed by column name
    pub labels: BTreeMap<String, String>,
    pub table: RecordBatch,
}

#[derive(Serialize)]
struct ChartDocument<'a> {
    id: &'a str,
    title: &'a str,
    kind: ChartKind,
    roles: &'a ColumnRoles,
    labels: &'a BTreeMap<String, String>,
    data: Vec<Map<String, JsonValue>>,
}

impl ChartSpec {
    pub fn to_json(&self) -> Result<JsonValue> {
        let document = ChartDocument {
            id: self.id,
            title: &self.title,
            kind: self.kind,
            roles: &self.roles,
            labels: &self.labels,
            data: batch_to_records(&self.table)?,
        };
        Ok(serde_json::to_value(document)?)
    }
}

fn labels(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
    pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect()
}

/// Every column except `index`, in table order
fn value_columns(table: &RecordBatch, index: &str) -> Vec<String> {
    table
        .schema()
        .fields()
        .iter()
        .map(|f| f.name().clone())
        .filter(|name| name != index)
        .collect()
}

pub fn teams_bar(store: &dyn RelationalStore, settings: &ChartSettings) -> Result<ChartSpec> {
    let min_points = settings.teams_min_points;
    let table = DashboardQuery::TeamsBestGoalDifference { min_points }.execute(store)?;

    Ok(ChartSpec {
        id: "teams_bar",
        title: format!("Teams with goal difference above 20 (min {min_points} points)"),
        kind: ChartKind::Bar,
        roles: ColumnRoles {
            x: "team_name".into(),
            y: vec!["goal_difference".into()],
            color: Some("points".into()),
            hover: vec!["points".into()],
            ..Default::default()
        },
        labels: labels(&[("team_name", "Team"), ("goal_difference", "Goal difference"), ("points", "Points")]),
        table,
    })
}

pub fn age_pie(store: &dyn RelationalStore, settings: &ChartSettings) -> Result<ChartSpec> {
    let table = DashboardQuery::AvgPlayerAgeByTeam.execute(store)?;
    let table = Transform::Head(settings.age_pie_top).apply(&table)?;

    Ok(ChartSpec {
        id: "age_pie",
        title: format!("Average player age, top {} teams", settings.age_pie_top),
        kind: ChartKind::Pie,
        roles: ColumnRoles {
            x: "team_name".into(),
            y: vec!["avg_age".into()],
            hover: vec!["player_count".into()],
            ..Default::default()
        },
        labels: labels(&[("team_name", "Team"), ("avg_age", "Average age"), ("player_count", "Players")]),
        table,
    })
}

pub fn wins_line(store: &dyn RelationalStore) -> Result<ChartSpec> {
    let table = DashboardQuery::TeamWinsByYear(WinsFilter::default()).execute(store)?;
    let table = Transform::Pivot {
        index: "year".into(),
        columns: "team_name".into(),
        values: "win_count".into(),
        fill: 0.0,
        column_order: None,
    }
    .apply(&table)?;

    Ok(ChartSpec {
        id: "wins_line",
        title: "Championships won per year".into(),
        kind: ChartKind::Line,
        roles: ColumnRoles { x: "year".into(), y: value_columns(&table, "year"), ..Default::default() },
        labels: labels(&[("year", "Year")]),
        table,
    })
}

pub fn players_scatter(store: &dyn RelationalStore, settings: &ChartSettings) -> Result<ChartSpec> {
    let limit = settings.scatter_limit;
    let table = DashboardQuery::TopPlayersByContributions { limit }.execute(store)?;

    Ok(ChartSpec {
        id: "players_scatter",
        title: format!("Goals and assists of the top {limit} players"),
        kind: ChartKind::Scatter,
        roles: ColumnRoles {
            x: "goal_scored".into(),
            y: vec!["assist_scored".into()],
            color: Some("team_name".into()),
            size: Some("total_contributions".into()),
            hover: vec!["player_name".into()],
        },
        labels: labels(&[
            ("goal_scored", "Goals"),
            ("assist_scored", "Assists"),
            ("total_contributions", "Goals + assists"),
        ]),
        table,
    })
}

pub fn matches_area(store: &dyn RelationalStore) -> Result<ChartSpec> {
    let table = DashboardQuery::MatchesByMonth.execute(store)?;
    let table = Transform::CumulativeSum { order: "month".into(), columns: vec!["match_count".into()] }
        .apply(&table)?;

    Ok(ChartSpec {
        id: "matches_area",
        title: "Cumulative matches by month".into(),
        kind: ChartKind::Area,
        roles: ColumnRoles {
            x: "month".into(),
            y: vec!["match_count_cumulative".into()],
            hover: vec!["match_count".into()],
            ..Default::default()
        },
        labels: labels(&[("month", "Month"), ("match_count_cumulative", "Matches played")]),
        table,
    })
}

pub fn coaches_heatmap(store: &dyn RelationalStore, settings: &ChartSettings) -> Result<ChartSpec> {
    let table = DashboardQuery::CoachesByCountry.execute(store)?;
    let table = Pipeline::new()
        .then(Transform::Bin {
            column: "avg_experience".into(),
            output: "exp_level".into(),
            labels: settings.experience_labels.clone(),
        })
        .then(Transform::Pivot {
            index: "coach_country".into(),
            columns: "exp_level".into(),
            values: "coach_count".into(),
            fill: 0.0,
            column_order: Some(settings.experience_labels.clone()),
        })
        .run(&table)?;

    Ok(ChartSpec {
        id: "coaches_heatmap",
        title: "Coaches by country and experience".into(),
        kind: ChartKind::Heatmap,
        roles: ColumnRoles {
            x: "coach_country".into(),
            y: value_columns(&table, "coach_country"),
            ..Default::default()
        },
        labels: labels(&[("coach_country", "Country")]),
        table,
    })
}

/// All six dashboard charts in display order
pub fn dashboard_charts(store: &dyn RelationalStore, settings: &ChartSettings) -> Result<Vec<ChartSpec>> {
    let charts = vec![
        teams_bar(store, settings)?,
        age_pie(store, settings)?,
        wins_line(store)?,
        players_scatter(store, settings)?,
        matches_area(store)?,
        coaches_heatmap(store, settings)?,
    ];
    for chart in &charts {
        debug!(chart = chart.id, kind = %chart.kind, rows = chart.table.num_rows(), "built chart");
    }
    Ok(charts)
}
