//! Query orchestration - ties together scan, lookup, filter, aggregation and sort
//!
//! Every dashboard query is a declarative [`QuerySpec`]. The executor runs the
//! stages in a fixed order:
//!
//! scan → lookups → filters → derived columns → group/aggregate → sort → limit → project

use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::sync::Arc;

use arrow::array::{Array, ArrayRef, AsArray, RecordBatch, UInt32Array};
use arrow::compute::{cast, take};
use arrow::datatypes::{DataType, Field, Int64Type, Schema};
use tracing::{debug, warn};

use crate::aggregator::{group_by, AggregateSpec};
use crate::error::{Result, StatsError};
use crate::expressions::{add_int_columns, truncate_to_month, Expr};
use crate::filter::{apply_filters, Predicate};
use crate::model::EntityKind;
use crate::store::RelationalStore;
use crate::utils::{append_column, get_column, project, sort_batch, OrderBy};

pub const DEFAULT_MIN_POINTS: i64 = 50;
pub const DEFAULT_LIMIT: usize = 10;

/// Goal difference a team needs to appear in the goal-difference ranking
pub const GOAL_DIFFERENCE_THRESHOLD: i64 = 20;

/// Many-to-one lookup: for each row, fetch `columns` from the `entity` row
/// whose `right_key` equals this row's `left_key`. Unmatched rows get nulls.
#[derive(Debug, Clone, PartialEq)]
pub struct Lookup {
    pub entity: EntityKind,
    pub left_key: String,
    pub right_key: String,
    pub columns: Vec<String>,
}

impl Lookup {
    pub fn new(entity: EntityKind, left_key: &str, right_key: &str, columns: &[&str]) -> Self {
        Self {
            entity,
            left_key: left_key.to_string(),
            right_key: right_key.to_string(),
            columns: columns.iter().map(|c| c.to_string()).collect(),
        }
    }
}

/// A computed column appended before grouping
#[derive(Debug, Clone, PartialEq)]
pub enum Derived {
    /// Integer sum of two integer columns
    IntSum { name: String, left: String, right: String },
    /// Date truncated to the first day of its month
    Month { name: String, source: String },
    /// Float64 arithmetic
    Expr { name: String, expr: Expr },
}

impl Derived {
    pub fn name(&self) -> &str {
        match self {
            Derived::IntSum { name, .. } | Derived::Month { name, .. } | Derived::Expr { name, .. } => {
                name
            }
        }
    }

    fn evaluate(&self, batch: &RecordBatch) -> Result<ArrayRef> {
        match self {
            Derived::IntSum { left, right, .. } => add_int_columns(batch, left, right),
            Derived::Month { source, .. } => truncate_to_month(batch, source),
            Derived::Expr { expr, .. } => Ok(Arc::new(expr.evaluate(batch)?)),
        }
    }
}

/// Structured request against one entity
#[derive(Debug, Clone, PartialEq)]
pub struct QuerySpec {
    pub entity: EntityKind,
    pub lookups: Vec<Lookup>,
    pub predicates: Vec<Predicate>,
    pub derived: Vec<Derived>,
    pub group_by: Vec<String>,
    pub aggregates: Vec<AggregateSpec>,
    pub order_by: Vec<OrderBy>,
    pub limit: Option<usize>,
    /// Output columns; for grouped queries the keys and aliases are used instead
    pub select: Vec<String>,
}

impl QuerySpec {
    pub fn scan(entity: EntityKind) -> Self {
        Self {
            entity,
            lookups: Vec::new(),
            predicates: Vec::new(),
            derived: Vec::new(),
            group_by: Vec::new(),
            aggregates: Vec::new(),
            order_by: Vec::new(),
            limit: None,
            select: Vec::new(),
        }
    }

    pub fn lookup(mut self, lookup: Lookup) -> Self {
        self.lookups.push(lookup);
        self
    }

    pub fn filter(mut self, predicate: Predicate) -> Self {
        self.predicates.push(predicate);
        self
    }

    pub fn derive(mut self, derived: Derived) -> Self {
        self.derived.push(derived);
        self
    }

    pub fn group_by(mut self, keys: &[&str], aggregates: Vec<AggregateSpec>) -> Self {
        self.group_by = keys.iter().map(|k| k.to_string()).collect();
        self.aggregates = aggregates;
        self
    }

    pub fn order_by(mut self, key: OrderBy) -> Self {
        self.order_by.push(key);
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn select(mut self, columns: &[&str]) -> Self {
        self.select = columns.iter().map(|c| c.to_string()).collect();
        self
    }

    pub fn is_grouped(&self) -> bool {
        !self.group_by.is_empty()
    }

    /// Run against `store` and return the result table
    pub fn execute(&self, store: &dyn RelationalStore) -> Result<RecordBatch> {
        let mut table = store.scan(self.entity, None)?;
        debug!(entity = %self.entity, rows = table.num_rows(), "scanned");

        for lookup in &self.lookups {
            table = apply_lookup(store, &table, lookup)?;
        }

        table = apply_filters(&table, &self.predicates)?;

        for derived in &self.derived {
            let values = derived.evaluate(&table)?;
            table = append_column(&table, derived.name(), values)?;
        }

        if self.is_grouped() {
            let keys: Vec<&str> = self.group_by.iter().map(String::as_str).collect();
            table = group_by(&table, &keys, &self.aggregates)?;
        }

        table = sort_batch(&table, &self.order_by)?;

        if let Some(limit) = self.limit {
            table = table.slice(0, limit.min(table.num_rows()));
        }

        if !self.select.is_empty() {
            let columns: Vec<&str> = self.select.iter().map(String::as_str).collect();
            table = project(&table, &columns)?;
        }

        debug!(entity = %self.entity, rows = table.num_rows(), "query finished");
        Ok(table)
    }
}

/// Left join `table` with a projection of `lookup.entity` on an integer key
fn apply_lookup(store: &dyn RelationalStore, table: &RecordBatch, lookup: &Lookup) -> Result<RecordBatch> {
    let mut right_columns: Vec<&str> = vec![lookup.right_key.as_str()];
    right_columns.extend(lookup.columns.iter().map(String::as_str));
    let right = store.scan(lookup.entity, Some(right_columns.as_slice()))?;

    let left_keys = int_keys(get_column(table, &lookup.left_key)?, &lookup.left_key)?;
    let right_keys = int_keys(right.column(0), &lookup.right_key)?;
    let right_keys = right_keys.as_primitive::<Int64Type>();

    // First row wins for duplicate keys on the right
    let mut index: HashMap<i64, u32> = HashMap::with_capacity(right_keys.len());
    let mut duplicates = 0usize;
    for (row, key) in right_keys.iter().enumerate() {
        if let Some(key) = key {
            match index.entry(key) {
                Entry::Occupied(_) => duplicates += 1,
                Entry::Vacant(slot) => {
                    slot.insert(row as u32);
                }
            }
        }
    }
    if duplicates > 0 {
        warn!(entity = %lookup.entity, key = %lookup.right_key, duplicates, "duplicate lookup keys");
    }

    let left_keys = left_keys.as_primitive::<Int64Type>();
    let indices: UInt32Array = left_keys
        .iter()
        .map(|key| key.and_then(|k| index.get(&k).copied()))
        .collect();

    // a non-null key with no match is a dangling reference
    let dangling = indices.null_count() - left_keys.null_count();
    if dangling > 0 {
        warn!(entity = %lookup.entity, key = %lookup.left_key, dangling, "unresolved lookup keys");
    }

    let mut fields: Vec<Field> = table.schema().fields().iter().map(|f| f.as_ref().clone()).collect();
    let mut columns = table.columns().to_vec();
    for (i, name) in lookup.columns.iter().enumerate() {
        let source = right.column(i + 1);
        if fields.iter().any(|f| f.name() == name) {
            return Err(StatsError::precondition(format!(
                "lookup column {name} collides with an existing column"
            )));
        }
        fields.push(Field::new(name, source.data_type().clone(), true));
        columns.push(take(source.as_ref(), &indices, None)?);
    }

    Ok(RecordBatch::try_new(Arc::new(Schema::new(fields)), columns)?)
}

fn int_keys(col: &ArrayRef, name: &str) -> Result<ArrayRef> {
    if !col.data_type().is_integer() {
        return Err(StatsError::precondition(format!("join key {name} is not an integer")));
    }
    Ok(cast(col, &DataType::Int64)?)
}

/// Optional filters accepted by the wins-by-year query
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WinsFilter {
    /// Case-insensitive substring of the team name
    pub team: Option<String>,
    pub year_from: Option<i64>,
    pub year_to: Option<i64>,
}

/// The fixed catalogue of dashboard queries
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DashboardQuery {
    TeamsBestGoalDifference { min_points: i64 },
    AvgPlayerAgeByTeam,
    TeamWinsByYear(WinsFilter),
    TopPlayersByContributions { limit: usize },
    MatchesByMonth,
    CoachesByCountry,
}

impl DashboardQuery {
    pub fn name(&self) -> &'static str {
        match self {
            Self::TeamsBestGoalDifference { .. } => "teams_best_goal_difference",
            Self::AvgPlayerAgeByTeam => "avg_player_age_by_team",
            Self::TeamWinsByYear(_) => "team_wins_by_year",
            Self::TopPlayersByContributions { .. } => "top_players_by_contributions",
            Self::MatchesByMonth => "matches_by_month",
            Self::CoachesByCountry => "coaches_by_country",
        }
    }

    /// The structured request for this query
    pub fn spec(&self) -> QuerySpec {
        match self {
            Self::TeamsBestGoalDifference { min_points } => QuerySpec::scan(EntityKind::Team)
                .filter(Predicate::gt_eq("points", *min_points))
                .filter(Predicate::gt("goal_difference", GOAL_DIFFERENCE_THRESHOLD))
                .order_by(OrderBy::desc("goal_difference"))
                .select(&["team_id", "team_name", "points", "goal_difference"]),

            Self::AvgPlayerAgeByTeam => QuerySpec::scan(EntityKind::PlayerTechnical)
                .lookup(Lookup::new(EntityKind::PlayerDetailed, "player_id", "player_id", &["player_age"]))
                .lookup(Lookup::new(EntityKind::Team, "player_team", "team_id", &["team_name"]))
                .filter(Predicate::not_null("player_age"))
                .group_by(
                    &["team_name"],
                    vec![
                        AggregateSpec::avg("player_age", "avg_age"),
                        AggregateSpec::count("player_id", "player_count"),
                    ],
                )
                .order_by(OrderBy::desc("avg_age")),

            Self::TeamWinsByYear(filter) => {
                let mut spec = QuerySpec::scan(EntityKind::History)
                    .lookup(Lookup::new(EntityKind::Team, "win_team", "team_id", &["team_name"]))
                    .filter(Predicate::not_null("win_team"));
                if let Some(team) = &filter.team {
                    spec = spec.filter(Predicate::contains_ignore_case("team_name", team));
                }
                if let Some(year_from) = filter.year_from {
                    spec = spec.filter(Predicate::gt_eq("year", year_from));
                }
                if let Some(year_to) = filter.year_to {
                    spec = spec.filter(Predicate::lt_eq("year", year_to));
                }
                spec.group_by(&["year", "team_name"], vec![AggregateSpec::count("win_team", "win_count")])
                    .order_by(OrderBy::desc("year"))
                    .order_by(OrderBy::desc("win_count"))
            }

            Self::TopPlayersByContributions { limit } => QuerySpec::scan(EntityKind::PlayerTechnical)
                .lookup(Lookup::new(EntityKind::Team, "player_team", "team_id", &["team_name"]))
                .derive(Derived::IntSum {
                    name: "total_contributions".into(),
                    left: "goal_scored".into(),
                    right: "assist_scored".into(),
                })
                .order_by(OrderBy::desc("total_contributions"))
                .order_by(OrderBy::asc("player_id"))
                .limit(*limit)
                .select(&["player_name", "team_name", "goal_scored", "assist_scored", "total_contributions"]),

            Self::MatchesByMonth => QuerySpec::scan(EntityKind::Calendar)
                .derive(Derived::Month { name: "month".into(), source: "event_date".into() })
                .group_by(&["month"], vec![AggregateSpec::count("event_id", "match_count")])
                .order_by(OrderBy::asc("month")),

            Self::CoachesByCountry => QuerySpec::scan(EntityKind::Coach)
                .filter(Predicate::not_null("coach_country"))
                .group_by(
                    &["coach_country"],
                    vec![
                        AggregateSpec::count("coach_id", "coach_count"),
                        AggregateSpec::avg("experience", "avg_experience"),
                        AggregateSpec::max("experience", "max_experience"),
                    ],
                )
                .order_by(OrderBy::desc("coach_count")),
        }
    }

    pub fn execute(&self, store: &dyn RelationalStore) -> Result<RecordBatch> {
        debug!(query = self.name(), "executing dashboard query");
        self.spec().execute(store)
    }
}

pub fn teams_best_goal_difference(store: &dyn RelationalStore, min_points: i64) -> Result<RecordBatch> {
    DashboardQuery::TeamsBestGoalDifference { min_points }.execute(store)
}

pub fn avg_player_age_by_team(store: &dyn RelationalStore) -> Result<RecordBatch> {
    DashboardQuery::AvgPlayerAgeByTeam.execute(store)
}

pub fn team_wins_by_year(store: &dyn RelationalStore, filter: WinsFilter) -> Result<RecordBatch> {
    DashboardQuery::TeamWinsByYear(filter).execute(store)
}

pub fn top_players_by_contributions(store: &dyn RelationalStore, limit: usize) -> Result<RecordBatch> {
    DashboardQuery::TopPlayersByContributions { limit }.execute(store)
}

pub fn matches_by_month(store: &dyn RelationalStore) -> Result<RecordBatch> {
    DashboardQuery::MatchesByMonth.execute(store)
}

pub fn coaches_by_country(store: &dyn RelationalStore) -> Result<RecordBatch> {
    DashboardQuery::CoachesByCountry.execute(store)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Calendar, Coach, History, PlayerDetailed, PlayerTechnical, Team};
    use crate::repository::Catalog;
    use crate::value::{column_cells, CellValue};
    use arrow::datatypes::{Date32Type, Float64Type};
    use chrono::NaiveDate;

    fn team(id: i64, name: &str, points: i64, gd: i64) -> Team {
        Team { team_id: id, team_name: name.into(), points, goal_difference: gd, ..Team::default() }
    }

    fn player(id: i64, name: &str, team: Option<i64>, goals: i64, assists: i64) -> PlayerTechnical {
        PlayerTechnical {
            player_id: id,
            player_name: name.into(),
            player_team: team,
            goal_scored: goals,
            assist_scored: assists,
        }
    }

    fn catalog() -> Catalog {
        let mut c = Catalog::new();
        for t in [
            team(1, "Napoli", 90, 49),
            team(2, "Lazio", 74, 18),
            team(3, "Inter", 72, 35),
            team(4, "Milan", 70, 21),
            team(5, "Sassuolo", 45, 25),
        ] {
            c.teams.create(t);
        }
        for p in [
            player(1, "Osimhen", Some(1), 26, 4),
            player(2, "Kvara", Some(1), 12, 13),
            player(3, "Lautaro", Some(3), 21, 6),
            player(4, "Leao", Some(4), 15, 8),
            player(5, "Free Agent", None, 1, 0),
        ] {
            c.player_technical.create(p);
        }
        for (id, age) in [(1, Some(24)), (2, Some(22)), (3, Some(25)), (4, None), (5, Some(33))] {
            c.player_detailed.create(PlayerDetailed { player_id: id, player_age: age, player_country: None });
        }
        for (year, win) in [(2021, Some(3)), (2022, Some(4)), (2023, Some(1)), (2020, None), (2023, Some(1))] {
            c.history.create(History { history_id: 0, year, win_team: win });
        }
        c
    }

    fn strings(batch: &RecordBatch, name: &str) -> Vec<CellValue> {
        column_cells(get_column(batch, name).unwrap()).unwrap()
    }

    #[test]
    fn test_teams_best_goal_difference() {
        let out = teams_best_goal_difference(&catalog(), 50).unwrap();
        assert_eq!(out.num_columns(), 4);
        let names = strings(&out, "team_name");
        assert_eq!(
            names,
            vec![CellValue::Text("Napoli".into()), CellValue::Text("Inter".into()), CellValue::Text("Milan".into())]
        );
    }

    #[test]
    fn test_avg_player_age_by_team() {
        let out = avg_player_age_by_team(&catalog()).unwrap();
        // Leao has no age, the free agent forms a null-team group
        let names = strings(&out, "team_name");
        assert_eq!(names, vec![CellValue::Null, CellValue::Text("Inter".into()), CellValue::Text("Napoli".into())]);

        let avg = get_column(&out, "avg_age").unwrap().as_primitive::<Float64Type>().clone();
        assert_eq!(avg.value(0), 33.0);
        assert_eq!(avg.value(2), 23.0);
        let counts = get_column(&out, "player_count").unwrap().as_primitive::<Int64Type>().clone();
        assert_eq!(counts.value(2), 2);
    }

    #[test]
    fn test_team_wins_by_year() {
        let out = team_wins_by_year(&catalog(), WinsFilter::default()).unwrap();
        assert_eq!(out.num_rows(), 3);
        let years = get_column(&out, "year").unwrap().as_primitive::<Int64Type>().clone();
        assert_eq!(years.values().to_vec(), vec![2023, 2022, 2021]);
        let wins = get_column(&out, "win_count").unwrap().as_primitive::<Int64Type>().clone();
        assert_eq!(wins.value(0), 2);

        let filtered = team_wins_by_year(
            &catalog(),
            WinsFilter { team: Some("MIL".into()), year_from: Some(2021), year_to: Some(2022) },
        )
        .unwrap();
        assert_eq!(filtered.num_rows(), 1);
        assert_eq!(strings(&filtered, "team_name"), vec![CellValue::Text("Milan".into())]);
    }

    #[test]
    fn test_top_players_tie_break_on_player_id() {
        let mut c = catalog();
        // same total as Osimhen (30), higher id
        c.player_technical.create(player(6, "Twin", Some(2), 20, 10));

        let out = top_players_by_contributions(&c, 3).unwrap();
        assert_eq!(out.num_rows(), 3);
        assert_eq!(
            strings(&out, "player_name"),
            vec![
                CellValue::Text("Osimhen".into()),
                CellValue::Text("Twin".into()),
                CellValue::Text("Lautaro".into()),
            ]
        );
        let totals = get_column(&out, "total_contributions").unwrap();
        assert_eq!(totals.data_type(), &DataType::Int64);

        assert_eq!(top_players_by_contributions(&c, 0).unwrap().num_rows(), 0);
        assert_eq!(top_players_by_contributions(&c, 100).unwrap().num_rows(), 6);
    }

    #[test]
    fn test_matches_by_month() {
        let mut c = Catalog::new();
        for (d, m) in [(5, 1), (20, 1), (3, 2)] {
            c.calendar.create(Calendar {
                event_id: 0,
                event_name: "Matchday".into(),
                event_date: NaiveDate::from_ymd_opt(2023, m, d).unwrap(),
            });
        }

        let out = matches_by_month(&c).unwrap();
        assert_eq!(out.num_rows(), 2);
        let months = get_column(&out, "month").unwrap().as_primitive::<Date32Type>().clone();
        assert_eq!(
            crate::value::days_to_date(months.value(0)),
            NaiveDate::from_ymd_opt(2023, 1, 1)
        );
        let counts = get_column(&out, "match_count").unwrap().as_primitive::<Int64Type>().clone();
        assert_eq!(counts.values().to_vec(), vec![2, 1]);
    }

    #[test]
    fn test_coaches_by_country() {
        let mut c = Catalog::new();
        for (country, exp) in [(Some("ES"), 5), (Some("IT"), 10), (Some("IT"), 20), (None, 30)] {
            c.coaches.create(Coach {
                coach_name: "Coach".into(),
                coach_country: country.map(String::from),
                experience: exp,
                ..Coach::default()
            });
        }

        let out = coaches_by_country(&c).unwrap();
        assert_eq!(
            strings(&out, "coach_country"),
            vec![CellValue::Text("IT".into()), CellValue::Text("ES".into())]
        );
        assert_eq!(strings(&out, "coach_count"), vec![CellValue::Int(2), CellValue::Int(1)]);
        assert_eq!(strings(&out, "avg_experience"), vec![CellValue::Float(15.0), CellValue::Float(5.0)]);
        assert_eq!(strings(&out, "max_experience"), vec![CellValue::Int(20), CellValue::Int(5)]);
    }

    #[test]
    fn test_empty_store_yields_empty_tables() {
        let empty = Catalog::new();
        let queries = [
            DashboardQuery::TeamsBestGoalDifference { min_points: DEFAULT_MIN_POINTS },
            DashboardQuery::AvgPlayerAgeByTeam,
            DashboardQuery::TeamWinsByYear(WinsFilter::default()),
            DashboardQuery::TopPlayersByContributions { limit: DEFAULT_LIMIT },
            DashboardQuery::MatchesByMonth,
            DashboardQuery::CoachesByCountry,
        ];
        for query in queries {
            let out = query.execute(&empty).unwrap();
            assert_eq!(out.num_rows(), 0, "{}", query.name());
        }
    }

    #[test]
    fn test_lookup_collision_fails_fast() {
        let spec = QuerySpec::scan(EntityKind::Team).lookup(Lookup::new(
            EntityKind::Team,
            "team_id",
            "team_id",
            &["team_name"],
        ));
        let err = spec.execute(&catalog()).unwrap_err();
        assert!(matches!(err, StatsError::TransformPrecondition(_)));
    }
}
