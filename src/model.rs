//! League entities and their columnar layout
//!
//! Every entity knows its Arrow schema and how to lay a slice of rows out as
//! a `RecordBatch`, which is the only shape the query layer consumes.

use std::fmt;
use std::sync::Arc;

use arrow_array::{ArrayRef, Date32Array, Int64Array, RecordBatch, StringArray};
use arrow_schema::{DataType, Field, Schema, SchemaRef};
use chrono::NaiveDate;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::value::date_to_days;

/// Entity tables known to the store
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    Team,
    Coach,
    Stadium,
    Calendar,
    Match,
    History,
    PlayerDetailed,
    PlayerTechnical,
}

impl EntityKind {
    pub const ALL: [EntityKind; 8] = [
        EntityKind::Team,
        EntityKind::Coach,
        EntityKind::Stadium,
        EntityKind::Calendar,
        EntityKind::Match,
        EntityKind::History,
        EntityKind::PlayerDetailed,
        EntityKind::PlayerTechnical,
    ];

    /// Table name, also the Parquet file stem
    pub fn table_name(&self) -> &'static str {
        match self {
            EntityKind::Team => "team",
            EntityKind::Coach => "coach",
            EntityKind::Stadium => "stadium",
            EntityKind::Calendar => "calendar",
            EntityKind::Match => "match",
            EntityKind::History => "history",
            EntityKind::PlayerDetailed => "player_detailed",
            EntityKind::PlayerTechnical => "player_technical",
        }
    }

    /// Primary key column
    pub fn id_column(&self) -> &'static str {
        match self {
            EntityKind::Team => "team_id",
            EntityKind::Coach => "coach_id",
            EntityKind::Stadium => "stadium_id",
            EntityKind::Calendar => "event_id",
            EntityKind::Match => "match_id",
            EntityKind::History => "history_id",
            EntityKind::PlayerDetailed | EntityKind::PlayerTechnical => "player_id",
        }
    }

    pub fn schema(&self) -> SchemaRef {
        match self {
            EntityKind::Team => Team::schema(),
            EntityKind::Coach => Coach::schema(),
            EntityKind::Stadium => Stadium::schema(),
            EntityKind::Calendar => Calendar::schema(),
            EntityKind::Match => Match::schema(),
            EntityKind::History => History::schema(),
            EntityKind::PlayerDetailed => PlayerDetailed::schema(),
            EntityKind::PlayerTechnical => PlayerTechnical::schema(),
        }
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.table_name())
    }
}

/// A row type stored in a repository and scanned as a columnar table
pub trait Entity: Clone + fmt::Debug + Serialize + DeserializeOwned + Send + Sync + 'static {
    const KIND: EntityKind;

    fn id(&self) -> i64;

    fn set_id(&mut self, id: i64);

    fn schema() -> SchemaRef;

    /// Column arrays in schema order
    fn columns(rows: &[Self]) -> Vec<ArrayRef>;

    fn to_batch(rows: &[Self]) -> Result<RecordBatch> {
        Ok(RecordBatch::try_new(Self::schema(), Self::columns(rows))?)
    }
}

fn int_col<T>(rows: &[T], f: impl Fn(&T) -> i64) -> ArrayRef {
    Arc::new(rows.iter().map(f).collect::<Int64Array>())
}

fn opt_int_col<T>(rows: &[T], f: impl Fn(&T) -> Option<i64>) -> ArrayRef {
    Arc::new(rows.iter().map(f).collect::<Int64Array>())
}

fn str_col<T>(rows: &[T], f: impl Fn(&T) -> Option<&str>) -> ArrayRef {
    Arc::new(rows.iter().map(f).collect::<StringArray>())
}

fn date_col<T>(rows: &[T], f: impl Fn(&T) -> NaiveDate) -> ArrayRef {
    Arc::new(rows.iter().map(|r| Some(date_to_days(f(r)))).collect::<Date32Array>())
}

fn schema_of(fields: Vec<Field>) -> SchemaRef {
    Arc::new(Schema::new(fields))
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Team {
    #[serde(default)]
    pub team_id: i64,
    pub team_name: String,
    pub points: i64,
    pub wins: i64,
    pub draws: i64,
    pub losses: i64,
    pub goals_for: i64,
    pub goals_against: i64,
    /// goals_for - goals_against, kept in sync by whoever writes the row
    pub goal_difference: i64,
}

impl Entity for Team {
    const KIND: EntityKind = EntityKind::Team;

    fn id(&self) -> i64 {
        self.team_id
    }

    fn set_id(&mut self, id: i64) {
        self.team_id = id;
    }

    fn schema() -> SchemaRef {
        schema_of(vec![
            Field::new("team_id", DataType::Int64, false),
            Field::new("team_name", DataType::Utf8, false),
            Field::new("points", DataType::Int64, false),
            Field::new("wins", DataType::Int64, false),
            Field::new("draws", DataType::Int64, false),
            Field::new("losses", DataType::Int64, false),
            Field::new("goals_for", DataType::Int64, false),
            Field::new("goals_against", DataType::Int64, false),
            Field::new("goal_difference", DataType::Int64, false),
        ])
    }

    fn columns(rows: &[Self]) -> Vec<ArrayRef> {
        vec![
            int_col(rows, |r| r.team_id),
            str_col(rows, |r| Some(r.team_name.as_str())),
            int_col(rows, |r| r.points),
            int_col(rows, |r| r.wins),
            int_col(rows, |r| r.draws),
            int_col(rows, |r| r.losses),
            int_col(rows, |r| r.goals_for),
            int_col(rows, |r| r.goals_against),
            int_col(rows, |r| r.goal_difference),
        ]
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Coach {
    #[serde(default)]
    pub coach_id: i64,
    pub coach_name: String,
    pub coach_country: Option<String>,
    /// Years of experience
    pub experience: i64,
    pub coach_team: Option<i64>,
}

impl Entity for Coach {
    const KIND: EntityKind = EntityKind::Coach;

    fn id(&self) -> i64 {
        self.coach_id
    }

    fn set_id(&mut self, id: i64) {
        self.coach_id = id;
    }

    fn schema() -> SchemaRef {
        schema_of(vec![
            Field::new("coach_id", DataType::Int64, false),
            Field::new("coach_name", DataType::Utf8, false),
            Field::new("coach_country", DataType::Utf8, true),
            Field::new("experience", DataType::Int64, false),
            Field::new("coach_team", DataType::Int64, true),
        ])
    }

    fn columns(rows: &[Self]) -> Vec<ArrayRef> {
        vec![
            int_col(rows, |r| r.coach_id),
            str_col(rows, |r| Some(r.coach_name.as_str())),
            str_col(rows, |r| r.coach_country.as_deref()),
            int_col(rows, |r| r.experience),
            opt_int_col(rows, |r| r.coach_team),
        ]
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Stadium {
    #[serde(default)]
    pub stadium_id: i64,
    pub stadium_name: String,
    pub city: String,
    pub capacity: i64,
    pub stadium_team: Option<i64>,
}

impl Entity for Stadium {
    const KIND: EntityKind = EntityKind::Stadium;

    fn id(&self) -> i64 {
        self.stadium_id
    }

    fn set_id(&mut self, id: i64) {
        self.stadium_id = id;
    }

    fn schema() -> SchemaRef {
        schema_of(vec![
            Field::new("stadium_id", DataType::Int64, false),
            Field::new("stadium_name", DataType::Utf8, false),
            Field::new("city", DataType::Utf8, false),
            Field::new("capacity", DataType::Int64, false),
            Field::new("stadium_team", DataType::Int64, true),
        ])
    }

    fn columns(rows: &[Self]) -> Vec<ArrayRef> {
        vec![
            int_col(rows, |r| r.stadium_id),
            str_col(rows, |r| Some(r.stadium_name.as_str())),
            str_col(rows, |r| Some(r.city.as_str())),
            int_col(rows, |r| r.capacity),
            opt_int_col(rows, |r| r.stadium_team),
        ]
    }
}

/// A scheduled event on the league calendar
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Calendar {
    #[serde(default)]
    pub event_id: i64,
    pub event_name: String,
    pub event_date: NaiveDate,
}

impl Entity for Calendar {
    const KIND: EntityKind = EntityKind::Calendar;

    fn id(&self) -> i64 {
        self.event_id
    }

    fn set_id(&mut self, id: i64) {
        self.event_id = id;
    }

    fn schema() -> SchemaRef {
        schema_of(vec![
            Field::new("event_id", DataType::Int64, false),
            Field::new("event_name", DataType::Utf8, false),
            Field::new("event_date", DataType::Date32, false),
        ])
    }

    fn columns(rows: &[Self]) -> Vec<ArrayRef> {
        vec![
            int_col(rows, |r| r.event_id),
            str_col(rows, |r| Some(r.event_name.as_str())),
            date_col(rows, |r| r.event_date),
        ]
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Match {
    #[serde(default)]
    pub match_id: i64,
    pub home_team: i64,
    pub away_team: i64,
    pub home_goals: i64,
    pub away_goals: i64,
    pub match_date: NaiveDate,
}

impl Entity for Match {
    const KIND: EntityKind = EntityKind::Match;

    fn id(&self) -> i64 {
        self.match_id
    }

    fn set_id(&mut self, id: i64) {
        self.match_id = id;
    }

    fn schema() -> SchemaRef {
        schema_of(vec![
            Field::new("match_id", DataType::Int64, false),
            Field::new("home_team", DataType::Int64, false),
            Field::new("away_team", DataType::Int64, false),
            Field::new("home_goals", DataType::Int64, false),
            Field::new("away_goals", DataType::Int64, false),
            Field::new("match_date", DataType::Date32, false),
        ])
    }

    fn columns(rows: &[Self]) -> Vec<ArrayRef> {
        vec![
            int_col(rows, |r| r.match_id),
            int_col(rows, |r| r.home_team),
            int_col(rows, |r| r.away_team),
            int_col(rows, |r| r.home_goals),
            int_col(rows, |r| r.away_goals),
            date_col(rows, |r| r.match_date),
        ]
    }
}

/// One season outcome
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct History {
    #[serde(default)]
    pub history_id: i64,
    pub year: i64,
    pub win_team: Option<i64>,
}

impl Entity for History {
    const KIND: EntityKind = EntityKind::History;

    fn id(&self) -> i64 {
        self.history_id
    }

    fn set_id(&mut self, id: i64) {
        self.history_id = id;
    }

    fn schema() -> SchemaRef {
        schema_of(vec![
            Field::new("history_id", DataType::Int64, false),
            Field::new("year", DataType::Int64, false),
            Field::new("win_team", DataType::Int64, true),
        ])
    }

    fn columns(rows: &[Self]) -> Vec<ArrayRef> {
        vec![
            int_col(rows, |r| r.history_id),
            int_col(rows, |r| r.year),
            opt_int_col(rows, |r| r.win_team),
        ]
    }
}

/// Biographical record, one per player
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct PlayerDetailed {
    #[serde(default)]
    pub player_id: i64,
    pub player_age: Option<i64>,
    pub player_country: Option<String>,
}

impl Entity for PlayerDetailed {
    const KIND: EntityKind = EntityKind::PlayerDetailed;

    fn id(&self) -> i64 {
        self.player_id
    }

    fn set_id(&mut self, id: i64) {
        self.player_id = id;
    }

    fn schema() -> SchemaRef {
        schema_of(vec![
            Field::new("player_id", DataType::Int64, false),
            Field::new("player_age", DataType::Int64, true),
            Field::new("player_country", DataType::Utf8, true),
        ])
    }

    fn columns(rows: &[Self]) -> Vec<ArrayRef> {
        vec![
            int_col(rows, |r| r.player_id),
            opt_int_col(rows, |r| r.player_age),
            str_col(rows, |r| r.player_country.as_deref()),
        ]
    }
}

/// Technical season stats, one per player
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct PlayerTechnical {
    #[serde(default)]
    pub player_id: i64,
    pub player_name: String,
    pub player_team: Option<i64>,
    pub goal_scored: i64,
    pub assist_scored: i64,
}

impl Entity for PlayerTechnical {
    const KIND: EntityKind = EntityKind::PlayerTechnical;

    fn id(&self) -> i64 {
        self.player_id
    }

    fn set_id(&mut self, id: i64) {
        self.player_id = id;
    }

    fn schema() -> SchemaRef {
        schema_of(vec![
            Field::new("player_id", DataType::Int64, false),
            Field::new("player_name", DataType::Utf8, false),
            Field::new("player_team", DataType::Int64, true),
            Field::new("goal_scored", DataType::Int64, false),
            Field::new("assist_scored", DataType::Int64, false),
        ])
    }

    fn columns(rows: &[Self]) -> Vec<ArrayRef> {
        vec![
            int_col(rows, |r| r.player_id),
            str_col(rows, |r| Some(r.player_name.as_str())),
            opt_int_col(rows, |r| r.player_team),
            int_col(rows, |r| r.goal_scored),
            int_col(rows, |r| r.assist_scored),
        ]
    }
}
