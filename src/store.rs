//! Relational store seam: a columnar scan of one entity table

use std::path::{Path, PathBuf};

use arrow::array::RecordBatch;
use tracing::info;

use crate::error::{Result, StatsError};
use crate::model::{
    Calendar, Coach, Entity, EntityKind, History, Match, PlayerDetailed, PlayerTechnical, Stadium,
    Team,
};
use crate::reader::{read_table, write_table};
use crate::repository::Catalog;
use crate::utils::project;

/// Source of entity tables for the query layer.
///
/// Implementations return the whole table (optionally projected to
/// `columns`, in that order). Failures to reach the data surface as
/// [`StatsError::StoreUnavailable`]; retries are the implementation's concern.
pub trait RelationalStore: Send + Sync {
    fn scan(&self, entity: EntityKind, columns: Option<&[&str]>) -> Result<RecordBatch>;
}

impl RelationalStore for Catalog {
    fn scan(&self, entity: EntityKind, columns: Option<&[&str]>) -> Result<RecordBatch> {
        let table = match entity {
            EntityKind::Team => Team::to_batch(self.teams.get_all()),
            EntityKind::Coach => Coach::to_batch(self.coaches.get_all()),
            EntityKind::Stadium => Stadium::to_batch(self.stadiums.get_all()),
            EntityKind::Calendar => Calendar::to_batch(self.calendar.get_all()),
            EntityKind::Match => Match::to_batch(self.matches.get_all()),
            EntityKind::History => History::to_batch(self.history.get_all()),
            EntityKind::PlayerDetailed => PlayerDetailed::to_batch(self.player_detailed.get_all()),
            EntityKind::PlayerTechnical => PlayerTechnical::to_batch(self.player_technical.get_all()),
        }?;

        match columns {
            Some(columns) => project(&table, columns),
            None => Ok(table),
        }
    }
}

/// Entity tables stored as `<table_name>.parquet` files in one directory
#[derive(Debug, Clone)]
pub struct ParquetStore {
    root: PathBuf,
}

impl ParquetStore {
    pub fn open(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        if !root.is_dir() {
            return Err(StatsError::store(format!("{} is not a directory", root.display())));
        }
        info!(root = %root.display(), "opened parquet store");
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn path_of(&self, entity: EntityKind) -> PathBuf {
        self.root.join(format!("{}.parquet", entity.table_name()))
    }

    /// Dump every table of `catalog` into `root`
    pub fn export(catalog: &Catalog, root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        std::fs::create_dir_all(&root)?;
        let store = Self::open(root)?;
        for entity in EntityKind::ALL {
            let table = catalog.scan(entity, None)?;
            write_table(&store.path_of(entity), &table)?;
        }
        Ok(store)
    }
}

impl RelationalStore for ParquetStore {
    fn scan(&self, entity: EntityKind, columns: Option<&[&str]>) -> Result<RecordBatch> {
        let table = read_table(&self.path_of(entity), columns)?;
        match columns {
            // Parquet projection keeps file order; restore the requested one
            Some(columns) => project(&table, columns),
            None => Ok(table),
        }
    }
}
