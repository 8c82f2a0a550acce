//! In-memory entity repositories and the catalog that groups them

use serde::Serialize;
use std::collections::BTreeMap;
use tracing::debug;

use crate::error::Result;
use crate::model::{
    Calendar, Coach, Entity, EntityKind, History, Match, PlayerDetailed, PlayerTechnical, Stadium,
    Team,
};
use crate::store::RelationalStore;

/// CRUD access to one entity table. Rows keep insertion order.
#[derive(Debug, Clone)]
pub struct Repository<E: Entity> {
    rows: Vec<E>,
}

impl<E: Entity> Default for Repository<E> {
    fn default() -> Self {
        Self { rows: Vec::new() }
    }
}

impl<E: Entity> Repository<E> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get_all(&self) -> &[E] {
        &self.rows
    }

    pub fn count(&self) -> usize {
        self.rows.len()
    }

    pub fn get_by_id(&self, id: i64) -> Option<&E> {
        self.rows.iter().find(|row| row.id() == id)
    }

    /// Insert a row. An id of 0 is replaced with the next free id; an id that
    /// is already taken replaces the existing row.
    pub fn create(&mut self, mut item: E) -> &E {
        if item.id() == 0 {
            let next = self.rows.iter().map(|row| row.id()).max().unwrap_or(0) + 1;
            item.set_id(next);
        }

        let id = item.id();
        debug!(entity = %E::KIND, id, "create");

        let idx = match self.rows.iter().position(|row| row.id() == id) {
            Some(idx) => {
                self.rows[idx] = item;
                idx
            }
            None => {
                self.rows.push(item);
                self.rows.len() - 1
            }
        };
        &self.rows[idx]
    }

    /// Replace the row with `id`, keeping its id. `None` when absent.
    pub fn update(&mut self, id: i64, mut item: E) -> Option<&E> {
        let idx = self.rows.iter().position(|row| row.id() == id)?;
        item.set_id(id);
        self.rows[idx] = item;
        debug!(entity = %E::KIND, id, "update");
        Some(&self.rows[idx])
    }

    pub fn delete(&mut self, id: i64) -> bool {
        let before = self.rows.len();
        self.rows.retain(|row| row.id() != id);
        let removed = self.rows.len() != before;
        debug!(entity = %E::KIND, id, removed, "delete");
        removed
    }
}

impl<E: Entity> FromIterator<E> for Repository<E> {
    fn from_iter<I: IntoIterator<Item = E>>(iter: I) -> Self {
        let mut repo = Self::new();
        for item in iter {
            repo.create(item);
        }
        repo
    }
}

/// One repository per entity table
#[derive(Debug, Clone, Default)]
pub struct Catalog {
    pub teams: Repository<Team>,
    pub coaches: Repository<Coach>,
    pub stadiums: Repository<Stadium>,
    pub calendar: Repository<Calendar>,
    pub matches: Repository<Match>,
    pub history: Repository<History>,
    pub player_detailed: Repository<PlayerDetailed>,
    pub player_technical: Repository<PlayerTechnical>,
}

/// Record counts across the main tables
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SimpleStatsReport {
    pub summary: BTreeMap<String, usize>,
    pub total_records: usize,
}

impl Catalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn count(&self, kind: EntityKind) -> usize {
        match kind {
            EntityKind::Team => self.teams.count(),
            EntityKind::Coach => self.coaches.count(),
            EntityKind::Stadium => self.stadiums.count(),
            EntityKind::Calendar => self.calendar.count(),
            EntityKind::Match => self.matches.count(),
            EntityKind::History => self.history.count(),
            EntityKind::PlayerDetailed => self.player_detailed.count(),
            EntityKind::PlayerTechnical => self.player_technical.count(),
        }
    }

    /// Record counts for teams, coaches, stadiums, players and matches
    pub fn simple_stats(&self) -> SimpleStatsReport {
        SimpleStatsReport::from_counts(|kind| self.count(kind))
    }
}

impl SimpleStatsReport {
    const TABLES: [(&'static str, EntityKind); 5] = [
        ("teams", EntityKind::Team),
        ("coaches", EntityKind::Coach),
        ("stadiums", EntityKind::Stadium),
        ("players", EntityKind::PlayerTechnical),
        ("matches", EntityKind::Match),
    ];

    fn from_counts(mut count: impl FnMut(EntityKind) -> usize) -> Self {
        let summary: BTreeMap<String, usize> = Self::TABLES
            .into_iter()
            .map(|(label, kind)| (label.to_string(), count(kind)))
            .collect();

        let total_records = summary.values().sum();
        Self { summary, total_records }
    }

    /// Same report over any store, counting rows of each id column
    pub fn from_store(store: &dyn RelationalStore) -> Result<Self> {
        let mut counts = BTreeMap::new();
        for (_, kind) in Self::TABLES {
            let ids = store.scan(kind, Some(&[kind.id_column()][..]))?;
            counts.insert(kind, ids.num_rows());
        }
        Ok(Self::from_counts(|kind| counts.get(&kind).copied().unwrap_or_default()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn team(name: &str) -> Team {
        Team { team_name: name.to_string(), ..Team::default() }
    }

    #[test]
    fn test_create_assigns_ids() {
        let mut repo = Repository::new();
        assert_eq!(repo.create(team("Inter")).team_id, 1);
        assert_eq!(repo.create(team("Milan")).team_id, 2);
        assert_eq!(repo.get_by_id(2).unwrap().team_name, "Milan");
        assert!(repo.get_by_id(3).is_none());
    }

    #[test]
    fn test_update_keeps_id() {
        let mut repo: Repository<Team> = [team("Inter")].into_iter().collect();
        let updated = repo.update(1, Team { team_id: 99, ..team("Internazionale") }).unwrap();
        assert_eq!(updated.team_id, 1);
        assert_eq!(updated.team_name, "Internazionale");
        assert!(repo.update(5, team("Ghost")).is_none());
    }

    #[test]
    fn test_delete() {
        let mut repo: Repository<Team> = [team("Inter"), team("Milan")].into_iter().collect();
        assert!(repo.delete(1));
        assert!(!repo.delete(1));
        assert_eq!(repo.count(), 1);
        assert_eq!(repo.get_all()[0].team_name, "Milan");
    }

    #[test]
    fn test_simple_stats() {
        let mut catalog = Catalog::new();
        catalog.teams.create(team("Inter"));
        catalog.teams.create(team("Milan"));
        catalog.player_technical.create(PlayerTechnical {
            player_name: "Lautaro".into(),
            ..PlayerTechnical::default()
        });
        catalog.history.create(History { year: 2021, ..History::default() });

        let report = catalog.simple_stats();
        assert_eq!(report.summary["teams"], 2);
        assert_eq!(report.summary["players"], 1);
        assert_eq!(report.summary["matches"], 0);
        // history is not part of the report
        assert_eq!(report.total_records, 3);

        assert_eq!(SimpleStatsReport::from_store(&catalog).unwrap(), report);
    }
}
