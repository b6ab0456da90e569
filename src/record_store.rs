// 📚 Record Store - typed collections over the key-value storage
//
// Keys are the ones the browser version used, so a dump of its storage can
// be loaded as-is. Every operation is read-modify-write of one whole JSON
// value. Missing keys read as empty; malformed JSON is an error.

use crate::entities::{MatchRecord, NameRegistry, UserInfo};
use crate::storage::KeyValueStore;
use anyhow::{Context, Result};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{debug, info};

pub const RECORDS_KEY: &str = "karate_records";
pub const USER_INFO_KEY: &str = "karate_user_info";
pub const OPPONENTS_KEY: &str = "karate_opponents";
pub const TOURNAMENTS_KEY: &str = "karate_tournaments";
pub const COLORS_SWAPPED_KEY: &str = "karate_colors_swapped";

pub struct RecordStore<S: KeyValueStore> {
    backend: S,
}

impl<S: KeyValueStore> RecordStore<S> {
    pub fn new(backend: S) -> Self {
        RecordStore { backend }
    }

    fn read_json<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>> {
        match self.backend.get(key)? {
            Some(raw) => {
                let value = serde_json::from_str(&raw)
                    .with_context(|| format!("Failed to parse stored value for {}", key))?;
                Ok(Some(value))
            }
            None => Ok(None),
        }
    }

    fn write_json<T: Serialize + ?Sized>(&mut self, key: &str, value: &T) -> Result<()> {
        let raw = serde_json::to_string(value)?;
        self.backend.set(key, &raw)
    }

    // ========================================================================
    // USER PROFILE
    // ========================================================================

    pub fn user_info(&self) -> Result<Option<UserInfo>> {
        self.read_json(USER_INFO_KEY)
    }

    pub fn save_user_info(&mut self, user: &UserInfo) -> Result<()> {
        self.write_json(USER_INFO_KEY, user)?;
        info!(name = %user.name, age = user.age, "user profile saved");
        Ok(())
    }

    // ========================================================================
    // NAME REGISTRIES
    // ========================================================================

    pub fn opponents(&self) -> Result<NameRegistry> {
        Ok(self.read_json(OPPONENTS_KEY)?.unwrap_or_default())
    }

    pub fn tournaments(&self) -> Result<NameRegistry> {
        Ok(self.read_json(TOURNAMENTS_KEY)?.unwrap_or_default())
    }

    /// Returns true when the name was new
    pub fn register_opponent(&mut self, name: &str) -> Result<bool> {
        self.register_name(OPPONENTS_KEY, name)
    }

    pub fn register_tournament(&mut self, name: &str) -> Result<bool> {
        self.register_name(TOURNAMENTS_KEY, name)
    }

    fn register_name(&mut self, key: &str, name: &str) -> Result<bool> {
        let mut registry: NameRegistry = self.read_json(key)?.unwrap_or_default();
        if !registry.add(name) {
            return Ok(false);
        }

        self.write_json(key, &registry)?;
        debug!(key, name, "registered new name");
        Ok(true)
    }

    fn register_names(&mut self, record: &MatchRecord) -> Result<()> {
        if let Some(opponent) = &record.opponent_name {
            self.register_opponent(opponent)?;
        }
        if let Some(tournament) = &record.tournament_name {
            self.register_tournament(tournament)?;
        }
        Ok(())
    }

    // ========================================================================
    // MATCH RECORDS
    // ========================================================================

    /// All records in insertion order
    pub fn all_match_records(&self) -> Result<Vec<MatchRecord>> {
        Ok(self.read_json(RECORDS_KEY)?.unwrap_or_default())
    }

    /// All records by match date, newest first (ties keep insertion order)
    pub fn records_newest_first(&self) -> Result<Vec<MatchRecord>> {
        let mut records = self.all_match_records()?;
        records.sort_by(|a, b| b.date.cmp(&a.date));
        Ok(records)
    }

    pub fn match_record(&self, id: &str) -> Result<Option<MatchRecord>> {
        Ok(self
            .all_match_records()?
            .into_iter()
            .find(|record| record.id == id))
    }

    /// Append a record and grow the name registries
    pub fn save_match_record(&mut self, record: &MatchRecord) -> Result<()> {
        let mut records = self.all_match_records()?;
        records.push(record.clone());
        self.write_json(RECORDS_KEY, &records)?;

        self.register_names(record)?;

        info!(id = %record.id, total = records.len(), "match record saved");
        Ok(())
    }

    /// Replace the record with the same id in place.
    /// No-op (returns false) when the id is unknown.
    pub fn update_match_record(&mut self, record: &MatchRecord) -> Result<bool> {
        let mut records = self.all_match_records()?;

        let Some(slot) = records.iter_mut().find(|r| r.id == record.id) else {
            debug!(id = %record.id, "update skipped: no such record");
            return Ok(false);
        };
        *slot = record.clone();

        self.write_json(RECORDS_KEY, &records)?;
        self.register_names(record)?;

        info!(id = %record.id, "match record updated");
        Ok(true)
    }

    /// Returns true when a record was removed
    pub fn delete_match_record(&mut self, id: &str) -> Result<bool> {
        let mut records = self.all_match_records()?;
        let before = records.len();
        records.retain(|record| record.id != id);

        if records.len() == before {
            return Ok(false);
        }

        self.write_json(RECORDS_KEY, &records)?;
        info!(id, remaining = records.len(), "match record deleted");
        Ok(true)
    }

    // ========================================================================
    // PREFERENCES
    // ========================================================================

    pub fn colors_swapped(&self) -> Result<bool> {
        Ok(self.read_json(COLORS_SWAPPED_KEY)?.unwrap_or(false))
    }

    pub fn set_colors_swapped(&mut self, swapped: bool) -> Result<()> {
        self.write_json(COLORS_SWAPPED_KEY, &swapped)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entities::{Actor, MatchType, Point, TargetArea, TechniqueRecord, TechniqueType};
    use crate::storage::{MemoryStore, SqliteStore};
    use chrono::NaiveDate;

    fn record(
        id: &str,
        date: (i32, u32, u32),
        opponent: Option<&str>,
        tournament: Option<&str>,
    ) -> MatchRecord {
        let date = NaiveDate::from_ymd_opt(date.0, date.1, date.2).unwrap();
        MatchRecord {
            id: id.to_string(),
            date,
            match_type: MatchType::Practice,
            tournament_name: tournament.map(str::to_string),
            opponent_name: opponent.map(str::to_string),
            techniques: vec![TechniqueRecord {
                match_id: id.to_string(),
                date,
                match_type: MatchType::Practice,
                tournament_name: None,
                opponent_name: None,
                actor: Actor::Me,
                technique: TechniqueType::Tsuki,
                sub_technique: None,
                area: TargetArea::Chudan,
                point: Point::ONE,
            }],
            penalties: vec![],
            senshu: None,
            colors_swapped: false,
        }
    }

    #[test]
    fn test_missing_keys_read_as_empty() {
        let store = RecordStore::new(MemoryStore::new());

        assert!(store.all_match_records().unwrap().is_empty());
        assert!(store.opponents().unwrap().is_empty());
        assert!(store.tournaments().unwrap().is_empty());
        assert!(store.user_info().unwrap().is_none());
        assert!(!store.colors_swapped().unwrap());
    }

    #[test]
    fn test_save_grows_registries() {
        let mut store = RecordStore::new(MemoryStore::new());

        store.save_match_record(&record("1", (2024, 5, 1), Some("Sato"), Some("県大会"))).unwrap();
        store.save_match_record(&record("2", (2024, 5, 2), Some("Sato"), None)).unwrap();
        store.save_match_record(&record("3", (2024, 5, 3), Some("sato"), Some(""))).unwrap();

        assert_eq!(store.all_match_records().unwrap().len(), 3);
        assert_eq!(store.opponents().unwrap().names(), &["Sato".to_string(), "sato".to_string()]);
        assert_eq!(store.tournaments().unwrap().names(), &["県大会".to_string()]);
    }

    #[test]
    fn test_update_and_delete_by_id() {
        let mut store = RecordStore::new(MemoryStore::new());
        store.save_match_record(&record("1", (2024, 5, 1), None, None)).unwrap();
        store.save_match_record(&record("2", (2024, 5, 2), None, None)).unwrap();

        let mut changed = store.match_record("1").unwrap().unwrap();
        changed.senshu = Some(Actor::Me);
        assert!(store.update_match_record(&changed).unwrap());

        let records = store.all_match_records().unwrap();
        assert_eq!(records[0].id, "1");
        assert_eq!(records[0].senshu, Some(Actor::Me));

        // Unknown id: nothing changes
        assert!(!store.update_match_record(&record("99", (2024, 1, 1), None, None)).unwrap());
        assert_eq!(store.all_match_records().unwrap().len(), 2);

        assert!(store.delete_match_record("1").unwrap());
        assert!(!store.delete_match_record("1").unwrap());
        assert!(store.match_record("1").unwrap().is_none());
        assert_eq!(store.all_match_records().unwrap().len(), 1);
    }

    #[test]
    fn test_newest_first_is_stable() {
        let mut store = RecordStore::new(MemoryStore::new());
        store.save_match_record(&record("a", (2024, 5, 1), None, None)).unwrap();
        store.save_match_record(&record("b", (2024, 6, 1), None, None)).unwrap();
        store.save_match_record(&record("c", (2024, 5, 1), None, None)).unwrap();

        let ids: Vec<String> = store
            .records_newest_first()
            .unwrap()
            .into_iter()
            .map(|r| r.id)
            .collect();
        assert_eq!(ids, vec!["b", "a", "c"]);
    }

    #[test]
    fn test_user_info_and_color_preference_on_sqlite() {
        let mut store = RecordStore::new(SqliteStore::open_in_memory().unwrap());

        let user = UserInfo::new(
            "山田太郎".to_string(),
            NaiveDate::from_ymd_opt(2012, 4, 1).unwrap(),
            NaiveDate::from_ymd_opt(2024, 4, 1).unwrap(),
        );
        store.save_user_info(&user).unwrap();
        assert_eq!(store.user_info().unwrap(), Some(user));

        store.set_colors_swapped(true).unwrap();
        assert!(store.colors_swapped().unwrap());
    }

    #[test]
    fn test_malformed_blob_is_an_error() {
        let mut backend = MemoryStore::new();
        backend.set(RECORDS_KEY, "{not json").unwrap();
        let store = RecordStore::new(backend);

        let err = store.all_match_records().unwrap_err();
        assert!(err.to_string().contains(RECORDS_KEY));
    }
}
