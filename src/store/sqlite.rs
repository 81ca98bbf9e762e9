// SQLite entity store
//
// Entity histories are stored whole, as JSON documents (the same
// "aggregate as a document" approach as the metadata column). A side table
// indexes every filterable field value together with the registration and
// effect intervals it was valid in, so filter queries can narrow candidates
// in SQL before the exact per-effect match runs in Rust.

use super::{EntityFilter, RegistryStore};
use crate::model::{EntityType, Identification};
use crate::temporal::Entity;
use anyhow::{anyhow, Context, Result};
use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::{params, params_from_iter, Connection};
use std::collections::HashSet;
use std::path::Path;
use std::sync::Mutex;
use std::time::Duration;
use tracing::debug;

pub struct SqliteStore {
    conn: Mutex<Connection>,
}

/// Fixed-width UTC form: lexical order equals chronological order.
fn timestamp(t: DateTime<Utc>) -> String {
    t.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn opt_timestamp(t: Option<DateTime<Utc>>) -> Option<String> {
    t.map(timestamp)
}

fn placeholders(n: usize) -> String {
    vec!["?"; n].join(", ")
}

pub fn setup_database(conn: &Connection) -> Result<()> {
    // ==========================================================================
    // Entities Table (whole version history per identification)
    // ==========================================================================
    conn.execute(
        "CREATE TABLE IF NOT EXISTS entities (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            kind TEXT NOT NULL,
            uuid TEXT NOT NULL,
            body TEXT NOT NULL,
            UNIQUE (kind, uuid)
        )",
        [],
    )?;

    // ==========================================================================
    // Data Index (one row per filterable value per effect)
    // ==========================================================================
    conn.execute(
        "CREATE TABLE IF NOT EXISTS data_index (
            entity_uuid TEXT NOT NULL,
            kind TEXT NOT NULL,
            field TEXT NOT NULL,
            value TEXT NOT NULL,
            reg_from TEXT,
            reg_to TEXT,
            eff_from TEXT,
            eff_to TEXT
        )",
        [],
    )?;

    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_data_index_lookup ON data_index(kind, field, value)",
        [],
    )?;

    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_data_index_entity ON data_index(entity_uuid)",
        [],
    )?;

    Ok(())
}

impl SqliteStore {
    /// Open (or create) a database file.
    pub fn open(path: &Path, busy_timeout: Duration) -> Result<Self> {
        let conn = Connection::open(path)
            .with_context(|| format!("Failed to open database {}", path.display()))?;
        // WAL lets readers proceed while an import is writing
        let mode: String =
            conn.pragma_update_and_check(None, "journal_mode", "WAL", |row| row.get(0))?;
        debug!(journal_mode = %mode, "database opened");
        conn.busy_timeout(busy_timeout)?;
        Self::from_connection(conn)
    }

    pub fn open_in_memory() -> Result<Self> {
        Self::from_connection(Connection::open_in_memory()?)
    }

    pub fn from_connection(conn: Connection) -> Result<Self> {
        setup_database(&conn)?;
        Ok(SqliteStore {
            conn: Mutex::new(conn),
        })
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| anyhow!("database connection lock poisoned"))
    }

    /// Store a full entity history, replacing any earlier copy of the same
    /// identification (its enumeration position is kept).
    pub fn insert(&self, entity: &Entity) -> Result<()> {
        let mut conn = self.lock()?;
        let tx = conn.transaction()?;
        write_entity(&tx, entity)?;
        tx.commit()?;
        Ok(())
    }

    pub fn insert_all(&self, entities: &[Entity]) -> Result<usize> {
        let mut conn = self.lock()?;
        let tx = conn.transaction()?;
        for entity in entities {
            write_entity(&tx, entity)?;
        }
        tx.commit()?;
        Ok(entities.len())
    }

    pub fn count(&self, kind: EntityType) -> Result<i64> {
        let conn = self.lock()?;
        let count = conn.query_row(
            "SELECT COUNT(*) FROM entities WHERE kind = ?1",
            [kind.as_str()],
            |row| row.get(0),
        )?;
        Ok(count)
    }

    fn query_entities(&self, sql: &str, args: Vec<String>) -> Result<Vec<Entity>> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(sql)?;
        let bodies = stmt
            .query_map(params_from_iter(args.iter()), |row| row.get::<_, String>(0))?
            .collect::<Result<Vec<_>, _>>()?;

        bodies
            .iter()
            .map(|body| serde_json::from_str(body).context("Failed to decode entity body"))
            .collect()
    }
}

fn write_entity(conn: &Connection, entity: &Entity) -> Result<()> {
    let uuid = entity.id.to_string();
    let body = serde_json::to_string(entity)?;

    conn.execute(
        "INSERT INTO entities (kind, uuid, body) VALUES (?1, ?2, ?3)
         ON CONFLICT (kind, uuid) DO UPDATE SET body = excluded.body",
        params![entity.kind.as_str(), uuid, body],
    )?;

    conn.execute(
        "DELETE FROM data_index WHERE entity_uuid = ?1 AND kind = ?2",
        params![uuid, entity.kind.as_str()],
    )?;

    let mut stmt = conn.prepare(
        "INSERT INTO data_index (entity_uuid, kind, field, value, reg_from, reg_to, eff_from, eff_to)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
    )?;

    for registration in &entity.registrations {
        for effect in &registration.effects {
            for item in &effect.data {
                for (field, value) in item.indexed_values() {
                    stmt.execute(params![
                        uuid,
                        entity.kind.as_str(),
                        field.as_str(),
                        value,
                        opt_timestamp(registration.interval.from),
                        opt_timestamp(registration.interval.to),
                        opt_timestamp(effect.interval.from),
                        opt_timestamp(effect.interval.to),
                    ])?;
                }
            }
        }
    }

    Ok(())
}

impl RegistryStore for SqliteStore {
    fn fetch_all(&self, kind: EntityType) -> Result<Vec<Entity>> {
        self.query_entities(
            "SELECT body FROM entities WHERE kind = ?1 ORDER BY id",
            vec![kind.as_str().to_string()],
        )
    }

    fn fetch_by_ids(&self, kind: EntityType, ids: &HashSet<Identification>) -> Result<Vec<Entity>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        let sql = format!(
            "SELECT body FROM entities WHERE kind = ? AND uuid IN ({}) ORDER BY id",
            placeholders(ids.len())
        );
        let mut args = vec![kind.as_str().to_string()];
        args.extend(ids.iter().map(|id| id.to_string()));

        self.query_entities(&sql, args)
    }

    fn fetch_matching(&self, filter: &EntityFilter) -> Result<Vec<Entity>> {
        if filter.is_unsatisfiable() {
            return Ok(Vec::new());
        }

        let window_from = timestamp(filter.window.from);
        let window_to = timestamp(filter.window.to);

        let mut sql = String::from("SELECT body FROM entities WHERE kind = ?");
        let mut args = vec![filter.kind.as_str().to_string()];

        for criterion in &filter.criteria {
            sql.push_str(&format!(
                " AND uuid IN (SELECT entity_uuid FROM data_index
                    WHERE kind = ? AND field = ? AND value IN ({})
                    AND (reg_from IS NULL OR reg_from <= ?) AND (reg_to IS NULL OR reg_to > ?)
                    AND (eff_from IS NULL OR eff_from <= ?) AND (eff_to IS NULL OR eff_to > ?))",
                placeholders(criterion.values.len())
            ));
            args.push(filter.kind.as_str().to_string());
            args.push(criterion.field.as_str().to_string());
            args.extend(criterion.values.iter().cloned());
            args.extend([
                window_to.clone(),
                window_from.clone(),
                window_to.clone(),
                window_from.clone(),
            ]);
        }
        sql.push_str(" ORDER BY id");

        let candidates = self.query_entities(&sql, args)?;
        let candidate_count = candidates.len();

        // SQL narrows per criterion; the exact match picks the effect that counts
        let matched: Vec<Entity> = candidates
            .into_iter()
            .filter(|e| filter.matches(e))
            .collect();

        debug!(
            kind = %filter.kind,
            candidates = candidate_count,
            matched = matched.len(),
            "sqlite filter query"
        );

        Ok(matched)
    }
}
