//! Named store lifecycle.
//!
//! A store moves `absent -> populating -> ready -> stale -> deleted` and
//! never backwards. Absent and deleted both mean "no row" in `cache_stores`.
//! Retiring a store also records its name in `retired_stores`; lazy creation
//! refuses those names, and only a new setup phase may create them again.

use super::connection::CacheDb;
use super::entries::CacheStore;
use crate::Error;
use chrono::Utc;
use std::fmt;
use std::str::FromStr;
use tokio_rusqlite::{params, rusqlite};

/// Persisted lifecycle state of a named store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum StoreState {
    /// Created by a setup phase that has not finished writing the manifest.
    Populating,
    /// Serving lookups for its version.
    Ready,
    /// Superseded by a newer version, awaiting deletion.
    Stale,
}

impl StoreState {
    pub fn as_str(&self) -> &'static str {
        match self {
            StoreState::Populating => "populating",
            StoreState::Ready => "ready",
            StoreState::Stale => "stale",
        }
    }

    /// Whether moving from `self` to `next` is a legal forward step.
    ///
    /// Staying in the same state is allowed so repeated calls are idempotent.
    pub fn can_transition_to(&self, next: StoreState) -> bool {
        *self <= next
    }
}

impl fmt::Display for StoreState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for StoreState {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "populating" => Ok(StoreState::Populating),
            "ready" => Ok(StoreState::Ready),
            "stale" => Ok(StoreState::Stale),
            other => Err(Error::CorruptEntry(format!("unknown store state: {other}"))),
        }
    }
}

fn read_state(conn: &rusqlite::Connection, name: &str) -> Result<Option<StoreState>, Error> {
    let result = conn.query_row("SELECT state FROM cache_stores WHERE name = ?1", params![name], |row| {
        row.get::<_, String>(0)
    });

    match result {
        Ok(state) => Ok(Some(state.parse()?)),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(e.into()),
    }
}

fn is_retired(conn: &rusqlite::Connection, name: &str) -> Result<bool, Error> {
    let retired = conn.query_row(
        "SELECT EXISTS(SELECT 1 FROM retired_stores WHERE name = ?1)",
        params![name],
        |row| row.get(0),
    )?;
    Ok(retired)
}

/// Get-or-create `name`, inserting it as `initial` when absent.
///
/// Fails with `InvalidTransition` when the existing store is stale, or when
/// a retired name is lazily reopened as `ready`. Creating it as `populating`
/// clears the retirement.
fn ensure_store(conn: &rusqlite::Connection, name: &str, initial: StoreState) -> Result<StoreState, Error> {
    match read_state(conn, name)? {
        Some(StoreState::Stale) => Err(Error::InvalidTransition {
            name: name.to_string(),
            from: StoreState::Stale.to_string(),
            to: initial.to_string(),
        }),
        Some(state) => Ok(state),
        None => {
            if initial == StoreState::Populating {
                conn.execute("DELETE FROM retired_stores WHERE name = ?1", params![name])?;
            } else if is_retired(conn, name)? {
                return Err(Error::InvalidTransition {
                    name: name.to_string(),
                    from: "deleted".to_string(),
                    to: initial.to_string(),
                });
            }
            let now = Utc::now().to_rfc3339();
            conn.execute(
                "INSERT INTO cache_stores (name, state, created_at, updated_at) VALUES (?1, ?2, ?3, ?3)",
                params![name, initial.as_str(), now],
            )?;
            Ok(initial)
        }
    }
}

fn transition(conn: &rusqlite::Connection, name: &str, next: StoreState) -> Result<(), Error> {
    let current = read_state(conn, name)?.ok_or_else(|| Error::StoreNotFound(name.to_string()))?;
    if !current.can_transition_to(next) {
        return Err(Error::InvalidTransition { name: name.to_string(), from: current.to_string(), to: next.to_string() });
    }
    conn.execute(
        "UPDATE cache_stores SET state = ?2, updated_at = ?3 WHERE name = ?1",
        params![name, next.as_str(), Utc::now().to_rfc3339()],
    )?;
    Ok(())
}

impl CacheDb {
    /// Open (create-if-absent) the store named `name`.
    ///
    /// A store created here is immediately `ready`, matching lazy creation
    /// on first write. A retired name is never reopened here.
    pub async fn open_store(&self, name: &str) -> Result<CacheStore, Error> {
        let owned = name.to_string();
        self.conn
            .call(move |conn| -> Result<StoreState, Error> { ensure_store(conn, &owned, StoreState::Ready) })
            .await
            .map_err(Error::from)?;
        Ok(CacheStore::new(self.clone(), name))
    }

    /// Handle to `name` without creating it.
    ///
    /// Lookups on an absent store miss; writes fail with `StoreNotFound`.
    pub fn store(&self, name: &str) -> CacheStore {
        CacheStore::new(self.clone(), name)
    }

    /// Open the store for a setup phase.
    ///
    /// A new store starts as `populating`; an existing ready store is reused
    /// so a repeated setup overwrites its entries in place. A retired name
    /// comes back as a brand-new store.
    pub async fn begin_install(&self, name: &str) -> Result<CacheStore, Error> {
        let owned = name.to_string();
        let state = self
            .conn
            .call(move |conn| -> Result<StoreState, Error> { ensure_store(conn, &owned, StoreState::Populating) })
            .await
            .map_err(Error::from)?;
        tracing::debug!(store = name, %state, "store opened for setup");
        Ok(CacheStore::new(self.clone(), name))
    }

    /// Mark a populating store as ready.
    pub async fn mark_ready(&self, name: &str) -> Result<(), Error> {
        let name = name.to_string();
        self.conn
            .call(move |conn| -> Result<(), Error> { transition(conn, &name, StoreState::Ready) })
            .await
            .map_err(Error::from)
    }

    /// Current state of a store, or None when absent.
    pub async fn store_state(&self, name: &str) -> Result<Option<StoreState>, Error> {
        let name = name.to_string();
        self.conn
            .call(move |conn| -> Result<Option<StoreState>, Error> { read_state(conn, &name) })
            .await
            .map_err(Error::from)
    }

    pub async fn has_store(&self, name: &str) -> Result<bool, Error> {
        Ok(self.store_state(name).await?.is_some())
    }

    /// All store names, oldest first.
    pub async fn store_names(&self) -> Result<Vec<String>, Error> {
        self.conn
            .call(|conn| -> Result<Vec<String>, Error> {
                let mut stmt = conn.prepare("SELECT name FROM cache_stores ORDER BY created_at ASC, name ASC")?;
                let names = stmt
                    .query_map([], |row| row.get::<_, String>(0))?
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(names)
            })
            .await
            .map_err(Error::from)
    }

    /// Delete a store and all of its entries.
    ///
    /// Returns false if no store existed under that name.
    pub async fn delete_store(&self, name: &str) -> Result<bool, Error> {
        let name = name.to_string();
        self.conn
            .call(move |conn| -> Result<bool, Error> {
                let deleted = conn.execute("DELETE FROM cache_stores WHERE name = ?1", params![name])?;
                Ok(deleted > 0)
            })
            .await
            .map_err(Error::from)
    }

    /// Mark a store stale, delete it and record the name as retired.
    ///
    /// All steps run in one transaction.
    pub async fn retire_store(&self, name: &str) -> Result<bool, Error> {
        let name = name.to_string();
        self.conn
            .call(move |conn| -> Result<bool, Error> {
                let tx = conn.transaction()?;
                if read_state(&tx, &name)?.is_none() {
                    return Ok(false);
                }
                transition(&tx, &name, StoreState::Stale)?;
                let deleted = tx.execute("DELETE FROM cache_stores WHERE name = ?1", params![name])?;
                tx.execute(
                    "INSERT OR REPLACE INTO retired_stores (name, retired_at) VALUES (?1, ?2)",
                    params![name, Utc::now().to_rfc3339()],
                )?;
                tx.commit()?;
                Ok(deleted > 0)
            })
            .await
            .map_err(Error::from)
    }
}
