//! Request-keyed entries inside a named store.
//!
//! Provides lookup, insert (last write wins), delete and key listing for
//! cached response snapshots.

use super::connection::CacheDb;
use super::hash::compute_request_key;
use crate::message::{Request, Response, ResponseType};
use crate::Error;
use bytes::Bytes;
use chrono::Utc;
use http::StatusCode;
use serde::{Deserialize, Serialize};
use tokio_rusqlite::{params, rusqlite};
use url::Url;

/// Identity of a stored entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CachedKey {
    pub method: String,
    pub url: String,
    pub stored_at: String,
}

/// Raw row as read from `cache_entries`.
struct EntryRow {
    status_code: i64,
    response_type: String,
    response_url: Option<String>,
    headers_json: String,
    body: Vec<u8>,
}

impl EntryRow {
    fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            status_code: row.get(0)?,
            response_type: row.get(1)?,
            response_url: row.get(2)?,
            headers_json: row.get(3)?,
            body: row.get(4)?,
        })
    }

    fn into_response(self) -> Result<Response, Error> {
        let status = u16::try_from(self.status_code)
            .ok()
            .and_then(|code| StatusCode::from_u16(code).ok())
            .ok_or_else(|| Error::CorruptEntry(format!("invalid status code {}", self.status_code)))?;
        let pairs: Vec<(String, Vec<u8>)> =
            serde_json::from_str(&self.headers_json).map_err(|e| Error::CorruptEntry(format!("headers: {e}")))?;
        let url = self
            .response_url
            .map(|u| Url::parse(&u))
            .transpose()
            .map_err(|e| Error::CorruptEntry(format!("response url: {e}")))?;

        Ok(Response {
            status,
            headers: Response::headers_from_pairs(&pairs)?,
            body: Bytes::from(self.body),
            response_type: self.response_type.parse::<ResponseType>()?,
            url,
        })
    }
}

const SELECT_ENTRY: &str = "SELECT status_code, response_type, response_url, headers_json, body
     FROM cache_entries WHERE store_name = ?1 AND key_hash = ?2";

/// Handle to one named store.
///
/// Cheap to clone; every operation goes through the shared connection.
#[derive(Clone, Debug)]
pub struct CacheStore {
    db: CacheDb,
    name: String,
}

impl CacheStore {
    pub(crate) fn new(db: CacheDb, name: &str) -> Self {
        Self { db, name: name.to_string() }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Look up the stored response for a request.
    ///
    /// Only read requests ever match.
    pub async fn match_request(&self, request: &Request) -> Result<Option<Response>, Error> {
        if !request.is_read() {
            return Ok(None);
        }
        let name = self.name.clone();
        let key = compute_request_key(request.method.as_str(), request.cache_url().as_str());

        let row = self
            .db
            .conn
            .call(move |conn| -> Result<Option<EntryRow>, Error> {
                let result = conn.query_row(SELECT_ENTRY, params![name, key], EntryRow::from_row);
                match result {
                    Ok(row) => Ok(Some(row)),
                    Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
                    Err(e) => Err(e.into()),
                }
            })
            .await
            .map_err(Error::from)?;

        row.map(EntryRow::into_response).transpose()
    }

    /// Store a response for a request, replacing any existing entry.
    ///
    /// Fails with `StoreNotFound` if the store was deleted meanwhile.
    pub async fn put(&self, request: &Request, response: &Response) -> Result<(), Error> {
        if !request.is_read() {
            return Err(Error::UncacheableRequest(format!("{} {}", request.method, request.url)));
        }

        let name = self.name.clone();
        let method = request.method.as_str().to_string();
        let url = request.cache_url().to_string();
        let key = compute_request_key(&method, &url);
        let status = i64::from(response.status.as_u16());
        let response_type = response.response_type.as_str();
        let response_url = response.url.as_ref().map(Url::to_string);
        let headers_json = serde_json::to_string(&response.header_pairs())
            .map_err(|e| Error::InvalidInput(format!("failed to encode headers: {e}")))?;
        let body = response.body.to_vec();
        let stored_at = Utc::now().to_rfc3339();

        self.db
            .conn
            .call(move |conn| -> Result<(), Error> {
                let exists: bool = conn.query_row(
                    "SELECT EXISTS(SELECT 1 FROM cache_stores WHERE name = ?1 AND state != 'stale')",
                    params![name],
                    |row| row.get(0),
                )?;
                if !exists {
                    return Err(Error::StoreNotFound(name));
                }

                conn.execute(
                    "INSERT INTO cache_entries (
                        store_name, key_hash, method, url, status_code,
                        response_type, response_url, headers_json, body, stored_at
                    ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
                    ON CONFLICT(store_name, key_hash) DO UPDATE SET
                        status_code = excluded.status_code,
                        response_type = excluded.response_type,
                        response_url = excluded.response_url,
                        headers_json = excluded.headers_json,
                        body = excluded.body,
                        stored_at = excluded.stored_at",
                    params![
                        name,
                        key,
                        method,
                        url,
                        status,
                        response_type,
                        response_url,
                        headers_json,
                        body,
                        stored_at
                    ],
                )?;
                Ok(())
            })
            .await
            .map_err(Error::from)
    }

    /// Remove the entry for a request. Returns false if nothing was stored.
    pub async fn delete(&self, request: &Request) -> Result<bool, Error> {
        let name = self.name.clone();
        let key = compute_request_key(request.method.as_str(), request.cache_url().as_str());
        self.db
            .conn
            .call(move |conn| -> Result<bool, Error> {
                let deleted =
                    conn.execute("DELETE FROM cache_entries WHERE store_name = ?1 AND key_hash = ?2", params![name, key])?;
                Ok(deleted > 0)
            })
            .await
            .map_err(Error::from)
    }

    /// Keys of every entry, in insertion order.
    pub async fn keys(&self) -> Result<Vec<CachedKey>, Error> {
        let name = self.name.clone();
        self.db
            .conn
            .call(move |conn| -> Result<Vec<CachedKey>, Error> {
                let mut stmt = conn.prepare(
                    "SELECT method, url, stored_at FROM cache_entries
                     WHERE store_name = ?1 ORDER BY rowid ASC",
                )?;
                let keys = stmt
                    .query_map(params![name], |row| {
                        Ok(CachedKey { method: row.get(0)?, url: row.get(1)?, stored_at: row.get(2)? })
                    })?
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(keys)
            })
            .await
            .map_err(Error::from)
    }

    pub async fn len(&self) -> Result<usize, Error> {
        let name = self.name.clone();
        self.db
            .conn
            .call(move |conn| -> Result<usize, Error> {
                let count: i64 =
                    conn.query_row("SELECT COUNT(*) FROM cache_entries WHERE store_name = ?1", params![name], |row| {
                        row.get(0)
                    })?;
                Ok(count as usize)
            })
            .await
            .map_err(Error::from)
    }
}

impl CacheDb {
    /// Look a request up across every non-stale store, oldest store first.
    pub async fn match_any(&self, request: &Request) -> Result<Option<Response>, Error> {
        if !request.is_read() {
            return Ok(None);
        }
        let key = compute_request_key(request.method.as_str(), request.cache_url().as_str());

        let row = self
            .conn
            .call(move |conn| -> Result<Option<EntryRow>, Error> {
                let result = conn.query_row(
                    "SELECT e.status_code, e.response_type, e.response_url, e.headers_json, e.body
                     FROM cache_entries e
                     JOIN cache_stores s ON s.name = e.store_name
                     WHERE e.key_hash = ?1 AND s.state != 'stale'
                     ORDER BY s.created_at ASC
                     LIMIT 1",
                    params![key],
                    EntryRow::from_row,
                );
                match result {
                    Ok(row) => Ok(Some(row)),
                    Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
                    Err(e) => Err(e.into()),
                }
            })
            .await
            .map_err(Error::from)?;

        row.map(EntryRow::into_response).transpose()
    }
}
