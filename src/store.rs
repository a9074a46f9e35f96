use anyhow::{Context, Result};
use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension};
use std::path::Path;
use tracing::{debug, warn};

use crate::models::{Deal, DealsSnapshot, Session, Site};

const SCHEMA_VERSION: i32 = 1;

pub const AUTH_TOKEN_KEY: &str = "authToken";
pub const SELECTED_WEBSITE_KEY: &str = "selectedWebsite";
pub const DEALS_KEY: &str = "deals";

/// Every key that belongs to a signed-in session. Cleared together.
pub const SESSION_KEYS: [&str; 3] = [AUTH_TOKEN_KEY, DEALS_KEY, SELECTED_WEBSITE_KEY];

/// Persistent client-side state, one value per key, last write wins.
pub struct Store {
    conn: Connection,
}

impl Store {
    pub fn open(path: &Path) -> Result<Self> {
        let conn = Connection::open(path).context("Failed to open state database")?;
        let store = Store { conn };
        store.init_schema()?;
        Ok(store)
    }

    fn init_schema(&self) -> Result<()> {
        let version: i32 = self
            .conn
            .query_row(
                "SELECT COALESCE(MAX(user_version), 0) FROM pragma_user_version",
                [],
                |row| row.get(0),
            )
            .unwrap_or(0);

        if version < SCHEMA_VERSION {
            self.conn.execute_batch(
                r#"
                CREATE TABLE IF NOT EXISTS kv (
                    key TEXT PRIMARY KEY,
                    value TEXT NOT NULL,
                    updated_at TEXT NOT NULL
                );
                "#,
            )?;

            self.conn
                .execute(&format!("PRAGMA user_version = {}", SCHEMA_VERSION), [])?;
        }

        Ok(())
    }

    // Raw key/value access
    pub fn get(&self, key: &str) -> Result<Option<String>> {
        let value = self
            .conn
            .query_row("SELECT value FROM kv WHERE key = ?1", [key], |row| row.get(0))
            .optional()?;
        Ok(value)
    }

    pub fn set(&self, key: &str, value: &str) -> Result<()> {
        let now = Utc::now().to_rfc3339();
        self.conn.execute(
            "INSERT INTO kv (key, value, updated_at) VALUES (?1, ?2, ?3)
             ON CONFLICT(key) DO UPDATE SET value = excluded.value, updated_at = excluded.updated_at",
            params![key, value, now],
        )?;
        Ok(())
    }

    pub fn remove(&self, key: &str) -> Result<bool> {
        let rows = self.conn.execute("DELETE FROM kv WHERE key = ?1", [key])?;
        Ok(rows > 0)
    }

    pub fn keys(&self) -> Result<Vec<String>> {
        let mut stmt = self.conn.prepare("SELECT key FROM kv ORDER BY key")?;
        let keys = stmt
            .query_map([], |row| row.get(0))?
            .collect::<std::result::Result<Vec<String>, _>>()?;
        Ok(keys)
    }

    // Session
    pub fn token(&self) -> Result<Option<String>> {
        Ok(self.get(AUTH_TOKEN_KEY)?.filter(|t| !t.is_empty()))
    }

    pub fn site(&self) -> Result<Option<Site>> {
        let raw = match self.get(SELECTED_WEBSITE_KEY)? {
            Some(raw) => raw,
            None => return Ok(None),
        };
        match raw.parse() {
            Ok(site) => Ok(Some(site)),
            Err(e) => {
                warn!(value = %raw, error = %e, "ignoring unknown stored website");
                Ok(None)
            }
        }
    }

    /// The stored session. A token without a usable site falls back to the
    /// default site, so a token alone is enough to count as signed in and
    /// credentials are still attached to requests (see DESIGN.md, "Token
    /// without a site").
    pub fn session(&self) -> Result<Option<Session>> {
        let token = match self.token()? {
            Some(t) => t,
            None => return Ok(None),
        };
        let site = match self.site()? {
            Some(site) => site,
            None => {
                warn!("stored token has no website, assuming {}", Site::default());
                Site::default()
            }
        };
        Ok(Some(Session { token, site }))
    }

    pub fn save_session(&self, session: &Session) -> Result<()> {
        let stale_cache = self
            .read_snapshot()?
            .map(|snapshot| snapshot.site != session.site)
            .unwrap_or(false);

        let tx = self.conn.unchecked_transaction()?;
        let now = Utc::now().to_rfc3339();
        for (key, value) in [
            (AUTH_TOKEN_KEY, session.token.as_str()),
            (SELECTED_WEBSITE_KEY, session.site.as_str()),
        ] {
            tx.execute(
                "INSERT INTO kv (key, value, updated_at) VALUES (?1, ?2, ?3)
                 ON CONFLICT(key) DO UPDATE SET value = excluded.value, updated_at = excluded.updated_at",
                params![key, value, now],
            )?;
        }
        if stale_cache {
            debug!(site = %session.site, "dropping deals cached for another website");
            tx.execute("DELETE FROM kv WHERE key = ?1", [DEALS_KEY])?;
        }
        tx.commit()?;
        Ok(())
    }

    pub fn clear_session(&self) -> Result<()> {
        let tx = self.conn.unchecked_transaction()?;
        for key in SESSION_KEYS {
            tx.execute("DELETE FROM kv WHERE key = ?1", [key])?;
        }
        tx.commit()?;
        Ok(())
    }

    // Deals cache
    pub fn cache_deals(&self, site: Site, deals: &[Deal]) -> Result<()> {
        let snapshot = DealsSnapshot {
            site,
            fetched_at: Utc::now(),
            deals: deals.to_vec(),
        };
        let json = serde_json::to_string(&snapshot)?;
        self.set(DEALS_KEY, &json)
    }

    /// Deals from the last successful fetch for `site`, if any.
    pub fn cached_deals(&self, site: Site) -> Result<Option<Vec<Deal>>> {
        match self.read_snapshot()? {
            Some(snapshot) if snapshot.site == site => Ok(Some(snapshot.deals)),
            Some(snapshot) => {
                debug!(cached = %snapshot.site, wanted = %site, "cached deals belong to another website");
                Ok(None)
            }
            None => Ok(None),
        }
    }

    fn read_snapshot(&self) -> Result<Option<DealsSnapshot>> {
        let raw = match self.get(DEALS_KEY)? {
            Some(raw) => raw,
            None => return Ok(None),
        };
        match serde_json::from_str(&raw) {
            Ok(snapshot) => Ok(Some(snapshot)),
            Err(e) => {
                warn!(error = %e, "cached deals are unreadable");
                Ok(None)
            }
        }
    }
}
