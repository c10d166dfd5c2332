//! SQLite-backed store for foods, tokens and permissions.
//!
//! # Responsibilities
//! - Own the single database connection and its schema
//! - Implement `FoodStore` with a version-checked update statement
//! - Resolve bearer tokens into identities
//!
//! # Design Decisions
//! - Blocking SQLite calls run on tokio's blocking pool
//! - Every call is wrapped in the configured deadline
//! - The connection mutex is never held across an await point

use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use async_trait::async_trait;
use rusqlite::{params, Connection, OptionalExtension, Row};

use crate::config::DatabaseConfig;
use crate::data::filters::{FoodFilter, Filters, Metadata};
use crate::data::foods::{Food, NewFood};
use crate::data::store::{with_deadline, FoodStore, StoreError};
use crate::security::identity::{
    generate_token, hash_token, Identity, IdentityResolver, SCOPE_AUTHENTICATION,
};

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS foods (
    id         INTEGER PRIMARY KEY AUTOINCREMENT,
    created_at INTEGER NOT NULL,
    title      TEXT    NOT NULL,
    types      TEXT    NOT NULL,
    version    INTEGER NOT NULL DEFAULT 1
);
CREATE TABLE IF NOT EXISTS tokens (
    hash    BLOB    PRIMARY KEY,
    user_id INTEGER NOT NULL,
    expiry  INTEGER NOT NULL,
    scope   TEXT    NOT NULL
);
CREATE TABLE IF NOT EXISTS users_permissions (
    user_id    INTEGER NOT NULL,
    permission TEXT    NOT NULL,
    PRIMARY KEY (user_id, permission)
);
"#;

const FOOD_COLUMNS: &str = "id, created_at, title, types, version";

fn now_secs() -> i64 {
    let secs = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs();
    i64::try_from(secs).unwrap_or(i64::MAX)
}

fn to_i64(value: u64) -> i64 {
    i64::try_from(value).unwrap_or(i64::MAX)
}

/// Columns of a food row before the JSON `types` column is decoded.
struct FoodRow {
    id: i64,
    created_at: i64,
    title: String,
    types: String,
    version: i32,
}

impl FoodRow {
    fn read(row: &Row<'_>, offset: usize) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(offset)?,
            created_at: row.get(offset + 1)?,
            title: row.get(offset + 2)?,
            types: row.get(offset + 3)?,
            version: row.get(offset + 4)?,
        })
    }

    fn into_food(self) -> Result<Food, StoreError> {
        let types = serde_json::from_str(&self.types)
            .map_err(|e| StoreError::Corrupt(format!("food {} types: {e}", self.id)))?;
        Ok(Food {
            id: self.id,
            created_at: u64::try_from(self.created_at).unwrap_or_default(),
            title: self.title,
            types,
            version: self.version,
        })
    }
}

fn encode_types(types: &[String]) -> Result<String, StoreError> {
    serde_json::to_string(types).map_err(|e| StoreError::Corrupt(e.to_string()))
}

/// Store backed by a single SQLite connection.
#[derive(Clone)]
pub struct SqliteStore {
    conn: Arc<Mutex<Connection>>,
    query_timeout: Duration,
}

impl SqliteStore {
    /// Open (creating if needed) the database described by `config`.
    pub fn open(config: &DatabaseConfig) -> Result<Self, StoreError> {
        let conn = Connection::open(&config.path)?;
        conn.busy_timeout(Duration::from_millis(config.busy_timeout_ms))?;
        Self::with_connection(conn, config.query_timeout())
    }

    /// Private in-memory database, mostly for tests.
    pub fn open_in_memory(query_timeout: Duration) -> Result<Self, StoreError> {
        Self::with_connection(Connection::open_in_memory()?, query_timeout)
    }

    fn with_connection(conn: Connection, query_timeout: Duration) -> Result<Self, StoreError> {
        conn.execute_batch(SCHEMA)?;
        tracing::debug!("Database schema ready");
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
            query_timeout,
        })
    }

    /// Run `op` against the connection on the blocking pool, under the
    /// store deadline.
    async fn run<T, F>(&self, op: F) -> Result<T, StoreError>
    where
        T: Send + 'static,
        F: FnOnce(&mut Connection) -> Result<T, StoreError> + Send + 'static,
    {
        let conn = Arc::clone(&self.conn);
        with_deadline(self.query_timeout, async move {
            tokio::task::spawn_blocking(move || {
                let mut conn = conn.lock().unwrap_or_else(PoisonError::into_inner);
                op(&mut conn)
            })
            .await
            .map_err(|e| StoreError::Worker(e.to_string()))?
        })
        .await
    }

    /// Grant `permissions` to `user_id` and mint an authentication token
    /// valid for `ttl`. Returns the plaintext token.
    pub async fn issue_token(
        &self,
        user_id: i64,
        ttl: Duration,
        permissions: Vec<String>,
    ) -> Result<String, StoreError> {
        let token = generate_token();
        let hash = hash_token(&token);
        let expiry = now_secs().saturating_add(to_i64(ttl.as_secs()));

        self.run(move |conn| {
            let tx = conn.transaction()?;
            for permission in &permissions {
                tx.execute(
                    "INSERT OR IGNORE INTO users_permissions (user_id, permission) VALUES (?1, ?2)",
                    params![user_id, permission],
                )?;
            }
            tx.execute(
                "INSERT INTO tokens (hash, user_id, expiry, scope) VALUES (?1, ?2, ?3, ?4)",
                params![hash, user_id, expiry, SCOPE_AUTHENTICATION],
            )?;
            tx.commit()?;
            Ok(())
        })
        .await?;

        tracing::info!(user_id, expiry, "Authentication token issued");
        Ok(token)
    }

    /// Remove every token belonging to `user_id` in `scope`.
    pub async fn delete_tokens_for_user(&self, user_id: i64, scope: &str) -> Result<usize, StoreError> {
        let scope = scope.to_string();
        self.run(move |conn| {
            Ok(conn.execute(
                "DELETE FROM tokens WHERE user_id = ?1 AND scope = ?2",
                params![user_id, scope],
            )?)
        })
        .await
    }
}

#[async_trait]
impl FoodStore for SqliteStore {
    async fn get(&self, id: i64) -> Result<Food, StoreError> {
        self.run(move |conn| {
            let row = conn
                .query_row(
                    &format!("SELECT {FOOD_COLUMNS} FROM foods WHERE id = ?1"),
                    params![id],
                    |row| FoodRow::read(row, 0),
                )
                .optional()?;
            row.ok_or(StoreError::RecordNotFound)?.into_food()
        })
        .await
    }

    async fn insert(&self, food: NewFood) -> Result<Food, StoreError> {
        let types = encode_types(&food.types)?;
        self.run(move |conn| {
            let created_at = now_secs();
            let (id, version): (i64, i32) = conn.query_row(
                "INSERT INTO foods (created_at, title, types) VALUES (?1, ?2, ?3) \
                 RETURNING id, version",
                params![created_at, food.title, types],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )?;
            Ok(Food {
                id,
                created_at: u64::try_from(created_at).unwrap_or_default(),
                title: food.title,
                types: food.types,
                version,
            })
        })
        .await
    }

    async fn conditional_update(&self, food: &Food) -> Result<i32, StoreError> {
        let types = encode_types(&food.types)?;
        let (id, title, expected) = (food.id, food.title.clone(), food.version);
        self.run(move |conn| {
            conn.query_row(
                "UPDATE foods SET title = ?1, types = ?2, version = version + 1 \
                 WHERE id = ?3 AND version = ?4 RETURNING version",
                params![title, types, id, expected],
                |row| row.get(0),
            )
            .optional()?
            .ok_or(StoreError::EditConflict)
        })
        .await
    }

    async fn delete(&self, id: i64) -> Result<(), StoreError> {
        self.run(move |conn| {
            match conn.execute("DELETE FROM foods WHERE id = ?1", params![id])? {
                0 => Err(StoreError::RecordNotFound),
                _ => Ok(()),
            }
        })
        .await
    }

    async fn list(
        &self,
        filter: &FoodFilter,
        filters: &Filters,
    ) -> Result<(Vec<Food>, Metadata), StoreError> {
        // Column and direction come from the safelist, never from raw input.
        let sql = format!(
            "SELECT count(*) OVER(), {FOOD_COLUMNS} FROM foods \
             WHERE (?1 = '' OR instr(lower(title), lower(?1)) > 0) \
             AND (SELECT count(*) FROM json_each(?2) AS wanted \
                  WHERE wanted.value IN (SELECT value FROM json_each(foods.types))) \
                 = json_array_length(?2) \
             ORDER BY {} {}, id ASC \
             LIMIT ?3 OFFSET ?4",
            filters.sort_column(),
            filters.sort_direction(),
        );
        let title = filter.title.clone();
        let types = encode_types(&filter.types)?;
        let (limit, offset) = (to_i64(filters.limit()), to_i64(filters.offset()));
        let (page, page_size) = (filters.page, filters.page_size);

        self.run(move |conn| {
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt.query_map(params![title, types, limit, offset], |row| {
                let total: i64 = row.get(0)?;
                Ok((total, FoodRow::read(row, 1)?))
            })?;

            let mut total_records = 0;
            let mut foods = Vec::new();
            for row in rows {
                let (total, food) = row?;
                total_records = u64::try_from(total).unwrap_or_default();
                foods.push(food.into_food()?);
            }
            Ok((foods, Metadata::calculate(total_records, page, page_size)))
        })
        .await
    }
}

#[async_trait]
impl IdentityResolver for SqliteStore {
    async fn resolve(&self, token: &str) -> Result<Option<Identity>, StoreError> {
        let hash = hash_token(token);
        self.run(move |conn| {
            let user_id: Option<i64> = conn
                .query_row(
                    "SELECT user_id FROM tokens WHERE hash = ?1 AND scope = ?2 AND expiry > ?3",
                    params![hash, SCOPE_AUTHENTICATION, now_secs()],
                    |row| row.get(0),
                )
                .optional()?;
            let Some(user_id) = user_id else {
                return Ok(None);
            };

            let mut stmt = conn.prepare(
                "SELECT permission FROM users_permissions WHERE user_id = ?1 ORDER BY permission",
            )?;
            let permissions = stmt
                .query_map(params![user_id], |row| row.get::<_, String>(0))?
                .collect::<Result<Vec<_>, _>>()?;
            Ok(Some(Identity::authenticated(user_id, permissions)))
        })
        .await
    }
}
