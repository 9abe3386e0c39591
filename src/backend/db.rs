use std::path::Path;
use std::sync::Arc;

use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::{Connection, ErrorCode, OptionalExtension, params};
use shoplist_common::payloads::normalize_email;
use shoplist_common::{Item, ItemPatch, NewItem, NewList, ShoppingList, User};

use crate::errors::StoreError;

/// Async-safe handle to the shopping-list database.
///
/// Wraps `ShopDb` behind `Arc<Mutex>` and runs all access on tokio's
/// blocking thread pool via `spawn_blocking`, keeping synchronous SQLite I/O
/// off the async worker threads.
#[derive(Clone)]
pub struct DbHandle {
    inner: Arc<std::sync::Mutex<ShopDb>>,
}

impl DbHandle {
    pub fn new(db: ShopDb) -> Self {
        Self {
            inner: Arc::new(std::sync::Mutex::new(db)),
        }
    }

    /// Run a closure with access to the database on a blocking thread.
    ///
    /// The closure holds the lock for its whole body, so a read-check-write
    /// sequence inside one call is not interleaved with other requests.
    /// All data passed into `f` must be owned (`'static`).
    pub async fn call<F, R, E>(&self, f: F) -> Result<R, E>
    where
        F: FnOnce(&ShopDb) -> Result<R, E> + Send + 'static,
        R: Send + 'static,
        E: From<StoreError> + Send + 'static,
    {
        let db = self.inner.clone();
        tokio::task::spawn_blocking(move || {
            let guard = db.lock().map_err(|_| E::from(StoreError::LockPoisoned))?;
            f(&guard)
        })
        .await
        .map_err(|e| E::from(StoreError::TaskFailed(e.to_string())))?
    }
}

/// A user row including the password hash. Never serialized.
#[derive(Debug, Clone)]
pub struct UserRecord {
    pub user: User,
    pub password_hash: String,
}

pub struct ShopDb {
    conn: Connection,
}

impl ShopDb {
    /// Open (or create) a SQLite database at the given path and run migrations.
    pub fn new(path: &Path) -> Result<Self, StoreError> {
        let conn = Connection::open(path)?;
        let db = Self { conn };
        db.init()?;
        Ok(db)
    }

    /// Create an in-memory SQLite database (for testing).
    pub fn new_in_memory() -> Result<Self, StoreError> {
        let conn = Connection::open_in_memory()?;
        let db = Self { conn };
        db.init()?;
        Ok(db)
    }

    fn init(&self) -> Result<(), StoreError> {
        self.conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        self.run_migrations()
    }

    fn run_migrations(&self) -> Result<(), StoreError> {
        self.conn.execute_batch(
            "
            CREATE TABLE IF NOT EXISTS users (
                id TEXT PRIMARY KEY,
                name TEXT NOT NULL,
                email TEXT NOT NULL UNIQUE,
                password_hash TEXT NOT NULL,
                created_at TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS lists (
                id TEXT PRIMARY KEY,
                name TEXT NOT NULL,
                owner_id TEXT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
                total_budget REAL NOT NULL DEFAULT 0,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS list_shares (
                list_id TEXT NOT NULL REFERENCES lists(id) ON DELETE CASCADE,
                user_id TEXT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
                shared_at TEXT NOT NULL,
                PRIMARY KEY (list_id, user_id)
            );

            CREATE TABLE IF NOT EXISTS items (
                id TEXT PRIMARY KEY,
                list_id TEXT NOT NULL REFERENCES lists(id) ON DELETE CASCADE,
                position INTEGER NOT NULL,
                name TEXT NOT NULL,
                quantity REAL NOT NULL DEFAULT 1,
                price REAL NOT NULL DEFAULT 0,
                is_purchased INTEGER NOT NULL DEFAULT 0,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_lists_owner ON lists(owner_id);
            CREATE INDEX IF NOT EXISTS idx_list_shares_user ON list_shares(user_id);
            CREATE INDEX IF NOT EXISTS idx_items_list ON items(list_id, position);
            ",
        )?;
        Ok(())
    }

    // ── Users ─────────────────────────────────────────────────────────

    pub fn create_user(
        &self,
        name: &str,
        email: &str,
        password_hash: &str,
    ) -> Result<User, StoreError> {
        let id = new_id();
        let email = normalize_email(email);
        let inserted = self.conn.execute(
            "INSERT INTO users (id, name, email, password_hash, created_at) VALUES (?1, ?2, ?3, ?4, ?5)",
            params![id, name, email, password_hash, timestamp()],
        );
        match inserted {
            Ok(_) => {}
            Err(rusqlite::Error::SqliteFailure(e, _)) if e.code == ErrorCode::ConstraintViolation => {
                return Err(StoreError::EmailTaken { email });
            }
            Err(e) => return Err(e.into()),
        }
        self.get_user(&id)?
            .ok_or(StoreError::UserNotFound { id })
    }

    pub fn get_user(&self, id: &str) -> Result<Option<User>, StoreError> {
        Ok(self
            .find_user("SELECT id, name, email, password_hash, created_at FROM users WHERE id = ?1", id)?
            .map(|record| record.user))
    }

    /// Case-insensitive lookup.
    pub fn find_user_by_email(&self, email: &str) -> Result<Option<UserRecord>, StoreError> {
        self.find_user(
            "SELECT id, name, email, password_hash, created_at FROM users WHERE email = ?1",
            &normalize_email(email),
        )
    }

    fn find_user(&self, sql: &str, key: &str) -> Result<Option<UserRecord>, StoreError> {
        let row = self
            .conn
            .query_row(sql, params![key], |row| {
                Ok(UserRow {
                    id: row.get(0)?,
                    name: row.get(1)?,
                    email: row.get(2)?,
                    password_hash: row.get(3)?,
                    created_at: row.get(4)?,
                })
            })
            .optional()?;
        row.map(UserRow::into_record).transpose()
    }

    // ── Lists ─────────────────────────────────────────────────────────

    /// Insert a list with its initial items and collaborators in one
    /// transaction. Collaborator ids must already exist.
    pub fn create_list(&self, owner_id: &str, new: &NewList) -> Result<ShoppingList, StoreError> {
        let id = new_id();
        let now = timestamp();
        let tx = self.conn.unchecked_transaction()?;
        tx.execute(
            "INSERT INTO lists (id, name, owner_id, total_budget, created_at, updated_at) VALUES (?1, ?2, ?3, ?4, ?5, ?5)",
            params![id, new.name, owner_id, new.total_budget, now],
        )?;
        for (position, item) in new.items.iter().enumerate() {
            insert_item(&tx, &id, position as i64, item, &now)?;
        }
        for user_id in &new.shared_with {
            tx.execute(
                "INSERT OR IGNORE INTO list_shares (list_id, user_id, shared_at) VALUES (?1, ?2, ?3)",
                params![id, user_id, now],
            )?;
        }
        tx.commit()?;
        self.get_list(&id)?.ok_or(StoreError::ListNotFound { id })
    }

    pub fn get_list(&self, id: &str) -> Result<Option<ShoppingList>, StoreError> {
        let row = self
            .conn
            .query_row(
                "SELECT id, name, owner_id, total_budget, created_at, updated_at FROM lists WHERE id = ?1",
                params![id],
                |row| {
                    Ok(ListRow {
                        id: row.get(0)?,
                        name: row.get(1)?,
                        owner_id: row.get(2)?,
                        total_budget: row.get(3)?,
                        created_at: row.get(4)?,
                        updated_at: row.get(5)?,
                    })
                },
            )
            .optional()?;
        let Some(row) = row else {
            return Ok(None);
        };
        let items = self.list_items(&row.id)?;
        let shared_with = self.list_collaborators(&row.id)?;
        Ok(Some(row.into_list(items, shared_with)?))
    }

    /// Lists the user owns or collaborates on, newest first.
    pub fn lists_for_user(&self, user_id: &str) -> Result<Vec<ShoppingList>, StoreError> {
        let mut stmt = self.conn.prepare(
            "SELECT id FROM lists
             WHERE owner_id = ?1 OR id IN (SELECT list_id FROM list_shares WHERE user_id = ?1)
             ORDER BY created_at DESC, rowid DESC",
        )?;
        let ids = stmt
            .query_map(params![user_id], |row| row.get::<_, String>(0))?
            .collect::<Result<Vec<_>, _>>()?;
        let mut lists = Vec::with_capacity(ids.len());
        for id in ids {
            if let Some(list) = self.get_list(&id)? {
                lists.push(list);
            }
        }
        Ok(lists)
    }

    /// Replace the name and/or budget. `None` leaves a field unchanged.
    pub fn update_list(
        &self,
        id: &str,
        name: Option<&str>,
        total_budget: Option<f64>,
    ) -> Result<ShoppingList, StoreError> {
        let changed = self.conn.execute(
            "UPDATE lists SET name = COALESCE(?1, name), total_budget = COALESCE(?2, total_budget), updated_at = ?3 WHERE id = ?4",
            params![name, total_budget, timestamp(), id],
        )?;
        if changed == 0 {
            return Err(StoreError::ListNotFound { id: id.to_string() });
        }
        self.get_list(id)?.ok_or_else(|| StoreError::ListNotFound { id: id.to_string() })
    }

    /// Delete a list together with its items and shares. Returns false when
    /// no such list existed.
    pub fn delete_list(&self, id: &str) -> Result<bool, StoreError> {
        let changed = self
            .conn
            .execute("DELETE FROM lists WHERE id = ?1", params![id])?;
        Ok(changed > 0)
    }

    pub fn share_list(&self, list_id: &str, user_id: &str) -> Result<ShoppingList, StoreError> {
        let now = timestamp();
        let tx = self.conn.unchecked_transaction()?;
        tx.execute(
            "INSERT OR IGNORE INTO list_shares (list_id, user_id, shared_at) VALUES (?1, ?2, ?3)",
            params![list_id, user_id, now],
        )?;
        touch_list(&tx, list_id, &now)?;
        tx.commit()?;
        self.get_list(list_id)?
            .ok_or_else(|| StoreError::ListNotFound { id: list_id.to_string() })
    }

    // ── Items ─────────────────────────────────────────────────────────

    /// Append an item at the end of the list.
    pub fn add_item(&self, list_id: &str, new: &NewItem) -> Result<Item, StoreError> {
        let now = timestamp();
        let tx = self.conn.unchecked_transaction()?;
        let next_position: i64 = tx.query_row(
            "SELECT COALESCE(MAX(position), -1) + 1 FROM items WHERE list_id = ?1",
            params![list_id],
            |row| row.get(0),
        )?;
        let id = insert_item(&tx, list_id, next_position, new, &now)?;
        touch_list(&tx, list_id, &now)?;
        tx.commit()?;
        self.get_item(list_id, &id)?.ok_or(StoreError::ItemNotFound { id })
    }

    pub fn get_item(&self, list_id: &str, item_id: &str) -> Result<Option<Item>, StoreError> {
        let row = self
            .conn
            .query_row(
                "SELECT id, name, quantity, price, is_purchased, created_at, updated_at
                 FROM items WHERE id = ?1 AND list_id = ?2",
                params![item_id, list_id],
                ItemRow::from_row,
            )
            .optional()?;
        row.map(ItemRow::into_item).transpose()
    }

    /// Apply the fields present in `patch`.
    pub fn update_item(
        &self,
        list_id: &str,
        item_id: &str,
        patch: &ItemPatch,
    ) -> Result<Item, StoreError> {
        let now = timestamp();
        let tx = self.conn.unchecked_transaction()?;
        let changed = tx.execute(
            "UPDATE items SET
                name = COALESCE(?1, name),
                quantity = COALESCE(?2, quantity),
                price = COALESCE(?3, price),
                is_purchased = COALESCE(?4, is_purchased),
                updated_at = ?5
             WHERE id = ?6 AND list_id = ?7",
            params![
                patch.name,
                patch.quantity,
                patch.price,
                patch.is_purchased,
                now,
                item_id,
                list_id
            ],
        )?;
        if changed == 0 {
            return Err(StoreError::ItemNotFound { id: item_id.to_string() });
        }
        touch_list(&tx, list_id, &now)?;
        tx.commit()?;
        self.get_item(list_id, item_id)?
            .ok_or_else(|| StoreError::ItemNotFound { id: item_id.to_string() })
    }

    /// Returns false when the item does not exist on that list.
    pub fn delete_item(&self, list_id: &str, item_id: &str) -> Result<bool, StoreError> {
        let now = timestamp();
        let tx = self.conn.unchecked_transaction()?;
        let changed = tx.execute(
            "DELETE FROM items WHERE id = ?1 AND list_id = ?2",
            params![item_id, list_id],
        )?;
        if changed > 0 {
            touch_list(&tx, list_id, &now)?;
        }
        tx.commit()?;
        Ok(changed > 0)
    }

    fn list_items(&self, list_id: &str) -> Result<Vec<Item>, StoreError> {
        let mut stmt = self.conn.prepare(
            "SELECT id, name, quantity, price, is_purchased, created_at, updated_at
             FROM items WHERE list_id = ?1 ORDER BY position",
        )?;
        let rows = stmt
            .query_map(params![list_id], ItemRow::from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        rows.into_iter().map(ItemRow::into_item).collect()
    }

    fn list_collaborators(&self, list_id: &str) -> Result<Vec<String>, StoreError> {
        let mut stmt = self
            .conn
            .prepare("SELECT user_id FROM list_shares WHERE list_id = ?1 ORDER BY rowid")?;
        let ids = stmt
            .query_map(params![list_id], |row| row.get(0))?
            .collect::<Result<Vec<String>, _>>()?;
        Ok(ids)
    }
}

// ── Helpers ───────────────────────────────────────────────────────────

fn new_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

/// Millisecond-precision UTC timestamp; fixed width so text order is time order.
fn timestamp() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)
}

fn parse_timestamp(raw: &str) -> Result<DateTime<Utc>, StoreError> {
    DateTime::parse_from_rfc3339(raw)
        .map(|ts| ts.with_timezone(&Utc))
        .map_err(|e| StoreError::CorruptRow(format!("bad timestamp '{}': {}", raw, e)))
}

fn insert_item(
    conn: &Connection,
    list_id: &str,
    position: i64,
    item: &NewItem,
    now: &str,
) -> Result<String, StoreError> {
    let id = new_id();
    conn.execute(
        "INSERT INTO items (id, list_id, position, name, quantity, price, is_purchased, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?8)",
        params![
            id,
            list_id,
            position,
            item.name,
            item.quantity,
            item.price,
            item.is_purchased,
            now
        ],
    )?;
    Ok(id)
}

fn touch_list(conn: &Connection, list_id: &str, now: &str) -> Result<(), StoreError> {
    conn.execute(
        "UPDATE lists SET updated_at = ?1 WHERE id = ?2",
        params![now, list_id],
    )?;
    Ok(())
}

struct UserRow {
    id: String,
    name: String,
    email: String,
    password_hash: String,
    created_at: String,
}

impl UserRow {
    fn into_record(self) -> Result<UserRecord, StoreError> {
        Ok(UserRecord {
            user: User {
                id: self.id,
                name: self.name,
                email: self.email,
                created_at: parse_timestamp(&self.created_at)?,
            },
            password_hash: self.password_hash,
        })
    }
}

struct ListRow {
    id: String,
    name: String,
    owner_id: String,
    total_budget: f64,
    created_at: String,
    updated_at: String,
}

impl ListRow {
    fn into_list(self, items: Vec<Item>, shared_with: Vec<String>) -> Result<ShoppingList, StoreError> {
        Ok(ShoppingList {
            id: self.id,
            name: self.name,
            items,
            owner: self.owner_id,
            shared_with,
            total_budget: self.total_budget,
            created_at: parse_timestamp(&self.created_at)?,
            updated_at: parse_timestamp(&self.updated_at)?,
        })
    }
}

struct ItemRow {
    id: String,
    name: String,
    quantity: f64,
    price: f64,
    is_purchased: bool,
    created_at: String,
    updated_at: String,
}

impl ItemRow {
    fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            name: row.get(1)?,
            quantity: row.get(2)?,
            price: row.get(3)?,
            is_purchased: row.get(4)?,
            created_at: row.get(5)?,
            updated_at: row.get(6)?,
        })
    }

    fn into_item(self) -> Result<Item, StoreError> {
        Ok(Item {
            id: self.id,
            name: self.name,
            quantity: self.quantity,
            price: self.price,
            is_purchased: self.is_purchased,
            created_at: parse_timestamp(&self.created_at)?,
            updated_at: parse_timestamp(&self.updated_at)?,
        })
    }
}
