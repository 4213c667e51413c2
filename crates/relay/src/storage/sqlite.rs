//! SQLite-based relay storage
//!
//! The single `Mutex<Connection>` is the process-wide exclusion lock:
//! both the interactive path and the background poll path go through it,
//! and compound read-check-write sequences run as one transaction while
//! it is held.

use std::path::Path;
use std::sync::Mutex;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use rusqlite::{Connection, OptionalExtension, params};
use rusqlite_migration::{M, Migrations};

use super::traits::{CreateAliasOutcome, IngestOutcome, RelayStore, StoreStats};
use crate::models::{
    AccountId, Alias, AliasId, IncomingMessage, MessageId, MessageSummary, NewAlias, StoredMessage,
    body_preview,
};

/// Column list shared by every alias SELECT
const ALIAS_COLUMNS: &str = "id, account_id, local_part, address, created_at, created_on, expires_at";

/// Database migrations
///
/// Each migration is applied in order. The user_version pragma tracks
/// which migrations have been applied.
fn migrations() -> Migrations<'static> {
    Migrations::new(vec![
        // Migration 1: Initial schema
        M::up(
            r#"
            -- Disposable addresses, one row per alias
            CREATE TABLE aliases (
                id INTEGER PRIMARY KEY,
                account_id INTEGER NOT NULL,
                local_part TEXT NOT NULL UNIQUE,
                address TEXT NOT NULL,
                created_at TEXT NOT NULL,
                created_on TEXT NOT NULL,
                expires_at TEXT
            );

            CREATE INDEX idx_aliases_account ON aliases(account_id);
            CREATE INDEX idx_aliases_quota ON aliases(account_id, created_on);

            -- Ingested mail with zstd-compressed bodies.
            -- The TEXT primary key is the transport Message-ID and doubles
            -- as the deduplication constraint.
            CREATE TABLE messages (
                id TEXT PRIMARY KEY,
                alias_id INTEGER NOT NULL,
                sender TEXT NOT NULL,
                subject TEXT NOT NULL,
                body BLOB NOT NULL,  -- zstd compressed
                body_preview TEXT NOT NULL,
                received_at TEXT NOT NULL,
                FOREIGN KEY (alias_id) REFERENCES aliases(id) ON DELETE CASCADE
            );

            CREATE INDEX idx_messages_alias ON messages(alias_id, received_at DESC);
            "#,
        ),
    ])
}

/// SQLite-based relay storage
pub struct SqliteRelayStore {
    conn: Mutex<Connection>,
}

impl SqliteRelayStore {
    /// Open (or create) the database at `db_path` and run migrations
    pub fn new(db_path: impl AsRef<Path>) -> Result<Self> {
        let mut conn = Connection::open(db_path.as_ref())
            .with_context(|| format!("Failed to open database at {:?}", db_path.as_ref()))?;

        // WAL for concurrent readers during writes, NORMAL sync as the
        // durability/performance balance, foreign_keys ON so the
        // messages -> aliases ON DELETE CASCADE is enforced.
        conn.execute_batch(
            r#"
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = NORMAL;
            PRAGMA foreign_keys = ON;
            "#,
        )?;

        migrations()
            .to_latest(&mut conn)
            .context("Failed to run database migrations")?;

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }
}

/// Parse an RFC 3339 timestamp column, falling back to now on bad data
fn parse_ts(s: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(|_| Utc::now())
}

/// Map one row of `ALIAS_COLUMNS` to an [`Alias`]
fn alias_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Alias> {
    let created_at_str: String = row.get(4)?;
    let created_on_str: String = row.get(5)?;
    let expires_at_str: Option<String> = row.get(6)?;

    Ok(Alias {
        id: AliasId::new(row.get(0)?),
        account: AccountId::new(row.get(1)?),
        local_part: row.get(2)?,
        address: row.get(3)?,
        created_at: parse_ts(&created_at_str),
        created_on: created_on_str
            .parse()
            .unwrap_or_else(|_| Utc::now().date_naive()),
        expires_at: expires_at_str.map(|s| parse_ts(&s)),
    })
}

impl RelayStore for SqliteRelayStore {
    fn create_alias(&self, new: NewAlias, daily_limit: u32) -> Result<CreateAliasOutcome> {
        let mut conn = self.conn.lock().unwrap();
        let tx = conn.transaction()?;

        let created_today: i64 = tx.query_row(
            "SELECT COUNT(*) FROM aliases WHERE account_id = ? AND created_on = ?",
            params![new.account.as_i64(), new.created_on().to_string()],
            |row| row.get(0),
        )?;

        if created_today >= daily_limit as i64 {
            return Ok(CreateAliasOutcome::QuotaExceeded);
        }

        // Collisions are caught by the UNIQUE constraint rather than
        // pre-checked, so generated names race-free fall through here.
        let inserted = tx.execute(
            "INSERT INTO aliases (account_id, local_part, address, created_at, created_on, expires_at)
             VALUES (?, ?, ?, ?, ?, ?)",
            params![
                new.account.as_i64(),
                new.local_part,
                new.address,
                new.created_at.to_rfc3339(),
                new.created_on().to_string(),
                new.expires_at.map(|at| at.to_rfc3339()),
            ],
        );

        match inserted {
            Ok(_) => {}
            Err(rusqlite::Error::SqliteFailure(e, _))
                if e.code == rusqlite::ErrorCode::ConstraintViolation =>
            {
                return Ok(CreateAliasOutcome::NameTaken);
            }
            Err(e) => return Err(e.into()),
        }

        let id = tx.last_insert_rowid();
        tx.commit()?;

        Ok(CreateAliasOutcome::Created(Alias {
            id: AliasId::new(id),
            account: new.account,
            created_on: new.created_on(),
            local_part: new.local_part,
            address: new.address,
            created_at: new.created_at,
            expires_at: new.expires_at,
        }))
    }

    fn list_aliases(&self, account: AccountId) -> Result<Vec<Alias>> {
        let conn = self.conn.lock().unwrap();

        let mut stmt = conn.prepare(&format!(
            "SELECT {ALIAS_COLUMNS} FROM aliases WHERE account_id = ? ORDER BY id ASC"
        ))?;

        let aliases = stmt
            .query_map([account.as_i64()], alias_from_row)?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(aliases)
    }

    fn get_alias(&self, id: AliasId) -> Result<Option<Alias>> {
        let conn = self.conn.lock().unwrap();

        let alias = conn
            .query_row(
                &format!("SELECT {ALIAS_COLUMNS} FROM aliases WHERE id = ?"),
                [id.as_i64()],
                alias_from_row,
            )
            .optional()?;

        Ok(alias)
    }

    fn get_alias_by_local_part(&self, local_part: &str) -> Result<Option<Alias>> {
        let conn = self.conn.lock().unwrap();

        let alias = conn
            .query_row(
                &format!("SELECT {ALIAS_COLUMNS} FROM aliases WHERE local_part = ?"),
                [local_part],
                alias_from_row,
            )
            .optional()?;

        Ok(alias)
    }

    fn delete_alias(&self, account: AccountId, local_part: &str) -> Result<bool> {
        let conn = self.conn.lock().unwrap();

        // Messages go with the alias via ON DELETE CASCADE
        let affected = conn.execute(
            "DELETE FROM aliases WHERE account_id = ? AND local_part = ?",
            params![account.as_i64(), local_part],
        )?;

        Ok(affected > 0)
    }

    fn delete_expired_aliases(&self, now: DateTime<Utc>) -> Result<usize> {
        let conn = self.conn.lock().unwrap();

        let affected = conn.execute(
            "DELETE FROM aliases WHERE expires_at IS NOT NULL AND expires_at <= ?",
            [now.to_rfc3339()],
        )?;

        Ok(affected)
    }

    fn ingest_message(&self, incoming: IncomingMessage) -> Result<IngestOutcome> {
        // Compress the body with zstd (level 3 = good speed/ratio balance)
        let body_compressed = zstd::encode_all(incoming.body.as_bytes(), 3)
            .context("Failed to compress message body")?;
        let preview = body_preview(&incoming.body);

        // Dedup check, ownership lookup, and insert must not interleave
        // with a concurrent alias deletion, so they share one
        // transaction under the store lock.
        let mut conn = self.conn.lock().unwrap();
        let tx = conn.transaction()?;

        let already: i64 = tx.query_row(
            "SELECT COUNT(*) FROM messages WHERE id = ?",
            [incoming.id.as_str()],
            |row| row.get(0),
        )?;
        if already > 0 {
            return Ok(IngestOutcome::Duplicate);
        }

        let alias = tx
            .query_row(
                &format!("SELECT {ALIAS_COLUMNS} FROM aliases WHERE local_part = ?"),
                [incoming.local_part.as_str()],
                alias_from_row,
            )
            .optional()?;

        let Some(alias) = alias else {
            return Ok(IngestOutcome::NoOwner);
        };

        tx.execute(
            "INSERT INTO messages (id, alias_id, sender, subject, body, body_preview, received_at)
             VALUES (?, ?, ?, ?, ?, ?, ?)",
            params![
                incoming.id.as_str(),
                alias.id.as_i64(),
                incoming.sender,
                incoming.subject,
                body_compressed,
                preview,
                incoming.received_at.to_rfc3339(),
            ],
        )?;

        tx.commit()?;
        Ok(IngestOutcome::Inserted { alias })
    }

    fn has_message(&self, id: &MessageId) -> Result<bool> {
        let conn = self.conn.lock().unwrap();

        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM messages WHERE id = ?",
            [id.as_str()],
            |row| row.get(0),
        )?;

        Ok(count > 0)
    }

    fn list_inbox(
        &self,
        alias_id: AliasId,
        page: usize,
        page_size: usize,
    ) -> Result<(Vec<MessageSummary>, usize)> {
        let conn = self.conn.lock().unwrap();

        let total: i64 = conn.query_row(
            "SELECT COUNT(*) FROM messages WHERE alias_id = ?",
            [alias_id.as_i64()],
            |row| row.get(0),
        )?;

        // rowid tie-break keeps arrival order stable within a timestamp
        let mut stmt = conn.prepare(
            "SELECT id, sender, subject, body_preview, received_at
             FROM messages WHERE alias_id = ?
             ORDER BY received_at DESC, rowid DESC
             LIMIT ? OFFSET ?",
        )?;

        let summaries = stmt
            .query_map(
                params![
                    alias_id.as_i64(),
                    page_size as i64,
                    (page * page_size) as i64
                ],
                |row| {
                    let received_at_str: String = row.get(4)?;
                    Ok(MessageSummary {
                        id: MessageId::new(row.get::<_, String>(0)?),
                        sender: row.get(1)?,
                        subject: row.get(2)?,
                        body_preview: row.get(3)?,
                        received_at: parse_ts(&received_at_str),
                    })
                },
            )?
            .collect::<Result<Vec<_>, _>>()?;

        Ok((summaries, total as usize))
    }

    fn get_message(&self, id: &MessageId) -> Result<Option<StoredMessage>> {
        let conn = self.conn.lock().unwrap();

        let row: Option<(i64, String, String, Vec<u8>, String)> = conn
            .query_row(
                "SELECT alias_id, sender, subject, body, received_at
                 FROM messages WHERE id = ?",
                [id.as_str()],
                |row| {
                    Ok((
                        row.get(0)?,
                        row.get(1)?,
                        row.get(2)?,
                        row.get(3)?,
                        row.get(4)?,
                    ))
                },
            )
            .optional()?;

        let Some((alias_id, sender, subject, body_compressed, received_at_str)) = row else {
            return Ok(None);
        };

        let body = zstd::decode_all(body_compressed.as_slice())
            .context("Failed to decompress message body")
            .map(|bytes| String::from_utf8_lossy(&bytes).into_owned())?;

        Ok(Some(StoredMessage {
            id: id.clone(),
            alias_id: AliasId::new(alias_id),
            sender,
            subject,
            body,
            received_at: parse_ts(&received_at_str),
        }))
    }

    fn count_messages_for_alias(&self, alias_id: AliasId) -> Result<usize> {
        let conn = self.conn.lock().unwrap();

        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM messages WHERE alias_id = ?",
            [alias_id.as_i64()],
            |row| row.get(0),
        )?;

        Ok(count as usize)
    }

    fn stats(&self) -> Result<StoreStats> {
        let conn = self.conn.lock().unwrap();

        let accounts: i64 =
            conn.query_row("SELECT COUNT(DISTINCT account_id) FROM aliases", [], |row| {
                row.get(0)
            })?;
        let aliases: i64 = conn.query_row("SELECT COUNT(*) FROM aliases", [], |row| row.get(0))?;
        let messages: i64 =
            conn.query_row("SELECT COUNT(*) FROM messages", [], |row| row.get(0))?;

        Ok(StoreStats {
            accounts: accounts as usize,
            aliases: aliases as usize,
            messages: messages as usize,
        })
    }

    fn clear(&self) -> Result<()> {
        let conn = self.conn.lock().unwrap();

        conn.execute_batch(
            "DELETE FROM messages;
             DELETE FROM aliases;",
        )?;

        Ok(())
    }
}
