use super::traits::{MessageStore, TagStore, ThoughtStore};
use super::types::{
    AccumulatedMessage, DeleteRange, NewMessage, NewOutput, NewThought, OutputRecord, Tag,
    RecordWithOutputs, ThoughtRecord, TimeBound, decode_ts, encode_ts,
};
use crate::core::types::{ActorId, ConversationKey, Platform, SourceKind};
use crate::error::StoreError;
use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use sqlx::Row;
use sqlx::sqlite::{SqlitePool, SqlitePoolOptions, SqliteRow};
use std::future::Future;
use std::path::Path;
use std::pin::Pin;
use std::str::FromStr;

const SCHEMA_META_TABLE: &str = "
CREATE TABLE IF NOT EXISTS leverage_schema_meta (
    key   TEXT PRIMARY KEY,
    value TEXT NOT NULL
)";
const SCHEMA_VERSION_KEY: &str = "leverage_schema_version";
const SCHEMA_VERSION: u32 = 1;

const SCHEMA: [&str; 6] = [
    "CREATE TABLE IF NOT EXISTS thoughts (
         id INTEGER PRIMARY KEY AUTOINCREMENT,
         actor INTEGER NOT NULL,
         created_at TEXT NOT NULL,
         raw_input TEXT NOT NULL,
         source_kind TEXT NOT NULL,
         idea_type TEXT NOT NULL,
         novelty_score INTEGER,
         clarity_score INTEGER,
         publishable INTEGER NOT NULL,
         risk_level TEXT NOT NULL,
         summary TEXT NOT NULL
     )",
    "CREATE TABLE IF NOT EXISTS outputs (
         id INTEGER PRIMARY KEY AUTOINCREMENT,
         thought_id INTEGER NOT NULL REFERENCES thoughts(id) ON DELETE CASCADE,
         created_at TEXT NOT NULL,
         platform TEXT NOT NULL,
         content TEXT NOT NULL,
         tokens_used INTEGER NOT NULL DEFAULT 0
     )",
    "CREATE TABLE IF NOT EXISTS accumulated_messages (
         id INTEGER PRIMARY KEY AUTOINCREMENT,
         actor INTEGER NOT NULL,
         conversation INTEGER NOT NULL,
         source_message_id INTEGER,
         text TEXT NOT NULL,
         created_at TEXT NOT NULL
     )",
    "CREATE TABLE IF NOT EXISTS tags (
         id INTEGER PRIMARY KEY AUTOINCREMENT,
         actor INTEGER NOT NULL,
         conversation INTEGER NOT NULL,
         label TEXT,
         created_at TEXT NOT NULL
     )",
    "CREATE INDEX IF NOT EXISTS idx_accumulated_scope
         ON accumulated_messages(actor, conversation, created_at)",
    "CREATE INDEX IF NOT EXISTS idx_thoughts_actor
         ON thoughts(actor, created_at)",
];

/// Open (creating if needed) the database file behind `path`.
pub async fn open_pool(path: &Path) -> Result<SqlitePool> {
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent)
            .await
            .with_context(|| format!("Failed to create data directory: {}", parent.display()))?;
    }

    let url = format!("sqlite://{}?mode=rwc", path.display());
    SqlitePoolOptions::new()
        .max_connections(2)
        .connect(&url)
        .await
        .with_context(|| format!("Failed to open database: {}", path.display()))
}

async fn ensure_schema_version(pool: &SqlitePool) -> Result<()> {
    sqlx::query(SCHEMA_META_TABLE)
        .execute(pool)
        .await
        .context("create leverage_schema_meta table")?;

    let stored: Option<(String,)> =
        sqlx::query_as("SELECT value FROM leverage_schema_meta WHERE key = $1")
            .bind(SCHEMA_VERSION_KEY)
            .fetch_optional(pool)
            .await
            .context("load schema version")?;

    if let Some((value,)) = stored {
        let parsed = value
            .parse::<u32>()
            .with_context(|| format!("invalid schema version value: {value}"))?;
        if parsed != SCHEMA_VERSION {
            return Err(StoreError::Migration(format!(
                "incompatible schema version: stored={parsed}, expected={SCHEMA_VERSION}"
            ))
            .into());
        }
        return Ok(());
    }

    sqlx::query("INSERT INTO leverage_schema_meta (key, value) VALUES ($1, $2)")
        .bind(SCHEMA_VERSION_KEY)
        .bind(SCHEMA_VERSION.to_string())
        .execute(pool)
        .await
        .context("persist schema version")?;

    Ok(())
}

/// One SQLite database backing messages, tags, thoughts and outputs.
#[derive(Clone)]
pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    /// Wrap an existing pool and run migrations.
    pub async fn new(pool: SqlitePool) -> Result<Self> {
        sqlx::query("PRAGMA foreign_keys = ON;")
            .execute(&pool)
            .await?;

        ensure_schema_version(&pool).await?;

        for statement in SCHEMA {
            sqlx::query(statement)
                .execute(&pool)
                .await
                .map_err(|e| StoreError::Migration(e.to_string()))?;
        }

        Ok(Self { pool })
    }

    pub async fn open(path: &Path) -> Result<Self> {
        Self::new(open_pool(path).await?).await
    }

    /// Private in-memory database on a single connection.
    pub async fn in_memory() -> Result<Self> {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .context("open in-memory database")?;
        Self::new(pool).await
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

fn opt_score(value: Option<i64>) -> Option<u8> {
    value.and_then(|v| u8::try_from(v).ok())
}

fn map_message_row(row: &SqliteRow) -> Result<AccumulatedMessage> {
    let created_at: String = row.try_get("created_at")?;
    Ok(AccumulatedMessage {
        id: row.try_get("id")?,
        key: ConversationKey::new(row.try_get("actor")?, row.try_get("conversation")?),
        source_message_id: row.try_get("source_message_id")?,
        text: row.try_get("text")?,
        created_at: decode_ts(&created_at)?,
    })
}

fn map_tag_row(row: &SqliteRow) -> Result<Tag> {
    let created_at: String = row.try_get("created_at")?;
    Ok(Tag {
        id: row.try_get("id")?,
        key: ConversationKey::new(row.try_get("actor")?, row.try_get("conversation")?),
        label: row.try_get("label")?,
        created_at: decode_ts(&created_at)?,
    })
}

fn map_thought_row(row: &SqliteRow) -> Result<ThoughtRecord> {
    let created_at: String = row.try_get("created_at")?;
    let source_raw: String = row.try_get("source_kind")?;
    let source = SourceKind::from_str(&source_raw)
        .map_err(|_| anyhow::anyhow!("unknown source kind: {source_raw}"))?;

    Ok(ThoughtRecord {
        id: row.try_get("id")?,
        actor: row.try_get("actor")?,
        created_at: decode_ts(&created_at)?,
        raw_input: row.try_get("raw_input")?,
        source,
        idea_type: row.try_get("idea_type")?,
        novelty_score: opt_score(row.try_get("novelty_score")?),
        clarity_score: opt_score(row.try_get("clarity_score")?),
        publishable: row.try_get("publishable")?,
        risk_level: row.try_get("risk_level")?,
        summary: row.try_get("summary")?,
    })
}

fn map_output_row(row: &SqliteRow) -> Result<OutputRecord> {
    let created_at: String = row.try_get("created_at")?;
    let platform_raw: String = row.try_get("platform")?;
    let tokens: i64 = row.try_get("tokens_used")?;

    Ok(OutputRecord {
        id: row.try_get("id")?,
        thought_id: row.try_get("thought_id")?,
        created_at: decode_ts(&created_at)?,
        platform: Platform::from_str(&platform_raw)
            .map_err(|_| anyhow::anyhow!("unknown platform: {platform_raw}"))?,
        content: row.try_get("content")?,
        tokens_used: u64::try_from(tokens).unwrap_or(0),
    })
}

const THOUGHT_COLUMNS: &str = "id, actor, created_at, raw_input, source_kind, idea_type,
     novelty_score, clarity_score, publishable, risk_level, summary";

impl MessageStore for SqliteStore {
    fn append_message<'a>(
        &'a self,
        message: NewMessage,
    ) -> Pin<Box<dyn Future<Output = Result<AccumulatedMessage>> + Send + 'a>> {
        Box::pin(async move {
            let result = sqlx::query(
                "INSERT INTO accumulated_messages (actor, conversation, source_message_id, text, created_at)
                 VALUES ($1, $2, $3, $4, $5)",
            )
            .bind(message.key.actor)
            .bind(message.key.conversation)
            .bind(message.source_message_id)
            .bind(&message.text)
            .bind(encode_ts(message.created_at))
            .execute(&self.pool)
            .await
            .context("insert accumulated message")?;

            Ok(AccumulatedMessage {
                id: result.last_insert_rowid(),
                key: message.key,
                source_message_id: message.source_message_id,
                text: message.text,
                created_at: message.created_at,
            })
        })
    }

    fn messages_since<'a>(
        &'a self,
        key: ConversationKey,
        bound: TimeBound,
    ) -> Pin<Box<dyn Future<Output = Result<Vec<AccumulatedMessage>>> + Send + 'a>> {
        Box::pin(async move {
            let (op, ts) = match bound {
                TimeBound::Inclusive(ts) => (">=", ts),
                TimeBound::Exclusive(ts) => (">", ts),
            };
            let sql = format!(
                "SELECT id, actor, conversation, source_message_id, text, created_at
                 FROM accumulated_messages
                 WHERE actor = $1 AND conversation = $2 AND created_at {op} $3
                 ORDER BY created_at ASC, id ASC"
            );
            let rows = sqlx::query(&sql)
                .bind(key.actor)
                .bind(key.conversation)
                .bind(encode_ts(ts))
                .fetch_all(&self.pool)
                .await
                .context("query accumulated messages")?;

            rows.iter().map(map_message_row).collect()
        })
    }

    fn delete_messages<'a>(
        &'a self,
        key: ConversationKey,
        range: DeleteRange,
    ) -> Pin<Box<dyn Future<Output = Result<u64>> + Send + 'a>> {
        Box::pin(async move {
            let (op, ts) = match range {
                DeleteRange::From(ts) => (">=", ts),
                DeleteRange::Through(ts) => ("<=", ts),
            };
            let sql = format!(
                "DELETE FROM accumulated_messages
                 WHERE actor = $1 AND conversation = $2 AND created_at {op} $3"
            );
            let result = sqlx::query(&sql)
                .bind(key.actor)
                .bind(key.conversation)
                .bind(encode_ts(ts))
                .execute(&self.pool)
                .await
                .context("delete accumulated messages")?;
            Ok(result.rows_affected())
        })
    }
}

impl TagStore for SqliteStore {
    fn insert_tag<'a>(
        &'a self,
        key: ConversationKey,
        label: Option<&'a str>,
        created_at: DateTime<Utc>,
    ) -> Pin<Box<dyn Future<Output = Result<Tag>> + Send + 'a>> {
        Box::pin(async move {
            let result = sqlx::query(
                "INSERT INTO tags (actor, conversation, label, created_at)
                 VALUES ($1, $2, $3, $4)",
            )
            .bind(key.actor)
            .bind(key.conversation)
            .bind(label)
            .bind(encode_ts(created_at))
            .execute(&self.pool)
            .await
            .context("insert tag")?;

            Ok(Tag {
                id: result.last_insert_rowid(),
                key,
                label: label.map(ToString::to_string),
                created_at,
            })
        })
    }

    fn latest_tag<'a>(
        &'a self,
        key: ConversationKey,
    ) -> Pin<Box<dyn Future<Output = Result<Option<Tag>>> + Send + 'a>> {
        Box::pin(async move {
            let row = sqlx::query(
                "SELECT id, actor, conversation, label, created_at
                 FROM tags
                 WHERE actor = $1 AND conversation = $2
                 ORDER BY created_at DESC, id DESC
                 LIMIT 1",
            )
            .bind(key.actor)
            .bind(key.conversation)
            .fetch_optional(&self.pool)
            .await
            .context("query latest tag")?;

            row.map(|r| map_tag_row(&r)).transpose()
        })
    }

    fn delete_tag<'a>(
        &'a self,
        id: i64,
    ) -> Pin<Box<dyn Future<Output = Result<bool>> + Send + 'a>> {
        Box::pin(async move {
            let result = sqlx::query("DELETE FROM tags WHERE id = $1")
                .bind(id)
                .execute(&self.pool)
                .await
                .context("delete tag")?;
            Ok(result.rows_affected() > 0)
        })
    }

    fn delete_through<'a>(
        &'a self,
        tag: &'a Tag,
    ) -> Pin<Box<dyn Future<Output = Result<u64>> + Send + 'a>> {
        Box::pin(async move {
            let result = sqlx::query(
                "DELETE FROM tags
                 WHERE actor = $1 AND conversation = $2
                   AND (id = $3 OR created_at < $4)",
            )
            .bind(tag.key.actor)
            .bind(tag.key.conversation)
            .bind(tag.id)
            .bind(encode_ts(tag.created_at))
            .execute(&self.pool)
            .await
            .context("delete consumed tags")?;
            Ok(result.rows_affected())
        })
    }
}

impl ThoughtStore for SqliteStore {
    fn commit<'a>(
        &'a self,
        thought: NewThought,
        outputs: Vec<NewOutput>,
    ) -> Pin<Box<dyn Future<Output = Result<i64>> + Send + 'a>> {
        Box::pin(async move {
            let mut tx = self
                .pool
                .begin()
                .await
                .map_err(|e| StoreError::Transaction(e.to_string()))?;

            let created_at = encode_ts(thought.created_at);
            let result = sqlx::query(
                "INSERT INTO thoughts (actor, created_at, raw_input, source_kind, idea_type,
                     novelty_score, clarity_score, publishable, risk_level, summary)
                 VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)",
            )
            .bind(thought.actor)
            .bind(&created_at)
            .bind(&thought.raw_input)
            .bind(thought.source.as_str())
            .bind(&thought.idea_type)
            .bind(thought.novelty_score.map(i64::from))
            .bind(thought.clarity_score.map(i64::from))
            .bind(thought.publishable)
            .bind(&thought.risk_level)
            .bind(&thought.summary)
            .execute(&mut *tx)
            .await
            .context("insert thought")?;
            let thought_id = result.last_insert_rowid();

            for output in &outputs {
                sqlx::query(
                    "INSERT INTO outputs (thought_id, created_at, platform, content, tokens_used)
                     VALUES ($1, $2, $3, $4, $5)",
                )
                .bind(thought_id)
                .bind(&created_at)
                .bind(output.platform.as_str())
                .bind(&output.content)
                .bind(i64::try_from(output.tokens_used).unwrap_or(i64::MAX))
                .execute(&mut *tx)
                .await
                .with_context(|| format!("insert {} output", output.platform))?;
            }

            tx.commit()
                .await
                .map_err(|e| StoreError::Transaction(e.to_string()))?;
            Ok(thought_id)
        })
    }

    fn thought_with_outputs<'a>(
        &'a self,
        id: i64,
        actor: ActorId,
    ) -> Pin<Box<dyn Future<Output = Result<Option<RecordWithOutputs>>> + Send + 'a>> {
        Box::pin(async move {
            let sql =
                format!("SELECT {THOUGHT_COLUMNS} FROM thoughts WHERE id = $1 AND actor = $2");
            let Some(row) = sqlx::query(&sql)
                .bind(id)
                .bind(actor)
                .fetch_optional(&self.pool)
                .await
                .context("query thought by id")?
            else {
                return Ok(None);
            };
            let thought = map_thought_row(&row)?;

            let rows = sqlx::query(
                "SELECT id, thought_id, created_at, platform, content, tokens_used
                 FROM outputs
                 WHERE thought_id = $1
                 ORDER BY id ASC",
            )
            .bind(id)
            .fetch_all(&self.pool)
            .await
            .context("query outputs")?;

            let mut outputs = rows
                .iter()
                .map(map_output_row)
                .collect::<Result<Vec<_>>>()?;
            outputs.sort_by_key(|output| output.platform);
            Ok(Some((thought, outputs)))
        })
    }

    fn recent_thoughts<'a>(
        &'a self,
        actor: ActorId,
        limit: usize,
    ) -> Pin<Box<dyn Future<Output = Result<Vec<ThoughtRecord>>> + Send + 'a>> {
        Box::pin(async move {
            let sql = format!(
                "SELECT {THOUGHT_COLUMNS} FROM thoughts
                 WHERE actor = $1
                 ORDER BY created_at DESC, id DESC
                 LIMIT $2"
            );
            let rows = sqlx::query(&sql)
                .bind(actor)
                .bind(i64::try_from(limit).unwrap_or(i64::MAX))
                .fetch_all(&self.pool)
                .await
                .context("query recent thoughts")?;

            rows.iter().map(map_thought_row).collect()
        })
    }

    fn count_thoughts<'a>(
        &'a self,
        actor: ActorId,
    ) -> Pin<Box<dyn Future<Output = Result<u64>> + Send + 'a>> {
        Box::pin(async move {
            let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM thoughts WHERE actor = $1")
                .bind(actor)
                .fetch_one(&self.pool)
                .await
                .context("count thoughts")?;
            Ok(u64::try_from(count).unwrap_or(0))
        })
    }
}
