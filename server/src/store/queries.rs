//! Query methods on [`Database`].
//!
//! The subscriber upsert is a single `INSERT ... ON CONFLICT DO UPDATE`
//! statement so that two simultaneous submissions for the same email
//! cannot interleave a read-modify-write and lose a data merge.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use rusqlite::{params, OptionalExtension, Row};
use serde_json::{Map, Value};
use uuid::Uuid;

use crate::store::models::{FormSubmission, Subscriber};
use crate::store::Database;

impl Database {
    // -- Subscribers --

    /// Insert or merge-update a subscriber, returning its id.
    ///
    /// Insert path: new row, `active=true`, both timestamps now.
    /// Conflict path: reactivates the row, replaces `name` only when the
    /// incoming value is non-empty, shallow-merges `data` (incoming keys
    /// overwrite, absent keys are preserved), and refreshes `updated_at`.
    /// `subscribed_at` is never touched after creation.
    pub fn upsert_subscriber(
        &self,
        email: &str,
        name: Option<&str>,
        data: &Map<String, Value>,
    ) -> Result<String> {
        let id = Uuid::new_v4().to_string();
        let now = Utc::now().to_rfc3339();
        let data_json = serde_json::to_string(data)?;

        self.with_conn(|conn| {
            let id = conn.query_row(
                "INSERT INTO subscribers (id, email, name, subscribed_at, updated_at, active, data)
                 VALUES (?1, ?2, ?3, ?4, ?4, 1, ?5)
                 ON CONFLICT(email) DO UPDATE SET
                     active = 1,
                     name = CASE
                         WHEN excluded.name IS NOT NULL AND excluded.name <> ''
                         THEN excluded.name
                         ELSE subscribers.name
                     END,
                     data = json_patch(subscribers.data, excluded.data),
                     updated_at = excluded.updated_at
                 RETURNING id",
                params![id, email, name, now, data_json],
                |row| row.get(0),
            )?;
            Ok(id)
        })
    }

    /// Mark a subscriber inactive. Unknown emails are a no-op.
    pub fn unsubscribe(&self, email: &str) -> Result<()> {
        let now = Utc::now().to_rfc3339();
        self.with_conn(|conn| {
            conn.execute(
                "UPDATE subscribers SET active = 0, updated_at = ?2 WHERE email = ?1",
                params![email, now],
            )?;
            Ok(())
        })
    }

    pub fn get_subscriber_by_email(&self, email: &str) -> Result<Option<Subscriber>> {
        let raw = self.with_conn(|conn| {
            let row = conn
                .query_row(
                    "SELECT id, email, name, subscribed_at, updated_at, active, data
                     FROM subscribers WHERE email = ?1",
                    [email],
                    subscriber_raw,
                )
                .optional()?;
            Ok(row)
        })?;
        raw.map(RawSubscriber::parse).transpose()
    }

    pub fn list_subscribers(&self, active_only: bool) -> Result<Vec<Subscriber>> {
        let rows = self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT id, email, name, subscribed_at, updated_at, active, data
                 FROM subscribers
                 WHERE active = 1 OR ?1 = 0
                 ORDER BY subscribed_at",
            )?;
            let rows = stmt
                .query_map([active_only as i64], subscriber_raw)?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            Ok(rows)
        })?;
        rows.into_iter().map(RawSubscriber::parse).collect()
    }

    // -- Form submissions --

    /// Append a raw webhook payload to the audit log, returning its id.
    pub fn insert_submission(&self, form_id: Option<&str>, payload: &Value) -> Result<String> {
        let id = Uuid::new_v4().to_string();
        let now = Utc::now().to_rfc3339();
        let payload_json = serde_json::to_string(payload)?;

        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO form_submissions (id, form_id, submission_data, received_at)
                 VALUES (?1, ?2, ?3, ?4)",
                params![id, form_id, payload_json, now],
            )?;
            Ok(())
        })?;
        Ok(id)
    }

    /// Fetch the audit log, optionally filtered by form id.
    pub fn list_submissions(&self, form_id: Option<&str>) -> Result<Vec<FormSubmission>> {
        let rows = self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT id, form_id, submission_data, received_at
                 FROM form_submissions
                 WHERE ?1 IS NULL OR form_id = ?1
                 ORDER BY received_at",
            )?;
            let rows = stmt
                .query_map([form_id], |row| {
                    Ok((
                        row.get::<_, String>(0)?,
                        row.get::<_, Option<String>>(1)?,
                        row.get::<_, String>(2)?,
                        row.get::<_, String>(3)?,
                    ))
                })?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            Ok(rows)
        })?;

        rows.into_iter()
            .map(|(id, form_id, data, received_at)| {
                Ok(FormSubmission {
                    id,
                    form_id,
                    submission_data: serde_json::from_str(&data)
                        .context("corrupt submission_data column")?,
                    received_at: parse_timestamp(&received_at)?,
                })
            })
            .collect()
    }

    pub fn count_submissions(&self) -> Result<u64> {
        self.with_conn(|conn| {
            let count: i64 =
                conn.query_row("SELECT COUNT(*) FROM form_submissions", [], |row| row.get(0))?;
            Ok(count as u64)
        })
    }
}

/// Subscriber row before the JSON and timestamp columns are decoded.
struct RawSubscriber {
    id: String,
    email: String,
    name: Option<String>,
    subscribed_at: String,
    updated_at: String,
    active: bool,
    data: String,
}

fn subscriber_raw(row: &Row) -> rusqlite::Result<RawSubscriber> {
    Ok(RawSubscriber {
        id: row.get(0)?,
        email: row.get(1)?,
        name: row.get(2)?,
        subscribed_at: row.get(3)?,
        updated_at: row.get(4)?,
        active: row.get::<_, i64>(5)? != 0,
        data: row.get(6)?,
    })
}

impl RawSubscriber {
    fn parse(self) -> Result<Subscriber> {
        Ok(Subscriber {
            id: self.id,
            email: self.email,
            name: self.name,
            subscribed_at: parse_timestamp(&self.subscribed_at)?,
            updated_at: parse_timestamp(&self.updated_at)?,
            active: self.active,
            data: match serde_json::from_str(&self.data).context("corrupt data column")? {
                Value::Object(map) => map,
                _ => Map::new(),
            },
        })
    }
}

fn parse_timestamp(raw: &str) -> Result<DateTime<Utc>> {
    Ok(DateTime::parse_from_rfc3339(raw)
        .with_context(|| format!("corrupt timestamp: {raw}"))?
        .with_timezone(&Utc))
}
