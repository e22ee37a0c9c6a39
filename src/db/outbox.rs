//! Local reminder outbox.
//!
//! Acts as the notification delivery subsystem for the daemon: the scheduler
//! cancels and schedules rows here, and the delivery loop drains rows whose
//! trigger instant has passed.

use crate::datasources::NotificationSink;
use crate::db::Database;
use crate::error::Result;
use crate::models::{ReminderHandle, ScheduledReminder};
use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::{params, Row, TransactionBehavior};

#[derive(Clone)]
pub struct Outbox {
    db: Database,
}

impl Outbox {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    pub fn pending(&self) -> Result<Vec<ScheduledReminder>> {
        self.db.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT trigger_at, title, body FROM pending_reminders ORDER BY trigger_at",
            )?;
            let rows = stmt.query_map([], row_to_reminder)?;
            rows.collect::<rusqlite::Result<Vec<_>>>().map_err(Into::into)
        })
    }

    /// Remove and return every reminder whose trigger instant is at or before `now`
    pub fn take_due(&self, now: DateTime<Utc>) -> Result<Vec<ScheduledReminder>> {
        self.db.with_conn_mut(|conn| {
            let tx = conn.transaction()?;
            let cutoff = to_sql_timestamp(now);

            let due = {
                let mut stmt = tx.prepare(
                    "SELECT trigger_at, title, body FROM pending_reminders \
                     WHERE trigger_at <= ?1 ORDER BY trigger_at",
                )?;
                let rows = stmt.query_map([&cutoff], row_to_reminder)?;
                rows.collect::<rusqlite::Result<Vec<_>>>()?
            };

            tx.execute(
                "DELETE FROM pending_reminders WHERE trigger_at <= ?1",
                [&cutoff],
            )?;
            tx.commit()?;

            Ok(due)
        })
    }
}

#[async_trait]
impl NotificationSink for Outbox {
    async fn cancel_all(&self) -> Result<()> {
        let removed = self
            .db
            .with_conn(|conn| Ok(conn.execute("DELETE FROM pending_reminders", [])?))?;
        if removed > 0 {
            tracing::debug!(removed, "Cancelled pending reminders");
        }
        Ok(())
    }

    /// Replace whatever is pending with `reminder`
    ///
    /// The delete and insert share one write transaction, so concurrent
    /// passes from other processes on the same file leave a single row.
    async fn schedule(&self, reminder: &ScheduledReminder) -> Result<ReminderHandle> {
        self.db.with_conn_mut(|conn| {
            let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
            let replaced = tx.execute("DELETE FROM pending_reminders", [])?;
            if replaced > 0 {
                tracing::debug!(replaced, "Replaced pending reminder");
            }
            tx.execute(
                "INSERT INTO pending_reminders (trigger_at, title, body, created_at) \
                 VALUES (?1, ?2, ?3, ?4)",
                params![
                    to_sql_timestamp(reminder.trigger_at),
                    reminder.title,
                    reminder.body,
                    Utc::now().to_rfc3339(),
                ],
            )?;
            let handle = tx.last_insert_rowid();
            tx.commit()?;
            Ok(handle)
        })
    }
}

/// Fixed-width UTC form so stored timestamps compare correctly as text
fn to_sql_timestamp(instant: DateTime<Utc>) -> String {
    instant.to_rfc3339_opts(SecondsFormat::Secs, true)
}

fn row_to_reminder(row: &Row) -> rusqlite::Result<ScheduledReminder> {
    let trigger_at_str: String = row.get("trigger_at")?;
    let trigger_at = DateTime::parse_from_rfc3339(&trigger_at_str)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(0, rusqlite::types::Type::Text, Box::new(e))
        })?;

    Ok(ScheduledReminder {
        trigger_at,
        title: row.get("title")?,
        body: row.get("body")?,
    })
}
