//! Activity repository for database operations

use anyhow::Result;
use chrono::{DateTime, Utc};
use common::{
    filter::ActivityFilter,
    models::{ActivityDto, ActivityInput},
    paging::{PagedList, PagingParams},
};
use sqlx::{PgPool, Row};
use tracing::info;
use uuid::Uuid;

use super::profile::{PROFILE_COLUMNS, profile_from_row};
use crate::models::{ActivityRow, AttendanceChange, AttendeeRow, activity::assemble};

const ACTIVITY_COLUMNS: &str =
    "a.id, a.title, a.date, a.description, a.category, a.city, a.venue, a.is_cancelled";

/// Shared WHERE clause of the list and count queries.
///
/// `$1` current user, `$2` start date, `$3` filter key.
const LIST_PREDICATE: &str = r#"
    a.date >= $2
    AND (
        $3 = 'all'
        OR ($3 = 'going' AND EXISTS (
            SELECT 1 FROM activity_attendees aa WHERE aa.activity_id = a.id AND aa.user_id = $1))
        OR ($3 = 'host' AND EXISTS (
            SELECT 1 FROM activity_attendees aa
            WHERE aa.activity_id = a.id AND aa.user_id = $1 AND aa.is_host))
    )
"#;

fn filter_key(filter: ActivityFilter) -> &'static str {
    match filter {
        ActivityFilter::All => "all",
        ActivityFilter::IsGoing => "going",
        ActivityFilter::IsHost => "host",
    }
}

/// Activity repository
#[derive(Clone)]
pub struct ActivityRepository {
    pool: PgPool,
}

impl ActivityRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// One page of activities on or after `start_date`, ordered by date
    pub async fn list(
        &self,
        current_user: Uuid,
        filter: ActivityFilter,
        start_date: DateTime<Utc>,
        paging: PagingParams,
    ) -> Result<PagedList<ActivityDto>> {
        let total: i64 = sqlx::query_scalar(&format!(
            "SELECT COUNT(*) FROM activities a WHERE {LIST_PREDICATE}"
        ))
        .bind(current_user)
        .bind(start_date)
        .bind(filter_key(filter))
        .fetch_one(&self.pool)
        .await?;

        let rows = sqlx::query_as::<_, ActivityRow>(&format!(
            r#"
            SELECT {ACTIVITY_COLUMNS}
            FROM activities a
            WHERE {LIST_PREDICATE}
            ORDER BY a.date ASC, a.id ASC
            LIMIT $4 OFFSET $5
            "#
        ))
        .bind(current_user)
        .bind(start_date)
        .bind(filter_key(filter))
        .bind(paging.limit())
        .bind(paging.offset())
        .fetch_all(&self.pool)
        .await?;

        let ids: Vec<Uuid> = rows.iter().map(|row| row.id).collect();
        let attendees = self.attendees(&ids, current_user).await?;

        Ok(PagedList::new(
            assemble(rows, attendees),
            total.max(0) as u64,
            paging,
        ))
    }

    /// A single activity with its attendees
    pub async fn details(&self, id: Uuid, current_user: Uuid) -> Result<Option<ActivityDto>> {
        let row = sqlx::query_as::<_, ActivityRow>(&format!(
            "SELECT {ACTIVITY_COLUMNS} FROM activities a WHERE a.id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        let Some(row) = row else {
            return Ok(None);
        };

        let attendees = self.attendees(&[id], current_user).await?;
        Ok(assemble(vec![row], attendees).into_iter().next())
    }

    async fn attendees(&self, activity_ids: &[Uuid], current_user: Uuid) -> Result<Vec<AttendeeRow>> {
        if activity_ids.is_empty() {
            return Ok(Vec::new());
        }

        let rows = sqlx::query(&format!(
            r#"
            SELECT aa.activity_id, aa.is_host, {PROFILE_COLUMNS}
            FROM activity_attendees aa
            JOIN users u ON u.id = aa.user_id
            WHERE aa.activity_id = ANY($2)
            ORDER BY aa.is_host DESC, u.username
            "#
        ))
        .bind(current_user)
        .bind(activity_ids)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .iter()
            .map(|row| AttendeeRow {
                activity_id: row.get("activity_id"),
                is_host: row.get("is_host"),
                profile: profile_from_row(row),
            })
            .collect())
    }

    /// Store a new activity hosted by `host`
    pub async fn create(&self, input: &ActivityInput, host: Uuid) -> Result<bool> {
        let id = input.id.unwrap_or_else(Uuid::new_v4);
        let date = input
            .date
            .ok_or_else(|| anyhow::anyhow!("Activity date is required"))?;

        let mut tx = self.pool.begin().await?;

        let inserted = sqlx::query(
            r#"
            INSERT INTO activities (id, title, date, description, category, city, venue)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            ON CONFLICT (id) DO NOTHING
            "#,
        )
        .bind(id)
        .bind(&input.title)
        .bind(date)
        .bind(&input.description)
        .bind(&input.category)
        .bind(&input.city)
        .bind(&input.venue)
        .execute(&mut *tx)
        .await?;

        if inserted.rows_affected() == 0 {
            tx.rollback().await?;
            return Ok(false);
        }

        sqlx::query(
            "INSERT INTO activity_attendees (activity_id, user_id, is_host) VALUES ($1, $2, TRUE)",
        )
        .bind(id)
        .bind(host)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        info!("Created activity {} hosted by {}", id, host);

        Ok(true)
    }

    /// Overwrite the editable fields; `false` when nothing was stored
    pub async fn update(&self, id: Uuid, input: &ActivityInput) -> Result<bool> {
        let date = input
            .date
            .ok_or_else(|| anyhow::anyhow!("Activity date is required"))?;

        let result = sqlx::query(
            r#"
            UPDATE activities
            SET title = $2, date = $3, description = $4, category = $5, city = $6, venue = $7
            WHERE id = $1
            "#,
        )
        .bind(id)
        .bind(&input.title)
        .bind(date)
        .bind(&input.description)
        .bind(&input.category)
        .bind(&input.city)
        .bind(&input.venue)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Remove an activity with its attendance and comments
    pub async fn delete(&self, id: Uuid) -> Result<bool> {
        let result = sqlx::query("DELETE FROM activities WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    pub async fn exists(&self, id: Uuid) -> Result<bool> {
        let exists: bool = sqlx::query_scalar("SELECT EXISTS (SELECT 1 FROM activities WHERE id = $1)")
            .bind(id)
            .fetch_one(&self.pool)
            .await?;

        Ok(exists)
    }

    /// Host of the activity, `None` when the activity does not exist
    pub async fn host_of(&self, id: Uuid) -> Result<Option<Uuid>> {
        let host: Option<Uuid> = sqlx::query_scalar(
            "SELECT user_id FROM activity_attendees WHERE activity_id = $1 AND is_host",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(host)
    }

    /// Join, leave or (for the host) toggle cancellation.
    ///
    /// `None` when the activity does not exist.
    pub async fn update_attendance(&self, id: Uuid, user: Uuid) -> Result<Option<AttendanceChange>> {
        let mut tx = self.pool.begin().await?;

        let found: Option<Uuid> =
            sqlx::query_scalar("SELECT id FROM activities WHERE id = $1 FOR UPDATE")
                .bind(id)
                .fetch_optional(&mut *tx)
                .await?;

        if found.is_none() {
            tx.rollback().await?;
            return Ok(None);
        }

        let membership: Option<bool> = sqlx::query_scalar(
            "SELECT is_host FROM activity_attendees WHERE activity_id = $1 AND user_id = $2",
        )
        .bind(id)
        .bind(user)
        .fetch_optional(&mut *tx)
        .await?;

        let change = AttendanceChange::decide(membership);
        let statement = match change {
            AttendanceChange::ToggleCancelled => {
                sqlx::query("UPDATE activities SET is_cancelled = NOT is_cancelled WHERE id = $1")
                    .bind(id)
            }
            AttendanceChange::Remove => sqlx::query(
                "DELETE FROM activity_attendees WHERE activity_id = $1 AND user_id = $2",
            )
            .bind(id)
            .bind(user),
            AttendanceChange::Add => sqlx::query(
                "INSERT INTO activity_attendees (activity_id, user_id, is_host) VALUES ($1, $2, FALSE)",
            )
            .bind(id)
            .bind(user),
        };
        statement.execute(&mut *tx).await?;

        tx.commit().await?;
        info!("Attendance of {} on {}: {:?}", user, id, change);

        Ok(Some(change))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn filter_keys_match_the_sql_predicate() {
        for filter in [ActivityFilter::All, ActivityFilter::IsGoing, ActivityFilter::IsHost] {
            assert!(LIST_PREDICATE.contains(&format!("'{}'", filter_key(filter))));
        }
    }
}
