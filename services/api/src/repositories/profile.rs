//! Profiles and the follow relation

use anyhow::Result;
use common::{Outcome, models::Profile};
use sqlx::{PgPool, Row, postgres::PgRow};
use tracing::info;
use uuid::Uuid;

use crate::models::FollowPredicate;

/// Public profile columns of `u`; `$1` is the observing user.
pub(crate) const PROFILE_COLUMNS: &str = r#"
    u.username, u.display_name, u.bio, u.image,
    EXISTS (SELECT 1 FROM user_followings f WHERE f.observer_id = $1 AND f.target_id = u.id) AS following,
    (SELECT COUNT(*) FROM user_followings f WHERE f.target_id = u.id) AS followers_count,
    (SELECT COUNT(*) FROM user_followings f WHERE f.observer_id = u.id) AS following_count
"#;

pub(crate) fn profile_from_row(row: &PgRow) -> Profile {
    Profile {
        username: row.get("username"),
        display_name: row.get("display_name"),
        bio: row.get("bio"),
        image: row.get("image"),
        following: row.get("following"),
        followers_count: row.get("followers_count"),
        following_count: row.get("following_count"),
    }
}

#[derive(Clone)]
pub struct ProfileRepository {
    pool: PgPool,
}

impl ProfileRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Profile of `username` as seen by `observer`
    pub async fn find(&self, username: &str, observer: Uuid) -> Result<Option<Profile>> {
        let row = sqlx::query(&format!(
            "SELECT {PROFILE_COLUMNS} FROM users u WHERE u.username = $2"
        ))
        .bind(observer)
        .bind(username)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.as_ref().map(profile_from_row))
    }

    /// Follow `username`, or stop following when already following.
    ///
    /// `None` when there is no such user.
    pub async fn toggle_follow(&self, observer: Uuid, username: &str) -> Result<Option<Outcome<()>>> {
        let target: Option<Uuid> = sqlx::query_scalar("SELECT id FROM users WHERE username = $1")
            .bind(username)
            .fetch_optional(&self.pool)
            .await?;

        let Some(target) = target else {
            return Ok(None);
        };

        if target == observer {
            return Ok(Some(Outcome::failure("You cannot follow yourself")));
        }

        let mut tx = self.pool.begin().await?;

        let removed = sqlx::query(
            "DELETE FROM user_followings WHERE observer_id = $1 AND target_id = $2",
        )
        .bind(observer)
        .bind(target)
        .execute(&mut *tx)
        .await?;

        if removed.rows_affected() == 0 {
            sqlx::query(
                "INSERT INTO user_followings (observer_id, target_id) VALUES ($1, $2) ON CONFLICT DO NOTHING",
            )
            .bind(observer)
            .bind(target)
            .execute(&mut *tx)
            .await?;
            info!("User {} now follows {}", observer, username);
        }

        tx.commit().await?;

        Ok(Some(Outcome::success(())))
    }

    /// Followers of `username`, or the users it follows
    pub async fn follow_list(
        &self,
        username: &str,
        predicate: FollowPredicate,
        observer: Uuid,
    ) -> Result<Vec<Profile>> {
        let (join_on, match_on) = match predicate {
            FollowPredicate::Followers => ("u.id = uf.observer_id", "uf.target_id"),
            FollowPredicate::Following => ("u.id = uf.target_id", "uf.observer_id"),
        };

        let rows = sqlx::query(&format!(
            r#"
            SELECT {PROFILE_COLUMNS}
            FROM user_followings uf
            JOIN users u ON {join_on}
            JOIN users subject ON subject.id = {match_on}
            WHERE subject.username = $2
            ORDER BY u.username
            "#
        ))
        .bind(observer)
        .bind(username)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.iter().map(profile_from_row).collect())
    }
}
