//! Comment repository for database operations

use anyhow::Result;
use common::models::CommentDto;
use sqlx::{PgPool, Row, postgres::PgRow};
use uuid::Uuid;

fn comment_from_row(row: &PgRow) -> CommentDto {
    CommentDto {
        id: row.get("id"),
        created_at: row.get("created_at"),
        body: row.get("body"),
        username: row.get("username"),
        display_name: row.get("display_name"),
        image: row.get("image"),
    }
}

#[derive(Clone)]
pub struct CommentRepository {
    pool: PgPool,
}

impl CommentRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Comments on an activity, newest first
    pub async fn list_for_activity(&self, activity_id: Uuid) -> Result<Vec<CommentDto>> {
        let rows = sqlx::query(
            r#"
            SELECT c.id, c.created_at, c.body, u.username, u.display_name, u.image
            FROM comments c
            JOIN users u ON u.id = c.author_id
            WHERE c.activity_id = $1
            ORDER BY c.created_at DESC, c.id DESC
            "#,
        )
        .bind(activity_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.iter().map(comment_from_row).collect())
    }

    /// Store a comment; `None` when the activity does not exist
    pub async fn create(&self, activity_id: Uuid, author_id: Uuid, body: &str) -> Result<Option<CommentDto>> {
        let row = sqlx::query(
            r#"
            WITH inserted AS (
                INSERT INTO comments (id, activity_id, author_id, body)
                SELECT $1, $2, $3, $4
                WHERE EXISTS (SELECT 1 FROM activities WHERE id = $2)
                RETURNING id, created_at, body, author_id
            )
            SELECT i.id, i.created_at, i.body, u.username, u.display_name, u.image
            FROM inserted i
            JOIN users u ON u.id = i.author_id
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(activity_id)
        .bind(author_id)
        .bind(body)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.as_ref().map(comment_from_row))
    }
}
