use crate::db::{invalid_column, parse_datetime, Database, DbError};
use crate::db::models::{Comment, CreateComment};
use crate::lifecycle::Role;

impl Database {
    pub fn add_comment(&self, comment: &CreateComment) -> Result<Comment, DbError> {
        let body = comment.body.trim();
        if body.is_empty() {
            return Err(DbError::Validation("Comment body cannot be empty".to_string()));
        }

        self.with_conn(|conn| {
            let comment_id = uuid::Uuid::new_v4().to_string();
            let now = chrono::Utc::now();

            conn.execute(
                r#"INSERT INTO comments
                   (id, ticket_id, author_email, author_role, body, created_at)
                   VALUES (?, ?, ?, ?, ?, ?)"#,
                rusqlite::params![
                    comment_id,
                    comment.ticket_id,
                    comment.author_email,
                    comment.author_role.as_str(),
                    body,
                    now.to_rfc3339(),
                ],
            )
            .map_err(|e| match e {
                rusqlite::Error::SqliteFailure(ref failure, _)
                    if failure.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_FOREIGNKEY =>
                {
                    DbError::NotFound(format!("Ticket {}", comment.ticket_id))
                }
                other => DbError::Sqlite(other),
            })?;

            Ok(Comment {
                id: comment_id,
                ticket_id: comment.ticket_id.clone(),
                author_email: comment.author_email.clone(),
                author_role: comment.author_role,
                body: body.to_string(),
                created_at: now,
            })
        })
    }

    pub fn get_comments(&self, ticket_id: &str) -> Result<Vec<Comment>, DbError> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                r#"SELECT id, ticket_id, author_email, author_role, body, created_at
                   FROM comments WHERE ticket_id = ? ORDER BY created_at"#
            )?;

            let comments = stmt.query_map([ticket_id], |row| {
                let role_str: String = row.get(3)?;

                Ok(Comment {
                    id: row.get(0)?,
                    ticket_id: row.get(1)?,
                    author_email: row.get(2)?,
                    author_role: Role::parse(&role_str).ok_or_else(|| invalid_column(3, "author_role"))?,
                    body: row.get(4)?,
                    created_at: parse_datetime(row.get(5)?),
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;

            Ok(comments)
        })
    }
}
