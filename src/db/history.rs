use rusqlite::Connection;

use crate::db::{invalid_column, parse_datetime, Database, DbError};
use crate::db::models::{HistoryAction, HistoryDetails, StatusHistoryEntry};
use crate::lifecycle::{Role, TicketStatus};

impl Database {
    /// Status history for a ticket, oldest first.
    pub fn get_status_history(&self, ticket_id: &str) -> Result<Vec<StatusHistoryEntry>, DbError> {
        self.with_conn(|conn| {
            let exists: bool = conn.query_row(
                "SELECT EXISTS(SELECT 1 FROM tickets WHERE id = ?)",
                [ticket_id],
                |row| row.get(0),
            )?;
            if !exists {
                return Err(DbError::NotFound(format!("Ticket {}", ticket_id)));
            }
            load_history(conn, ticket_id)
        })
    }
}

/// Entries are keyed by id, so re-committing a ticket whose history already
/// contains this entry is a no-op.
pub(super) fn insert_history_entry(
    conn: &Connection,
    ticket_id: &str,
    seq: i64,
    entry: &StatusHistoryEntry,
) -> Result<(), DbError> {
    let details_json = entry
        .details
        .as_ref()
        .map(serde_json::to_string)
        .transpose()?;

    conn.execute(
        r#"INSERT OR IGNORE INTO status_history
           (id, ticket_id, seq, action, status, changed_at, changed_by, changed_by_role, reason, details_json)
           VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)"#,
        rusqlite::params![
            entry.id,
            ticket_id,
            seq,
            entry.action.as_str(),
            entry.status.as_str(),
            entry.changed_at.to_rfc3339(),
            entry.changed_by,
            entry.changed_by_role.as_str(),
            entry.reason,
            details_json,
        ],
    )?;
    Ok(())
}

pub(super) fn load_history(conn: &Connection, ticket_id: &str) -> Result<Vec<StatusHistoryEntry>, DbError> {
    let mut stmt = conn.prepare(
        r#"SELECT id, action, status, changed_at, changed_by, changed_by_role, reason, details_json
           FROM status_history WHERE ticket_id = ? ORDER BY seq"#,
    )?;

    let entries = stmt
        .query_map([ticket_id], |row| {
            let action_str: String = row.get(1)?;
            let status_str: String = row.get(2)?;
            let role_str: String = row.get(5)?;
            let details_json: Option<String> = row.get(7)?;

            Ok(StatusHistoryEntry {
                id: row.get(0)?,
                action: HistoryAction::parse(&action_str).ok_or_else(|| invalid_column(1, "action"))?,
                status: TicketStatus::parse(&status_str).ok_or_else(|| invalid_column(2, "status"))?,
                changed_at: parse_datetime(row.get(3)?),
                changed_by: row.get(4)?,
                changed_by_role: Role::parse(&role_str)
                    .ok_or_else(|| invalid_column(5, "changed_by_role"))?,
                reason: row.get(6)?,
                details: details_json.and_then(|s| serde_json::from_str::<HistoryDetails>(&s).ok()),
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;

    Ok(entries)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use crate::db::models::{CreateTicket, StatusChangeDetails};
    use crate::lifecycle::{self, Actor};

    fn create_test_db() -> Database {
        Database::open_in_memory().unwrap()
    }

    fn create_ticket(db: &Database) -> crate::db::Ticket {
        let input: CreateTicket = serde_json::from_value(serde_json::json!({
            "productName": "Potassium nitrate"
        }))
        .unwrap();
        db.create_ticket(&input, &Actor::new("pm@example.com", Role::ProductManager))
            .unwrap()
    }

    #[test]
    fn history_for_unknown_ticket_is_not_found() {
        let db = create_test_db();
        assert!(matches!(db.get_status_history("missing"), Err(DbError::NotFound(_))));
    }

    #[test]
    fn status_change_details_survive_storage() {
        let db = create_test_db();
        let ticket = create_ticket(&db);
        let admin = Actor::new("admin@example.com", Role::Admin);

        let moved = lifecycle::override_status(
            &ticket,
            &admin,
            TicketStatus::Canceled,
            Some("Duplicate request".to_string()),
            Utc::now(),
        )
        .unwrap();
        db.commit_ticket(&moved, ticket.version).unwrap();

        let history = db.get_status_history(&ticket.id).unwrap();
        assert_eq!(history.len(), 2);
        assert_eq!(history[0].action, HistoryAction::Created);

        let last = &history[1];
        assert_eq!(last.action, HistoryAction::StatusChanged);
        assert_eq!(last.status, TicketStatus::Canceled);
        assert_eq!(last.changed_by_role, Role::Admin);
        assert_eq!(last.reason.as_deref(), Some("Duplicate request"));
        assert_eq!(
            last.details,
            Some(HistoryDetails::StatusChange(StatusChangeDetails {
                previous_status: TicketStatus::Draft,
            }))
        );
    }

    #[test]
    fn stored_entries_are_never_rewritten() {
        let db = create_test_db();
        let ticket = create_ticket(&db);
        let original = ticket.status_history[0].clone();

        // A snapshot that tampers with an existing entry must not change it
        let mut tampered = lifecycle::submit(&ticket, &Actor::new("pm@example.com", Role::ProductManager), Utc::now())
            .unwrap();
        tampered.status_history[0].changed_by = "someone-else@example.com".to_string();
        db.commit_ticket(&tampered, ticket.version).unwrap();

        let history = db.get_status_history(&ticket.id).unwrap();
        assert_eq!(history.len(), 2);
        assert_eq!(history[0], StatusHistoryEntry {
            changed_at: history[0].changed_at,
            ..original
        });
        assert_eq!(history[0].changed_by, "pm@example.com");
    }
}
