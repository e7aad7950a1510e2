use chrono::{DateTime, Datelike, Utc};
use rusqlite::{Connection, OptionalExtension};

use super::history::{insert_history_entry, load_history};
use crate::db::{invalid_column, parse_datetime, Database, DbError};
use crate::db::models::{
    CreateTicket, HistoryAction, NpdiTracking, PartNumber, Priority, Quality, SkuVariant,
    StatusHistoryEntry, Ticket,
};
use crate::lifecycle::{Actor, TicketStatus};

const TICKET_COLUMNS: &str = r#"id, ticket_number, product_name, status, priority, base_number,
       npdi_tracking_json, sku_variants_json, pricing_data_json, chemical_properties_json,
       quality_json, composition_json, corpbase_json, hazard_json,
       created_by, created_at, updated_at, version"#;

impl Database {
    /// Creates a DRAFT ticket with a fresh `TKT-{year}-{seq}` number.
    pub fn create_ticket(&self, ticket: &CreateTicket, actor: &Actor) -> Result<Ticket, DbError> {
        if ticket.product_name.trim().is_empty() {
            return Err(DbError::Validation("Product name cannot be empty".to_string()));
        }

        self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;
            let now = Utc::now();
            let ticket_id = uuid::Uuid::new_v4().to_string();
            let ticket_number = next_ticket_number(&tx, now)?;

            tx.execute(
                r#"INSERT INTO tickets
                   (id, ticket_number, product_name, status, priority, sku_variants_json,
                    pricing_data_json, chemical_properties_json, quality_json, composition_json,
                    corpbase_json, hazard_json, created_by, created_at, updated_at, version)
                   VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, 1)"#,
                rusqlite::params![
                    ticket_id,
                    ticket_number,
                    ticket.product_name.trim(),
                    TicketStatus::Draft.as_str(),
                    ticket.priority.as_str(),
                    serde_json::to_string(&ticket.sku_variants)?,
                    serde_json::to_string(&ticket.pricing_data)?,
                    serde_json::to_string(&ticket.chemical_properties)?,
                    serde_json::to_string(&ticket.quality)?,
                    serde_json::to_string(&ticket.composition)?,
                    serde_json::to_string(&ticket.corpbase_data)?,
                    serde_json::to_string(&ticket.hazard_classification)?,
                    actor.email,
                    now.to_rfc3339(),
                    now.to_rfc3339(),
                ],
            )?;

            let created = StatusHistoryEntry {
                id: uuid::Uuid::new_v4().to_string(),
                action: HistoryAction::Created,
                status: TicketStatus::Draft,
                changed_at: now,
                changed_by: actor.email.clone(),
                changed_by_role: actor.role,
                reason: None,
                details: None,
            };
            insert_history_entry(&tx, &ticket_id, 0, &created)?;

            let saved = select_ticket(&tx, "id", &ticket_id)?;
            tx.commit()?;

            tracing::info!("Created ticket {} ({}) for {}", saved.ticket_number, saved.id, actor.email);
            Ok(saved)
        })
    }

    pub fn get_ticket(&self, ticket_id: &str) -> Result<Ticket, DbError> {
        self.with_conn(|conn| select_ticket(conn, "id", ticket_id))
    }

    /// Lookup by the user-facing number. Numbers change on NPDI initiation,
    /// so callers holding one should re-fetch by id after any update.
    pub fn get_ticket_by_number(&self, ticket_number: &str) -> Result<Ticket, DbError> {
        self.with_conn(|conn| select_ticket(conn, "ticket_number", ticket_number))
    }

    pub fn count_tickets(&self) -> Result<i64, DbError> {
        self.with_conn(|conn| {
            Ok(conn.query_row("SELECT COUNT(*) FROM tickets", [], |row| row.get(0))?)
        })
    }

    pub fn list_tickets(&self, status: Option<TicketStatus>) -> Result<Vec<Ticket>, DbError> {
        self.with_conn(|conn| {
            let rows = match status {
                Some(status) => {
                    let mut stmt = conn.prepare(&format!(
                        "SELECT {} FROM tickets WHERE status = ? ORDER BY created_at",
                        TICKET_COLUMNS
                    ))?;
                    let rows = stmt.query_map([status.as_str()], map_ticket_row)?;
                    rows.collect::<Result<Vec<_>, _>>()?
                }
                None => {
                    let mut stmt = conn.prepare(&format!(
                        "SELECT {} FROM tickets ORDER BY created_at",
                        TICKET_COLUMNS
                    ))?;
                    let rows = stmt.query_map([], map_ticket_row)?;
                    rows.collect::<Result<Vec<_>, _>>()?
                }
            };

            let mut tickets = rows
                .into_iter()
                .map(TicketRow::into_ticket)
                .collect::<Result<Vec<_>, _>>()?;
            for ticket in &mut tickets {
                ticket.status_history = load_history(conn, &ticket.id)?;
            }
            Ok(tickets)
        })
    }

    /// Persists a ticket computed by the lifecycle engine as one write.
    ///
    /// Fails with `Conflict` when the stored version no longer matches
    /// `expected_version` or the new ticket number is already taken. History
    /// entries already stored are left untouched.
    pub fn commit_ticket(&self, ticket: &Ticket, expected_version: i64) -> Result<Ticket, DbError> {
        self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;

            let affected = tx
                .execute(
                    r#"UPDATE tickets
                       SET ticket_number = ?, product_name = ?, status = ?, priority = ?,
                           base_number = ?, npdi_tracking_json = ?, sku_variants_json = ?,
                           pricing_data_json = ?, chemical_properties_json = ?, quality_json = ?,
                           composition_json = ?, corpbase_json = ?, hazard_json = ?,
                           updated_at = ?, version = version + 1
                       WHERE id = ? AND version = ?"#,
                    rusqlite::params![
                        ticket.ticket_number,
                        ticket.product_name,
                        ticket.status.as_str(),
                        ticket.priority.as_str(),
                        ticket.base_number(),
                        ticket
                            .npdi_tracking
                            .as_ref()
                            .map(serde_json::to_string)
                            .transpose()?,
                        serde_json::to_string(&ticket.sku_variants)?,
                        serde_json::to_string(&ticket.pricing_data)?,
                        serde_json::to_string(&ticket.chemical_properties)?,
                        serde_json::to_string(&ticket.quality)?,
                        serde_json::to_string(&ticket.composition)?,
                        serde_json::to_string(&ticket.corpbase_data)?,
                        serde_json::to_string(&ticket.hazard_classification)?,
                        ticket.updated_at.to_rfc3339(),
                        ticket.id,
                        expected_version,
                    ],
                )
                .map_err(|e| unique_violation(e, &ticket.ticket_number))?;

            if affected == 0 {
                let exists = tx
                    .query_row("SELECT 1 FROM tickets WHERE id = ?", [&ticket.id], |_| Ok(()))
                    .optional()?
                    .is_some();
                return Err(if exists {
                    DbError::Conflict(format!(
                        "Ticket {} was modified by someone else; reload and retry",
                        ticket.id
                    ))
                } else {
                    DbError::NotFound(format!("Ticket {}", ticket.id))
                });
            }

            for (seq, entry) in ticket.status_history.iter().enumerate() {
                insert_history_entry(&tx, &ticket.id, seq as i64, entry)?;
            }

            let saved = select_ticket(&tx, "id", &ticket.id)?;
            tx.commit()?;

            tracing::debug!("Committed ticket {} at version {}", saved.ticket_number, saved.version);
            Ok(saved)
        })
    }
}

fn next_ticket_number(conn: &Connection, now: DateTime<Utc>) -> Result<String, DbError> {
    let year = now.year();
    conn.execute(
        r#"INSERT INTO ticket_sequences (year, last_value) VALUES (?1, 1)
           ON CONFLICT(year) DO UPDATE SET last_value = last_value + 1"#,
        [year],
    )?;
    let value: i64 = conn.query_row(
        "SELECT last_value FROM ticket_sequences WHERE year = ?",
        [year],
        |row| row.get(0),
    )?;
    Ok(format!("TKT-{}-{:04}", year, value))
}

fn unique_violation(err: rusqlite::Error, ticket_number: &str) -> DbError {
    match err {
        rusqlite::Error::SqliteFailure(ref failure, _)
            if failure.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE =>
        {
            DbError::Conflict(format!("Ticket number {} is already in use", ticket_number))
        }
        other => DbError::Sqlite(other),
    }
}

fn select_ticket(conn: &Connection, column: &str, value: &str) -> Result<Ticket, DbError> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {} FROM tickets WHERE {} = ?",
        TICKET_COLUMNS, column
    ))?;

    let mut ticket = stmt
        .query_row([value], map_ticket_row)
        .map_err(|e| match e {
            rusqlite::Error::QueryReturnedNoRows => DbError::NotFound(format!("Ticket {}", value)),
            other => DbError::Sqlite(other),
        })?
        .into_ticket()?;

    ticket.status_history = load_history(conn, &ticket.id)?;
    Ok(ticket)
}

/// A ticket row with its JSON columns still unparsed, so that decoding
/// failures surface as `DbError::Serialization` instead of empty values.
struct TicketRow {
    ticket: Ticket,
    npdi_tracking_json: Option<String>,
    sku_variants_json: String,
    quality_json: String,
    document_json: [String; 5],
}

impl TicketRow {
    fn into_ticket(self) -> Result<Ticket, DbError> {
        let [pricing, chemical, composition, corpbase, hazard] = self.document_json;
        let mut ticket = self.ticket;

        ticket.npdi_tracking = self
            .npdi_tracking_json
            .as_deref()
            .map(serde_json::from_str::<NpdiTracking>)
            .transpose()?;
        ticket.sku_variants = serde_json::from_str::<Vec<SkuVariant>>(&self.sku_variants_json)?;
        ticket.quality = serde_json::from_str::<Quality>(&self.quality_json)?;
        ticket.pricing_data = serde_json::from_str(&pricing)?;
        ticket.chemical_properties = serde_json::from_str(&chemical)?;
        ticket.composition = serde_json::from_str(&composition)?;
        ticket.corpbase_data = serde_json::from_str(&corpbase)?;
        ticket.hazard_classification = serde_json::from_str(&hazard)?;
        Ok(ticket)
    }
}

fn map_ticket_row(row: &rusqlite::Row) -> rusqlite::Result<TicketRow> {
    let status_str: String = row.get(3)?;
    let status = TicketStatus::parse(&status_str).ok_or_else(|| invalid_column(3, "status"))?;

    let priority_str: String = row.get(4)?;
    let priority = Priority::parse(&priority_str).ok_or_else(|| invalid_column(4, "priority"))?;

    let base_number: Option<String> = row.get(5)?;

    Ok(TicketRow {
        ticket: Ticket {
            id: row.get(0)?,
            ticket_number: row.get(1)?,
            product_name: row.get(2)?,
            status,
            priority,
            part_number: base_number.map(|b| PartNumber { base_number: Some(b) }),
            npdi_tracking: None,
            status_history: Vec::new(),
            sku_variants: Vec::new(),
            pricing_data: serde_json::Value::Null,
            chemical_properties: serde_json::Value::Null,
            quality: Quality::default(),
            composition: serde_json::Value::Null,
            corpbase_data: serde_json::Value::Null,
            hazard_classification: serde_json::Value::Null,
            created_by: row.get(14)?,
            created_at: parse_datetime(row.get(15)?),
            updated_at: parse_datetime(row.get(16)?),
            version: row.get(17)?,
        },
        npdi_tracking_json: row.get(6)?,
        sku_variants_json: row.get(7)?,
        quality_json: row.get(10)?,
        document_json: [row.get(8)?, row.get(9)?, row.get(11)?, row.get(12)?, row.get(13)?],
    })
}
