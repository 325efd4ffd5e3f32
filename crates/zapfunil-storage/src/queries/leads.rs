// SPDX-FileCopyrightText: 2026 Zapfunil Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Lead read operations.
//!
//! Mutations live in `zapfunil-pipeline`, which pairs every write with its
//! audit entry inside one transaction. This module is the read side plus
//! the phone-variant search used by the conversation linker.

use rusqlite::params;
use zapfunil_core::{LeadStatus, ZapfunilError};

use crate::database::{map_tr_err, Database};
use crate::models::{lead_from_row, Lead, LEAD_COLUMNS};

/// Get a lead by id.
pub async fn get_lead(db: &Database, id: &str) -> Result<Option<Lead>, ZapfunilError> {
    let id = id.to_string();
    db.connection()
        .call(move |conn| {
            let sql = format!("SELECT {LEAD_COLUMNS} FROM leads WHERE id = ?1");
            let mut stmt = conn.prepare(&sql)?;
            let result = stmt.query_row(params![id], lead_from_row);
            match result {
                Ok(lead) => Ok(Some(lead)),
                Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
                Err(e) => Err(e),
            }
        })
        .await
        .map_err(map_tr_err)
}

/// List leads, optionally filtered by status, newest first.
pub async fn list_leads(
    db: &Database,
    status: Option<LeadStatus>,
) -> Result<Vec<Lead>, ZapfunilError> {
    db.connection()
        .call(move |conn| {
            let mut leads = Vec::new();
            match status {
                Some(status) => {
                    let sql = format!(
                        "SELECT {LEAD_COLUMNS} FROM leads
                         WHERE status = ?1 ORDER BY created_at DESC"
                    );
                    let mut stmt = conn.prepare(&sql)?;
                    let rows = stmt.query_map(params![status.to_string()], lead_from_row)?;
                    for row in rows {
                        leads.push(row?);
                    }
                }
                None => {
                    let sql =
                        format!("SELECT {LEAD_COLUMNS} FROM leads ORDER BY created_at DESC");
                    let mut stmt = conn.prepare(&sql)?;
                    let rows = stmt.query_map([], lead_from_row)?;
                    for row in rows {
                        leads.push(row?);
                    }
                }
            }
            Ok(leads)
        })
        .await
        .map_err(map_tr_err)
}

/// Find leads in one unit matching any of the given phone variants.
///
/// The linker passes the canonical phone plus its country-code variants so
/// formatting differences do not block a match.
pub async fn find_by_phone_variants(
    db: &Database,
    unit: &str,
    variants: &[String],
) -> Result<Vec<Lead>, ZapfunilError> {
    let unit = unit.to_string();
    let variants = variants.to_vec();
    db.connection()
        .call(move |conn| {
            if variants.is_empty() {
                return Ok(Vec::new());
            }
            let placeholders = (0..variants.len())
                .map(|i| format!("?{}", i + 2))
                .collect::<Vec<_>>()
                .join(", ");
            let sql = format!(
                "SELECT {LEAD_COLUMNS} FROM leads
                 WHERE unit = ?1 AND phone IN ({placeholders})
                 ORDER BY created_at ASC"
            );
            let mut stmt = conn.prepare(&sql)?;
            let mut sql_params: Vec<&dyn rusqlite::types::ToSql> = vec![&unit];
            for v in &variants {
                sql_params.push(v);
            }
            let rows = stmt.query_map(sql_params.as_slice(), lead_from_row)?;
            let mut leads = Vec::new();
            for row in rows {
                leads.push(row?);
            }
            Ok(leads)
        })
        .await
        .map_err(map_tr_err)
}
