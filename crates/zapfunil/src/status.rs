// SPDX-FileCopyrightText: 2026 Zapfunil Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Operational subcommands: pipeline counters and duplicate listing.

use zapfunil_config::ZapfunilConfig;
use zapfunil_core::{LeadStatus, ZapfunilError};
use zapfunil_storage::queries::{conversations, followups, leads};
use zapfunil_storage::Database;

/// Print pipeline counters.
pub async fn run(config: &ZapfunilConfig) -> Result<(), ZapfunilError> {
    let db = Database::open_with_options(&config.storage.database_path, config.storage.wal_mode)
        .await?;

    let conversation_count = conversations::list_conversations(&db).await?.len();
    println!("conversations: {conversation_count}");

    println!("leads:");
    for status in LeadStatus::ALL {
        let count = leads::list_leads(&db, Some(status)).await?.len();
        println!("  {status}: {count}");
    }

    let armed = followups::list_armed(&db).await?.len();
    println!("armed follow-ups: {armed}");

    db.close().await?;
    Ok(())
}

/// Print duplicate conversation groups, one per line.
pub async fn run_detect_duplicates(config: &ZapfunilConfig) -> Result<(), ZapfunilError> {
    let db = Database::open_with_options(&config.storage.database_path, config.storage.wal_mode)
        .await?;

    let groups = zapfunil_linker::detect_duplicates(&db).await?;
    if groups.is_empty() {
        println!("no duplicate conversations");
    }
    for group in groups {
        println!(
            "{} / {}: {}",
            group.instance_id,
            group.phone,
            group.conversation_ids.join(", ")
        );
    }

    db.close().await?;
    Ok(())
}
