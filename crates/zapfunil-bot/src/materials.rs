// SPDX-FileCopyrightText: 2026 Zapfunil Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Post-qualification material sequencing.
//!
//! Sends the unit's photos, presentation video, the guest-count-matched
//! promotional PDF, and (while enabled) the seasonal promo video, each
//! category preceded by its configured caption with `{{unidade}}`
//! interpolation. Sends are spaced by a configurable delay so the provider
//! neither rate-limits nor reorders them. A failed item aborts the
//! remainder; the qualification outcome is unaffected.

use std::collections::HashMap;
use std::time::Duration;

use tracing::debug;
use zapfunil_config::UnitMaterials;
use zapfunil_core::{template, MessageGateway, ZapfunilError};

/// Send the material sequence for one unit. Returns how many outbound
/// sends went through.
pub async fn send_materials(
    gateway: &dyn MessageGateway,
    instance_id: &str,
    phone: &str,
    unit: &str,
    materials: &UnitMaterials,
    guest_count: Option<i64>,
    delay: Duration,
) -> Result<usize, ZapfunilError> {
    let vars: HashMap<String, String> =
        HashMap::from([("unidade".to_string(), unit.to_string())]);
    let mut sent = 0usize;

    if !materials.photos.is_empty() {
        if let Some(caption) = &materials.photo_caption {
            pace(delay, sent).await;
            gateway
                .send_text(instance_id, phone, &template::render(caption, &vars))
                .await?;
            sent += 1;
        }
        for photo in &materials.photos {
            pace(delay, sent).await;
            gateway.send_image(instance_id, phone, photo, None).await?;
            sent += 1;
        }
    }

    if let Some(video) = &materials.video {
        if let Some(caption) = &materials.video_caption {
            pace(delay, sent).await;
            gateway
                .send_text(instance_id, phone, &template::render(caption, &vars))
                .await?;
            sent += 1;
        }
        pace(delay, sent).await;
        gateway.send_video(instance_id, phone, video, None).await?;
        sent += 1;
    }

    if let Some(tier) = pick_pdf_tier(materials, guest_count) {
        if let Some(caption) = &materials.pdf_caption {
            pace(delay, sent).await;
            gateway
                .send_text(instance_id, phone, &template::render(caption, &vars))
                .await?;
            sent += 1;
        }
        pace(delay, sent).await;
        let filename = tier
            .url
            .rsplit('/')
            .next()
            .unwrap_or("apresentacao.pdf");
        gateway
            .send_document(instance_id, phone, &tier.url, filename, None)
            .await?;
        sent += 1;
    }

    if materials.seasonal_enabled {
        if let Some(video) = &materials.seasonal_video {
            if let Some(caption) = &materials.seasonal_caption {
                pace(delay, sent).await;
                gateway
                    .send_text(instance_id, phone, &template::render(caption, &vars))
                    .await?;
                sent += 1;
            }
            pace(delay, sent).await;
            gateway.send_video(instance_id, phone, video, None).await?;
            sent += 1;
        }
    }

    debug!(unit, sent, "material sequence finished");
    Ok(sent)
}

/// Space consecutive sends; the first one goes out immediately.
async fn pace(delay: Duration, already_sent: usize) {
    if already_sent > 0 && !delay.is_zero() {
        tokio::time::sleep(delay).await;
    }
}

/// The first tier whose `max_guests` covers the lead; with no guest count
/// or nothing large enough, the biggest tier.
fn pick_pdf_tier(
    materials: &UnitMaterials,
    guest_count: Option<i64>,
) -> Option<&zapfunil_config::PdfTier> {
    if materials.pdf_tiers.is_empty() {
        return None;
    }
    match guest_count {
        Some(count) => materials
            .pdf_tiers
            .iter()
            .find(|t| count <= t.max_guests)
            .or_else(|| materials.pdf_tiers.last()),
        None => materials.pdf_tiers.last(),
    }
}
