//! Label synchronization, matched by name.

use std::collections::HashMap;

use tracing::{debug, info, warn};

use super::SyncContext;
use crate::error::Result;
use crate::pagination::{fetch_all, DESTINATION_PAGE_SIZE, SOURCE_PAGE_SIZE};
use crate::types::{LabelDraft, SourceLabel, SyncCounts};

pub struct LabelSynchronizer<'a> {
    ctx: SyncContext<'a>,
}

/// Destination payload for a source label. Colours gain a leading `#`.
pub fn label_draft(label: &SourceLabel) -> LabelDraft {
    LabelDraft {
        name: label.name.clone(),
        color: format!("#{}", label.color.trim_start_matches('#')),
        description: label.description.clone().unwrap_or_default(),
    }
}

impl<'a> LabelSynchronizer<'a> {
    pub fn new(ctx: SyncContext<'a>) -> Self {
        Self { ctx }
    }

    pub async fn sync(&self) -> Result<SyncCounts> {
        let (source, source_repo) = (self.ctx.source, self.ctx.source_repo);
        let labels = fetch_all(SOURCE_PAGE_SIZE, move |page| {
            source.list_labels(source_repo, page, SOURCE_PAGE_SIZE)
        })
        .await?;

        let (destination, dest_repo) = (self.ctx.destination, self.ctx.dest_repo);
        let mut existing: HashMap<String, u64> = fetch_all(DESTINATION_PAGE_SIZE, move |page| {
            destination.list_labels(dest_repo, page, DESTINATION_PAGE_SIZE)
        })
        .await?
        .into_iter()
        .map(|l| (l.name, l.id))
        .collect();

        let mut counts = SyncCounts::default();
        for label in &labels {
            let draft = label_draft(label);
            match existing.get(&label.name) {
                Some(&id) => match destination.update_label(dest_repo, id, &draft).await {
                    Ok(_) => {
                        debug!(name = %label.name, "Updated label");
                        counts.updated += 1;
                    }
                    Err(e) => {
                        warn!(name = %label.name, error = %e, "Failed to update label");
                        counts.skipped += 1;
                    }
                },
                None => match destination.create_label(dest_repo, &draft).await {
                    Ok(created) => {
                        debug!(name = %label.name, "Created label");
                        existing.insert(created.name, created.id);
                        counts.created += 1;
                    }
                    Err(e) => {
                        warn!(name = %label.name, error = %e, "Failed to create label");
                        counts.skipped += 1;
                    }
                },
            }
        }

        info!(repo = %dest_repo, %counts, "Labels mirrored");
        Ok(counts)
    }
}
