//! Milestone synchronization, matched by title.

use std::collections::HashMap;

use tracing::{debug, info, warn};

use super::SyncContext;
use crate::error::Result;
use crate::pagination::{fetch_all, DESTINATION_PAGE_SIZE, SOURCE_PAGE_SIZE};
use crate::types::{MilestoneDraft, SourceMilestone, SyncCounts};

pub struct MilestoneSynchronizer<'a> {
    ctx: SyncContext<'a>,
}

pub fn milestone_draft(milestone: &SourceMilestone) -> MilestoneDraft {
    MilestoneDraft {
        title: milestone.title.clone(),
        description: milestone.description.clone().unwrap_or_default(),
        state: milestone.state,
        due_on: milestone.due_on,
    }
}

impl<'a> MilestoneSynchronizer<'a> {
    pub fn new(ctx: SyncContext<'a>) -> Self {
        Self { ctx }
    }

    pub async fn sync(&self) -> Result<SyncCounts> {
        let (source, source_repo) = (self.ctx.source, self.ctx.source_repo);
        let milestones = fetch_all(SOURCE_PAGE_SIZE, move |page| {
            source.list_milestones(source_repo, page, SOURCE_PAGE_SIZE)
        })
        .await?;

        let (destination, dest_repo) = (self.ctx.destination, self.ctx.dest_repo);
        let mut existing: HashMap<String, u64> = fetch_all(DESTINATION_PAGE_SIZE, move |page| {
            destination.list_milestones(dest_repo, page, DESTINATION_PAGE_SIZE)
        })
        .await?
        .into_iter()
        .map(|m| (m.title, m.id))
        .collect();

        let mut counts = SyncCounts::default();
        for milestone in &milestones {
            let draft = milestone_draft(milestone);
            let result = match existing.get(&milestone.title) {
                Some(&id) => destination
                    .update_milestone(dest_repo, id, &draft)
                    .await
                    .map(|_| counts.updated += 1),
                None => destination
                    .create_milestone(dest_repo, &draft)
                    .await
                    .map(|created| {
                        existing.insert(created.title, created.id);
                        counts.created += 1;
                    }),
            };

            match result {
                Ok(()) => debug!(title = %milestone.title, "Mirrored milestone"),
                Err(e) => {
                    warn!(title = %milestone.title, error = %e, "Failed to mirror milestone");
                    counts.skipped += 1;
                }
            }
        }

        info!(repo = %dest_repo, %counts, "Milestones mirrored");
        Ok(counts)
    }
}
