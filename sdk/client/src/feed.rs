use {
  crate::{format::CampaignCard, ledger::Ledger},
  crowdfund_primitives::CampaignRecord,
  parking_lot::RwLock,
  tracing::{info, warn},
};

/// Result of refreshing the feed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FeedStatus {
  Success,
  Error,
}

/// Locally cached snapshot of all campaigns, most recent first.
#[derive(Debug, Default)]
pub struct Feed {
  records: RwLock<Vec<CampaignRecord>>,
}

impl Feed {
  /// Replaces the cached snapshot with a fresh one from the ledger.
  /// On failure the previous snapshot is kept.
  pub(crate) async fn refresh(&self, ledger: &dyn Ledger) -> FeedStatus {
    match ledger.campaigns().await {
      Ok(mut records) => {
        records.sort_by(|a, b| b.id.cmp(&a.id));
        info!("feed refreshed with {} campaigns", records.len());
        *self.records.write() = records;
        FeedStatus::Success
      }
      Err(e) => {
        warn!("feed refresh failed: {e}");
        FeedStatus::Error
      }
    }
  }

  pub fn snapshot(&self) -> Vec<CampaignRecord> {
    self.records.read().clone()
  }

  pub fn cards(&self) -> Vec<CampaignCard> {
    self.records.read().iter().map(CampaignCard::from).collect()
  }
}
