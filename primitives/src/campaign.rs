use {
  crate::{Address, Amount, TxHash},
  serde::{Deserialize, Serialize},
  std::fmt::Display,
};

/// Sequential identifier assigned by the crowdfunding contract
/// to every campaign in the order they were started.
#[derive(
  Debug,
  Copy,
  Clone,
  PartialEq,
  Eq,
  Hash,
  PartialOrd,
  Ord,
  Serialize,
  Deserialize,
)]
pub struct CampaignId(pub u64);

impl Display for CampaignId {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    write!(f, "#{}", self.0)
  }
}

/// The `startProject` contract method.
///
/// Starts a new fundraising campaign owned by the transaction signer
/// that stays open for `duration_in_days` from the time the transaction
/// is included in a block.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StartProject {
  pub title: String,
  pub description: String,
  pub image_link: String,
  pub duration_in_days: u32,
  pub amount_to_raise: Amount,
}

/// Read-only snapshot of one campaign as stored on the ledger.
///
/// Clients never mutate records, any change to a campaign happens
/// on-chain and is observed by fetching a fresh snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CampaignRecord {
  pub id: CampaignId,
  pub title: String,
  pub description: String,
  pub image_link: String,
  pub creator: Address,
  pub goal: Amount,
  pub raised: Amount,

  /// Unix timestamp in seconds after which the campaign
  /// no longer accepts contributions.
  pub deadline: i64,
}

/// Ledger-confirmed proof that a transaction was included in a block.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Receipt {
  pub tx_hash: TxHash,
  pub block_height: u64,
  pub campaign_id: CampaignId,
}
