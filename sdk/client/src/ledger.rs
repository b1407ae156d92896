use {
  async_trait::async_trait,
  crowdfund_primitives::{
    CampaignId,
    CampaignRecord,
    Receipt,
    TransactionError,
    TxHash,
  },
  thiserror::Error,
};

#[derive(Debug, Error)]
pub enum Error {
  #[error("Transaction rejected by the ledger: {0}")]
  Rejected(String),

  #[error("Malformed transaction: {0}")]
  Transaction(#[from] TransactionError),

  #[error("Transaction {0} is unknown to the ledger")]
  UnknownTransaction(String),

  #[error("Ledger connection closed")]
  Disconnected,

  #[error("Campaign storage error: {0}")]
  Storage(#[from] StoreError),
}

/// The boundary to the blockchain hosting the crowdfunding contract.
#[async_trait]
pub trait Ledger: Send + Sync {
  /// Submits raw signed transaction bytes to the network and
  /// returns the transaction hash.
  async fn broadcast(&self, raw: &[u8]) -> Result<TxHash, Error>;

  /// Resolves once the transaction is included in a block.
  async fn await_receipt(&self, hash: TxHash) -> Result<Receipt, Error>;

  /// All campaigns known to the contract, in the order they were started.
  async fn campaigns(&self) -> Result<Vec<CampaignRecord>, Error>;
}

#[derive(Debug, Error)]
pub enum StoreError {
  #[error("Storage backend error: {0}")]
  Backend(#[source] Box<dyn std::error::Error + Send + Sync>),

  #[error("Corrupt campaign record: {0}")]
  Corrupt(String),
}

impl StoreError {
  pub fn backend(
    error: impl std::error::Error + Send + Sync + 'static,
  ) -> Self {
    Self::Backend(Box::new(error))
  }
}

/// Append-only storage of campaign records owned by a ledger.
pub trait CampaignStore: Send + Sync {
  fn len(&self) -> Result<u64, StoreError>;
  fn get(&self, id: CampaignId) -> Result<Option<CampaignRecord>, StoreError>;
  fn append(&mut self, record: CampaignRecord) -> Result<(), StoreError>;
  fn all(&self) -> Result<Vec<CampaignRecord>, StoreError>;
}

#[derive(Debug, Default)]
pub struct InMemoryCampaignStore {
  records: Vec<CampaignRecord>,
}

impl CampaignStore for InMemoryCampaignStore {
  fn len(&self) -> Result<u64, StoreError> {
    Ok(self.records.len() as u64)
  }

  fn get(&self, id: CampaignId) -> Result<Option<CampaignRecord>, StoreError> {
    Ok(self.records.get(id.0 as usize).cloned())
  }

  fn append(&mut self, record: CampaignRecord) -> Result<(), StoreError> {
    if record.id.0 != self.records.len() as u64 {
      return Err(StoreError::Corrupt(format!(
        "expected campaign #{}, got {}",
        self.records.len(),
        record.id
      )));
    }
    self.records.push(record);
    Ok(())
  }

  fn all(&self) -> Result<Vec<CampaignRecord>, StoreError> {
    Ok(self.records.clone())
  }
}
