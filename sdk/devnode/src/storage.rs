use {
  crowdfund_client_sdk::{CampaignStore, StoreError},
  crowdfund_primitives::{CampaignId, CampaignRecord},
  rmp_serde::{from_slice, to_vec},
  std::path::Path,
};

/// Campaign records persisted in a sled tree, keyed by big-endian
/// campaign id so iteration follows creation order.
pub struct OnDiskCampaignStore {
  tree: sled::Tree,
}

impl OnDiskCampaignStore {
  pub fn open(path: &Path) -> Result<Self, sled::Error> {
    Self::new(&sled::open(path)?)
  }

  pub fn new(db: &sled::Db) -> Result<Self, sled::Error> {
    Ok(Self {
      tree: db.open_tree("campaigns")?,
    })
  }
}

fn decode(bytes: &[u8]) -> Result<CampaignRecord, StoreError> {
  from_slice(bytes).map_err(|e| StoreError::Corrupt(e.to_string()))
}

impl CampaignStore for OnDiskCampaignStore {
  fn len(&self) -> Result<u64, StoreError> {
    Ok(self.tree.len() as u64)
  }

  fn get(&self, id: CampaignId) -> Result<Option<CampaignRecord>, StoreError> {
    match self
      .tree
      .get(id.0.to_be_bytes())
      .map_err(StoreError::backend)?
    {
      Some(bytes) => Ok(Some(decode(&bytes)?)),
      None => Ok(None),
    }
  }

  fn append(&mut self, record: CampaignRecord) -> Result<(), StoreError> {
    let expected = self.len()?;
    if record.id.0 != expected {
      return Err(StoreError::Corrupt(format!(
        "expected campaign #{expected}, got {}",
        record.id
      )));
    }

    self
      .tree
      .insert(
        record.id.0.to_be_bytes(),
        to_vec(&record).map_err(StoreError::backend)?,
      )
      .map_err(StoreError::backend)?;
    self.tree.flush().map_err(StoreError::backend)?;
    Ok(())
  }

  fn all(&self) -> Result<Vec<CampaignRecord>, StoreError> {
    self
      .tree
      .iter()
      .values()
      .map(|bytes| decode(&bytes.map_err(StoreError::backend)?))
      .collect()
  }
}
