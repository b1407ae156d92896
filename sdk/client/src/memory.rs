//! In-process implementations of the ledger and image storage boundaries.
//!
//! They behave like the real services closely enough to drive the whole
//! submission flow in local development and tests, without a chain node
//! or a blob storage account.

use {
  crate::{
    deadline::deadline_timestamp,
    ledger::{
      CampaignStore,
      Error as LedgerError,
      InMemoryCampaignStore,
      Ledger,
    },
    upload::{Error as UploadError, ImageStore, UploadProgress},
  },
  async_trait::async_trait,
  bytes::Bytes,
  crowdfund_primitives::{
    Address,
    Amount,
    Call,
    CampaignId,
    CampaignRecord,
    Receipt,
    SignedTransaction,
    ToBase58String,
    TxHash,
  },
  dashmap::DashMap,
  parking_lot::{Mutex, RwLock},
  std::{
    sync::{
      atomic::{AtomicU64, Ordering},
      Arc,
      Weak,
    },
    time::Duration,
  },
  time::OffsetDateTime,
  tokio::{
    sync::oneshot,
    task::JoinHandle,
    time::{interval, MissedTickBehavior},
  },
  tracing::{debug, error, info, warn},
  url::Url,
};

/// A single-node ledger hosting the crowdfunding contract in memory.
///
/// Broadcast transactions wait in a mempool until the next block is
/// produced, either explicitly through [`MemoryLedger::produce_block`] or
/// periodically by the task started with [`MemoryLedger::spawn`].
pub struct MemoryLedger {
  contract: Address,
  height: AtomicU64,
  store: RwLock<Box<dyn CampaignStore>>,
  mempool: Mutex<Vec<SignedTransaction>>,
  receipts: DashMap<TxHash, Receipt>,
  rejected: DashMap<TxHash, String>,
  watchlist: DashMap<TxHash, Vec<oneshot::Sender<Outcome>>>,
}

/// What a receipt waiter learns once its transaction leaves the mempool.
type Outcome = Result<Receipt, String>;

impl MemoryLedger {
  pub fn new(contract: Address) -> Self {
    Self::with_store(contract, InMemoryCampaignStore::default())
  }

  pub fn with_store(
    contract: Address,
    store: impl CampaignStore + 'static,
  ) -> Self {
    Self {
      contract,
      height: AtomicU64::new(0),
      store: RwLock::new(Box::new(store)),
      mempool: Mutex::new(Vec::new()),
      receipts: DashMap::new(),
      rejected: DashMap::new(),
      watchlist: DashMap::new(),
    }
  }

  pub fn contract(&self) -> Address {
    self.contract
  }

  pub fn height(&self) -> u64 {
    self.height.load(Ordering::Acquire)
  }

  pub fn pending(&self) -> usize {
    self.mempool.lock().len()
  }

  /// Applies all queued transactions in a new block and returns
  /// receipts of the transactions included in it.
  pub fn produce_block(&self) -> Vec<Receipt> {
    let mut mempool = self.mempool.lock();
    let txs = std::mem::take(&mut *mempool);
    let height = self.height.fetch_add(1, Ordering::AcqRel) + 1;
    let now = OffsetDateTime::now_utc();

    let mut receipts = Vec::with_capacity(txs.len());
    for tx in txs {
      let hash = *tx.hash();
      let campaign_id = match self.apply(&tx, now) {
        Ok(id) => id,
        Err(e) => {
          error!("transaction {} dropped from block: {e}", hash.to_b58());
          let reason = e.to_string();
          self.rejected.insert(hash, reason.clone());
          self.settle(hash, Err(reason));
          continue;
        }
      };

      let receipt = Receipt {
        tx_hash: hash,
        block_height: height,
        campaign_id,
      };

      self.receipts.insert(hash, receipt.clone());
      self.settle(hash, Ok(receipt.clone()));
      receipts.push(receipt);
    }

    if receipts.is_empty() {
      debug!("produced empty block {height}");
    } else {
      info!(
        "produced block {height} with {} transactions",
        receipts.len()
      );
    }
    receipts
  }

  /// Produces a block every `block_time` in the background. The task
  /// stops once the ledger is dropped.
  pub fn spawn(self: &Arc<Self>, block_time: Duration) -> JoinHandle<()> {
    let ledger: Weak<Self> = Arc::downgrade(self);
    tokio::spawn(async move {
      let mut ticker = interval(block_time);
      ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
      loop {
        ticker.tick().await;
        match ledger.upgrade() {
          Some(ledger) => {
            ledger.produce_block();
          }
          None => break,
        }
      }
    })
  }

  /// Wakes up everyone awaiting the receipt of `hash`.
  fn settle(&self, hash: TxHash, outcome: Outcome) {
    if let Some((_, waiters)) = self.watchlist.remove(&hash) {
      for waiter in waiters {
        if waiter.send(outcome.clone()).is_err() {
          warn!("receipt waiter for {} is gone", hash.to_b58());
        }
      }
    }
  }

  fn apply(
    &self,
    tx: &SignedTransaction,
    now: OffsetDateTime,
  ) -> Result<CampaignId, LedgerError> {
    let Call::StartProject(project) = &tx.transaction.call;
    let deadline = deadline_timestamp(now, project.duration_in_days)
      .ok_or_else(|| out_of_range(project.duration_in_days))?;

    let mut store = self.store.write();
    let id = CampaignId(store.len()?);
    store.append(CampaignRecord {
      id,
      title: project.title.clone(),
      description: project.description.clone(),
      image_link: project.image_link.clone(),
      creator: tx.transaction.from,
      goal: project.amount_to_raise,
      raised: Amount::ZERO,
      deadline,
    })?;
    Ok(id)
  }
}

fn out_of_range(days: u32) -> LedgerError {
  LedgerError::Rejected(format!(
    "campaign duration of {days} days is out of range"
  ))
}

#[async_trait]
impl Ledger for MemoryLedger {
  async fn broadcast(&self, raw: &[u8]) -> Result<TxHash, LedgerError> {
    let signed = SignedTransaction::from_bytes(raw)?;
    signed.verify()?;

    if signed.transaction.to != self.contract {
      return Err(LedgerError::Rejected(format!(
        "no contract at {}",
        signed.transaction.to
      )));
    }

    let Call::StartProject(project) = &signed.transaction.call;
    if project.duration_in_days == 0 || project.amount_to_raise.is_zero() {
      return Err(LedgerError::Rejected(
        "campaign duration and goal must be positive".into(),
      ));
    }

    let now = OffsetDateTime::now_utc();
    if deadline_timestamp(now, project.duration_in_days).is_none() {
      return Err(out_of_range(project.duration_in_days));
    }

    let hash = *signed.hash();
    let mut mempool = self.mempool.lock();
    if self.receipts.contains_key(&hash)
      || mempool.iter().any(|tx| tx.hash() == &hash)
    {
      debug!("transaction {} already known", hash.to_b58());
      return Ok(hash);
    }

    info!("transaction {} accepted into mempool", hash.to_b58());
    self.rejected.remove(&hash);
    mempool.push(signed);
    Ok(hash)
  }

  async fn await_receipt(&self, hash: TxHash) -> Result<Receipt, LedgerError> {
    let pending = {
      // blocks are produced while holding the mempool lock, so a known
      // transaction is always either queued, receipted or rejected here.
      let mempool = self.mempool.lock();
      if let Some(receipt) = self.receipts.get(&hash) {
        return Ok(receipt.clone());
      }

      if !mempool.iter().any(|tx| tx.hash() == &hash) {
        return Err(match self.rejected.get(&hash) {
          Some(reason) => LedgerError::Rejected(reason.clone()),
          None => LedgerError::UnknownTransaction(hash.to_b58()),
        });
      }

      let (signal, pending) = oneshot::channel();
      self.watchlist.entry(hash).or_default().push(signal);
      pending
    };

    match pending.await {
      Ok(Ok(receipt)) => Ok(receipt),
      Ok(Err(reason)) => Err(LedgerError::Rejected(reason)),
      Err(_) => Err(LedgerError::Disconnected),
    }
  }

  async fn campaigns(&self) -> Result<Vec<CampaignRecord>, LedgerError> {
    Ok(self.store.read().all()?)
  }
}

/// Image storage that keeps uploaded blobs in memory and hands out
/// `memory://images/<object>` URLs, with the object name percent-encoded.
pub struct MemoryImageStore {
  blobs: DashMap<String, Bytes>,
  chunk_size: usize,
}

impl Default for MemoryImageStore {
  fn default() -> Self {
    Self {
      blobs: DashMap::new(),
      chunk_size: 16 * 1024,
    }
  }
}

impl MemoryImageStore {
  pub fn get(&self, url: &Url) -> Option<Bytes> {
    self.blobs.get(url.as_str()).map(|b| b.clone())
  }

  pub fn len(&self) -> usize {
    self.blobs.len()
  }

  pub fn is_empty(&self) -> bool {
    self.blobs.is_empty()
  }
}

#[async_trait]
impl ImageStore for MemoryImageStore {
  async fn put(
    &self,
    name: &str,
    blob: Bytes,
    progress: &tokio::sync::mpsc::UnboundedSender<UploadProgress>,
  ) -> Result<Url, UploadError> {
    let mut url = Url::parse("memory://images/")
      .map_err(|e| UploadError::Storage(e.to_string()))?;
    url
      .path_segments_mut()
      .map_err(|()| UploadError::Storage("memory url has no path".into()))?
      .pop_if_empty()
      .extend(name.split('/'));

    let total = blob.len() as u64;
    let mut transferred = 0;
    while transferred < total {
      transferred = (transferred + self.chunk_size as u64).min(total);
      let _ = progress.send(UploadProgress { transferred, total });
      tokio::task::yield_now().await;
    }

    self.blobs.insert(url.to_string(), blob);
    Ok(url)
  }
}

#[cfg(test)]
mod tests {
  use {
    super::{MemoryImageStore, MemoryLedger},
    crate::{
      ledger::{CampaignStore, Error as LedgerError, Ledger, StoreError},
      upload::ImageStore,
    },
    bytes::Bytes,
    crowdfund_primitives::{
      Address,
      Amount,
      Call,
      CampaignId,
      CampaignRecord,
      FeeCurrency,
      StartProject,
      Transaction,
    },
    ed25519_dalek::{Keypair, PublicKey, SecretKey},
    std::sync::Arc,
    tokio::sync::mpsc::unbounded_channel,
  };

  struct ReadOnlyStore;

  impl CampaignStore for ReadOnlyStore {
    fn len(&self) -> Result<u64, StoreError> {
      Ok(0)
    }

    fn get(
      &self,
      _: CampaignId,
    ) -> Result<Option<CampaignRecord>, StoreError> {
      Ok(None)
    }

    fn append(&mut self, _: CampaignRecord) -> Result<(), StoreError> {
      Err(StoreError::Corrupt("store is read-only".into()))
    }

    fn all(&self) -> Result<Vec<CampaignRecord>, StoreError> {
      Ok(vec![])
    }
  }

  fn keypair() -> Keypair {
    let secret = SecretKey::from_bytes(&[5u8; 32]).unwrap();
    let public = PublicKey::from(&secret);
    Keypair { secret, public }
  }

  fn signed_start_project(
    keypair: &Keypair,
    contract: Address,
    title: &str,
  ) -> Vec<u8> {
    signed_with_duration(keypair, contract, title, 7)
  }

  fn signed_with_duration(
    keypair: &Keypair,
    contract: Address,
    title: &str,
    duration_in_days: u32,
  ) -> Vec<u8> {
    Transaction::new(
      keypair.public.into(),
      contract,
      Call::StartProject(StartProject {
        title: title.into(),
        description: "desc".into(),
        image_link: "memory://fundraiserImages/x.png".into(),
        duration_in_days,
        amount_to_raise: Amount::from_units(10),
      }),
      FeeCurrency::StableUsd,
    )
    .sign(keypair)
    .unwrap()
    .to_bytes()
    .unwrap()
  }

  #[tokio::test]
  async fn receipts_follow_block_production() -> anyhow::Result<()> {
    let keypair = keypair();
    let contract = Address::from(keypair.public).derive(&[b"crowdfund"]);
    let ledger = MemoryLedger::new(contract);

    let first = ledger
      .broadcast(&signed_start_project(&keypair, contract, "one"))
      .await?;
    let second = ledger
      .broadcast(&signed_start_project(&keypair, contract, "two"))
      .await?;
    assert_eq!(ledger.pending(), 2);

    let waiter = ledger.await_receipt(first);
    let receipts = ledger.produce_block();
    assert_eq!(receipts.len(), 2);

    let receipt = waiter.await?;
    assert_eq!(receipt.campaign_id, CampaignId(0));
    assert_eq!(receipt.block_height, 1);
    assert_eq!(ledger.await_receipt(second).await?.campaign_id, CampaignId(1));

    let campaigns = ledger.campaigns().await?;
    assert_eq!(campaigns.len(), 2);
    assert_eq!(campaigns[1].title, "two");
    assert_eq!(campaigns[1].creator, Address::from(keypair.public));
    Ok(())
  }

  #[tokio::test]
  async fn rejects_wrong_contract_and_unknown_hashes() -> anyhow::Result<()> {
    let keypair = keypair();
    let contract = Address::from(keypair.public).derive(&[b"crowdfund"]);
    let ledger = MemoryLedger::new(contract);

    let elsewhere = Address::from(keypair.public).derive(&[b"elsewhere"]);
    let raw = signed_start_project(&keypair, elsewhere, "lost");
    assert!(matches!(
      ledger.broadcast(&raw).await,
      Err(LedgerError::Rejected(_))
    ));

    assert!(matches!(
      ledger.broadcast(b"not a transaction").await,
      Err(LedgerError::Transaction(_))
    ));

    let hash = multihash::Multihash::default();
    assert!(matches!(
      ledger.await_receipt(hash).await,
      Err(LedgerError::UnknownTransaction(_))
    ));
    Ok(())
  }

  #[tokio::test]
  async fn duplicate_broadcasts_are_idempotent() -> anyhow::Result<()> {
    let keypair = keypair();
    let contract = Address::from(keypair.public).derive(&[b"crowdfund"]);
    let ledger = MemoryLedger::new(contract);

    let raw = signed_start_project(&keypair, contract, "once");
    let hash = ledger.broadcast(&raw).await?;
    assert_eq!(ledger.broadcast(&raw).await?, hash);
    ledger.produce_block();
    assert_eq!(ledger.broadcast(&raw).await?, hash);
    ledger.produce_block();

    assert_eq!(ledger.campaigns().await?.len(), 1);
    Ok(())
  }

  #[tokio::test]
  async fn image_store_reports_progress() -> anyhow::Result<()> {
    let store = MemoryImageStore::default();
    let (tx, mut rx) = unbounded_channel();
    let blob = Bytes::from(vec![0u8; 40 * 1024]);

    let url = store.put("fundraiserImages/big.png", blob.clone(), &tx).await?;
    drop(tx);

    let mut events = vec![];
    while let Some(event) = rx.recv().await {
      events.push(event);
    }
    assert_eq!(events.len(), 3);
    assert_eq!(events.last().unwrap().transferred, 40 * 1024);
    assert_eq!(store.get(&url), Some(blob));
    Ok(())
  }

  #[tokio::test]
  async fn out_of_range_duration_is_rejected() -> anyhow::Result<()> {
    let keypair = keypair();
    let contract = Address::from(keypair.public).derive(&[b"crowdfund"]);
    let ledger = MemoryLedger::new(contract);

    for days in [3_000_000, u32::MAX] {
      let raw = signed_with_duration(&keypair, contract, "forever", days);
      assert!(matches!(
        ledger.broadcast(&raw).await,
        Err(LedgerError::Rejected(_))
      ));
    }
    assert_eq!(ledger.pending(), 0);

    // block production keeps working for valid transactions
    let hash = ledger
      .broadcast(&signed_start_project(&keypair, contract, "fine"))
      .await?;
    assert_eq!(ledger.produce_block().len(), 1);
    assert_eq!(ledger.await_receipt(hash).await?.campaign_id, CampaignId(0));
    Ok(())
  }

  #[tokio::test]
  async fn failed_apply_wakes_receipt_waiters() -> anyhow::Result<()> {
    let keypair = keypair();
    let contract = Address::from(keypair.public).derive(&[b"crowdfund"]);
    let ledger = Arc::new(MemoryLedger::with_store(contract, ReadOnlyStore));

    let hash = ledger
      .broadcast(&signed_start_project(&keypair, contract, "doomed"))
      .await?;

    let waiter = tokio::spawn({
      let ledger = Arc::clone(&ledger);
      async move { ledger.await_receipt(hash).await }
    });
    while ledger.watchlist.is_empty() {
      tokio::task::yield_now().await;
    }

    assert!(ledger.produce_block().is_empty());
    assert!(matches!(waiter.await?, Err(LedgerError::Rejected(_))));
    assert!(ledger.watchlist.is_empty());

    // later lookups report the rejection instead of waiting
    assert!(matches!(
      ledger.await_receipt(hash).await,
      Err(LedgerError::Rejected(_))
    ));
    Ok(())
  }

  #[tokio::test]
  async fn object_names_are_percent_encoded() -> anyhow::Result<()> {
    let store = MemoryImageStore::default();
    let (tx, _rx) = unbounded_channel();

    let first = store
      .put("fundraiserImages/a#1.png", Bytes::from_static(b"one"), &tx)
      .await?;
    let second = store
      .put("fundraiserImages/a?2.png", Bytes::from_static(b"two"), &tx)
      .await?;

    assert_ne!(first, second);
    assert_eq!(first.fragment(), None);
    assert_eq!(second.query(), None);
    assert_eq!(first.as_str(), "memory://images/fundraiserImages/a%231.png");
    assert_eq!(store.len(), 2);
    assert_eq!(store.get(&first), Some(Bytes::from_static(b"one")));
    assert_eq!(store.get(&second), Some(Bytes::from_static(b"two")));
    Ok(())
  }
}
