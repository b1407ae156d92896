use {
  async_trait::async_trait,
  bytes::Bytes,
  crowdfund_client_sdk::{
    CampaignDraft,
    Client,
    Config,
    ImageStore,
    Ledger,
    LedgerError,
    LocalImage,
    MemoryImageStore,
    MemoryLedger,
    SigningMailbox,
    UploadError,
    UploadProgress,
    Wallet,
    WalletError,
  },
  crowdfund_primitives::{
    Address,
    Amount,
    Call,
    CampaignRecord,
    Receipt,
    RequestId,
    SignedTransaction,
    SigningOutcome,
    SigningRequest,
    SigningResponse,
    Transaction,
    TxHash,
  },
  ed25519_dalek::{Keypair, PublicKey, SecretKey},
  parking_lot::Mutex,
  std::{
    sync::{
      atomic::{AtomicBool, AtomicUsize, Ordering},
      Arc,
    },
    time::Duration,
  },
  tokio::sync::mpsc::UnboundedSender,
  url::Url,
};

pub const SIGNING_TIMEOUT: Duration = Duration::from_millis(300);
pub const CONFIRMATION_TIMEOUT: Duration = Duration::from_millis(500);
pub const BLOCK_TIME: Duration = Duration::from_millis(20);

pub fn keypair(seed: u8) -> Keypair {
  let secret = SecretKey::from_bytes(&[seed; 32]).unwrap();
  let public = PublicKey::from(&secret);
  Keypair { secret, public }
}

/// How the scripted wallet reacts to signing requests.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Behavior {
  /// Signs whatever it is asked to sign.
  Sign,

  /// The user declines the request.
  Decline(String),

  /// Never responds, as if the user left the wallet app open.
  Ignore,

  /// Responds with a signed transaction under a different request id.
  WrongRequestId,

  /// Signs a transaction other than the requested one.
  SignOther,

  /// Returns the requested transaction with a signature over
  /// different contents.
  Tamper,
}

/// A wallet that holds a fixed keypair and answers signing requests
/// out of band through the signing mailbox, like a real wallet app
/// opening the callback URL.
pub struct ScriptedWallet {
  keypair: Keypair,
  mailbox: Arc<SigningMailbox>,
  behavior: Mutex<Behavior>,
  requests: AtomicUsize,
  last_request: Mutex<Option<SigningRequest>>,
}

impl ScriptedWallet {
  pub fn new(keypair: Keypair, mailbox: Arc<SigningMailbox>) -> Self {
    Self {
      keypair,
      mailbox,
      behavior: Mutex::new(Behavior::Sign),
      requests: AtomicUsize::new(0),
      last_request: Mutex::new(None),
    }
  }

  pub fn account(&self) -> Address {
    self.keypair.public.into()
  }

  pub fn set_behavior(&self, behavior: Behavior) {
    *self.behavior.lock() = behavior;
  }

  pub fn requests(&self) -> usize {
    self.requests.load(Ordering::SeqCst)
  }

  pub fn last_request(&self) -> Option<SigningRequest> {
    self.last_request.lock().clone()
  }

  /// Delivers a signature for the given request, bypassing the
  /// configured behavior. Used to simulate late responses.
  pub fn sign_response(&self, request: &SigningRequest) -> SigningResponse {
    SigningResponse {
      request_id: request.request_id,
      outcome: SigningOutcome::Signed(
        request
          .transactions
          .iter()
          .map(|tx| self.sign_raw(&tx.tx))
          .collect(),
      ),
    }
  }

  fn sign_raw(&self, raw: &[u8]) -> Vec<u8> {
    Transaction::from_bytes(raw)
      .unwrap()
      .sign(&self.keypair)
      .unwrap()
      .to_bytes()
      .unwrap()
  }

  fn respond(&self, request: &SigningRequest) -> Option<SigningResponse> {
    let behavior = self.behavior.lock().clone();
    let request_id = request.request_id;
    let raw = &request.transactions[0].tx;
    let outcome = match behavior {
      Behavior::Ignore => return None,
      Behavior::Sign => return Some(self.sign_response(request)),
      Behavior::Decline(reason) => SigningOutcome::Declined(reason),
      Behavior::WrongRequestId => {
        return Some(SigningResponse {
          request_id: RequestId::random(),
          outcome: SigningOutcome::Signed(vec![self.sign_raw(raw)]),
        })
      }
      Behavior::SignOther => {
        let other = altered(Transaction::from_bytes(raw).unwrap());
        SigningOutcome::Signed(vec![other
          .sign(&self.keypair)
          .unwrap()
          .to_bytes()
          .unwrap()])
      }
      Behavior::Tamper => {
        let requested = Transaction::from_bytes(raw).unwrap();
        let forged = altered(requested.clone()).sign(&self.keypair).unwrap();
        let tampered = SignedTransaction {
          transaction: requested,
          signature: forged.signature,
        };
        SigningOutcome::Signed(vec![tampered.to_bytes().unwrap()])
      }
    };
    Some(SigningResponse {
      request_id,
      outcome,
    })
  }
}

fn altered(tx: Transaction) -> Transaction {
  let Call::StartProject(mut project) = tx.call;
  project.title.push_str(" (edited)");
  Transaction::new(
    tx.from,
    tx.to,
    Call::StartProject(project),
    tx.fee_currency,
  )
}

#[async_trait]
impl Wallet for ScriptedWallet {
  async fn request_signature(
    &self,
    request: SigningRequest,
  ) -> Result<(), WalletError> {
    self.requests.fetch_add(1, Ordering::SeqCst);
    *self.last_request.lock() = Some(request.clone());

    if let Some(response) = self.respond(&request) {
      let mailbox = Arc::clone(&self.mailbox);
      let callback = response.to_callback_url(&request.callback);
      tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(5)).await;
        let _ = mailbox.deliver_callback(&callback);
      });
    }
    Ok(())
  }
}

/// Ledger wrapper that can be told to fail and counts broadcasts.
pub struct FlakyLedger {
  pub inner: Arc<MemoryLedger>,
  pub fail_broadcast: AtomicBool,
  pub fail_campaigns: AtomicBool,
  broadcasts: AtomicUsize,
}

impl FlakyLedger {
  pub fn broadcasts(&self) -> usize {
    self.broadcasts.load(Ordering::SeqCst)
  }
}

#[async_trait]
impl Ledger for FlakyLedger {
  async fn broadcast(&self, raw: &[u8]) -> Result<TxHash, LedgerError> {
    self.broadcasts.fetch_add(1, Ordering::SeqCst);
    if self.fail_broadcast.load(Ordering::SeqCst) {
      return Err(LedgerError::Disconnected);
    }
    self.inner.broadcast(raw).await
  }

  async fn await_receipt(&self, hash: TxHash) -> Result<Receipt, LedgerError> {
    self.inner.await_receipt(hash).await
  }

  async fn campaigns(&self) -> Result<Vec<CampaignRecord>, LedgerError> {
    if self.fail_campaigns.load(Ordering::SeqCst) {
      return Err(LedgerError::Disconnected);
    }
    self.inner.campaigns().await
  }
}

/// Image store that fails a configurable number of uploads before
/// delegating to an in-memory store, and delays uploads of objects
/// whose name contains "slow".
#[derive(Default)]
pub struct FlakyImageStore {
  pub inner: MemoryImageStore,
  pub failures_left: AtomicUsize,
  pub puts: AtomicUsize,
}

#[async_trait]
impl ImageStore for FlakyImageStore {
  async fn put(
    &self,
    name: &str,
    blob: Bytes,
    progress: &UnboundedSender<UploadProgress>,
  ) -> Result<Url, UploadError> {
    self.puts.fetch_add(1, Ordering::SeqCst);
    if name.contains("slow") {
      tokio::time::sleep(Duration::from_millis(200)).await;
    }
    let failing = self
      .failures_left
      .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
      .is_ok();
    if failing {
      return Err(UploadError::Storage("storage unavailable".into()));
    }
    self.inner.put(name, blob, progress).await
  }
}

pub struct Harness {
  pub client: Client,
  pub contract: Address,
  pub ledger: Arc<FlakyLedger>,
  pub chain: Arc<MemoryLedger>,
  pub wallet: Arc<ScriptedWallet>,
  pub images: Arc<FlakyImageStore>,
}

impl Harness {
  /// A logged in client whose ledger produces blocks every
  /// [`BLOCK_TIME`].
  pub fn new() -> Self {
    let harness = Self::without_blocks();
    harness.chain.spawn(BLOCK_TIME);
    harness
  }

  /// A logged in client whose ledger never produces blocks unless
  /// `chain.produce_block()` is called explicitly.
  pub fn without_blocks() -> Self {
    let creator = keypair(1);
    let contract = Address::from(keypair(0).public).derive(&[b"crowdfund"]);
    let chain = Arc::new(MemoryLedger::new(contract));
    let ledger = Arc::new(FlakyLedger {
      inner: Arc::clone(&chain),
      fail_broadcast: AtomicBool::new(false),
      fail_campaigns: AtomicBool::new(false),
      broadcasts: AtomicUsize::new(0),
    });
    let mailbox = Arc::new(SigningMailbox::default());
    let wallet = Arc::new(ScriptedWallet::new(creator, Arc::clone(&mailbox)));
    let images = Arc::new(FlakyImageStore::default());

    let config = Config {
      contract,
      signing_timeout: SIGNING_TIMEOUT,
      confirmation_timeout: CONFIRMATION_TIMEOUT,
      upload_timeout: Duration::from_secs(5),
      ..Config::default()
    };

    let client = Client::new(
      config,
      mailbox,
      Arc::clone(&ledger) as Arc<dyn Ledger>,
      Arc::clone(&wallet) as Arc<dyn Wallet>,
      Arc::clone(&images) as Arc<dyn ImageStore>,
    );
    client.log_in(wallet.account());

    Self {
      client,
      contract,
      ledger,
      chain,
      wallet,
      images,
    }
  }
}

pub fn image(name: &str) -> LocalImage {
  LocalImage::new(name, vec![7u8; 1024])
}

pub fn filled_draft(title: &str) -> CampaignDraft {
  CampaignDraft {
    title: title.into(),
    description: "Community garden for the neighbourhood".into(),
    goal: Amount::from_units(1000),
    deadline_days: 30,
  }
}
