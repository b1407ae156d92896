use {
  crate::{
    client::Client,
    draft::{CampaignDraft, ValidationError},
    mailbox::SigningMailbox,
    upload::{self, ImageReference, ImageSlot, LocalImage, UploadState},
  },
  crowdfund_primitives::{
    Call,
    CampaignId,
    Receipt,
    RequestId,
    SignedTransaction,
    SigningOutcome,
    SigningRequest,
    ToBase58String,
    Transaction,
    TxRequest,
  },
  metrics::increment_counter,
  parking_lot::Mutex,
  std::{
    sync::{
      atomic::{AtomicBool, Ordering},
      Arc,
    },
    time::Duration,
  },
  thiserror::Error,
  tokio::time::timeout,
  tracing::{error, info, warn},
};

#[derive(Debug, Error)]
pub enum SubmissionError {
  #[error("Invalid {field}: {0}", field = .0.field())]
  Validation(#[from] ValidationError),

  #[error("Image upload failed: {0}")]
  Upload(#[from] upload::Error),

  #[error("No user is logged in")]
  NotLoggedIn,

  #[error("A submission of this draft is already in progress")]
  SubmissionInProgress,

  #[error("Signing failed: {0}")]
  SigningFailed(String),

  #[error("Wallet did not respond within {0:?}")]
  TimedOut(Duration),

  #[error("Broadcast failed: {0}")]
  BroadcastFailed(String),
}

impl SubmissionError {
  /// True when the transaction may or may not have reached the ledger,
  /// so resubmitting could create a duplicate campaign.
  pub fn is_ambiguous(&self) -> bool {
    matches!(self, SubmissionError::BroadcastFailed(_))
  }

  /// Text to show to the user.
  pub fn user_message(&self) -> String {
    match self {
      SubmissionError::Validation(e) => match e {
        ValidationError::Image(UploadState::Failed) => {
          "Reupload image!".into()
        }
        ValidationError::Image(_) => "Add an image!".into(),
        ValidationError::EmptyTitle => "Add a title!".into(),
        ValidationError::EmptyDescription => "Add a description!".into(),
        ValidationError::NonPositiveGoal => {
          "Fundraising amount must be greater than 0!".into()
        }
        ValidationError::NonPositiveDeadline => "Add a deadline!".into(),
        other => format!("{other}."),
      },
      SubmissionError::Upload(e) => format!("{e}. Reupload image!"),
      SubmissionError::NotLoggedIn => {
        "Log in to create your fundraiser!".into()
      }
      SubmissionError::SubmissionInProgress => {
        "Your fundraiser is already being submitted.".into()
      }
      SubmissionError::SigningFailed(reason) => format!(
        "The transaction was not signed ({reason}). Nothing was submitted, \
         you can try again."
      ),
      SubmissionError::TimedOut(_) => {
        "The wallet did not respond in time. Nothing was submitted, you can \
         try again."
          .into()
      }
      SubmissionError::BroadcastFailed(reason) => format!(
        "The signed transaction could not be confirmed ({reason}). Your \
         fundraiser may or may not have been created. Check the feed before \
         trying again to avoid creating it twice."
      ),
    }
  }
}

/// A campaign confirmed by the ledger.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Confirmation {
  pub campaign_id: CampaignId,
  pub receipt: Receipt,
}

struct DraftState {
  draft: Mutex<CampaignDraft>,
  image: Mutex<ImageSlot>,
  in_flight: AtomicBool,
  outstanding: Mutex<Option<RequestId>>,
}

/// One campaign draft being edited by the user together with its image
/// upload and submission state.
///
/// Clones refer to the same draft. At most one submission per draft runs
/// at any time, concurrent attempts are rejected.
#[derive(Clone)]
pub struct DraftSession {
  client: Client,
  state: Arc<DraftState>,
}

impl DraftSession {
  pub(crate) fn new(client: Client) -> Self {
    Self {
      client,
      state: Arc::new(DraftState {
        draft: Mutex::new(CampaignDraft::default()),
        image: Mutex::new(ImageSlot::default()),
        in_flight: AtomicBool::new(false),
        outstanding: Mutex::new(None),
      }),
    }
  }

  pub fn draft(&self) -> CampaignDraft {
    self.state.draft.lock().clone()
  }

  pub fn edit(&self, change: impl FnOnce(&mut CampaignDraft)) {
    change(&mut *self.state.draft.lock());
  }

  pub fn upload_state(&self) -> UploadState {
    self.state.image.lock().state()
  }

  pub fn image_reference(&self) -> Option<ImageReference> {
    self.state.image.lock().reference().cloned()
  }

  pub fn is_submitting(&self) -> bool {
    self.state.in_flight.load(Ordering::Acquire)
  }

  /// Uploads the campaign image. Starting a new upload supersedes any
  /// upload of this draft that is still in flight.
  pub async fn upload_image(
    &self,
    image: LocalImage,
  ) -> Result<ImageReference, upload::Error> {
    let generation = self.state.image.lock().begin();
    let config = self.client.config();
    let result = upload::upload(
      self.client.images(),
      &config.image_prefix,
      image,
      config.upload_timeout,
    )
    .await;

    let completed = self.state.image.lock().complete(generation, result);
    if let Err(upload::Error::Superseded) = completed {
      info!("image upload generation {generation} superseded");
    }
    completed
  }

  /// Marks the outstanding signing request of this draft as abandoned,
  /// for example when the user navigates away. The pending submission
  /// fails with [`SubmissionError::SigningFailed`] and a late wallet
  /// response is ignored.
  pub fn abandon(&self) -> bool {
    let outstanding = self.state.outstanding.lock().take();
    match outstanding {
      Some(id) => {
        info!("abandoning signing request {id}");
        self.client.mailbox().abandon(&id)
      }
      None => false,
    }
  }

  /// Validates the draft, has the wallet sign a `startProject` transaction,
  /// broadcasts it and waits for its receipt.
  ///
  /// On success the draft is cleared. On any failure the draft is kept,
  /// so the user can retry without entering everything again.
  pub async fn submit(&self) -> Result<Confirmation, SubmissionError> {
    let Some(_guard) = InFlight::acquire(&self.state.in_flight) else {
      warn!("rejecting reentrant submission");
      return Err(SubmissionError::SubmissionInProgress);
    };

    increment_counter!("crowdfund_submissions");
    let result = self.run().await;
    match &result {
      Ok(confirmation) => {
        increment_counter!("crowdfund_submissions_confirmed");
        info!(
          "campaign {} created in block {}",
          confirmation.campaign_id, confirmation.receipt.block_height
        );
        *self.state.draft.lock() = CampaignDraft::default();
        self.state.image.lock().reset();
      }
      Err(e) if e.is_ambiguous() => {
        increment_counter!("crowdfund_submissions_ambiguous");
        error!("submission outcome unknown: {e}");
      }
      Err(e) => {
        increment_counter!("crowdfund_submissions_failed");
        warn!("submission failed: {e}");
      }
    }
    result
  }

  async fn run(&self) -> Result<Confirmation, SubmissionError> {
    let call = {
      let image = self.state.image.lock();
      self.state.draft.lock().validate(&image)?
    };

    let account = self.client.account().ok_or(SubmissionError::NotLoggedIn)?;
    let config = self.client.config();
    let transaction = Transaction::new(
      account,
      config.contract,
      Call::StartProject(call),
      config.fee_currency,
    );

    let signed = self.collect_signature(&transaction).await?;
    self.broadcast(signed).await
  }

  async fn collect_signature(
    &self,
    transaction: &Transaction,
  ) -> Result<SignedTransaction, SubmissionError> {
    let config = self.client.config();
    let mailbox = self.client.mailbox();
    let request_id = RequestId::random();

    let request = SigningRequest {
      request_id,
      dapp_name: config.dapp_name.clone(),
      callback: config.callback.clone(),
      transactions: vec![TxRequest {
        from: transaction.from,
        to: transaction.to,
        tx: transaction
          .to_bytes()
          .map_err(|e| SubmissionError::SigningFailed(e.to_string()))?,
        fee_currency: transaction.fee_currency,
      }],
    };

    let response = mailbox.register(request_id, config.signing_timeout);
    let _outstanding =
      Outstanding::track(&self.state.outstanding, mailbox, request_id);

    self
      .client
      .wallet()
      .request_signature(request)
      .await
      .map_err(|e| SubmissionError::SigningFailed(e.to_string()))?;

    let response = match timeout(config.signing_timeout, response).await {
      Ok(Ok(response)) => response,
      Ok(Err(_)) => {
        return Err(SubmissionError::SigningFailed(
          "signing request abandoned".into(),
        ))
      }
      Err(_) => return Err(SubmissionError::TimedOut(config.signing_timeout)),
    };

    let raw = match response.outcome {
      SigningOutcome::Signed(raw) => raw,
      SigningOutcome::Declined(reason) => {
        return Err(SubmissionError::SigningFailed(format!(
          "declined by wallet: {reason}"
        )))
      }
    };

    let raw = raw.into_iter().next().ok_or_else(|| {
      SubmissionError::SigningFailed("wallet returned no transactions".into())
    })?;

    let signed = SignedTransaction::from_bytes(&raw).map_err(|e| {
      SubmissionError::SigningFailed(format!("malformed signed tx: {e}"))
    })?;

    if signed.transaction != *transaction {
      return Err(SubmissionError::SigningFailed(
        "wallet signed a different transaction".into(),
      ));
    }

    signed
      .verify()
      .map_err(|e| SubmissionError::SigningFailed(e.to_string()))?;

    Ok(signed)
  }

  async fn broadcast(
    &self,
    signed: SignedTransaction,
  ) -> Result<Confirmation, SubmissionError> {
    let raw = signed
      .to_bytes()
      .map_err(|e| SubmissionError::SigningFailed(e.to_string()))?;

    let ledger = self.client.ledger();
    let hash = ledger
      .broadcast(&raw)
      .await
      .map_err(|e| SubmissionError::BroadcastFailed(e.to_string()))?;
    info!("transaction {} broadcast, awaiting receipt", hash.to_b58());

    let limit = self.client.config().confirmation_timeout;
    let receipt = match timeout(limit, ledger.await_receipt(hash)).await {
      Ok(Ok(receipt)) => receipt,
      Ok(Err(e)) => return Err(SubmissionError::BroadcastFailed(e.to_string())),
      Err(_) => {
        return Err(SubmissionError::BroadcastFailed(format!(
          "no receipt within {limit:?}"
        )))
      }
    };

    Ok(Confirmation {
      campaign_id: receipt.campaign_id,
      receipt,
    })
  }
}

/// Holds the per-draft submission flag for as long as a submission runs,
/// including when the submitting future is dropped halfway.
struct InFlight<'a>(&'a AtomicBool);

impl<'a> InFlight<'a> {
  fn acquire(flag: &'a AtomicBool) -> Option<Self> {
    flag
      .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
      .ok()
      .map(|_| Self(flag))
  }
}

impl Drop for InFlight<'_> {
  fn drop(&mut self) {
    self.0.store(false, Ordering::Release);
  }
}

/// Records the signing request a draft is waiting on. Once the wait ends,
/// the request is removed from the mailbox so late responses are discarded.
struct Outstanding<'a> {
  slot: &'a Mutex<Option<RequestId>>,
  mailbox: &'a SigningMailbox,
  id: RequestId,
}

impl<'a> Outstanding<'a> {
  fn track(
    slot: &'a Mutex<Option<RequestId>>,
    mailbox: &'a SigningMailbox,
    id: RequestId,
  ) -> Self {
    *slot.lock() = Some(id);
    Self { slot, mailbox, id }
  }
}

impl Drop for Outstanding<'_> {
  fn drop(&mut self) {
    self.mailbox.abandon(&self.id);
    let mut slot = self.slot.lock();
    if *slot == Some(self.id) {
      *slot = None;
    }
  }
}
