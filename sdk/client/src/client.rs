use {
  crate::{
    feed::{Feed, FeedStatus},
    format::CampaignCard,
    ledger::Ledger,
    mailbox::SigningMailbox,
    submission::DraftSession,
    upload::ImageStore,
    wallet::Wallet,
    Config,
  },
  crowdfund_primitives::{Address, CampaignRecord},
  parking_lot::RwLock,
  std::sync::Arc,
  tokio::task::JoinHandle,
  tracing::info,
};

/// The currently logged in user.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Session {
  pub account: Address,
}

/// Application state shared by every screen of the client.
///
/// Services (ledger, wallet, image storage, signing mailbox) are fixed at
/// construction. Mutable state has a single writer each: the session is
/// written only by [`Client::log_in`] and [`Client::log_out`], the feed
/// only by [`Client::refresh_feed`].
struct AppState {
  config: Config,
  ledger: Arc<dyn Ledger>,
  wallet: Arc<dyn Wallet>,
  images: Arc<dyn ImageStore>,
  mailbox: Arc<SigningMailbox>,
  session: RwLock<Option<Session>>,
  feed: Feed,
}

/// Entry point to the SDK. Cheap to clone, all clones share state.
#[derive(Clone)]
pub struct Client {
  state: Arc<AppState>,
}

impl Client {
  pub fn new(
    config: Config,
    mailbox: Arc<SigningMailbox>,
    ledger: Arc<dyn Ledger>,
    wallet: Arc<dyn Wallet>,
    images: Arc<dyn ImageStore>,
  ) -> Self {
    Self {
      state: Arc::new(AppState {
        config,
        ledger,
        wallet,
        images,
        mailbox,
        session: RwLock::new(None),
        feed: Feed::default(),
      }),
    }
  }

  pub fn config(&self) -> &Config {
    &self.state.config
  }

  /// Where wallet responses are delivered. The platform layer passes
  /// incoming callback URLs to [`SigningMailbox::deliver_callback`].
  pub fn mailbox(&self) -> &Arc<SigningMailbox> {
    &self.state.mailbox
  }

  pub(crate) fn ledger(&self) -> &dyn Ledger {
    self.state.ledger.as_ref()
  }

  pub(crate) fn wallet(&self) -> &dyn Wallet {
    self.state.wallet.as_ref()
  }

  pub(crate) fn images(&self) -> &dyn ImageStore {
    self.state.images.as_ref()
  }

  /// Starts the background task that expires abandoned signing requests.
  pub fn spawn_sweeper(&self) -> JoinHandle<()> {
    self.state.mailbox.spawn_sweeper(self.state.config.sweep_interval)
  }

  pub fn log_in(&self, account: Address) {
    info!("logged in as {account}");
    *self.state.session.write() = Some(Session { account });
  }

  pub fn log_out(&self) {
    if let Some(session) = self.state.session.write().take() {
      info!("logged out {}", session.account);
    }
  }

  pub fn session(&self) -> Option<Session> {
    *self.state.session.read()
  }

  pub fn account(&self) -> Option<Address> {
    self.session().map(|s| s.account)
  }

  /// Re-fetches all campaigns from the ledger into the feed cache.
  pub async fn refresh_feed(&self) -> FeedStatus {
    self.state.feed.refresh(self.ledger()).await
  }

  /// Cached campaigns, most recent first.
  pub fn feed(&self) -> Vec<CampaignRecord> {
    self.state.feed.snapshot()
  }

  pub fn cards(&self) -> Vec<CampaignCard> {
    self.state.feed.cards()
  }

  /// Opens a new empty campaign draft.
  pub fn new_draft(&self) -> DraftSession {
    DraftSession::new(self.clone())
  }
}
