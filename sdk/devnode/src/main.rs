use {
  crate::{
    settings::{Command, SystemSettings},
    storage::OnDiskCampaignStore,
    wallet::DevWallet,
  },
  clap::Parser,
  crowdfund_client_sdk::{
    CampaignDraft,
    Client,
    Config,
    DeepLinkWallet,
    FeedStatus,
    LocalImage,
    MemoryImageStore,
    MemoryLedger,
    SigningMailbox,
  },
  crowdfund_primitives::Address,
  std::{path::Path, sync::Arc},
  tokio::sync::mpsc::unbounded_channel,
  tracing::{error, info, subscriber::set_global_default},
  tracing_subscriber::{EnvFilter, FmtSubscriber},
  url::Url,
};

mod settings;
mod storage;
mod wallet;

fn contract_address() -> Address {
  Address::default().derive(&[b"crowdfund", b"v1"])
}

fn start_ledger(settings: &SystemSettings) -> anyhow::Result<Arc<MemoryLedger>> {
  let contract = contract_address();
  Ok(Arc::new(match settings.data_dir() {
    Some(dir) => {
      info!("persisting campaigns in {}", dir.display());
      MemoryLedger::with_store(contract, OnDiskCampaignStore::open(dir)?)
    }
    None => MemoryLedger::new(contract),
  }))
}

fn start_client(
  settings: &SystemSettings,
  ledger: Arc<MemoryLedger>,
) -> anyhow::Result<Client> {
  let mailbox = Arc::new(SigningMailbox::default());
  let (links, requests) = unbounded_channel();
  let wallet = DevWallet::new(
    settings.wallet_keypair()?,
    settings.decline(),
    Arc::clone(&mailbox),
  );
  let account = wallet.account();
  wallet.spawn(requests);

  let client = Client::new(
    Config {
      contract: ledger.contract(),
      signing_timeout: settings.signing_timeout(),
      ..Config::default()
    },
    mailbox,
    ledger,
    Arc::new(DeepLinkWallet::new(
      Url::parse("devwallet://sign")?,
      links,
    )),
    Arc::new(MemoryImageStore::default()),
  );

  client.spawn_sweeper();
  client.log_in(account);
  Ok(client)
}

async fn create(
  client: &Client,
  draft: CampaignDraft,
  image: &Path,
) -> anyhow::Result<()> {
  let session = client.new_draft();
  session.upload_image(LocalImage::open(image).await?).await?;
  session.edit(|d| *d = draft);

  match session.submit().await {
    Ok(confirmation) => {
      println!(
        "Fundraiser {} created in block {}.",
        confirmation.campaign_id, confirmation.receipt.block_height
      );
      Ok(())
    }
    Err(e) => {
      error!("submission failed: {e}");
      anyhow::bail!(e.user_message())
    }
  }
}

async fn print_feed(client: &Client) -> anyhow::Result<()> {
  if client.refresh_feed().await == FeedStatus::Error {
    anyhow::bail!("failed to load fundraisers");
  }

  let cards = client.cards();
  if cards.is_empty() {
    println!("No fundraisers yet.");
  }

  for card in cards {
    println!("{}  by {}", card.title, card.creator);
    println!("  {}", card.summary);
    println!(
      "  {} ({:.0}%), ends {}",
      card.raised_line,
      card.display_progress() * 100.0,
      card.deadline
    );
  }
  Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
  // configure logging
  set_global_default(
    FmtSubscriber::builder()
      .with_env_filter(
        EnvFilter::try_from_default_env()
          .unwrap_or_else(|_| EnvFilter::new("info")),
      )
      .finish(),
  )?;

  // gather CLI parameters
  let settings = SystemSettings::parse();
  info!("startup settings: {settings:#?}");

  let ledger = start_ledger(&settings)?;
  ledger.spawn(settings.block_time());
  let client = start_client(&settings, ledger)?;

  match settings.command() {
    Command::Create {
      title,
      description,
      goal,
      deadline_days,
      image,
    } => {
      let draft = CampaignDraft {
        title: title.clone(),
        description: description.clone(),
        goal: *goal,
        deadline_days: *deadline_days,
      };
      create(&client, draft, image).await
    }
    Command::Feed => print_feed(&client).await,
  }
}
