mod client;
mod config;
mod deadline;
mod draft;
mod feed;
mod format;
mod ledger;
mod mailbox;
mod memory;
mod submission;
mod upload;
mod wallet;

pub use {
  client::{Client, Session},
  config::Config,
  deadline::{days_from_now, days_until, deadline_timestamp},
  draft::{
    CampaignDraft,
    DraftField,
    ValidationError,
    MAX_DESCRIPTION_CHARS,
    MAX_TITLE_CHARS,
  },
  feed::{Feed, FeedStatus},
  format::{deadline_date, truncate, CampaignCard, CREATOR_CHARS, SUMMARY_CHARS},
  ledger::{
    CampaignStore,
    Error as LedgerError,
    InMemoryCampaignStore,
    Ledger,
    StoreError,
  },
  mailbox::{Delivery, SigningMailbox},
  memory::{MemoryImageStore, MemoryLedger},
  submission::{Confirmation, DraftSession, SubmissionError},
  upload::{
    Error as UploadError,
    ImageReference,
    ImageStore,
    LocalImage,
    UploadProgress,
    UploadState,
  },
  wallet::{DeepLinkWallet, Error as WalletError, LinkOpener, Wallet},
};
