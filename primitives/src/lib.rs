mod address;
mod amount;
mod b58;
mod campaign;
mod transaction;
mod wallet;

pub use {
  address::{Address, Error as AddressError},
  amount::{Amount, Error as AmountError},
  b58::ToBase58String,
  campaign::{CampaignId, CampaignRecord, Receipt, StartProject},
  transaction::{
    Call,
    Error as TransactionError,
    FeeCurrency,
    SignedTransaction,
    Transaction,
    TxHash,
  },
  wallet::{
    Error as WireError,
    RequestId,
    SigningOutcome,
    SigningRequest,
    SigningResponse,
    TxRequest,
  },
};
