use {
  crate::{b58::ToBase58String, Address, StartProject},
  ed25519_dalek::{Keypair, Signature, Signer, Verifier},
  multihash::{Multihash, MultihashDigest},
  once_cell::sync::OnceCell,
  serde::{Deserialize, Serialize},
  thiserror::Error,
};

pub type TxHash = Multihash;

#[derive(Debug, Error)]
pub enum Error {
  #[error("Transaction encoding failed: {0}")]
  Encode(#[from] rmp_serde::encode::Error),

  #[error("Transaction decoding failed: {0}")]
  Decode(#[from] rmp_serde::decode::Error),

  #[error("Signer {0} does not match transaction sender {1}")]
  SignerMismatch(Address, Address),

  #[error("Signer {0} is not an externally owned account")]
  NotExternallyOwned(Address),

  #[error("Invalid transaction signature")]
  InvalidSignature,
}

/// The currency in which transaction fees are paid.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FeeCurrency {
  /// The ledger's own gas token.
  Native,

  /// The dollar-pegged stable token, so users that hold only
  /// stable tokens can still create campaigns.
  StableUsd,
}

/// Contract methods this client knows how to invoke.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Call {
  StartProject(StartProject),
}

#[derive(Clone, Serialize, Deserialize)]
pub struct Transaction {
  pub from: Address,
  pub to: Address,
  pub call: Call,
  pub fee_currency: FeeCurrency,

  #[serde(skip)]
  hash_cache: OnceCell<TxHash>,
}

impl Transaction {
  pub fn new(
    from: Address,
    to: Address,
    call: Call,
    fee_currency: FeeCurrency,
  ) -> Self {
    Self {
      from,
      to,
      call,
      fee_currency,
      hash_cache: OnceCell::new(),
    }
  }

  /// SHA3-256 over the MessagePack encoding of the transaction.
  pub fn hash(&self) -> &TxHash {
    self.hash_cache.get_or_init(|| {
      multihash::Code::Sha3_256.digest(&self.signing_bytes())
    })
  }

  /// The bytes that wallets sign and that are carried in signing
  /// requests as the unsigned transaction payload.
  pub fn to_bytes(&self) -> Result<Vec<u8>, Error> {
    Ok(rmp_serde::to_vec(self)?)
  }

  pub fn from_bytes(bytes: &[u8]) -> Result<Self, Error> {
    Ok(rmp_serde::from_slice(bytes)?)
  }

  pub fn sign(self, keypair: &Keypair) -> Result<SignedTransaction, Error> {
    let signer = Address::from(keypair.public);
    if signer != self.from {
      return Err(Error::SignerMismatch(signer, self.from));
    }
    let signature = keypair.sign(&self.signing_bytes());
    Ok(SignedTransaction {
      transaction: self,
      signature,
    })
  }

  fn signing_bytes(&self) -> Vec<u8> {
    rmp_serde::to_vec(self).expect("transaction fields are always encodable")
  }
}

impl PartialEq for Transaction {
  fn eq(&self, other: &Self) -> bool {
    self.from == other.from
      && self.to == other.to
      && self.call == other.call
      && self.fee_currency == other.fee_currency
  }
}

impl Eq for Transaction {}

impl core::fmt::Debug for Transaction {
  fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
    f.debug_struct("Transaction")
      .field("from", &self.from)
      .field("to", &self.to)
      .field("call", &self.call)
      .field("fee_currency", &self.fee_currency)
      .field("hash", &self.hash().to_b58())
      .finish()
  }
}

/// A transaction authorized by the private key of its sender.
///
/// This is what wallets hand back after the user approves a signing
/// request, as opaque bytes produced by [`SignedTransaction::to_bytes`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignedTransaction {
  pub transaction: Transaction,
  pub signature: Signature,
}

impl SignedTransaction {
  pub fn hash(&self) -> &TxHash {
    self.transaction.hash()
  }

  /// Verifies that the signature was produced by the private key
  /// of the transaction sender over the exact transaction contents.
  pub fn verify(&self) -> Result<(), Error> {
    let sender = self.transaction.from;
    let pubkey = sender
      .public_key()
      .ok_or(Error::NotExternallyOwned(sender))?;
    pubkey
      .verify(&self.transaction.signing_bytes(), &self.signature)
      .map_err(|_| Error::InvalidSignature)
  }

  pub fn to_bytes(&self) -> Result<Vec<u8>, Error> {
    Ok(rmp_serde::to_vec(self)?)
  }

  pub fn from_bytes(bytes: &[u8]) -> Result<Self, Error> {
    Ok(rmp_serde::from_slice(bytes)?)
  }
}
