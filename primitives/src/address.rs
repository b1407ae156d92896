use {
  curve25519_dalek::edwards::CompressedEdwardsY,
  ed25519_dalek::PublicKey,
  multihash::{Hasher, Sha3_256},
  serde::{Deserialize, Serialize},
  std::{
    fmt::{Debug, Display},
    ops::Deref,
    str::FromStr,
  },
  thiserror::Error,
};

#[derive(Debug, Error, PartialEq, Eq)]
pub enum Error {
  #[error("Invalid base58 encoding: {0}")]
  Base58(#[from] bs58::decode::Error),

  #[error("Invalid address length {0}. Expected 32 bytes")]
  InvalidLength(usize),
}

/// Represents an address of an account on the crowdfunding ledger.
///
/// The same address could either represent a user wallet that
/// has a corresponding private key on the ed25519 curve (externally owned)
/// or a contract account that is not on the curve and is writable
/// only by the contract owning it.
///
/// Campaign creators are always externally owned, their address is
/// their ed25519 public key. The crowdfunding contract lives under an
/// address derived from its deployer.
#[derive(
  Copy,
  Clone,
  Default,
  PartialEq,
  Eq,
  Hash,
  PartialOrd,
  Ord,
  Serialize,
  Deserialize,
)]
pub struct Address([u8; 32]);

impl Address {
  pub const fn from_bytes(bytes: [u8; 32]) -> Self {
    Self(bytes)
  }

  /// Given a list of seeds this method will generate a new
  /// derived address that is not on the Ed25519 curve
  /// (no private key exists for the resulting address).
  ///
  /// The same set of seeds will always return the same
  /// derived address.
  pub fn derive(&self, seeds: &[&[u8]]) -> Self {
    let mut bump: u64 = 0;
    loop {
      let mut hasher = Sha3_256::default();
      hasher.update(&self.0);
      for seed in seeds.iter() {
        hasher.update(seed);
      }
      hasher.update(&bump.to_le_bytes());

      let mut bytes = [0u8; 32];
      bytes.copy_from_slice(hasher.finalize());
      let key = Address(bytes);
      if !key.has_private_key() {
        return key;
      } else {
        bump += 1;
      }
    }
  }

  /// Checks if the given address lies on the Ed25519 elliptic curve.
  ///
  /// When true, then it means that there exists a private key that
  /// make up together a valid Ed25519 keypair, so it could be the
  /// signer of a transaction.
  pub fn has_private_key(&self) -> bool {
    CompressedEdwardsY::from_slice(&self.0)
      .decompress()
      .is_some()
  }

  /// Interprets this address as an ed25519 public key.
  ///
  /// Returns None for contract (off-curve) addresses.
  pub fn public_key(&self) -> Option<PublicKey> {
    PublicKey::from_bytes(&self.0).ok()
  }
}

impl AsRef<[u8]> for Address {
  fn as_ref(&self) -> &[u8] {
    &self.0
  }
}

impl Deref for Address {
  type Target = [u8];

  fn deref(&self) -> &Self::Target {
    &self.0
  }
}

impl Display for Address {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    write!(f, "{}", bs58::encode(self.0).into_string())
  }
}

impl Debug for Address {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    write!(f, "address({})", bs58::encode(self.0).into_string())
  }
}

impl From<Address> for String {
  fn from(addr: Address) -> Self {
    bs58::encode(addr.0).into_string()
  }
}

impl FromStr for Address {
  type Err = Error;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    let decoded = bs58::decode(s).into_vec()?;
    let bytes: [u8; 32] = decoded
      .as_slice()
      .try_into()
      .map_err(|_| Error::InvalidLength(decoded.len()))?;
    Ok(Self(bytes))
  }
}

impl TryFrom<&str> for Address {
  type Error = Error;

  fn try_from(value: &str) -> Result<Self, Self::Error> {
    FromStr::from_str(value)
  }
}

impl From<PublicKey> for Address {
  fn from(p: PublicKey) -> Self {
    Self(*p.as_bytes())
  }
}

impl From<&PublicKey> for Address {
  fn from(p: &PublicKey) -> Self {
    Self(*p.as_bytes())
  }
}

#[cfg(test)]
mod tests {
  use {
    super::{Address, Error},
    ed25519_dalek::{PublicKey, SecretKey},
  };

  #[test]
  fn text_form_is_base58() -> anyhow::Result<()> {
    let secret = SecretKey::from_bytes(&[3u8; 32])?;
    let address = Address::from(PublicKey::from(&secret));
    let parsed: Address = address.to_string().parse()?;
    assert_eq!(parsed, address);
    assert!(address.has_private_key());
    assert!(address.public_key().is_some());
    Ok(())
  }

  #[test]
  fn rejects_short_addresses() {
    let short = bs58::encode([1u8; 20]).into_string();
    assert_eq!(short.parse::<Address>(), Err(Error::InvalidLength(20)));
  }

  #[test]
  fn derived_addresses_are_off_curve() -> anyhow::Result<()> {
    let secret = SecretKey::from_bytes(&[9u8; 32])?;
    let deployer = Address::from(PublicKey::from(&secret));
    let contract = deployer.derive(&[b"crowdfund"]);

    assert!(!contract.has_private_key());
    assert_eq!(contract, deployer.derive(&[b"crowdfund"]));
    assert_ne!(contract, deployer.derive(&[b"other"]));
    Ok(())
  }
}
