//! Wire types of the out-of-band signing handshake between this client
//! and an external wallet app.
//!
//! The client opens a deep link to the wallet that describes the
//! transactions to sign and a callback URL. Once the user approves or
//! declines, the wallet opens the callback URL carrying the outcome.
//! Both directions are correlated by a [`RequestId`].

use {
  crate::{Address, FeeCurrency},
  serde::{Deserialize, Serialize},
  std::{
    collections::HashMap,
    fmt::{Debug, Display},
    str::FromStr,
  },
  thiserror::Error,
  url::Url,
};

const SIGN_TX: &str = "sign_tx";
const SIGN_TX_RESULT: &str = "sign_tx_result";

#[derive(Debug, Error)]
pub enum Error {
  #[error("Missing query parameter '{0}'")]
  MissingParam(&'static str),

  #[error("Unexpected message type '{0}'")]
  UnexpectedType(String),

  #[error("Unexpected response status '{0}'")]
  UnexpectedStatus(String),

  #[error("Invalid request id: {0}")]
  InvalidRequestId(String),

  #[error("Invalid base58 payload: {0}")]
  Base58(#[from] bs58::decode::Error),

  #[error("Invalid url: {0}")]
  Url(#[from] url::ParseError),

  #[error("Payload encoding failed: {0}")]
  Encode(#[from] rmp_serde::encode::Error),

  #[error("Payload decoding failed: {0}")]
  Decode(#[from] rmp_serde::decode::Error),
}

/// Opaque correlation token of one signing attempt.
///
/// Every submission attempt generates a fresh random id, so a response
/// to an earlier abandoned attempt can never match a newer one.
#[derive(Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RequestId(u128);

impl RequestId {
  pub fn random() -> Self {
    Self(rand::random())
  }
}

impl Display for RequestId {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    write!(f, "{}", bs58::encode(self.0.to_be_bytes()).into_string())
  }
}

impl Debug for RequestId {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    write!(f, "request({self})")
  }
}

impl FromStr for RequestId {
  type Err = Error;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    let bytes = bs58::decode(s).into_vec()?;
    let bytes: [u8; 16] = bytes
      .try_into()
      .map_err(|_| Error::InvalidRequestId(s.to_owned()))?;
    Ok(Self(u128::from_be_bytes(bytes)))
  }
}

/// One transaction the wallet is asked to sign.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TxRequest {
  /// The account that must sign, the currently logged in user.
  pub from: Address,

  /// The contract the transaction is sent to.
  pub to: Address,

  /// Unsigned transaction bytes.
  pub tx: Vec<u8>,

  pub fee_currency: FeeCurrency,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SigningRequest {
  pub request_id: RequestId,
  pub dapp_name: String,
  pub callback: Url,
  pub transactions: Vec<TxRequest>,
}

impl SigningRequest {
  /// Encodes this request as a deep link rooted at the wallet's base URL.
  pub fn to_deep_link(&self, wallet: &Url) -> Result<Url, Error> {
    let txs = bs58::encode(rmp_serde::to_vec(&self.transactions)?);
    let mut url = wallet.clone();
    url
      .query_pairs_mut()
      .append_pair("type", SIGN_TX)
      .append_pair("requestId", &self.request_id.to_string())
      .append_pair("dappName", &self.dapp_name)
      .append_pair("callback", self.callback.as_str())
      .append_pair("txs", &txs.into_string());
    Ok(url)
  }

  pub fn from_deep_link(url: &Url) -> Result<Self, Error> {
    let params: HashMap<_, _> = url.query_pairs().into_owned().collect();
    expect_type(&params, SIGN_TX)?;

    let txs = bs58::decode(param(&params, "txs")?).into_vec()?;
    Ok(Self {
      request_id: param(&params, "requestId")?.parse()?,
      dapp_name: param(&params, "dappName")?.to_owned(),
      callback: param(&params, "callback")?.parse()?,
      transactions: rmp_serde::from_slice(&txs)?,
    })
  }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SigningOutcome {
  /// Raw signed transactions, in the same order as requested.
  Signed(Vec<Vec<u8>>),

  /// The user rejected the request or the wallet failed to sign.
  Declined(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SigningResponse {
  pub request_id: RequestId,
  pub outcome: SigningOutcome,
}

impl SigningResponse {
  /// Encodes this response as the callback URL the wallet opens.
  pub fn to_callback_url(&self, callback: &Url) -> Url {
    let mut url = callback.clone();
    {
      let mut query = url.query_pairs_mut();
      query
        .append_pair("type", SIGN_TX_RESULT)
        .append_pair("requestId", &self.request_id.to_string());
      match &self.outcome {
        SigningOutcome::Signed(raw) => {
          let raw: Vec<_> = raw
            .iter()
            .map(|tx| bs58::encode(tx).into_string())
            .collect();
          query
            .append_pair("status", "success")
            .append_pair("rawTxs", &raw.join(","));
        }
        SigningOutcome::Declined(reason) => {
          query
            .append_pair("status", "declined")
            .append_pair("reason", reason);
        }
      }
    }
    url
  }

  pub fn from_callback_url(url: &Url) -> Result<Self, Error> {
    let params: HashMap<_, _> = url.query_pairs().into_owned().collect();
    expect_type(&params, SIGN_TX_RESULT)?;

    let request_id = param(&params, "requestId")?.parse()?;
    let outcome = match param(&params, "status")? {
      "success" => SigningOutcome::Signed(
        param(&params, "rawTxs")?
          .split(',')
          .filter(|s| !s.is_empty())
          .map(|tx| bs58::decode(tx).into_vec())
          .collect::<Result<_, _>>()?,
      ),
      "declined" => SigningOutcome::Declined(
        params.get("reason").cloned().unwrap_or_default(),
      ),
      other => return Err(Error::UnexpectedStatus(other.to_owned())),
    };

    Ok(Self {
      request_id,
      outcome,
    })
  }
}

fn param<'a>(
  params: &'a HashMap<String, String>,
  name: &'static str,
) -> Result<&'a str, Error> {
  params
    .get(name)
    .map(String::as_str)
    .ok_or(Error::MissingParam(name))
}

fn expect_type(
  params: &HashMap<String, String>,
  expected: &str,
) -> Result<(), Error> {
  match param(params, "type")? {
    t if t == expected => Ok(()),
    other => Err(Error::UnexpectedType(other.to_owned())),
  }
}

#[cfg(test)]
mod tests {
  use {
    super::{
      Error,
      RequestId,
      SigningOutcome,
      SigningRequest,
      SigningResponse,
      TxRequest,
    },
    crate::{Address, FeeCurrency},
    url::Url,
  };

  #[test]
  fn request_deep_link_carries_all_fields() -> anyhow::Result<()> {
    let request = SigningRequest {
      request_id: RequestId::random(),
      dapp_name: "Crowdfund".into(),
      callback: "crowdfund://signing/callback?session=1".parse()?,
      transactions: vec![TxRequest {
        from: Address::from_bytes([1; 32]),
        to: Address::from_bytes([2; 32]),
        tx: vec![0xde, 0xad, 0xbe, 0xef],
        fee_currency: FeeCurrency::StableUsd,
      }],
    };

    let wallet: Url = "wallet://dappkit".parse()?;
    let link = request.to_deep_link(&wallet)?;
    assert_eq!(link.scheme(), "wallet");
    assert_eq!(SigningRequest::from_deep_link(&link)?, request);
    Ok(())
  }

  #[test]
  fn callback_url_decodes_signed_and_declined() -> anyhow::Result<()> {
    let callback: Url = "crowdfund://signing/callback".parse()?;
    let signed = SigningResponse {
      request_id: RequestId::random(),
      outcome: SigningOutcome::Signed(vec![vec![1, 2, 3], vec![4, 5]]),
    };
    let declined = SigningResponse {
      request_id: RequestId::random(),
      outcome: SigningOutcome::Declined("user cancelled".into()),
    };

    for response in [signed, declined] {
      let url = response.to_callback_url(&callback);
      assert_eq!(SigningResponse::from_callback_url(&url)?, response);
    }
    Ok(())
  }

  #[test]
  fn request_link_is_not_a_response() -> anyhow::Result<()> {
    let url: Url =
      "crowdfund://cb?type=sign_tx&requestId=abc&status=success".parse()?;
    assert!(matches!(
      SigningResponse::from_callback_url(&url),
      Err(Error::UnexpectedType(t)) if t == "sign_tx"
    ));
    Ok(())
  }
}
