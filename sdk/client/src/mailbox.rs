use {
  crowdfund_primitives::{RequestId, SigningResponse, WireError},
  dashmap::DashMap,
  metrics::increment_counter,
  std::{
    sync::{Arc, Weak},
    time::Duration,
  },
  tokio::{
    sync::oneshot,
    task::JoinHandle,
    time::{interval, Instant, MissedTickBehavior},
  },
  tracing::{debug, warn},
  url::Url,
};

/// Outcome of handing a wallet response to the mailbox.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivery {
  /// The response reached the submission that issued the request.
  Delivered,

  /// No live submission is waiting for this request id. The response is
  /// either stale (abandoned or expired attempt), a duplicate, or was never
  /// requested by this client.
  Discarded,
}

struct Pending {
  signal: oneshot::Sender<SigningResponse>,
  expires_at: Instant,
}

/// Correlation table between outstanding signing requests and the
/// submissions awaiting their responses.
///
/// Each registered request id is a single-slot mailbox: the first matching
/// response is delivered to the waiting submission and the slot is removed,
/// so later duplicates are discarded. Entries that outlive their ttl are
/// treated as abandoned.
#[derive(Default)]
pub struct SigningMailbox {
  pending: DashMap<RequestId, Pending>,
}

impl SigningMailbox {
  /// Opens a slot for the given request id and returns the receiving end
  /// that resolves once the wallet responds.
  ///
  /// The receiver fails with `RecvError` if the request is abandoned
  /// or swept before a response arrives.
  pub fn register(
    &self,
    id: RequestId,
    ttl: Duration,
  ) -> oneshot::Receiver<SigningResponse> {
    let (signal, rx) = oneshot::channel();
    let expires_at = Instant::now() + ttl;
    if self
      .pending
      .insert(id, Pending { signal, expires_at })
      .is_some()
    {
      warn!("signing request {id} registered twice, previous waiter dropped");
    }
    rx
  }

  /// Routes a wallet response to the submission that issued the
  /// matching request.
  pub fn deliver(&self, response: SigningResponse) -> Delivery {
    let id = response.request_id;
    let Some((_, pending)) = self.pending.remove(&id) else {
      warn!("discarding response to unknown or stale signing request {id}");
      increment_counter!("crowdfund_mailbox_discarded");
      return Delivery::Discarded;
    };

    if pending.expires_at <= Instant::now() {
      warn!("discarding response to expired signing request {id}");
      increment_counter!("crowdfund_mailbox_discarded");
      return Delivery::Discarded;
    }

    if pending.signal.send(response).is_err() {
      warn!("submission awaiting signing request {id} is gone");
      increment_counter!("crowdfund_mailbox_discarded");
      return Delivery::Discarded;
    }

    debug!("signing response {id} delivered");
    increment_counter!("crowdfund_mailbox_delivered");
    Delivery::Delivered
  }

  /// Decodes a wallet callback URL and delivers the response it carries.
  pub fn deliver_callback(&self, url: &Url) -> Result<Delivery, WireError> {
    Ok(self.deliver(SigningResponse::from_callback_url(url)?))
  }

  /// Marks an outstanding request as abandoned. The waiting submission
  /// is woken up with an error and any late response becomes a no-op.
  ///
  /// Returns false if the request was not outstanding.
  pub fn abandon(&self, id: &RequestId) -> bool {
    let removed = self.pending.remove(id).is_some();
    if removed {
      debug!("signing request {id} abandoned");
    }
    removed
  }

  pub fn is_pending(&self, id: &RequestId) -> bool {
    self.pending.contains_key(id)
  }

  pub fn len(&self) -> usize {
    self.pending.len()
  }

  pub fn is_empty(&self) -> bool {
    self.pending.is_empty()
  }

  /// Removes all expired entries and returns how many were removed.
  pub fn sweep(&self) -> usize {
    let now = Instant::now();
    let mut expired = 0;
    self.pending.retain(|id, pending| {
      let alive = pending.expires_at > now;
      if !alive {
        debug!("sweeping expired signing request {id}");
        expired += 1;
      }
      alive
    });
    expired
  }

  /// Runs [`SigningMailbox::sweep`] periodically in the background.
  ///
  /// The task ends on its own once the mailbox is dropped.
  pub fn spawn_sweeper(self: &Arc<Self>, every: Duration) -> JoinHandle<()> {
    let mailbox: Weak<Self> = Arc::downgrade(self);
    tokio::spawn(async move {
      let mut ticker = interval(every);
      ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
      loop {
        ticker.tick().await;
        let Some(mailbox) = mailbox.upgrade() else {
          break;
        };
        let swept = mailbox.sweep();
        if swept != 0 {
          debug!("swept {swept} expired signing requests");
        }
      }
    })
  }
}
