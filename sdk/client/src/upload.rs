use {
  async_trait::async_trait,
  bytes::Bytes,
  metrics::increment_counter,
  std::{fmt::Display, path::Path, time::Duration},
  thiserror::Error,
  tokio::sync::mpsc::{unbounded_channel, UnboundedSender},
  tracing::{debug, info, warn},
  url::Url,
};

#[derive(Debug, Error)]
pub enum Error {
  #[error("Failed to read local image: {0}")]
  Io(#[from] std::io::Error),

  #[error("Local image path {0} has no file name")]
  InvalidName(String),

  #[error("Image storage error: {0}")]
  Storage(String),

  #[error("Image upload timed out after {0:?}")]
  TimedOut(Duration),

  #[error("Image upload superseded by a newer upload")]
  Superseded,
}

/// Lifecycle of the image attached to a draft.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum UploadState {
  #[default]
  NotStarted,
  Uploading,
  Uploaded,
  Failed,
}

/// Progress event reported by an image store while uploading.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UploadProgress {
  pub transferred: u64,
  pub total: u64,
}

/// Stable, externally resolvable location of an uploaded image.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ImageReference(Url);

impl ImageReference {
  pub fn as_str(&self) -> &str {
    self.0.as_str()
  }
}

impl From<Url> for ImageReference {
  fn from(url: Url) -> Self {
    Self(url)
  }
}

impl Display for ImageReference {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    write!(f, "{}", self.0)
  }
}

/// An image picked by the user on the local device.
#[derive(Debug, Clone)]
pub struct LocalImage {
  name: String,
  bytes: Bytes,
}

impl LocalImage {
  pub fn new(name: impl Into<String>, bytes: impl Into<Bytes>) -> Self {
    Self {
      name: name.into(),
      bytes: bytes.into(),
    }
  }

  /// Reads an image from disk. The file name becomes the
  /// object name in image storage.
  pub async fn open(path: impl AsRef<Path>) -> Result<Self, Error> {
    let path = path.as_ref();
    let name = path
      .file_name()
      .and_then(|n| n.to_str())
      .ok_or_else(|| Error::InvalidName(path.display().to_string()))?;
    Ok(Self::new(name, tokio::fs::read(path).await?))
  }

  pub fn name(&self) -> &str {
    &self.name
  }

  pub fn len(&self) -> usize {
    self.bytes.len()
  }

  pub fn is_empty(&self) -> bool {
    self.bytes.is_empty()
  }
}

/// The boundary to off-chain blob storage for campaign images.
#[async_trait]
pub trait ImageStore: Send + Sync {
  /// Stores the blob under the given object name and returns its
  /// public download URL. Progress events may be reported while the
  /// upload is running.
  async fn put(
    &self,
    name: &str,
    blob: Bytes,
    progress: &UnboundedSender<UploadProgress>,
  ) -> Result<Url, Error>;
}

/// Per-draft upload state machine.
///
/// Every upload bumps the generation, so when uploads overlap only the
/// most recent one may complete the slot (last writer wins).
#[derive(Debug, Default)]
pub(crate) struct ImageSlot {
  state: UploadState,
  reference: Option<ImageReference>,
  generation: u64,
}

impl ImageSlot {
  pub fn state(&self) -> UploadState {
    self.state
  }

  pub fn reference(&self) -> Option<&ImageReference> {
    self.reference.as_ref()
  }

  /// The image reference, only if the most recent upload succeeded.
  pub fn uploaded(&self) -> Option<&ImageReference> {
    match self.state {
      UploadState::Uploaded => self.reference.as_ref(),
      _ => None,
    }
  }

  pub fn begin(&mut self) -> u64 {
    self.generation += 1;
    self.state = UploadState::Uploading;
    self.reference = None;
    self.generation
  }

  /// Forgets the image. Uploads still in flight can no longer
  /// complete this slot.
  pub fn reset(&mut self) {
    self.generation += 1;
    self.state = UploadState::NotStarted;
    self.reference = None;
  }

  pub fn complete(
    &mut self,
    generation: u64,
    result: Result<ImageReference, Error>,
  ) -> Result<ImageReference, Error> {
    if generation != self.generation {
      return Err(Error::Superseded);
    }

    match result {
      Ok(reference) => {
        self.state = UploadState::Uploaded;
        self.reference = Some(reference.clone());
        Ok(reference)
      }
      Err(e) => {
        self.state = UploadState::Failed;
        Err(e)
      }
    }
  }
}

/// Runs one upload attempt against the image store, bounded by `limit`.
pub(crate) async fn upload(
  store: &dyn ImageStore,
  prefix: &str,
  image: LocalImage,
  limit: Duration,
) -> Result<ImageReference, Error> {
  let object = format!("{prefix}/{}", image.name);
  info!("uploading image {object} ({} bytes)", image.bytes.len());

  let (progress, mut events) = unbounded_channel();
  let put = async move {
    let result = store.put(&object, image.bytes, &progress).await;
    drop(progress);
    result
  };

  let report = async {
    while let Some(event) = events.recv().await {
      debug!(
        "image upload progress {}/{} bytes",
        event.transferred, event.total
      );
    }
  };

  let (result, ()) = tokio::join!(tokio::time::timeout(limit, put), report);
  match result {
    Ok(Ok(url)) => {
      increment_counter!("crowdfund_image_uploads");
      info!("image uploaded to {url}");
      Ok(url.into())
    }
    Ok(Err(e)) => {
      increment_counter!("crowdfund_image_upload_failures");
      warn!("image upload failed: {e}");
      Err(e)
    }
    Err(_) => {
      increment_counter!("crowdfund_image_upload_failures");
      warn!("image upload timed out after {limit:?}");
      Err(Error::TimedOut(limit))
    }
  }
}
