use {
  crate::upload::{ImageSlot, UploadState},
  crowdfund_primitives::{Amount, StartProject},
  std::fmt::Display,
  thiserror::Error,
};

pub const MAX_TITLE_CHARS: usize = 50;
pub const MAX_DESCRIPTION_CHARS: usize = 300;

/// Fields of a campaign draft, used to name the offending field
/// when validation fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DraftField {
  Image,
  Title,
  Description,
  Goal,
  Deadline,
}

impl Display for DraftField {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.write_str(match self {
      DraftField::Image => "image",
      DraftField::Title => "title",
      DraftField::Description => "description",
      DraftField::Goal => "goal amount",
      DraftField::Deadline => "deadline",
    })
  }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
  #[error("Campaign image is not uploaded (upload state: {0:?})")]
  Image(UploadState),

  #[error("Campaign title is empty")]
  EmptyTitle,

  #[error(
    "Campaign title has {0} characters, at most {max} allowed",
    max = MAX_TITLE_CHARS
  )]
  TitleTooLong(usize),

  #[error("Campaign description is empty")]
  EmptyDescription,

  #[error(
    "Campaign description has {0} characters, at most {max} allowed",
    max = MAX_DESCRIPTION_CHARS
  )]
  DescriptionTooLong(usize),

  #[error("Fundraising goal must be greater than zero")]
  NonPositiveGoal,

  #[error("Deadline must be at least one day from now")]
  NonPositiveDeadline,
}

impl ValidationError {
  pub fn field(&self) -> DraftField {
    match self {
      ValidationError::Image(_) => DraftField::Image,
      ValidationError::EmptyTitle | ValidationError::TitleTooLong(_) => {
        DraftField::Title
      }
      ValidationError::EmptyDescription
      | ValidationError::DescriptionTooLong(_) => DraftField::Description,
      ValidationError::NonPositiveGoal => DraftField::Goal,
      ValidationError::NonPositiveDeadline => DraftField::Deadline,
    }
  }
}

/// User-entered campaign data that has not been submitted yet.
///
/// The image is tracked separately by the owning draft session since
/// it is filled asynchronously by uploads.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CampaignDraft {
  pub title: String,
  pub description: String,
  pub goal: Amount,

  /// Number of days the campaign stays open after it is created.
  /// See [`crate::days_until`] for deriving it from a calendar date.
  pub deadline_days: u32,
}

impl CampaignDraft {
  /// Checks all preconditions of a submission in a fixed order and
  /// turns the draft into the contract call. The first failure wins.
  pub(crate) fn validate(
    &self,
    image: &ImageSlot,
  ) -> Result<StartProject, ValidationError> {
    let image_link = image
      .uploaded()
      .ok_or(ValidationError::Image(image.state()))?;

    let title = self.title.trim();
    if title.is_empty() {
      return Err(ValidationError::EmptyTitle);
    }
    let title_len = title.chars().count();
    if title_len > MAX_TITLE_CHARS {
      return Err(ValidationError::TitleTooLong(title_len));
    }

    let description = self.description.trim();
    if description.is_empty() {
      return Err(ValidationError::EmptyDescription);
    }
    let description_len = description.chars().count();
    if description_len > MAX_DESCRIPTION_CHARS {
      return Err(ValidationError::DescriptionTooLong(description_len));
    }

    if self.goal.is_zero() {
      return Err(ValidationError::NonPositiveGoal);
    }

    if self.deadline_days == 0 {
      return Err(ValidationError::NonPositiveDeadline);
    }

    Ok(StartProject {
      title: title.to_owned(),
      description: description.to_owned(),
      image_link: image_link.to_string(),
      duration_in_days: self.deadline_days,
      amount_to_raise: self.goal,
    })
  }
}
