use {crowdfund_primitives::CampaignRecord, time::OffsetDateTime};

pub const SUMMARY_CHARS: usize = 115;
pub const CREATOR_CHARS: usize = 16;

const CONTINUATION: &str = "...";
const UNKNOWN_DATE: &str = "unknown date";
const UNTITLED: &str = "Untitled";

/// Display-ready view of one campaign in the feed.
#[derive(Debug, Clone, PartialEq)]
pub struct CampaignCard {
  pub title: String,

  /// Creator address shortened to its first characters.
  pub creator: String,

  /// Description shortened to its first characters.
  pub summary: String,

  /// `"$<raised> raised of $<goal> goal."`
  pub raised_line: String,

  /// Raised amount over the goal. May exceed 1.0 for over-funded
  /// campaigns and is None when the goal is zero.
  pub progress: Option<f64>,

  /// Deadline as a `M/D/YYYY` UTC date.
  pub deadline: String,
}

impl CampaignCard {
  /// Progress bar fill in `[0, 1]`.
  pub fn display_progress(&self) -> f64 {
    self.progress.unwrap_or(0.0).clamp(0.0, 1.0)
  }
}

impl From<&CampaignRecord> for CampaignCard {
  fn from(record: &CampaignRecord) -> Self {
    let title = match record.title.trim() {
      "" => UNTITLED.to_owned(),
      title => title.to_owned(),
    };

    Self {
      title,
      creator: format!(
        "{}{CONTINUATION}",
        take_chars(&record.creator.to_string(), CREATOR_CHARS)
      ),
      summary: truncate(&record.description, SUMMARY_CHARS),
      raised_line: format!(
        "${} raised of ${} goal.",
        record.raised, record.goal
      ),
      progress: record.raised.ratio(record.goal),
      deadline: deadline_date(record.deadline)
        .unwrap_or_else(|| UNKNOWN_DATE.to_owned()),
    }
  }
}

/// Formats a unix timestamp as a `M/D/YYYY` date in UTC, or None if the
/// timestamp is outside of the representable range.
pub fn deadline_date(timestamp: i64) -> Option<String> {
  let date = OffsetDateTime::from_unix_timestamp(timestamp).ok()?.date();
  Some(format!(
    "{}/{}/{}",
    u8::from(date.month()),
    date.day(),
    date.year()
  ))
}

/// First `max` characters of `text` followed by a continuation marker,
/// or `text` unchanged when it is short enough.
///
/// Counts unicode scalar values, so multi-byte characters are never split.
pub fn truncate(text: &str, max: usize) -> String {
  let head = take_chars(text, max);
  if head.len() == text.len() {
    text.to_owned()
  } else {
    format!("{head}{CONTINUATION}")
  }
}

fn take_chars(text: &str, max: usize) -> &str {
  match text.char_indices().nth(max) {
    Some((end, _)) => &text[..end],
    None => text,
  }
}
