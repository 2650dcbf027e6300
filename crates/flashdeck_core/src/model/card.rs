//! Flashcard domain model.
//!
//! # Responsibility
//! - Define the persisted card record and the in-memory authoring draft.
//! - Own the field-level rules a card must satisfy before it is stored.
//!
//! # Invariants
//! - `id` is assigned once and never reused for another card.
//! - A persisted card has non-empty `id`, `front_image` and `back_text`.
//! - `created_at` is set at creation and never mutated.

use chrono::DateTime;
use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize};
use std::error::Error;
use std::fmt::{Display, Formatter};
use uuid::Uuid;

/// Stable identifier of a card. Also the card's key in the store.
pub type CardId = String;

/// Persisted flashcard: an image on the front, a text label on the back.
///
/// Serialized with camelCase field names so records written by earlier app
/// builds stay readable. Those builds stored `createdAt` as an ISO-8601
/// string; it is read back as epoch milliseconds and always written as a
/// number.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FlashCard {
    pub id: CardId,
    /// Local file URI of the captured or picked image.
    pub front_image: String,
    pub back_text: String,
    /// Unix epoch milliseconds.
    #[serde(deserialize_with = "deserialize_created_at")]
    pub created_at: i64,
    #[serde(default)]
    pub tags: Vec<String>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawCreatedAt {
    Millis(i64),
    Text(String),
}

fn deserialize_created_at<'de, D>(deserializer: D) -> Result<i64, D::Error>
where
    D: Deserializer<'de>,
{
    match RawCreatedAt::deserialize(deserializer)? {
        RawCreatedAt::Millis(millis) => Ok(millis),
        RawCreatedAt::Text(text) => DateTime::parse_from_rfc3339(text.trim())
            .map(|at| at.timestamp_millis())
            .map_err(|err| {
                D::Error::custom(format!("createdAt `{text}` is not an RFC 3339 date: {err}"))
            }),
    }
}

/// Validation failures for card records and drafts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CardValidationError {
    EmptyId,
    EmptyFrontImage,
    EmptyBackText,
    NegativeCreatedAt(i64),
}

impl Display for CardValidationError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::EmptyId => write!(f, "card id must not be empty"),
            Self::EmptyFrontImage => write!(f, "card frontImage must not be empty"),
            Self::EmptyBackText => write!(f, "card backText must not be empty"),
            Self::NegativeCreatedAt(value) => {
                write!(f, "card createdAt must not be negative, got {value}")
            }
        }
    }
}

impl Error for CardValidationError {}

impl FlashCard {
    /// Creates a card with a generated UUID v4 id.
    pub fn new(
        front_image: impl Into<String>,
        back_text: impl Into<String>,
        created_at: i64,
    ) -> Self {
        Self::with_id(Uuid::new_v4().to_string(), front_image, back_text, created_at)
    }

    /// Creates a card with a caller-supplied id.
    ///
    /// Used when identity already exists outside core, e.g. the
    /// timestamp-derived ids of cards saved by earlier app builds.
    /// Does not validate; call [`FlashCard::validate`] before persisting.
    pub fn with_id(
        id: impl Into<CardId>,
        front_image: impl Into<String>,
        back_text: impl Into<String>,
        created_at: i64,
    ) -> Self {
        Self {
            id: id.into(),
            front_image: front_image.into(),
            back_text: back_text.into(),
            created_at,
            tags: Vec::new(),
        }
    }

    /// Builder-style tag assignment.
    pub fn with_tags<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tags = tags.into_iter().map(Into::into).collect();
        self
    }

    /// Checks the persisted-card invariants.
    ///
    /// Whitespace-only values count as empty.
    pub fn validate(&self) -> Result<(), CardValidationError> {
        if self.id.trim().is_empty() {
            return Err(CardValidationError::EmptyId);
        }
        if self.front_image.trim().is_empty() {
            return Err(CardValidationError::EmptyFrontImage);
        }
        if self.back_text.trim().is_empty() {
            return Err(CardValidationError::EmptyBackText);
        }
        if self.created_at < 0 {
            return Err(CardValidationError::NegativeCreatedAt(self.created_at));
        }
        Ok(())
    }
}

/// Authoring state held by the add-card screen before saving.
///
/// Either field may be empty while the user is still picking an image or
/// typing the label.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CardDraft {
    pub front_image: String,
    pub back_text: String,
    pub tags: Vec<String>,
}

impl CardDraft {
    pub fn new(front_image: impl Into<String>, back_text: impl Into<String>) -> Self {
        Self {
            front_image: front_image.into(),
            back_text: back_text.into(),
            tags: Vec::new(),
        }
    }

    /// Whether the draft can be saved (drives the save button state).
    pub fn is_ready(&self) -> bool {
        self.missing_field().is_none()
    }

    /// Resets both faces, as the screen's clear action does.
    pub fn clear(&mut self) {
        self.front_image.clear();
        self.back_text.clear();
        self.tags.clear();
    }

    /// Returns the first field that blocks saving, if any.
    pub fn missing_field(&self) -> Option<CardValidationError> {
        if self.front_image.trim().is_empty() {
            return Some(CardValidationError::EmptyFrontImage);
        }
        if self.back_text.trim().is_empty() {
            return Some(CardValidationError::EmptyBackText);
        }
        None
    }

    /// Converts a ready draft into a card with the given identity.
    ///
    /// Back text is trimmed; tags are trimmed and blank tags dropped.
    pub fn into_card(
        self,
        id: impl Into<CardId>,
        created_at: i64,
    ) -> Result<FlashCard, CardValidationError> {
        if let Some(missing) = self.missing_field() {
            return Err(missing);
        }
        let tags = self
            .tags
            .into_iter()
            .map(|tag| tag.trim().to_string())
            .filter(|tag| !tag.is_empty())
            .collect::<Vec<_>>();
        let card = FlashCard::with_id(id, self.front_image.trim(), self.back_text.trim(), created_at)
            .with_tags(tags);
        card.validate()?;
        Ok(card)
    }
}
