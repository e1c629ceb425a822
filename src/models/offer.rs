use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub const OFFERS: &str = "offers";

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "camelCase")]
pub enum OfferStatus {
    Pending,
    Confirmed,
    Refused,
}

impl OfferStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            OfferStatus::Pending => "pending",
            OfferStatus::Confirmed => "confirmed",
            OfferStatus::Refused => "refused",
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, OfferStatus::Pending)
    }

    /// An offer is answered exactly once.
    pub fn can_transition_to(&self, next: OfferStatus) -> bool {
        matches!(
            (self, next),
            (OfferStatus::Pending, OfferStatus::Confirmed)
                | (OfferStatus::Pending, OfferStatus::Refused)
        )
    }
}

/// A tailor's bid against a client's project.
///
/// `author_id` is the requester who posted the project, `user_id` the
/// provider who submitted the bid.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Offer {
    #[serde(default)]
    pub id: String,
    pub project_id: String,
    pub author_id: String,
    pub user_id: String,
    pub price: f64,
    #[serde(default)]
    pub message: String,
    pub status: OfferStatus,
    pub created_at: DateTime<Utc>,
}

impl Offer {
    pub fn is_party(&self, user_id: &str) -> bool {
        self.author_id == user_id || self.user_id == user_id
    }
}
