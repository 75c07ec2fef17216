use serde::{Deserialize, Serialize};

use super::{Tag, User};

/// An apartment listing in the discovery feed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Apartment {
    pub id: i64,
    pub owner_id: i64,
    pub city: String,
    #[serde(default)]
    pub area: Option<String>,
    #[serde(default)]
    pub address: Option<String>,
    pub price: i64,
    pub number_of_rooms: i32,
    pub number_of_available_rooms: i32,
    #[serde(default)]
    pub about: Option<String>,
    #[serde(default)]
    pub tags: Vec<Tag>,
    #[serde(default)]
    pub photo_urls: Vec<String>,
    /// Current roommates, included on detail responses.
    #[serde(default)]
    pub roommates: Vec<User>,
}

/// Swipe decision on an apartment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SwipeAction {
    Like,
    Skip,
}
