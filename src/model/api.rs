use serde::{Deserialize, Serialize};

/// Borrowable item as returned by `GET /items`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Item {
    pub id: i64,
    pub name: String,
    pub qty: i64,
    pub description: Option<String>,
    pub image_url: Option<String>,
}

/// Bookable room as returned by `GET /rooms`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Room {
    pub id: i64,
    pub name: String,
    pub quantity: i64,
}

/// Body of `POST /requests`.
#[derive(Debug, Clone, Serialize)]
pub struct NewBorrowRequest {
    pub name: String,
    pub borrower_id: String,
    pub year: String,
    pub department: String,
    pub course: String,
    pub date: String,
    pub time_in: String,
    pub time_out: String,
    pub item_id: i64,
}

/// Body of `POST /room-requests`. Same shape as an item request with
/// `room_id` in place of `item_id`.
#[derive(Debug, Clone, Serialize)]
pub struct NewRoomRequest {
    pub name: String,
    pub borrower_id: String,
    pub year: String,
    pub department: String,
    pub course: String,
    pub date: String,
    pub time_in: String,
    pub time_out: String,
    pub room_id: i64,
}
