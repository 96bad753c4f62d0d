use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A dining hall menu for one meal on one day of the week.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct Menu {
    pub id: i32,
    #[serde(rename = "diningHall")]
    pub dining_hall: String,
    pub day: String,
    pub meal: String,
    #[serde(rename = "foodItems")]
    pub food_items: Vec<String>,
}

/// The API token of the requesting user, as returned by the token endpoint.
#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct TokenInfo {
    pub token: String,
    #[serde(rename = "createdAt")]
    pub created_at: DateTime<Utc>,
}
