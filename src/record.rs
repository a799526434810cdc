use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// One decoded row.
///
/// The struct covers the columns of every built-in [`Schema`](crate::schema::Schema);
/// columns a schema does not carry stay `None`. A record owns all of its data
/// and never borrows from the buffers it was decoded from.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct FakeName {
    pub id: i32,
    pub guid: Uuid,
    pub is_vip: Option<bool>,
    pub gender: String,
    pub given_name: String,
    pub surname: String,
    pub city: Option<String>,
    pub street_address: Option<String>,
    pub email_address: Option<String>,
    pub birthday: NaiveDate,
    pub height: Option<i32>,
    pub weight: Option<f32>,
    pub credit_card_number: Option<i64>,
    pub domain: Option<String>,
}
