use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub mod transaction {
    use super::*;

    /// One line item on the wire. Prices are decimal currency values,
    /// rounded to 2 places by the server.
    #[derive(Clone, Debug, Serialize, Deserialize)]
    pub struct ItemWire {
        pub name: String,
        pub price: f64,
    }

    /// A participant's slice of a transaction.
    ///
    /// On create requests the derived fields are optional; the server fills
    /// them the same way the persisted records carry them (total from the
    /// item sum, splitAmount from total).
    #[derive(Clone, Debug, Serialize, Deserialize)]
    #[serde(rename_all = "camelCase")]
    pub struct UserEntryWire {
        pub user_id: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        pub name: Option<String>,
        /// Required on create; a missing list is rejected, an empty one is
        /// fine.
        pub items: Option<Vec<ItemWire>>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        pub total: Option<f64>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        pub fees: Option<f64>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        pub split_amount: Option<f64>,
    }

    /// Create-request body: the persisted record minus id/createdAt, with
    /// the derived fields optional.
    #[derive(Clone, Debug, Serialize, Deserialize)]
    #[serde(rename_all = "camelCase")]
    pub struct TransactionNew {
        pub name: Option<String>,
        pub date: Option<DateTime<Utc>>,
        pub merchant: Option<String>,
        pub users: Option<Vec<UserEntryWire>>,
        pub fees: Option<f64>,
        pub subtotal: Option<f64>,
        pub total: Option<f64>,
    }

    #[derive(Clone, Debug, Serialize, Deserialize)]
    pub struct TransactionCreated {
        pub id: String,
        pub message: String,
    }

    /// A persisted transaction as returned by the read endpoints.
    #[derive(Clone, Debug, Serialize, Deserialize)]
    #[serde(rename_all = "camelCase")]
    pub struct StoredTransactionView {
        pub id: String,
        pub name: String,
        pub date: DateTime<Utc>,
        pub merchant: String,
        pub users: Vec<UserEntryWire>,
        pub user_ids: Vec<String>,
        pub fees: f64,
        pub subtotal: f64,
        pub total: f64,
        pub created_at: DateTime<Utc>,
    }

    /// Compact row for the monthly report, re-numbered per response.
    #[derive(Clone, Debug, Serialize, Deserialize)]
    pub struct MonthlyTransactionView {
        pub id: usize,
        pub name: String,
        pub amount: f64,
        pub date: DateTime<Utc>,
    }

    #[derive(Clone, Debug, Serialize, Deserialize)]
    #[serde(rename_all = "camelCase")]
    pub struct TransactionCount {
        pub total_count: usize,
    }

    /// Query parameters of `GET /api/transactions/userRange/{userId}`.
    #[derive(Clone, Debug, Serialize, Deserialize)]
    #[serde(rename_all = "camelCase")]
    pub struct RangeQuery {
        pub start_index: Option<usize>,
        pub end_index: Option<usize>,
    }

    /// Query parameters of `GET /api/transactions/monthly/{userId}`.
    #[derive(Clone, Debug, Serialize, Deserialize)]
    pub struct MonthlyQuery {
        pub year: Option<i32>,
        pub month: Option<u32>,
    }
}
