//! Transactions API endpoints.

use api_types::transaction::{
    ItemWire, MonthlyQuery, MonthlyTransactionView, RangeQuery, StoredTransactionView,
    TransactionCount, TransactionCreated, TransactionNew, UserEntryWire,
};
use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
};
use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use engine::{ExtractionProvider, LineItem, MoneyCents, TransactionRecord, UserEntry};

use crate::{ServerError, server::ServerState, store::StoredTransaction};

const DEFAULT_RANGE_END: usize = 10;

pub async fn create<P>(
    State(state): State<ServerState<P>>,
    Json(payload): Json<TransactionNew>,
) -> Result<(StatusCode, Json<TransactionCreated>), ServerError>
where
    P: ExtractionProvider + Send + Sync + 'static,
{
    let record = normalize(payload)?;
    let id = state.store.create(record);
    tracing::info!(%id, "transaction created");

    Ok((
        StatusCode::CREATED,
        Json(TransactionCreated {
            id,
            message: "Transaction created successfully.".to_string(),
        }),
    ))
}

/// Applies the create-side defaults: per-user totals from the item sums,
/// splitAmount from the total, userIds rebuilt from the users array, and the
/// record subtotal/total recomputed server-side.
fn normalize(payload: TransactionNew) -> Result<TransactionRecord, ServerError> {
    let missing = || {
        ServerError::Generic("Transaction name, date, and users array are required.".to_string())
    };
    let name = payload
        .name
        .filter(|name| !name.trim().is_empty())
        .ok_or_else(missing)?;
    let date = payload.date.ok_or_else(missing)?;
    let wire_users = payload.users.ok_or_else(missing)?;

    let mut users = Vec::with_capacity(wire_users.len());
    for entry in wire_users {
        let Some(items) = entry.items else {
            return Err(ServerError::Generic(format!(
                "Missing items for user {}",
                entry.user_id
            )));
        };
        let items: Vec<LineItem> = items
            .into_iter()
            .map(|item| LineItem {
                name: item.name,
                price: MoneyCents::from_major(item.price),
            })
            .collect();
        let items_total: MoneyCents = items.iter().map(|item| item.price).sum();
        let total = entry.total.map(MoneyCents::from_major).unwrap_or(items_total);
        let split_amount = entry.split_amount.map(MoneyCents::from_major).unwrap_or(total);
        users.push(UserEntry {
            user_id: entry.user_id,
            name: entry.name.unwrap_or_default(),
            items,
            total,
            fees: entry
                .fees
                .map(MoneyCents::from_major)
                .filter(|fee| fee.is_positive()),
            split_amount,
        });
    }

    let user_ids = users.iter().map(|user| user.user_id.clone()).collect();
    let subtotal: MoneyCents = users.iter().map(|user| user.total).sum();
    let fees = payload.fees.map(MoneyCents::from_major);
    let total = match fees {
        Some(fees) => subtotal + fees,
        None => subtotal,
    };

    Ok(TransactionRecord {
        name,
        date,
        merchant: payload.merchant.unwrap_or_default(),
        users,
        user_ids,
        fees: fees.unwrap_or(MoneyCents::ZERO),
        subtotal,
        total,
    })
}

pub async fn user_range<P>(
    State(state): State<ServerState<P>>,
    Path(user_id): Path<String>,
    Query(query): Query<RangeQuery>,
) -> Json<Vec<StoredTransactionView>>
where
    P: ExtractionProvider + Send + Sync + 'static,
{
    let start = query.start_index.unwrap_or(0);
    let end = query.end_index.unwrap_or(DEFAULT_RANGE_END);
    let limit = end.saturating_sub(start);

    let rows = state.store.list_by_user(&user_id, start, limit);
    Json(rows.into_iter().map(view_of).collect())
}

pub async fn monthly<P>(
    State(state): State<ServerState<P>>,
    Path(user_id): Path<String>,
    Query(query): Query<MonthlyQuery>,
) -> Result<Json<Vec<MonthlyTransactionView>>, ServerError>
where
    P: ExtractionProvider + Send + Sync + 'static,
{
    let (Some(year), Some(month)) = (query.year, query.month) else {
        return Err(ServerError::Generic(
            "Year and month query parameters are required.".to_string(),
        ));
    };
    let from = month_start(year, month)
        .ok_or_else(|| ServerError::Generic("Invalid year or month.".to_string()))?;
    let (next_year, next_month) = if month >= 12 {
        (year + 1, 1)
    } else {
        (year, month + 1)
    };
    let to = month_start(next_year, next_month)
        .ok_or_else(|| ServerError::Generic("Invalid year or month.".to_string()))?;

    let rows = state.store.list_by_user_between(&user_id, from, to);
    let views = rows
        .into_iter()
        .enumerate()
        .map(|(index, stored)| MonthlyTransactionView {
            id: index + 1,
            name: stored.record.name,
            amount: stored.record.total.to_major(),
            date: stored.record.date,
        })
        .collect();

    Ok(Json(views))
}

pub async fn count<P>(
    State(state): State<ServerState<P>>,
    Path(user_id): Path<String>,
) -> Json<TransactionCount>
where
    P: ExtractionProvider + Send + Sync + 'static,
{
    Json(TransactionCount {
        total_count: state.store.count_by_user(&user_id),
    })
}

fn month_start(year: i32, month: u32) -> Option<DateTime<Utc>> {
    let date = NaiveDate::from_ymd_opt(year, month, 1)?;
    Some(date.and_time(NaiveTime::MIN).and_utc())
}

fn view_of(stored: StoredTransaction) -> StoredTransactionView {
    let record = stored.record;
    StoredTransactionView {
        id: stored.id,
        name: record.name,
        date: record.date,
        merchant: record.merchant,
        users: record.users.into_iter().map(wire_user).collect(),
        user_ids: record.user_ids,
        fees: record.fees.to_major(),
        subtotal: record.subtotal.to_major(),
        total: record.total.to_major(),
        created_at: stored.created_at,
    }
}

fn wire_user(user: UserEntry) -> UserEntryWire {
    UserEntryWire {
        user_id: user.user_id,
        name: Some(user.name),
        items: Some(
            user.items
                .into_iter()
                .map(|item| ItemWire {
                    name: item.name,
                    price: item.price.to_major(),
                })
                .collect(),
        ),
        total: Some(user.total.to_major()),
        fees: user.fees.map(MoneyCents::to_major),
        split_amount: Some(user.split_amount.to_major()),
    }
}
