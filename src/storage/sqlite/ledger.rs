//! Wallet and ledger writes.
//!
//! Both functions take the settlement transaction's connection; they are
//! only reachable from `SqliteCampaignStore::settle`.

use chrono::{DateTime, Utc};
use sea_query::{Expr, OnConflict, Query, SqliteQueryBuilder};
use sqlx::SqliteConnection;
use uuid::Uuid;

use crate::model::{Money, TransactionType};
use crate::storage::helpers::format_timestamp;
use crate::storage::schema::{LedgerTransactions, Wallets};
use crate::storage::Result;

/// Add `amount` to a user's wallet, creating the wallet if needed.
pub(super) async fn increment_balance(
    conn: &mut SqliteConnection,
    user_id: Uuid,
    amount: Money,
    now: DateTime<Utc>,
) -> Result<()> {
    let user = user_id.to_string();
    let updated_at = format_timestamp(now);

    let create = Query::insert()
        .into_table(Wallets::Table)
        .columns([Wallets::UserId, Wallets::Balance, Wallets::UpdatedAt])
        .values_panic([user.clone().into(), 0i64.into(), updated_at.clone().into()])
        .on_conflict(OnConflict::column(Wallets::UserId).do_nothing().to_owned())
        .to_string(SqliteQueryBuilder);
    sqlx::query(&create).execute(&mut *conn).await?;

    let update = Query::update()
        .table(Wallets::Table)
        .value(Wallets::Balance, Expr::col(Wallets::Balance).add(amount.minor()))
        .value(Wallets::UpdatedAt, updated_at)
        .and_where(Expr::col(Wallets::UserId).eq(user))
        .to_string(SqliteQueryBuilder);
    sqlx::query(&update).execute(&mut *conn).await?;

    Ok(())
}

/// Append an immutable ledger transaction. Returns its id.
pub(super) async fn record_transaction(
    conn: &mut SqliteConnection,
    user_id: Uuid,
    kind: TransactionType,
    amount: Money,
    description: &str,
    reference: &str,
    now: DateTime<Utc>,
) -> Result<Uuid> {
    let id = Uuid::new_v4();

    let query = Query::insert()
        .into_table(LedgerTransactions::Table)
        .columns([
            LedgerTransactions::Id,
            LedgerTransactions::UserId,
            LedgerTransactions::Kind,
            LedgerTransactions::Amount,
            LedgerTransactions::Description,
            LedgerTransactions::Reference,
            LedgerTransactions::CreatedAt,
        ])
        .values_panic([
            id.to_string().into(),
            user_id.to_string().into(),
            kind.as_str().into(),
            amount.minor().into(),
            description.into(),
            reference.into(),
            format_timestamp(now).into(),
        ])
        .to_string(SqliteQueryBuilder);
    sqlx::query(&query).execute(&mut *conn).await?;

    Ok(id)
}
