//! Atomic balance movements. Every function here takes
//! an already-open `PgConnection` (usually the connection backing the
//! caller's `apply_transition` transaction) and does exactly one
//! `SELECT ... FOR UPDATE` row-lock followed by one balance update and one
//! ledger-entry insert. Callers own the transaction boundary; nothing in
//! this module calls `BEGIN`/`COMMIT` itself.

use chrono::Utc;
use rust_decimal::Decimal;
use sqlx::PgConnection;
use uuid::Uuid;

use settlement_core_types::{EntryKind, LedgerEntry, OrderError, OrderId, PartyRef, Result};

/// Row-lock a party's balance for `currency`, creating a zero row if none
/// exists yet. Must be called inside the same transaction as the balance
/// update that follows it.
async fn lock_balance(
    conn: &mut PgConnection,
    party: PartyRef,
    currency: &str,
) -> Result<Decimal> {
    sqlx::query(
        "INSERT INTO party_balances (party_kind, party_id, currency, balance)
         VALUES ($1, $2, $3, 0)
         ON CONFLICT (party_kind, party_id, currency) DO NOTHING",
    )
    .bind(party.kind.to_string())
    .bind(party.id)
    .bind(currency)
    .execute(&mut *conn)
    .await
    .map_err(|e| OrderError::Database(e.to_string()))?;

    let row: (Decimal,) = sqlx::query_as(
        "SELECT balance FROM party_balances
         WHERE party_kind = $1 AND party_id = $2 AND currency = $3
         FOR UPDATE",
    )
    .bind(party.kind.to_string())
    .bind(party.id)
    .bind(currency)
    .fetch_one(&mut *conn)
    .await
    .map_err(|e| OrderError::Database(e.to_string()))?;

    Ok(row.0)
}

async fn set_balance(
    conn: &mut PgConnection,
    party: PartyRef,
    currency: &str,
    new_balance: Decimal,
) -> Result<()> {
    sqlx::query(
        "UPDATE party_balances SET balance = $4
         WHERE party_kind = $1 AND party_id = $2 AND currency = $3",
    )
    .bind(party.kind.to_string())
    .bind(party.id)
    .bind(currency)
    .bind(new_balance)
    .execute(&mut *conn)
    .await
    .map_err(|e| OrderError::Database(e.to_string()))?;
    Ok(())
}

async fn insert_entry(
    conn: &mut PgConnection,
    order_id: OrderId,
    party: PartyRef,
    kind: EntryKind,
    amount: Decimal,
    currency: &str,
    balance_after: Decimal,
) -> Result<LedgerEntry> {
    let id = Uuid::new_v4();
    let created_at = Utc::now();

    sqlx::query(
        "INSERT INTO ledger_entries
            (id, order_id, party_kind, party_id, kind, amount, currency, balance_after, created_at)
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)",
    )
    .bind(id)
    .bind(order_id.0)
    .bind(party.kind.to_string())
    .bind(party.id)
    .bind(kind.as_str())
    .bind(amount)
    .bind(currency)
    .bind(balance_after)
    .bind(created_at)
    .execute(&mut *conn)
    .await
    .map_err(|e| OrderError::Database(e.to_string()))?;

    Ok(LedgerEntry {
        id,
        order_id,
        party,
        kind,
        amount,
        currency: currency.to_string(),
        balance_after,
        created_at,
    })
}

/// Lock `amount` of `currency` out of `party`'s spendable balance into
/// escrow for `order_id`. Fails with `InsufficientFunds` rather than
/// letting the balance go negative.
pub async fn debit_and_lock(
    conn: &mut PgConnection,
    order_id: OrderId,
    party: PartyRef,
    currency: &str,
    amount: Decimal,
) -> Result<LedgerEntry> {
    if amount <= Decimal::ZERO {
        return Err(OrderError::ZeroAmount);
    }
    let balance = lock_balance(conn, party, currency).await?;
    if balance < amount {
        return Err(OrderError::InsufficientFunds {
            need: amount.to_string(),
            have: balance.to_string(),
        });
    }
    let new_balance = balance - amount;
    set_balance(conn, party, currency, new_balance).await?;
    insert_entry(
        conn,
        order_id,
        party,
        EntryKind::EscrowLock,
        -amount,
        currency,
        new_balance,
    )
    .await
}

/// Credit `amount` of `currency` into `party`'s balance — used for escrow
/// release to the counterparty and for refunds back to the escrow-debited
/// party.
pub async fn credit(
    conn: &mut PgConnection,
    order_id: OrderId,
    party: PartyRef,
    currency: &str,
    amount: Decimal,
    kind: EntryKind,
) -> Result<LedgerEntry> {
    if amount <= Decimal::ZERO {
        return Err(OrderError::ZeroAmount);
    }
    let balance = lock_balance(conn, party, currency).await?;
    let new_balance = balance + amount;
    set_balance(conn, party, currency, new_balance).await?;
    insert_entry(conn, order_id, party, kind, amount, currency, new_balance).await
}

/// Deduct the platform fee from a release amount and credit it to the
/// platform's own ledger account, keyed as a merchant-shaped `PartyRef`
/// under the well-known platform id.
pub async fn debit_platform_fee(
    conn: &mut PgConnection,
    order_id: OrderId,
    platform_account: PartyRef,
    currency: &str,
    fee_amount: Decimal,
) -> Result<LedgerEntry> {
    if fee_amount <= Decimal::ZERO {
        return Err(OrderError::ZeroAmount);
    }
    credit(conn, order_id, platform_account, currency, fee_amount, EntryKind::Fee).await
}
