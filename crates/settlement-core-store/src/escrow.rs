//! Escrow lock / release / refund. The crypto
//! leg of the trade is what sits in escrow; which side locks it depends on
//! `OrderType` — a sell order escrows the user's crypto, a buy order
//! escrows the merchant's. Release always credits the other side net of
//! the platform fee; refund always credits back whichever party was
//! actually debited.

use rust_decimal::Decimal;
use serde_json::json;
use sqlx::PgPool;
use uuid::Uuid;

use settlement_core_ledger::{credit, debit_and_lock, debit_platform_fee};
use settlement_core_types::{
    Actor, EntryKind, Order, OrderError, OrderId, OrderStatus, PartyKind, PartyRef, Result, TxHash,
};

use crate::transitions::{apply_transition, Effects, TransitionRequest};

/// Well-known ledger account the platform fee is credited to. Not a real
/// merchant; reuses the `PartyRef::merchant` shape because the ledger keys
/// balances on `(PartyKind, Uuid)` and this account never needs its own kind.
pub fn platform_account() -> PartyRef {
    PartyRef::merchant(Uuid::nil())
}

/// Who `lock_escrow` debits. `buyer_merchant_id` marks an M2M trade where
/// `merchant_id` is always the seller-of-crypto side regardless of
/// `order_type`; otherwise the usual buy/sell split applies.
fn escrow_owner(order: &Order) -> Result<PartyRef> {
    if order.buyer_merchant_id.is_some() {
        return order
            .merchant_id
            .map(PartyRef::merchant)
            .ok_or_else(|| OrderError::Internal("m2m order has no assigned seller merchant".into()));
    }
    match order.order_type {
        settlement_core_types::OrderType::Sell => Ok(PartyRef::user(order.user_id)),
        settlement_core_types::OrderType::Buy => order
            .merchant_id
            .map(PartyRef::merchant)
            .ok_or_else(|| OrderError::Internal("buy order has no assigned merchant".into())),
    }
}

/// Who `release_escrow` credits. `buyer_merchant_id` always wins when
/// present — the buyer-of-crypto side of an M2M trade — otherwise the
/// usual buy/sell counterparty.
fn counterparty(order: &Order) -> Result<PartyRef> {
    if let Some(buyer_merchant_id) = order.buyer_merchant_id {
        return Ok(PartyRef::merchant(buyer_merchant_id));
    }
    match order.order_type {
        settlement_core_types::OrderType::Sell => order
            .merchant_id
            .map(PartyRef::merchant)
            .ok_or_else(|| OrderError::Internal("sell order has no assigned merchant".into())),
        settlement_core_types::OrderType::Buy => Ok(PartyRef::user(order.user_id)),
    }
}

/// `accepted|escrow_pending -> escrowed`: debit the escrow owner's crypto
/// balance and record the mock lock transaction hash.
pub async fn lock_escrow(
    pool: &PgPool,
    order_id: OrderId,
    actor: Actor,
    expected_version: Option<i64>,
) -> Result<Order> {
    let effects: Effects = Box::new(move |conn, order| {
        Box::pin(async move {
            if order.escrow_tx_hash.is_some() {
                return Err(OrderError::AlreadyEscrowed);
            }
            let owner = escrow_owner(order)?;
            debit_and_lock(conn, order.id, owner, &order.crypto_asset, order.crypto_amount).await?;
            order.escrow_tx_hash = Some(TxHash::mock(order.id, "escrow_lock"));
            order.escrow_debited_kind = Some(owner.kind);
            order.escrow_debited_id = Some(owner.id);
            order.escrow_debited_amount = Some(order.crypto_amount);
            Ok(())
        })
    });

    apply_transition(
        pool,
        TransitionRequest {
            order_id,
            actor,
            to: OrderStatus::Escrowed,
            expected_version,
            metadata: json!({ "action": "lock_escrow" }),
            effects,
            role_override: None,
        },
    )
    .await
}

/// `payment_confirmed|releasing -> completed`: pay the counterparty net of
/// the platform fee, credit the platform with the fee, record the release
/// transaction hash.
pub async fn release_escrow(
    pool: &PgPool,
    order_id: OrderId,
    actor: Actor,
    to: OrderStatus,
    expected_version: Option<i64>,
) -> Result<Order> {
    let effects: Effects = Box::new(move |conn, order| {
        Box::pin(async move {
            if order.escrow_tx_hash.is_none() {
                return Err(OrderError::Internal("cannot release escrow that was never locked".into()));
            }
            if order.release_tx_hash.is_some() {
                return Err(OrderError::AlreadySettled);
            }
            let recipient = counterparty(order)?;
            let fee = (order.crypto_amount * order.protocol_fee_percentage / Decimal::from(100))
                .round_dp(order.crypto_amount.scale());
            let net = order.crypto_amount - fee;

            credit(conn, order.id, recipient, &order.crypto_asset, net, EntryKind::EscrowRelease).await?;
            if fee > Decimal::ZERO {
                debit_platform_fee(conn, order.id, platform_account(), &order.crypto_asset, fee).await?;
            }
            order.release_tx_hash = Some(TxHash::mock(order.id, "escrow_release"));
            Ok(())
        })
    });

    apply_transition(
        pool,
        TransitionRequest {
            order_id,
            actor,
            to,
            expected_version,
            metadata: json!({ "action": "release_escrow" }),
            effects,
            role_override: None,
        },
    )
    .await
}

/// `* -> cancelled|expired`: if escrow was locked and never released,
/// refund it in full to whichever party was debited. A no-op ledger-wise
/// if escrow was never locked.
pub async fn refund_escrow(
    pool: &PgPool,
    order_id: OrderId,
    actor: Actor,
    to: OrderStatus,
    expected_version: Option<i64>,
) -> Result<Order> {
    let effects: Effects = Box::new(move |conn, order| {
        Box::pin(async move {
            if order.release_tx_hash.is_some() {
                return Ok(());
            }
            let (Some(kind), Some(id), Some(amount)) =
                (order.escrow_debited_kind, order.escrow_debited_id, order.escrow_debited_amount)
            else {
                return Ok(());
            };
            let owner = match kind {
                PartyKind::User => PartyRef::user(id),
                PartyKind::Merchant => PartyRef::merchant(id),
            };
            credit(conn, order.id, owner, &order.crypto_asset, amount, EntryKind::Refund).await?;
            order.refund_tx_hash = Some(TxHash::mock(order.id, "refund"));
            Ok(())
        })
    });

    apply_transition(
        pool,
        TransitionRequest {
            order_id,
            actor,
            to,
            expected_version,
            metadata: json!({ "action": "refund_escrow" }),
            effects,
            role_override: None,
        },
    )
    .await
}
