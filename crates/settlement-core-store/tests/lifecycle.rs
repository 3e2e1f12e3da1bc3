//! Integration tests against a real Postgres instance.
//! Each test gets its own freshly migrated database via `#[sqlx::test(migrations = "../../migrations")]`.

use chrono::{Duration, Utc};
use rust_decimal::Decimal;
use sqlx::PgPool;
use uuid::Uuid;

use settlement_core_ledger::credit;
use settlement_core_store::{dispute, escrow, lifecycle, orders};
use settlement_core_types::{
    Actor, EntryKind, Order, OrderId, OrderStatus, OrderType, PartyRef, PaymentDetails,
    Resolution, SpreadPreference,
};

fn seed_order(order_type: OrderType, merchant_id: Option<Uuid>) -> Order {
    let now = Utc::now();
    Order {
        id: OrderId::new(),
        order_number: format!("20260101-{:06}", now.timestamp_subsec_micros() % 1_000_000),
        order_type,
        status: OrderStatus::Escrowed,
        order_version: 1,
        offer_id: Uuid::new_v4(),
        user_id: Uuid::new_v4(),
        merchant_id,
        buyer_merchant_id: None,
        crypto_asset: "USDT".into(),
        crypto_amount: Decimal::new(10000, 2),
        fiat_currency: "USD".into(),
        fiat_amount: Decimal::new(10000, 2),
        rate: Decimal::new(100, 2),
        spread_preference: SpreadPreference::Best,
        payment_details: PaymentDetails::Cash {
            meeting_location: "downtown".into(),
            instructions: None,
        },
        protocol_fee_percentage: SpreadPreference::Best.fee_percent(),
        protocol_fee_amount: Decimal::ZERO,
        escrow_tx_hash: None,
        release_tx_hash: None,
        refund_tx_hash: None,
        escrow_debited_kind: None,
        escrow_debited_id: None,
        escrow_debited_amount: None,
        created_at: now,
        updated_at: now,
        expires_at: now + Duration::minutes(30),
        accepted_at: None,
        escrowed_at: None,
        payment_sent_at: None,
        payment_confirmed_at: None,
        completed_at: None,
        cancelled_at: None,
    }
}

async fn fund(pool: &PgPool, party: PartyRef, currency: &str, amount: Decimal, order_id: OrderId) {
    let mut conn = pool.acquire().await.unwrap();
    credit(&mut conn, order_id, party, currency, amount, EntryKind::Fee)
        .await
        .unwrap();
}

#[sqlx::test(migrations = "../../migrations")]
async fn happy_path_buy_locks_escrows_and_releases_net_of_fee(pool: PgPool) {
    let merchant_id = Uuid::new_v4();
    let mut order = seed_order(OrderType::Buy, Some(merchant_id));
    order.status = OrderStatus::Accepted;

    {
        let mut conn = pool.acquire().await.unwrap();
        orders::insert(&mut conn, &order).await.unwrap();
    }
    fund(&pool, PartyRef::merchant(merchant_id), "USDT", Decimal::new(100000, 2), order.id).await;

    let escrowed = escrow::lock_escrow(&pool, order.id, Actor::System, Some(1)).await.unwrap();
    assert_eq!(escrowed.status, OrderStatus::Escrowed);
    assert!(escrowed.escrow_tx_hash.is_some());

    // payment_confirmed -> completed directly (releasing is optional).
    {
        let mut conn = pool.acquire().await.unwrap();
        sqlx::query("UPDATE orders SET status = 'payment_confirmed' WHERE id = $1")
            .bind(order.id.0)
            .execute(&mut *conn)
            .await
            .unwrap();
    }

    let completed = escrow::release_escrow(&pool, order.id, Actor::System, OrderStatus::Completed, None)
        .await
        .unwrap();
    assert_eq!(completed.status, OrderStatus::Completed);
    assert!(completed.release_tx_hash.is_some());

    // 2% fee ("best") on 100.00 USDT -> 98.00 net to the user.
    let mut conn = pool.acquire().await.unwrap();
    let (balance,): (Decimal,) = sqlx::query_as(
        "SELECT balance FROM party_balances WHERE party_kind = 'user' AND party_id = $1 AND currency = 'USDT'",
    )
    .bind(order.user_id)
    .fetch_one(&mut *conn)
    .await
    .unwrap();
    assert_eq!(balance, Decimal::new(9800, 2));
}

#[sqlx::test(migrations = "../../migrations")]
async fn cancel_after_escrow_refunds_the_debited_party(pool: PgPool) {
    let mut order = seed_order(OrderType::Sell, Some(Uuid::new_v4()));
    order.escrow_tx_hash = Some(settlement_core_types::TxHash::mock(order.id, "escrow_lock"));
    order.escrow_debited_kind = Some(settlement_core_types::PartyKind::User);
    order.escrow_debited_id = Some(order.user_id);
    order.escrow_debited_amount = Some(order.crypto_amount);

    {
        let mut conn = pool.acquire().await.unwrap();
        orders::insert(&mut conn, &order).await.unwrap();
        // Seed the balance as if lock_escrow had already run the debit.
        sqlx::query(
            "INSERT INTO party_balances (party_kind, party_id, currency, balance) VALUES ('user', $1, 'USDT', -100.00)",
        )
        .bind(order.user_id)
        .execute(&mut *conn)
        .await
        .unwrap();
    }

    let cancelled = escrow::refund_escrow(&pool, order.id, Actor::User { id: order.user_id }, OrderStatus::Cancelled, Some(1))
        .await
        .unwrap();
    assert_eq!(cancelled.status, OrderStatus::Cancelled);
    assert!(cancelled.refund_tx_hash.is_some());

    let mut conn = pool.acquire().await.unwrap();
    let (balance,): (Decimal,) = sqlx::query_as(
        "SELECT balance FROM party_balances WHERE party_kind = 'user' AND party_id = $1 AND currency = 'USDT'",
    )
    .bind(order.user_id)
    .fetch_one(&mut *conn)
    .await
    .unwrap();
    assert_eq!(balance, Decimal::ZERO);
}

#[sqlx::test(migrations = "../../migrations")]
async fn double_release_is_rejected_by_the_second_caller(pool: PgPool) {
    let merchant_id = Uuid::new_v4();
    let mut order = seed_order(OrderType::Buy, Some(merchant_id));
    order.status = OrderStatus::PaymentConfirmed;
    order.escrow_tx_hash = Some(settlement_core_types::TxHash::mock(order.id, "escrow_lock"));

    {
        let mut conn = pool.acquire().await.unwrap();
        orders::insert(&mut conn, &order).await.unwrap();
    }
    fund(&pool, PartyRef::merchant(merchant_id), "USDT", Decimal::new(100000, 2), order.id).await;

    let first = escrow::release_escrow(&pool, order.id, Actor::System, OrderStatus::Completed, Some(1))
        .await
        .unwrap();
    assert_eq!(first.status, OrderStatus::Completed);

    // Same expected_version again: the order has already moved on, so this
    // is a version conflict rather than a second release.
    let second = escrow::release_escrow(&pool, order.id, Actor::System, OrderStatus::Completed, Some(1)).await;
    assert!(second.is_err());
}

#[sqlx::test(migrations = "../../migrations")]
async fn expiry_sweep_candidate_has_no_escrow_to_refund(pool: PgPool) {
    let mut order = seed_order(OrderType::Sell, None);
    order.status = OrderStatus::Accepted;
    order.expires_at = Utc::now() - Duration::minutes(1);

    {
        let mut conn = pool.acquire().await.unwrap();
        orders::insert(&mut conn, &order).await.unwrap();
    }

    let expired = escrow::refund_escrow(&pool, order.id, Actor::System, OrderStatus::Expired, Some(1))
        .await
        .unwrap();
    assert_eq!(expired.status, OrderStatus::Expired);
    assert!(expired.refund_tx_hash.is_none());
}

#[sqlx::test(migrations = "../../migrations")]
async fn dispute_split_pays_both_sides_and_resolves(pool: PgPool) {
    let merchant_id = Uuid::new_v4();
    let mut order = seed_order(OrderType::Sell, Some(merchant_id));
    order.escrow_tx_hash = Some(settlement_core_types::TxHash::mock(order.id, "escrow_lock"));

    {
        let mut conn = pool.acquire().await.unwrap();
        orders::insert(&mut conn, &order).await.unwrap();
    }

    let user = Actor::User { id: order.user_id };
    let merchant = Actor::Merchant { id: merchant_id };

    dispute::open_dispute(&pool, order.id, user, "item not as described".into(), Some(1))
        .await
        .unwrap();

    dispute::propose_resolution(
        &pool,
        order.id,
        user,
        Resolution::Split { user_bps: 6_000, merchant_bps: 4_000 },
    )
    .await
    .unwrap();

    let resolved = dispute::confirm_resolution(&pool, order.id, merchant).await.unwrap();
    assert!(resolved.ready_to_resolve() || resolved.resolution.is_some());

    let finalized = dispute::finalize_disputed_order(&pool, order.id, OrderStatus::Completed, Some(2))
        .await
        .unwrap();
    assert_eq!(finalized.status, OrderStatus::Completed);

    let mut conn = pool.acquire().await.unwrap();
    let (user_balance,): (Decimal,) = sqlx::query_as(
        "SELECT balance FROM party_balances WHERE party_kind = 'user' AND party_id = $1 AND currency = 'USDT'",
    )
    .bind(order.user_id)
    .fetch_one(&mut *conn)
    .await
    .unwrap();
    assert_eq!(user_balance, Decimal::new(6000, 2));
}

#[sqlx::test(migrations = "../../migrations")]
async fn sell_order_payer_and_receiver_are_remapped_to_the_real_fiat_parties(pool: PgPool) {
    let merchant_id = Uuid::new_v4();
    let order = seed_order(OrderType::Sell, Some(merchant_id));

    {
        let mut conn = pool.acquire().await.unwrap();
        orders::insert(&mut conn, &order).await.unwrap();
    }

    let user = Actor::User { id: order.user_id };
    let merchant = Actor::Merchant { id: merchant_id };

    // On a sell order the merchant pays fiat, so only the merchant may mark
    // payment sent even though `mark_payment_sent`'s literal caller role is
    // usually the user on a buy order.
    assert!(lifecycle::mark_payment_sent(&pool, order.id, user, Some(1)).await.is_err());
    let sent = lifecycle::mark_payment_sent(&pool, order.id, merchant, Some(1)).await.unwrap();
    assert_eq!(sent.status, OrderStatus::PaymentSent);
    assert!(sent.payment_sent_at.is_some());

    // The user is the fiat receiver on a sell order.
    assert!(lifecycle::confirm_payment(&pool, order.id, merchant, Some(2)).await.is_err());
    let confirmed = lifecycle::confirm_payment(&pool, order.id, user, Some(2)).await.unwrap();
    assert_eq!(confirmed.status, OrderStatus::PaymentConfirmed);
    assert!(confirmed.payment_confirmed_at.is_some());
}

#[sqlx::test(migrations = "../../migrations")]
async fn either_real_party_can_drive_their_own_completed_release(pool: PgPool) {
    let merchant_id = Uuid::new_v4();
    let mut order = seed_order(OrderType::Buy, Some(merchant_id));
    order.status = OrderStatus::PaymentConfirmed;
    order.escrow_tx_hash = Some(settlement_core_types::TxHash::mock(order.id, "escrow_lock"));

    {
        let mut conn = pool.acquire().await.unwrap();
        orders::insert(&mut conn, &order).await.unwrap();
    }
    fund(&pool, PartyRef::merchant(merchant_id), "USDT", Decimal::new(100000, 2), order.id).await;

    let completed = escrow::release_escrow(
        &pool,
        order.id,
        Actor::User { id: order.user_id },
        OrderStatus::Completed,
        Some(1),
    )
    .await
    .unwrap();
    assert_eq!(completed.status, OrderStatus::Completed);
    assert!(completed.completed_at.is_some());
}

#[sqlx::test(migrations = "../../migrations")]
async fn refund_pays_the_party_actually_debited_even_after_merchant_is_reassigned(pool: PgPool) {
    let original_merchant = Uuid::new_v4();
    let mut order = seed_order(OrderType::Buy, Some(original_merchant));
    order.status = OrderStatus::Accepted;

    {
        let mut conn = pool.acquire().await.unwrap();
        orders::insert(&mut conn, &order).await.unwrap();
    }
    fund(&pool, PartyRef::merchant(original_merchant), "USDT", Decimal::new(100000, 2), order.id).await;

    let escrowed = escrow::lock_escrow(&pool, order.id, settlement_core_types::Actor::System, Some(1))
        .await
        .unwrap();
    assert_eq!(escrowed.escrow_debited_id, Some(original_merchant));

    // Reassign the merchant on the row directly, simulating a later
    // dispatch change unrelated to who actually funded the escrow.
    let reassigned_merchant = Uuid::new_v4();
    {
        let mut conn = pool.acquire().await.unwrap();
        sqlx::query("UPDATE orders SET merchant_id = $1 WHERE id = $2")
            .bind(reassigned_merchant)
            .bind(order.id.0)
            .execute(&mut *conn)
            .await
            .unwrap();
    }

    let refunded = escrow::refund_escrow(&pool, order.id, Actor::System, OrderStatus::Cancelled, Some(2))
        .await
        .unwrap();
    assert!(refunded.refund_tx_hash.is_some());
    assert!(refunded.cancelled_at.is_some());

    let mut conn = pool.acquire().await.unwrap();
    let (original_balance,): (Decimal,) = sqlx::query_as(
        "SELECT balance FROM party_balances WHERE party_kind = 'merchant' AND party_id = $1 AND currency = 'USDT'",
    )
    .bind(original_merchant)
    .fetch_one(&mut *conn)
    .await
    .unwrap();
    // Debited 100.00 at lock time, refunded the same 100.00 — back to the
    // 1000.00 it was funded with.
    assert_eq!(original_balance, Decimal::new(100000, 2));

    let reassigned_balance: Option<(Decimal,)> = sqlx::query_as(
        "SELECT balance FROM party_balances WHERE party_kind = 'merchant' AND party_id = $1 AND currency = 'USDT'",
    )
    .bind(reassigned_merchant)
    .fetch_optional(&mut *conn)
    .await
    .unwrap();
    assert!(reassigned_balance.is_none());
}

#[sqlx::test(migrations = "../../migrations")]
async fn dispute_user_wins_cancels_the_order_instead_of_completing_it(pool: PgPool) {
    let merchant_id = Uuid::new_v4();
    let order = seed_order(OrderType::Sell, Some(merchant_id));

    {
        let mut conn = pool.acquire().await.unwrap();
        orders::insert(&mut conn, &order).await.unwrap();
    }

    let user = Actor::User { id: order.user_id };
    let merchant = Actor::Merchant { id: merchant_id };

    dispute::open_dispute(&pool, order.id, user, "never received funds".into(), Some(1))
        .await
        .unwrap();
    dispute::propose_resolution(&pool, order.id, user, Resolution::UserWins).await.unwrap();
    let resolved = dispute::confirm_resolution(&pool, order.id, merchant).await.unwrap();
    let resolution = resolved.resolution.expect("both sides confirmed");

    let finalized =
        dispute::finalize_disputed_order(&pool, order.id, resolution.target_status(), Some(2)).await.unwrap();
    assert_eq!(finalized.status, OrderStatus::Cancelled);
}

#[sqlx::test(migrations = "../../migrations")]
async fn rejecting_a_proposed_resolution_reverts_the_dispute_to_open(pool: PgPool) {
    let merchant_id = Uuid::new_v4();
    let order = seed_order(OrderType::Sell, Some(merchant_id));

    {
        let mut conn = pool.acquire().await.unwrap();
        orders::insert(&mut conn, &order).await.unwrap();
    }

    let user = Actor::User { id: order.user_id };

    dispute::open_dispute(&pool, order.id, user, "disagree on item condition".into(), Some(1))
        .await
        .unwrap();
    dispute::propose_resolution(&pool, order.id, user, Resolution::MerchantWins).await.unwrap();

    let reverted = dispute::reject_resolution(&pool, order.id).await.unwrap();
    assert_eq!(reverted.status, settlement_core_types::DisputeStatus::Open);
    assert!(reverted.proposed_resolution.is_none());
    assert!(!reverted.user_confirmed);
    assert!(!reverted.merchant_confirmed);
}
