pub mod db;
pub mod dispute;
pub mod escrow;
pub mod events;
pub mod idempotency;
pub mod lifecycle;
pub mod outbox;
pub mod orders;
pub mod transitions;

pub use db::Store;
pub use escrow::platform_account;
pub use transitions::{apply_transition, no_effects, Effects, TransitionRequest};

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, Utc};
    use rust_decimal::Decimal;
    use settlement_core_types::{
        Order, OrderId, OrderStatus, OrderType, PaymentDetails, SpreadPreference,
    };
    use uuid::Uuid;

    fn sample_order() -> Order {
        let now = Utc::now();
        Order {
            id: OrderId::new(),
            order_number: "20260101-000001".into(),
            order_type: OrderType::Sell,
            status: OrderStatus::Pending,
            order_version: 1,
            offer_id: Uuid::new_v4(),
            user_id: Uuid::new_v4(),
            merchant_id: None,
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

    #[test]
    fn is_expired_respects_terminal_states() {
        let mut order = sample_order();
        let later = order.expires_at + Duration::seconds(1);
        assert!(order.is_expired(later));
        order.status = OrderStatus::Completed;
        assert!(!order.is_expired(later));
    }

    #[test]
    fn minimal_status_matches_statemachine_projection() {
        let order = sample_order();
        assert_eq!(
            order.minimal_status(),
            settlement_core_statemachine::minimal_status(order.status)
        );
    }
}
