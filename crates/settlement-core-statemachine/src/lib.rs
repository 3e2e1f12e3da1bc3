//! Pure order lifecycle state machine. No I/O, no async:
//! every function here is a total, side-effect-free projection over
//! `OrderStatus` and `Actor`. Callers (`settlement-core-store::apply_transition`)
//! own the transaction boundary; this crate only answers "is this move legal".

use settlement_core_types::{
    Actor, ActorRole, MinimalStatus, OrderError, OrderStatus, OrderType, Result,
};

/// The full source -> targets transition table. `payment_pending` has no
/// entries because no transition produces or consumes it today.
fn allowed_targets(from: OrderStatus) -> &'static [OrderStatus] {
    use OrderStatus::*;
    match from {
        Pending => &[Accepted, Cancelled, Expired],
        Accepted => &[EscrowPending, Escrowed, Cancelled, Expired],
        EscrowPending => &[Escrowed, Cancelled],
        Escrowed => &[PaymentSent, Disputed, Cancelled, Expired],
        PaymentPending => &[],
        PaymentSent => &[PaymentConfirmed, Disputed, Cancelled],
        PaymentConfirmed => &[Releasing, Completed, Disputed],
        Releasing => &[Completed, Disputed],
        Completed | Cancelled | Expired => &[],
        Disputed => &[Completed, Cancelled],
    }
}

/// Which roles may drive a given `from -> to` edge. Unlisted edges are
/// unreachable via `allowed_targets` anyway; this only narrows edges that
/// exist in the transition table.
fn allowed_actors(from: OrderStatus, to: OrderStatus) -> &'static [ActorRole] {
    use OrderStatus::*;
    match (from, to) {
        (Pending, Accepted) => &[ActorRole::Merchant, ActorRole::System],
        (Pending, Cancelled) => &[ActorRole::User, ActorRole::Merchant, ActorRole::System],
        (Pending, Expired) => &[ActorRole::System],

        (Accepted, EscrowPending) => &[ActorRole::User, ActorRole::System],
        (Accepted, Escrowed) => &[ActorRole::System],
        (Accepted, Cancelled) => &[ActorRole::User, ActorRole::Merchant, ActorRole::System],
        (Accepted, Expired) => &[ActorRole::System],

        (EscrowPending, Escrowed) => &[ActorRole::System],
        (EscrowPending, Cancelled) => &[ActorRole::User, ActorRole::Merchant, ActorRole::System],

        // The matrix is keyed on the canonical payer/receiver role, not the
        // literal actor role: `payer_role`/`receiver_role` below remap the
        // genuine fiat payer (buy => user, sell => merchant) onto
        // `ActorRole::User` before this table is consulted, so it reads as
        // "the payer" and "the receiver" regardless of order_type.
        (Escrowed, PaymentSent) => &[ActorRole::User],
        (Escrowed, Disputed) => &[ActorRole::User, ActorRole::Merchant],
        (Escrowed, Cancelled) => &[ActorRole::User, ActorRole::Merchant, ActorRole::System],
        (Escrowed, Expired) => &[ActorRole::System],

        (PaymentSent, PaymentConfirmed) => &[ActorRole::Merchant],
        (PaymentSent, Disputed) => &[ActorRole::User, ActorRole::Merchant],
        (PaymentSent, Cancelled) => &[ActorRole::User, ActorRole::Merchant, ActorRole::System],

        (PaymentConfirmed, Releasing) => &[ActorRole::System],
        (PaymentConfirmed, Completed) => &[ActorRole::User, ActorRole::Merchant, ActorRole::System],
        (PaymentConfirmed, Disputed) => &[ActorRole::User, ActorRole::Merchant],

        (Releasing, Completed) => &[ActorRole::User, ActorRole::Merchant, ActorRole::System],
        (Releasing, Disputed) => &[ActorRole::User, ActorRole::Merchant],

        (Disputed, Completed) => &[ActorRole::System],
        (Disputed, Cancelled) => &[ActorRole::System],

        _ => &[],
    }
}

/// The role a `check_transition` caller should be treated as for edges keyed
/// on "the fiat payer" (`Escrowed -> PaymentSent`). The payer is the user on
/// a buy order (paying fiat for crypto) and the merchant on a sell order
/// (paying fiat to the user in exchange for the user's crypto). A caller
/// whose real role doesn't match either slot is mapped to `System`, which
/// this edge never authorizes, so it's rejected rather than silently let
/// through.
pub fn payer_role(order_type: OrderType, actor: &Actor) -> ActorRole {
    let payer_matches = match order_type {
        OrderType::Buy => matches!(actor, Actor::User { .. }),
        OrderType::Sell => matches!(actor, Actor::Merchant { .. }),
    };
    if payer_matches {
        ActorRole::User
    } else if matches!(actor, Actor::System) {
        ActorRole::System
    } else {
        ActorRole::Merchant
    }
}

/// The counterpart of `payer_role` for edges keyed on "the fiat receiver"
/// (`PaymentSent -> PaymentConfirmed`): the merchant on a buy order, the
/// user on a sell order.
pub fn receiver_role(order_type: OrderType, actor: &Actor) -> ActorRole {
    let receiver_matches = match order_type {
        OrderType::Buy => matches!(actor, Actor::Merchant { .. }),
        OrderType::Sell => matches!(actor, Actor::User { .. }),
    };
    if receiver_matches {
        ActorRole::Merchant
    } else if matches!(actor, Actor::System) {
        ActorRole::System
    } else {
        ActorRole::User
    }
}

/// True if `from -> to` appears in the transition table at all, regardless
/// of actor.
pub fn is_valid_transition(from: OrderStatus, to: OrderStatus) -> bool {
    allowed_targets(from).contains(&to)
}

/// True if `actor` may drive `from -> to`. Implies `is_valid_transition`.
pub fn is_authorized(actor: &Actor, from: OrderStatus, to: OrderStatus) -> bool {
    allowed_actors(from, to).contains(&actor.role())
}

/// Validate and authorize a transition in one call, producing the precise
/// error the API boundary reports. Authorizes against `actor`'s own role
/// directly — callers on edges where the canonical matrix role isn't the
/// literal caller role (payment_sent/payment_confirmed) should go through
/// `check_transition_as` instead.
pub fn check_transition(actor: &Actor, from: OrderStatus, to: OrderStatus) -> Result<()> {
    check_transition_as(actor.role(), actor, from, to)
}

/// Same as `check_transition`, but authorizes against an explicit `role`
/// rather than `actor.role()` — lets a caller be judged as "the payer" or
/// "the receiver" (see `payer_role`/`receiver_role`) while `actor` is still
/// carried through for the `Forbidden` error message and audit logging.
pub fn check_transition_as(role: ActorRole, actor: &Actor, from: OrderStatus, to: OrderStatus) -> Result<()> {
    if from.is_terminal() {
        return Err(OrderError::OrderTerminal(from.to_string()));
    }
    if !is_valid_transition(from, to) {
        return Err(OrderError::InvalidTransition {
            from: from.to_string(),
            to: to.to_string(),
        });
    }
    if !allowed_actors(from, to).contains(&role) {
        return Err(OrderError::Forbidden {
            actor: actor.to_string(),
            target: to.to_string(),
        });
    }
    Ok(())
}

/// Projection used by read APIs that don't need the full internal status
/// set.
pub fn minimal_status(status: OrderStatus) -> MinimalStatus {
    status.into()
}

#[cfg(test)]
mod tests {
    use super::*;
    use settlement_core_types::OrderStatus::*;
    use uuid::Uuid;

    fn user() -> Actor {
        Actor::User { id: Uuid::new_v4() }
    }
    fn merchant() -> Actor {
        Actor::Merchant { id: Uuid::new_v4() }
    }
    fn system() -> Actor {
        Actor::System
    }

    #[test]
    fn terminal_states_accept_nothing() {
        for terminal in [Completed, Cancelled, Expired] {
            assert!(allowed_targets(terminal).is_empty());
            assert!(check_transition(&system(), terminal, Accepted).is_err());
        }
    }

    #[test]
    fn payment_pending_is_unreachable() {
        assert!(allowed_targets(PaymentPending).is_empty());
    }

    #[test]
    fn merchant_accepts_pending_order() {
        assert!(check_transition(&merchant(), Pending, Accepted).is_ok());
    }

    #[test]
    fn user_cannot_accept_their_own_order() {
        assert!(matches!(
            check_transition(&user(), Pending, Accepted),
            Err(OrderError::Forbidden { .. })
        ));
    }

    #[test]
    fn only_user_marks_payment_sent() {
        assert!(check_transition(&user(), Escrowed, PaymentSent).is_ok());
        assert!(check_transition(&merchant(), Escrowed, PaymentSent).is_err());
        assert!(check_transition(&system(), Escrowed, PaymentSent).is_err());
    }

    #[test]
    fn only_merchant_confirms_payment() {
        assert!(check_transition(&merchant(), PaymentSent, PaymentConfirmed).is_ok());
        assert!(check_transition(&user(), PaymentSent, PaymentConfirmed).is_err());
    }

    #[test]
    fn either_party_can_open_a_dispute_from_escrowed() {
        assert!(check_transition(&user(), Escrowed, Disputed).is_ok());
        assert!(check_transition(&merchant(), Escrowed, Disputed).is_ok());
        assert!(check_transition(&system(), Escrowed, Disputed).is_err());
    }

    #[test]
    fn releasing_to_completed_is_system_driven_and_optional() {
        // payment_confirmed can skip releasing and go straight to completed.
        assert!(check_transition(&system(), PaymentConfirmed, Completed).is_ok());
        assert!(check_transition(&system(), PaymentConfirmed, Releasing).is_ok());
        assert!(check_transition(&system(), Releasing, Completed).is_ok());
    }

    #[test]
    fn a_real_party_can_release_their_own_escrow() {
        assert!(check_transition(&user(), PaymentConfirmed, Completed).is_ok());
        assert!(check_transition(&merchant(), Releasing, Completed).is_ok());
    }

    #[test]
    fn merchant_can_cancel_before_escrow_and_user_can_cancel_after_payment_sent() {
        assert!(check_transition(&merchant(), Pending, Cancelled).is_ok());
        assert!(check_transition(&merchant(), EscrowPending, Cancelled).is_ok());
        assert!(check_transition(&user(), PaymentSent, Cancelled).is_ok());
    }

    #[test]
    fn payer_role_tracks_the_genuine_fiat_payer_not_the_literal_caller() {
        let buyer = user();
        let seller_merchant = merchant();
        assert_eq!(payer_role(OrderType::Buy, &buyer), ActorRole::User);
        assert_eq!(payer_role(OrderType::Buy, &seller_merchant), ActorRole::Merchant);
        assert_eq!(payer_role(OrderType::Sell, &seller_merchant), ActorRole::User);
        assert_eq!(payer_role(OrderType::Sell, &buyer), ActorRole::Merchant);
    }

    #[test]
    fn sell_order_merchant_is_the_payer_and_may_mark_payment_sent() {
        let m = merchant();
        let role = payer_role(OrderType::Sell, &m);
        assert!(check_transition_as(role, &m, Escrowed, PaymentSent).is_ok());

        // The user on a sell order is the receiver, not the payer.
        let u = user();
        let role = payer_role(OrderType::Sell, &u);
        assert!(check_transition_as(role, &u, Escrowed, PaymentSent).is_err());
    }

    #[test]
    fn sell_order_user_is_the_receiver_and_may_confirm_payment() {
        let u = user();
        let role = receiver_role(OrderType::Sell, &u);
        assert!(check_transition_as(role, &u, PaymentSent, PaymentConfirmed).is_ok());

        let m = merchant();
        let role = receiver_role(OrderType::Sell, &m);
        assert!(check_transition_as(role, &m, PaymentSent, PaymentConfirmed).is_err());
    }

    #[test]
    fn system_actor_never_satisfies_payer_or_receiver_role() {
        assert_eq!(payer_role(OrderType::Buy, &system()), ActorRole::System);
        assert_eq!(receiver_role(OrderType::Sell, &system()), ActorRole::System);
    }

    #[test]
    fn unknown_edge_is_invalid_not_forbidden() {
        assert!(matches!(
            check_transition(&system(), Pending, Completed),
            Err(OrderError::InvalidTransition { .. })
        ));
    }

    #[test]
    fn minimal_status_collapses_escrow_substates() {
        assert_eq!(minimal_status(Accepted), MinimalStatus::Accepted);
        assert_eq!(minimal_status(EscrowPending), MinimalStatus::Accepted);
        assert_eq!(minimal_status(Escrowed), MinimalStatus::Escrowed);
        assert_eq!(minimal_status(PaymentPending), MinimalStatus::Escrowed);
        assert_eq!(minimal_status(Releasing), MinimalStatus::Completed);
        assert_eq!(minimal_status(Completed), MinimalStatus::Completed);
    }

    #[test]
    fn every_non_terminal_state_can_reach_a_terminal_state() {
        // payment_pending is the one named state with no outgoing edges at
        // all (see module docs); everything else must have some path, direct
        // or via `disputed`, to completed/cancelled/expired.
        for status in OrderStatus::ALL {
            if status.is_terminal() || status == PaymentPending {
                continue;
            }
            let targets = allowed_targets(status);
            assert!(!targets.is_empty(), "{status} is a dead end");
            let reaches_terminal = targets.iter().any(|t| t.is_terminal() || *t == Disputed);
            assert!(reaches_terminal, "{status} has no path toward a terminal state");
        }
    }
}
