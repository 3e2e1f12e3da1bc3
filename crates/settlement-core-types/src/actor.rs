use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Polymorphic actor: the identity driving a
/// lifecycle mutation. State-machine authorization is a pure
/// `Actor -> OrderStatus -> bool` (see `settlement-core-statemachine::authorized`).
#[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Debug)]
#[serde(tag = "actor_type", rename_all = "lowercase")]
pub enum Actor {
    User { id: Uuid },
    Merchant { id: Uuid },
    System,
}

impl Actor {
    pub fn role(&self) -> ActorRole {
        match self {
            Actor::User { .. } => ActorRole::User,
            Actor::Merchant { .. } => ActorRole::Merchant,
            Actor::System => ActorRole::System,
        }
    }

    pub fn id(&self) -> Option<Uuid> {
        match self {
            Actor::User { id } | Actor::Merchant { id } => Some(*id),
            Actor::System => None,
        }
    }
}

impl fmt::Display for Actor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Actor::User { id } => write!(f, "user:{id}"),
            Actor::Merchant { id } => write!(f, "merchant:{id}"),
            Actor::System => write!(f, "system"),
        }
    }
}

/// The three roles the authorization matrix is keyed on.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Debug)]
#[serde(rename_all = "lowercase")]
pub enum ActorRole {
    User,
    Merchant,
    System,
}

impl fmt::Display for ActorRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ActorRole::User => write!(f, "user"),
            ActorRole::Merchant => write!(f, "merchant"),
            ActorRole::System => write!(f, "system"),
        }
    }
}
