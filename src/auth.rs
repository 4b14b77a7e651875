//! Capability checks for the authenticated actor. The HTTP layer trusts an
//! upstream gateway to inject the identity; everything below works against
//! this one type instead of scattering role checks across handlers.

use uuid::Uuid;

use crate::error::{AppError, Result};
use crate::models::{Booking, Chat, UserRole};

/// Verified identity of the caller, as injected by the auth gateway.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Actor {
    pub id: Uuid,
    pub role: UserRole,
}

impl Actor {
    pub fn new(id: Uuid, role: UserRole) -> Self {
        Self { id, role }
    }

    pub fn is_admin(&self) -> bool {
        self.role.is_admin()
    }
}

/// Booking participants and admins may read a booking.
pub fn can_access_booking(actor: &Actor, booking: &Booking) -> bool {
    actor.is_admin() || booking.customer_id == actor.id || booking.provider_id == actor.id
}

/// The same set may update a booking's status fields.
pub fn can_modify_booking(actor: &Actor, booking: &Booking) -> bool {
    can_access_booking(actor, booking)
}

/// Admins and chat participants may read a chat; only participants may post.
pub fn can_view_chat(actor: &Actor, chat: &Chat) -> bool {
    actor.is_admin() || chat.is_participant(actor.id)
}

pub fn can_post_message(actor: &Actor, chat: &Chat) -> bool {
    !actor.is_admin() && chat.is_participant(actor.id)
}

/// A review may be written by the booking's customer, or by an admin acting
/// on that customer's behalf.
pub fn can_review_booking(actor: &Actor, booking: &Booking) -> bool {
    actor.is_admin() || booking.customer_id == actor.id
}

/// Wallet operations act on the caller's own account unless the caller is an
/// admin.
pub fn ensure_own_account(actor: &Actor, account_id: Uuid) -> Result<()> {
    if actor.is_admin() || actor.id == account_id {
        Ok(())
    } else {
        Err(AppError::Forbidden(
            "cannot operate on another user's wallet".to_string(),
        ))
    }
}
