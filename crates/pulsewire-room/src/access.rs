//! Access checks for room joins.
//!
//! Whether a user may follow `meeting-123` depends on who owns meeting
//! 123, which only the application's data layer knows. The server asks
//! an [`Authorizer`] before every join and never decides on its own.

use pulsewire_protocol::RoomKind;
use pulsewire_session::Identity;

/// Decides whether an identity may subscribe to one entity's room.
///
/// Implementations typically look the entity up and compare its owner
/// or team with `identity.user_id`. Lookup failures should answer
/// `false`.
pub trait Authorizer: Send + Sync + 'static {
    fn can_join(
        &self,
        identity: &Identity,
        kind: RoomKind,
        entity_id: &str,
    ) -> impl std::future::Future<Output = bool> + Send;
}

/// Lets every admitted identity join every room.
///
/// For local development and demos only. A production server must be
/// built with an authorizer that checks ownership.
#[derive(Debug, Clone, Copy, Default)]
pub struct AllowAll;

impl Authorizer for AllowAll {
    async fn can_join(
        &self,
        _identity: &Identity,
        _kind: RoomKind,
        _entity_id: &str,
    ) -> bool {
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_allow_all_admits_any_entity() {
        let identity = Identity::new("u-1");
        assert!(AllowAll.can_join(&identity, RoomKind::Meeting, "123").await);
        assert!(AllowAll.can_join(&identity, RoomKind::Batch, "x").await);
    }
}
