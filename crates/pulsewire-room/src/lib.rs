//! Room membership for Pulsewire.
//!
//! A room is nothing but the set of connections currently subscribed to
//! it. There is no room object: a room exists while it has members and
//! is forgotten when its last member leaves.
//!
//! # Key types
//!
//! - [`RoomIndex`]: the two-way connection ↔ room index
//! - [`Authorizer`]: decides whether an identity may follow an entity
//! - [`RoomError`]: command-level failures (invalid room, unauthorized)

#![allow(async_fn_in_trait)]

mod access;
mod error;
mod index;

pub use access::{AllowAll, Authorizer};
pub use error::RoomError;
pub use index::RoomIndex;
