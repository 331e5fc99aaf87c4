//! Database entities.

#![allow(missing_docs)]

pub mod follow;
pub mod followable_state;
pub mod followed_history;

pub use follow::Entity as Follow;
pub use followable_state::Entity as FollowableState;
pub use followed_history::Entity as FollowedHistory;
