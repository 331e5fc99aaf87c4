//! Repositories for the follow tables.

mod follow;
mod followable_state;
mod followed_history;

pub use follow::FollowRepository;
pub use followable_state::FollowableStateRepository;
pub use followed_history::FollowedHistoryRepository;
