//! Follow engine services.

pub mod aggregation;
pub mod follow_graph;
pub mod resolution;

pub use aggregation::{AggregationService, Extremum, FollowerTally};
pub use follow_graph::{FollowGraphService, FollowOutcome, Refusal, UnfollowOutcome, UnfollowReport};
pub use resolution::resolve_all;
