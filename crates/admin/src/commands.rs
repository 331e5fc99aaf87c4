//! Command execution against a follow graph.

use std::io::Write;
use std::sync::Arc;

use followable_common::{AppError, AppResult, ResolutionPolicy};
use followable_core::{
    AggregationService, EntityKey, Extremum, FollowGraphService, FollowOutcome, FollowState,
    FollowerTally, RegisteredEntityResolver, RelationshipStore, Refusal, TypeRegistry,
    UnfollowOutcome, UnfollowReport,
};
use serde::Serialize;
use tracing::info;

use crate::cli::{Commands, OutputFormat};

type Resolver<S> = RegisteredEntityResolver<S>;

/// Services a command runs against.
pub struct Context<S> {
    graph: FollowGraphService<S, Resolver<S>>,
    stats: AggregationService<S, Resolver<S>>,
    format: OutputFormat,
}

impl<S: RelationshipStore> Context<S> {
    /// Build the services over `store`.
    pub fn new(
        store: Arc<S>,
        registry: TypeRegistry,
        policy: ResolutionPolicy,
        format: OutputFormat,
    ) -> Self {
        let resolver = Arc::new(RegisteredEntityResolver::new(store.clone()));
        Self {
            graph: FollowGraphService::new(store.clone(), resolver.clone(), Arc::new(registry))
                .with_policy(policy),
            stats: AggregationService::new(store, resolver).with_policy(policy),
            format,
        }
    }

    /// Run one command and write its result to `out`.
    pub async fn execute(&self, command: Commands, out: &mut impl Write) -> AppResult<()> {
        let report = match command {
            Commands::Migrate => {
                return Err(AppError::Internal(
                    "migrations need a database connection".to_string(),
                ));
            }
            Commands::Register { entities } => {
                for entity in &entities {
                    self.graph.register(entity).await?;
                }
                info!(count = entities.len(), "Registered entities");
                Report::Keys(entities)
            }
            Commands::Forget { entities } => {
                for entity in &entities {
                    self.graph.forget(entity).await?;
                }
                info!(count = entities.len(), "Forgot entities");
                Report::Keys(entities)
            }
            Commands::Follow { follower, followee } => {
                Report::Follow(self.graph.follow(&follower, &followee).await?)
            }
            Commands::Unfollow {
                follower,
                followees,
                all,
            } => {
                let report = if all {
                    self.graph.unfollow_everyone(&follower).await?
                } else {
                    self.graph.unfollow(&follower, followees).await?
                };
                Report::Unfollow(report)
            }
            Commands::Authorize {
                entity,
                types,
                unset,
                following,
            } => {
                let state = match (types.is_empty(), unset, following) {
                    (true, _, _) => self.graph.authorization(&entity).await?,
                    (false, false, false) => self.graph.set_authorization(&entity, types).await?,
                    (false, true, false) => self.graph.unset_authorization(&entity, types).await?,
                    (false, false, true) => {
                        self.graph.set_follow_restriction(&entity, types).await?
                    }
                    (false, true, true) => {
                        self.graph.unset_follow_restriction(&entity, types).await?
                    }
                };
                Report::State(state)
            }
            Commands::Followers { entity, by, count } => {
                let by = by.map(|name| self.graph.registry().lookup(&name)).transpose()?;
                match (by, count) {
                    (None, true) => Report::Count(self.stats.followers_count(&entity).await?),
                    (Some(tag), true) => Report::Count(
                        self.stats.followers_count_by_type(&entity, &tag).await?,
                    ),
                    (None, false) => Report::Keys(self.stats.all_followers(&entity).await?),
                    (Some(tag), false) => {
                        Report::Keys(self.stats.followers_by_type(&entity, &tag).await?)
                    }
                }
            }
            Commands::Followees { entity, by } => {
                match by.map(|name| self.graph.registry().lookup(&name)).transpose()? {
                    Some(tag) => Report::Keys(self.stats.followees_by_type(&entity, &tag).await?),
                    None => Report::Keys(self.stats.all_followees(&entity).await?),
                }
            }
            Commands::History { entity } => Report::Keys(self.graph.ever_followed(&entity).await?),
            Commands::Common { a, b } => {
                Report::Keys(self.stats.common_followers_with(&a, &b).await?)
            }
            Commands::Extremes { type_name, by, min } => {
                let registry = self.graph.registry();
                let tag = registry.lookup(&type_name)?;
                let by = by.map(|name| registry.lookup(&name)).transpose()?;
                let extremum = if min { Extremum::Min } else { Extremum::Max };
                Report::Tallies(
                    self.stats
                        .follower_tallies(&tag, by.as_ref(), extremum)
                        .await?,
                )
            }
        };

        report
            .render(self.format, out)
            .map_err(|e| AppError::Internal(format!("failed to write output: {e}")))
    }
}

/// Result of a command, ready to print.
#[derive(Debug, Serialize)]
#[serde(untagged)]
enum Report {
    Keys(Vec<EntityKey>),
    Count(u64),
    Follow(FollowOutcome),
    Unfollow(UnfollowReport),
    State(FollowState),
    Tallies(Vec<FollowerTally>),
}

impl Report {
    fn render(&self, format: OutputFormat, out: &mut impl Write) -> std::io::Result<()> {
        if format == OutputFormat::Json {
            serde_json::to_writer_pretty(&mut *out, self)?;
            return writeln!(out);
        }

        match self {
            Self::Keys(keys) => {
                for key in keys {
                    writeln!(out, "{key}")?;
                }
            }
            Self::Count(count) => writeln!(out, "{count}")?,
            Self::Follow(outcome) => writeln!(out, "{}", follow_text(outcome))?,
            Self::Unfollow(report) => {
                for (key, outcome) in report {
                    writeln!(out, "{key}\t{}", unfollow_text(outcome))?;
                }
            }
            Self::State(state) => {
                let join = |tags: &std::collections::BTreeSet<_>| {
                    tags.iter()
                        .map(ToString::to_string)
                        .collect::<Vec<_>>()
                        .join(",")
                };
                writeln!(out, "cannot_followed\t{}", join(&state.cannot_followed))?;
                writeln!(out, "cannot_follow\t{}", join(&state.cannot_follow))?;
            }
            Self::Tallies(tallies) => {
                for tally in tallies {
                    writeln!(out, "{}\t{}", tally.key, tally.count)?;
                }
            }
        }
        Ok(())
    }
}

fn refusal_text(refusal: &Refusal) -> String {
    match refusal {
        Refusal::FolloweeRefuses(tag) => format!("unauthorized: followee refuses {tag}"),
        Refusal::FollowerRefuses(tag) => format!("unauthorized: follower refuses {tag}"),
    }
}

fn follow_text(outcome: &FollowOutcome) -> String {
    match outcome {
        FollowOutcome::Followed => "followed".to_string(),
        FollowOutcome::SelfFollow => "self follow ignored".to_string(),
        FollowOutcome::AlreadyFollowing => "already following".to_string(),
        FollowOutcome::Unauthorized(refusal) => refusal_text(refusal),
    }
}

fn unfollow_text(outcome: &UnfollowOutcome) -> String {
    match outcome {
        UnfollowOutcome::Unfollowed => "unfollowed".to_string(),
        UnfollowOutcome::SelfUnfollow => "self unfollow ignored".to_string(),
        UnfollowOutcome::NotFollowing => "not following".to_string(),
        UnfollowOutcome::Unauthorized(refusal) => refusal_text(refusal),
    }
}
