//! Command line definition.

use clap::{Parser, Subcommand, ValueEnum};
use followable_core::EntityKey;

/// Output format of query commands.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// One entity per line.
    #[default]
    Text,
    /// Pretty-printed JSON.
    Json,
}

#[derive(Parser, Debug)]
#[command(name = "followable")]
#[command(version, about = "Inspect and edit a followable follow graph")]
#[command(subcommand_required = true, arg_required_else_help = true)]
#[command(after_help = "Entities are written <type>_<id>, e.g. user_42.")]
pub struct Cli {
    /// Output format
    #[arg(long, value_enum, default_value = "text", global = true)]
    pub output: OutputFormat,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run pending database migrations
    Migrate,

    /// Make entities known to the graph
    Register {
        #[arg(required = true)]
        entities: Vec<EntityKey>,
    },

    /// Drop entities the host deleted, with every edge they take part in
    Forget {
        #[arg(required = true)]
        entities: Vec<EntityKey>,
    },

    /// Make FOLLOWER follow FOLLOWEE
    Follow {
        follower: EntityKey,
        followee: EntityKey,
    },

    /// Make FOLLOWER stop following the given entities
    Unfollow {
        follower: EntityKey,

        #[arg(required_unless_present = "all")]
        followees: Vec<EntityKey>,

        /// Stop following every current followee
        #[arg(long, conflicts_with = "followees")]
        all: bool,
    },

    /// Show or edit the types an entity refuses
    Authorize {
        entity: EntityKey,

        /// Type names to add (or remove with --unset)
        types: Vec<String>,

        /// Remove the types instead of adding them
        #[arg(long)]
        unset: bool,

        /// Edit the types this entity refuses to follow instead of the
        /// types it refuses as followers
        #[arg(long)]
        following: bool,
    },

    /// List the followers of an entity
    Followers {
        entity: EntityKey,

        /// Only followers of this type
        #[arg(long)]
        by: Option<String>,

        /// Print the count only
        #[arg(long)]
        count: bool,
    },

    /// List the entities an entity follows
    Followees {
        entity: EntityKey,

        /// Only followees of this type
        #[arg(long)]
        by: Option<String>,
    },

    /// List everyone who ever followed an entity, oldest first
    History { entity: EntityKey },

    /// List the followers two entities share
    Common { a: EntityKey, b: EntityKey },

    /// Entities of a type with the most (or fewest) followers
    Extremes {
        /// Type of the ranked entities
        type_name: String,

        /// Only count followers of this type
        #[arg(long)]
        by: Option<String>,

        /// Select the fewest followers instead of the most
        #[arg(long)]
        min: bool,
    },
}
