//! Command-line surface for `hearth-cli`.

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use uuid::Uuid;

#[derive(Parser, Debug)]
#[command(name = "hearth-cli", version, about = "Hearth social API CLI", long_about = None)]
pub struct Cli {
    /// Server base URL, e.g. <https://hearth.example>
    #[arg(long, env = "HEARTH_SERVER_URL")]
    pub server: Option<String>,

    /// Path to file containing a session token (takes precedence over env)
    #[arg(long, env = "HEARTH_TOKEN_FILE")]
    pub token_file: Option<PathBuf>,

    /// Session token from env (no CLI flag, keeps tokens out of shell history)
    #[arg(hide = true, env = "HEARTH_TOKEN")]
    pub token_env: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Sign in and out
    Session(SessionArgs),
    /// Approved posts, newest first
    Feed,
    /// Your profile and all of your posts
    Me,
    /// Write, edit, like and comment on posts
    Posts(PostsArgs),
    /// Moderation queue (admins)
    Moderation(ModerationArgs),
    /// Profile lookups and registration
    Users(UsersArgs),
    /// Friend requests
    Friends(FriendsArgs),
    /// Follow or unfollow a user
    Follow(FollowArgs),
    /// Server and store health
    Health,
}

#[derive(Parser, Debug)]
pub struct SessionArgs {
    #[command(subcommand)]
    pub action: SessionCmd,
}

#[derive(Subcommand, Debug)]
pub enum SessionCmd {
    /// Issue a session token for an email address
    SignIn {
        #[arg(long)]
        email: String,
        /// Write the issued token to this file
        #[arg(long)]
        save: Option<PathBuf>,
    },
    /// Revoke the current session
    SignOut,
}

#[derive(Parser, Debug)]
pub struct PostsArgs {
    #[command(subcommand)]
    pub action: PostsCmd,
}

#[derive(Subcommand, Debug)]
pub enum PostsCmd {
    /// Create a post; it waits for moderation
    Create {
        #[arg(long)]
        caption: Option<String>,
        #[arg(long)]
        caption_file: Option<PathBuf>,
        #[arg(long)]
        image: Option<String>,
    },
    /// Replace caption and image; sends the post back for review
    Edit {
        id: Uuid,
        #[arg(long)]
        caption: Option<String>,
        #[arg(long)]
        caption_file: Option<PathBuf>,
        #[arg(long)]
        image: Option<String>,
    },
    /// Delete a post
    Delete { id: Uuid },
    /// Toggle your like
    Like { id: Uuid },
    /// Add a comment
    Comment {
        id: Uuid,
        #[arg(long)]
        text: String,
    },
    /// Edit one of your comments
    EditComment {
        id: Uuid,
        comment_id: Uuid,
        #[arg(long)]
        text: String,
    },
    /// Delete a comment
    Uncomment { id: Uuid, comment_id: Uuid },
}

#[derive(Parser, Debug)]
pub struct ModerationArgs {
    #[command(subcommand)]
    pub action: ModerationCmd,
}

#[derive(Subcommand, Debug)]
pub enum ModerationCmd {
    /// Posts awaiting review, oldest first
    Pending,
    Approve { id: Uuid },
    Reject { id: Uuid },
}

#[derive(Parser, Debug)]
pub struct UsersArgs {
    #[command(subcommand)]
    pub action: UsersCmd,
}

#[derive(Subcommand, Debug)]
pub enum UsersCmd {
    /// Create the profile for the signed-in email
    Register {
        #[arg(long)]
        name: String,
        #[arg(long)]
        username: Option<String>,
        #[arg(long)]
        profile: Option<String>,
    },
    Get { id: Uuid },
    ByEmail { email: String },
    ByUsername { username: String },
    /// Check whether a username is free
    Available { username: String },
}

#[derive(Parser, Debug)]
pub struct FriendsArgs {
    #[command(subcommand)]
    pub action: FriendsCmd,
}

#[derive(Subcommand, Debug)]
pub enum FriendsCmd {
    Send { target: Uuid },
    Cancel { target: Uuid },
    /// Accept the request `requester` sent you
    Accept { requester: Uuid },
    Reject { requester: Uuid },
    Unfriend { target: Uuid },
    /// How you relate to `target`
    Status { target: Uuid },
}

#[derive(Parser, Debug)]
pub struct FollowArgs {
    #[command(subcommand)]
    pub action: FollowCmd,
}

#[derive(Subcommand, Debug)]
pub enum FollowCmd {
    Add { target: Uuid },
    Remove { target: Uuid },
}
