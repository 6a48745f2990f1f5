use hearth_api_types::{PostContentRequest, RegisterUserRequest};
use hearth_client::HearthClient;

use crate::args::{Cli, FollowCmd, FriendsCmd, ModerationCmd, PostsCmd, SessionCmd, UsersCmd};
use crate::error::CliError;
use crate::io::{read_opt_value, read_token, write_token};
use crate::print::print_json;

/// Token file wins over `HEARTH_TOKEN`; no token is fine for public calls.
pub fn build_client(cli: &Cli) -> Result<HearthClient, CliError> {
    let server = cli.server.as_deref().ok_or(CliError::MissingServer)?;
    let token = match &cli.token_file {
        Some(path) => Some(read_token(path)?),
        None => cli.token_env.clone(),
    };

    let mut client = HearthClient::new(server)?;
    client.set_token(token.filter(|token| !token.is_empty()));
    Ok(client)
}

pub async fn session(client: &mut HearthClient, cmd: SessionCmd) -> Result<(), CliError> {
    match cmd {
        SessionCmd::SignIn { email, save } => {
            let session = client.sign_in(&email).await?;
            if let Some(path) = save {
                write_token(&path, &session.token)?;
            }
            print_json(&session)
        }
        SessionCmd::SignOut => {
            client.sign_out().await?;
            print_json(&serde_json::json!({ "signed_out": true }))
        }
    }
}

pub async fn feed(client: &HearthClient) -> Result<(), CliError> {
    print_json(&client.feed().await?)
}

pub async fn me(client: &HearthClient) -> Result<(), CliError> {
    print_json(&client.me().await?)
}

fn post_content(
    caption: Option<String>,
    caption_file: Option<std::path::PathBuf>,
    image: Option<String>,
) -> Result<PostContentRequest, CliError> {
    let caption = read_opt_value(caption, caption_file)?;
    if caption.as_deref().is_none_or(|text| text.trim().is_empty()) && image.is_none() {
        return Err(CliError::InvalidInput(
            "a post needs a caption or an image".into(),
        ));
    }
    Ok(PostContentRequest { caption, image })
}

pub async fn posts(client: &HearthClient, cmd: PostsCmd) -> Result<(), CliError> {
    match cmd {
        PostsCmd::Create {
            caption,
            caption_file,
            image,
        } => {
            let request = post_content(caption, caption_file, image)?;
            print_json(&client.create_post(&request).await?)
        }
        PostsCmd::Edit {
            id,
            caption,
            caption_file,
            image,
        } => {
            let request = post_content(caption, caption_file, image)?;
            print_json(&client.edit_post(id, &request).await?)
        }
        PostsCmd::Delete { id } => {
            client.delete_post(id).await?;
            print_json(&serde_json::json!({ "deleted": id }))
        }
        PostsCmd::Like { id } => print_json(&client.toggle_like(id).await?),
        PostsCmd::Comment { id, text } => print_json(&client.add_comment(id, &text).await?),
        PostsCmd::EditComment {
            id,
            comment_id,
            text,
        } => print_json(&client.edit_comment(id, comment_id, &text).await?),
        PostsCmd::Uncomment { id, comment_id } => {
            client.delete_comment(id, comment_id).await?;
            print_json(&serde_json::json!({ "deleted": comment_id }))
        }
    }
}

pub async fn moderation(client: &HearthClient, cmd: ModerationCmd) -> Result<(), CliError> {
    match cmd {
        ModerationCmd::Pending => print_json(&client.pending_posts().await?),
        ModerationCmd::Approve { id } => print_json(&client.approve_post(id).await?),
        ModerationCmd::Reject { id } => print_json(&client.reject_post(id).await?),
    }
}

pub async fn users(client: &HearthClient, cmd: UsersCmd) -> Result<(), CliError> {
    match cmd {
        UsersCmd::Register {
            name,
            username,
            profile,
        } => {
            let request = RegisterUserRequest {
                name,
                username,
                profile,
                cover: None,
            };
            print_json(&client.register(&request).await?)
        }
        UsersCmd::Get { id } => print_json(&client.user(id).await?),
        UsersCmd::ByEmail { email } => print_json(&client.user_by_email(&email).await?),
        UsersCmd::ByUsername { username } => {
            print_json(&client.user_by_username(&username).await?)
        }
        UsersCmd::Available { username } => {
            print_json(&client.username_available(&username).await?)
        }
    }
}

pub async fn friends(client: &HearthClient, cmd: FriendsCmd) -> Result<(), CliError> {
    let view = match cmd {
        FriendsCmd::Send { target } => client.send_friend_request(target).await?,
        FriendsCmd::Cancel { target } => client.cancel_friend_request(target).await?,
        FriendsCmd::Accept { requester } => client.accept_friend_request(requester).await?,
        FriendsCmd::Reject { requester } => client.reject_friend_request(requester).await?,
        FriendsCmd::Unfriend { target } => client.unfriend(target).await?,
        FriendsCmd::Status { target } => client.relationship(target).await?,
    };
    print_json(&view)
}

pub async fn follow(client: &HearthClient, cmd: FollowCmd) -> Result<(), CliError> {
    let view = match cmd {
        FollowCmd::Add { target } => client.follow(target).await?,
        FollowCmd::Remove { target } => client.unfollow(target).await?,
    };
    print_json(&view)
}

pub async fn health(client: &HearthClient) -> Result<(), CliError> {
    print_json(&client.health().await?)
}
