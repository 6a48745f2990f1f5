//! Post document mutations: likes, comments, edits and moderation.
//!
//! Each [`PostOp`] validates against the current document and either mutates
//! it or returns an error with the document untouched. Stores apply the op to
//! the canonical copy and then mirror the result into the approved
//! collection, so both copies always agree.

use thiserror::Error;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::domain::entities::{CommentRecord, PostRecord};
use crate::domain::error::DomainError;
use crate::domain::relationships::toggle;
use crate::domain::types::REJECTION_MESSAGE;

pub const MAX_CAPTION_CHARS: usize = 5_000;
pub const MAX_COMMENT_CHARS: usize = 2_000;

/// Validated caption/image pair; at least one is present.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PostContent {
    pub caption: Option<String>,
    pub image: Option<String>,
}

impl PostContent {
    pub fn new(caption: Option<String>, image: Option<String>) -> Result<Self, DomainError> {
        let caption = caption
            .map(|value| value.trim().to_string())
            .filter(|value| !value.is_empty());
        let image = image
            .map(|value| value.trim().to_string())
            .filter(|value| !value.is_empty());

        if caption.is_none() && image.is_none() {
            return Err(DomainError::validation(
                "a post needs a caption or an image",
            ));
        }
        if let Some(caption) = caption.as_ref()
            && caption.chars().count() > MAX_CAPTION_CHARS
        {
            return Err(DomainError::TooLong {
                field: "caption",
                max: MAX_CAPTION_CHARS,
            });
        }
        if let Some(image) = image.as_ref() {
            validate_image_url(image)?;
        }

        Ok(Self { caption, image })
    }
}

/// Image URLs come from the external image host and must be absolute http(s).
pub fn validate_image_url(value: &str) -> Result<(), DomainError> {
    let parsed = url::Url::parse(value)
        .map_err(|err| DomainError::malformed("image url", err))?;
    match parsed.scheme() {
        "http" | "https" => Ok(()),
        other => Err(DomainError::malformed(
            "image url",
            format!("unsupported scheme `{other}`"),
        )),
    }
}

pub fn validate_comment(text: &str) -> Result<String, DomainError> {
    DomainError::bounded("comment", text, MAX_COMMENT_CHARS)
}

#[derive(Debug, Clone, Copy, Error, PartialEq, Eq)]
pub enum PostRuleError {
    #[error("only the author may change this post")]
    NotAuthor,
    #[error("comment not found")]
    CommentNotFound,
    #[error("only the comment author may do that")]
    NotCommentAuthor,
    #[error("post is already approved")]
    AlreadyApproved,
    /// Unpublished posts are only reachable by their author and moderators.
    #[error("post not found")]
    NotVisible,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LikeOutcome {
    pub liked: bool,
    pub like_count: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PostOp {
    ToggleLike {
        user_id: Uuid,
        moderator: bool,
    },
    AddComment {
        comment: CommentRecord,
        moderator: bool,
    },
    EditComment {
        comment_id: Uuid,
        actor: Uuid,
        text: String,
        at: OffsetDateTime,
    },
    /// `moderator` lets admins remove any comment.
    DeleteComment {
        comment_id: Uuid,
        actor: Uuid,
        moderator: bool,
    },
    /// Author edit; any edit sends the post back to the pending queue.
    Edit {
        actor: Uuid,
        content: PostContent,
        at: OffsetDateTime,
    },
    Approve {
        at: OffsetDateTime,
    },
    Reject {
        at: OffsetDateTime,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PostEffect {
    Like(LikeOutcome),
    CommentAdded(CommentRecord),
    CommentEdited(CommentRecord),
    CommentRemoved(CommentRecord),
    Updated,
}

impl PostOp {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ToggleLike { .. } => "toggle_like",
            Self::AddComment { .. } => "add_comment",
            Self::EditComment { .. } => "edit_comment",
            Self::DeleteComment { .. } => "delete_comment",
            Self::Edit { .. } => "edit",
            Self::Approve { .. } => "approve",
            Self::Reject { .. } => "reject",
        }
    }

    pub fn apply(self, post: &mut PostRecord) -> Result<PostEffect, PostRuleError> {
        match self {
            Self::ToggleLike { user_id, moderator } => {
                ensure_visible(post, user_id, moderator)?;
                let liked = toggle(&mut post.liked_by, user_id);
                Ok(PostEffect::Like(LikeOutcome {
                    liked,
                    like_count: post.liked_by.len(),
                }))
            }
            Self::AddComment { comment, moderator } => {
                ensure_visible(post, comment.author_id, moderator)?;
                post.comments.push(comment.clone());
                Ok(PostEffect::CommentAdded(comment))
            }
            Self::EditComment {
                comment_id,
                actor,
                text,
                at,
            } => {
                let comment = post
                    .comments
                    .iter_mut()
                    .find(|comment| comment.id == comment_id)
                    .ok_or(PostRuleError::CommentNotFound)?;
                if comment.author_id != actor {
                    return Err(PostRuleError::NotCommentAuthor);
                }
                comment.text = text;
                comment.edited_at = Some(at);
                Ok(PostEffect::CommentEdited(comment.clone()))
            }
            Self::DeleteComment {
                comment_id,
                actor,
                moderator,
            } => {
                let index = post
                    .comments
                    .iter()
                    .position(|comment| comment.id == comment_id)
                    .ok_or(PostRuleError::CommentNotFound)?;
                let comment = &post.comments[index];
                if comment.author_id != actor && post.author_id != actor && !moderator {
                    return Err(PostRuleError::NotCommentAuthor);
                }
                Ok(PostEffect::CommentRemoved(post.comments.remove(index)))
            }
            Self::Edit { actor, content, at } => {
                if post.author_id != actor {
                    return Err(PostRuleError::NotAuthor);
                }
                post.caption = content.caption;
                post.image = content.image;
                post.approved = false;
                post.rejection = None;
                post.updated_at = at;
                Ok(PostEffect::Updated)
            }
            Self::Approve { at } => {
                if post.approved {
                    return Err(PostRuleError::AlreadyApproved);
                }
                post.approved = true;
                post.rejection = None;
                post.updated_at = at;
                Ok(PostEffect::Updated)
            }
            Self::Reject { at } => {
                post.approved = false;
                post.rejection = Some(REJECTION_MESSAGE.to_string());
                post.updated_at = at;
                Ok(PostEffect::Updated)
            }
        }
    }
}

fn ensure_visible(post: &PostRecord, actor: Uuid, moderator: bool) -> Result<(), PostRuleError> {
    if post.approved || post.author_id == actor || moderator {
        Ok(())
    } else {
        Err(PostRuleError::NotVisible)
    }
}

#[cfg(test)]
mod tests {
    use time::macros::datetime;

    use super::*;
    use crate::domain::types::ModerationState;

    fn post(author: Uuid) -> PostRecord {
        PostRecord::new(
            author,
            Some("hello".into()),
            None,
            datetime!(2024-03-01 12:00 UTC),
        )
    }

    fn comment(author: Uuid, text: &str) -> CommentRecord {
        CommentRecord {
            id: Uuid::new_v4(),
            author_id: author,
            text: text.into(),
            commented_at: datetime!(2024-03-01 12:05 UTC),
            edited_at: None,
        }
    }

    #[test]
    fn like_toggles_membership() {
        let mut post = post(Uuid::new_v4());
        let fan = Uuid::new_v4();

        let first = PostOp::ToggleLike {
            user_id: fan,
            moderator: false,
        }
        .apply(&mut post)
        .unwrap();
        assert_eq!(
            first,
            PostEffect::Like(LikeOutcome {
                liked: true,
                like_count: 1
            })
        );
        let second = PostOp::ToggleLike {
            user_id: fan,
            moderator: false,
        }
        .apply(&mut post)
        .unwrap();
        assert_eq!(
            second,
            PostEffect::Like(LikeOutcome {
                liked: false,
                like_count: 0
            })
        );
        PostOp::ToggleLike {
            user_id: fan,
            moderator: false,
        }
        .apply(&mut post)
        .unwrap();
        assert_eq!(post.liked_by, vec![fan]);
    }

    #[test]
    fn comment_lifecycle_respects_authorship() {
        let author = Uuid::new_v4();
        let commenter = Uuid::new_v4();
        let stranger = Uuid::new_v4();
        let mut post = post(author);
        let added = comment(commenter, "nice");
        let id = added.id;

        PostOp::AddComment {
            comment: added,
            moderator: false,
        }
        .apply(&mut post)
        .unwrap();

        let denied = PostOp::EditComment {
            comment_id: id,
            actor: stranger,
            text: "hijack".into(),
            at: datetime!(2024-03-02 00:00 UTC),
        }
        .apply(&mut post);
        assert_eq!(denied, Err(PostRuleError::NotCommentAuthor));
        assert_eq!(post.comments[0].text, "nice");

        PostOp::EditComment {
            comment_id: id,
            actor: commenter,
            text: "very nice".into(),
            at: datetime!(2024-03-02 00:00 UTC),
        }
        .apply(&mut post)
        .unwrap();
        assert_eq!(post.comments[0].text, "very nice");
        assert!(post.comments[0].edited_at.is_some());

        let denied = PostOp::DeleteComment {
            comment_id: id,
            actor: stranger,
            moderator: false,
        }
        .apply(&mut post);
        assert_eq!(denied, Err(PostRuleError::NotCommentAuthor));

        // The post author may remove comments on their own post.
        let removed = PostOp::DeleteComment {
            comment_id: id,
            actor: author,
            moderator: false,
        }
        .apply(&mut post)
        .unwrap();
        assert!(matches!(removed, PostEffect::CommentRemoved(c) if c.id == id));
        assert!(post.comments.is_empty());

        let missing = PostOp::DeleteComment {
            comment_id: id,
            actor: author,
            moderator: false,
        }
        .apply(&mut post);
        assert_eq!(missing, Err(PostRuleError::CommentNotFound));
    }

    #[test]
    fn moderation_transitions() {
        let author = Uuid::new_v4();
        let mut post = post(author);
        assert_eq!(post.moderation_state(), ModerationState::Pending);

        PostOp::Reject {
            at: datetime!(2024-03-02 00:00 UTC),
        }
        .apply(&mut post)
        .unwrap();
        assert_eq!(post.moderation_state(), ModerationState::Rejected);
        assert_eq!(post.rejection.as_deref(), Some(REJECTION_MESSAGE));

        // Editing a rejected post puts it back in the queue.
        let content = PostContent::new(Some("fixed".into()), None).unwrap();
        PostOp::Edit {
            actor: author,
            content,
            at: datetime!(2024-03-03 00:00 UTC),
        }
        .apply(&mut post)
        .unwrap();
        assert_eq!(post.moderation_state(), ModerationState::Pending);

        PostOp::Approve {
            at: datetime!(2024-03-04 00:00 UTC),
        }
        .apply(&mut post)
        .unwrap();
        assert_eq!(post.moderation_state(), ModerationState::Approved);

        let again = PostOp::Approve {
            at: datetime!(2024-03-05 00:00 UTC),
        }
        .apply(&mut post);
        assert_eq!(again, Err(PostRuleError::AlreadyApproved));
    }

    #[test]
    fn rejecting_a_published_post_takes_it_down() {
        let mut post = post(Uuid::new_v4());
        PostOp::Approve {
            at: datetime!(2024-03-02 00:00 UTC),
        }
        .apply(&mut post)
        .unwrap();

        PostOp::Reject {
            at: datetime!(2024-03-03 00:00 UTC),
        }
        .apply(&mut post)
        .unwrap();
        assert!(!post.approved);
        assert_eq!(post.moderation_state(), ModerationState::Rejected);
        assert_eq!(post.rejection.as_deref(), Some(REJECTION_MESSAGE));
    }

    #[test]
    fn unpublished_posts_refuse_strangers() {
        let author = Uuid::new_v4();
        let stranger = Uuid::new_v4();
        let mut post = post(author);

        let like = PostOp::ToggleLike {
            user_id: stranger,
            moderator: false,
        }
        .apply(&mut post);
        assert_eq!(like, Err(PostRuleError::NotVisible));
        let reply = PostOp::AddComment {
            comment: comment(stranger, "first"),
            moderator: false,
        }
        .apply(&mut post);
        assert_eq!(reply, Err(PostRuleError::NotVisible));
        assert!(post.liked_by.is_empty());
        assert!(post.comments.is_empty());

        PostOp::ToggleLike {
            user_id: author,
            moderator: false,
        }
        .apply(&mut post)
        .unwrap();
        PostOp::ToggleLike {
            user_id: stranger,
            moderator: true,
        }
        .apply(&mut post)
        .unwrap();
        assert_eq!(post.liked_by, vec![author, stranger]);

        // Once a moderator un-publishes it, the stranger is locked out again.
        PostOp::Approve {
            at: datetime!(2024-03-02 00:00 UTC),
        }
        .apply(&mut post)
        .unwrap();
        PostOp::ToggleLike {
            user_id: stranger,
            moderator: false,
        }
        .apply(&mut post)
        .unwrap();
        PostOp::Reject {
            at: datetime!(2024-03-03 00:00 UTC),
        }
        .apply(&mut post)
        .unwrap();
        let late = PostOp::ToggleLike {
            user_id: stranger,
            moderator: false,
        }
        .apply(&mut post);
        assert_eq!(late, Err(PostRuleError::NotVisible));
    }

    #[test]
    fn only_author_edits() {
        let mut post = post(Uuid::new_v4());
        let content = PostContent::new(Some("mine now".into()), None).unwrap();
        let result = PostOp::Edit {
            actor: Uuid::new_v4(),
            content,
            at: datetime!(2024-03-02 00:00 UTC),
        }
        .apply(&mut post);
        assert_eq!(result, Err(PostRuleError::NotAuthor));
        assert_eq!(post.caption.as_deref(), Some("hello"));
    }

    #[test]
    fn content_validation() {
        assert!(PostContent::new(Some("  ".into()), None).is_err());
        assert!(PostContent::new(None, Some("ftp://host/a.png".into())).is_err());
        let content =
            PostContent::new(Some(" hi ".into()), Some("https://img.example/a.png".into())).unwrap();
        assert_eq!(content.caption.as_deref(), Some("hi"));
        assert!(validate_comment("   ").is_err());
        assert_eq!(validate_comment(" ok ").unwrap(), "ok");
        assert!(validate_comment(&"x".repeat(MAX_COMMENT_CHARS + 1)).is_err());
    }
}
