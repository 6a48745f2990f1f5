//! Typed HTTP client for the `/api/v1` surface.

use hearth_api_types::{
    ApiErrorBody, CommentRequest, CommentView, HealthResponse, LikeResponse, MyDataResponse,
    PostContentRequest, PostView, RegisterUserRequest, RelationshipView, SessionRequest,
    SessionResponse, UpdateProfileRequest, UserView, UsernameAvailability, UsersByIdsRequest,
};
use reqwest::{Client, Method, RequestBuilder, Response, StatusCode, Url, header};
use serde::Serialize;
use serde::de::DeserializeOwned;
use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("invalid URL: {0}")]
    Url(#[from] url::ParseError),
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("server answered {status}: {body}")]
    Server { status: StatusCode, body: String },
    #[error("failed to decode response: {0}")]
    Decode(#[from] serde_json::Error),
    #[error("no session token; sign in first")]
    MissingSession,
    #[error("signed-in user has no cached profile; load it first")]
    MissingProfile,
}

impl ClientError {
    /// Stable error code from the server's error envelope, if any.
    pub fn code(&self) -> Option<String> {
        match self {
            Self::Server { body, .. } => serde_json::from_str::<ApiErrorBody>(body)
                .ok()
                .map(|envelope| envelope.error.code),
            _ => None,
        }
    }

    pub fn status(&self) -> Option<StatusCode> {
        match self {
            Self::Server { status, .. } => Some(*status),
            Self::Http(err) => err.status(),
            _ => None,
        }
    }
}

#[derive(Clone, Debug)]
pub struct HearthClient {
    http: Client,
    base: Url,
    token: Option<String>,
}

impl HearthClient {
    pub fn new(server: &str) -> Result<Self, ClientError> {
        let base = Url::parse(server)?.join("/")?;
        let http = Client::builder().user_agent(Self::user_agent()).build()?;
        Ok(Self {
            http,
            base,
            token: None,
        })
    }

    pub fn user_agent() -> &'static str {
        concat!("hearth-cli/", env!("CARGO_PKG_VERSION"))
    }

    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.token = Some(token.into());
        self
    }

    pub fn set_token(&mut self, token: Option<String>) {
        self.token = token;
    }

    pub fn token(&self) -> Option<&str> {
        self.token.as_deref()
    }

    /// `/api/v1/<segments...>`, each segment percent-encoded.
    pub fn url(&self, segments: &[&str]) -> Result<Url, ClientError> {
        let mut url = self.base.clone();
        url.path_segments_mut()
            .map_err(|()| ClientError::Url(url::ParseError::RelativeUrlWithCannotBeABaseBase))?
            .pop_if_empty()
            .extend(["api", "v1"])
            .extend(segments);
        Ok(url)
    }

    fn request(&self, method: Method, segments: &[&str]) -> Result<RequestBuilder, ClientError> {
        let url = self.url(segments)?;
        let mut builder = self.http.request(method, url);
        if let Some(token) = &self.token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
        }
        Ok(builder)
    }

    fn authed(&self, method: Method, segments: &[&str]) -> Result<RequestBuilder, ClientError> {
        if self.token.is_none() {
            return Err(ClientError::MissingSession);
        }
        self.request(method, segments)
    }

    async fn json<T: DeserializeOwned>(builder: RequestBuilder) -> Result<T, ClientError> {
        let response = Self::check(builder.send().await?).await?;
        let bytes = response.bytes().await?;
        Ok(serde_json::from_slice(&bytes)?)
    }

    async fn unit(builder: RequestBuilder) -> Result<(), ClientError> {
        Self::check(builder.send().await?).await?;
        Ok(())
    }

    async fn check(response: Response) -> Result<Response, ClientError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().await.unwrap_or_default();
        Err(ClientError::Server { status, body })
    }

    async fn get<T: DeserializeOwned>(&self, segments: &[&str]) -> Result<T, ClientError> {
        Self::json(self.request(Method::GET, segments)?).await
    }

    async fn send_authed<B, T>(
        &self,
        method: Method,
        segments: &[&str],
        body: Option<&B>,
    ) -> Result<T, ClientError>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let mut builder = self.authed(method, segments)?;
        if let Some(body) = body {
            builder = builder.json(body);
        }
        Self::json(builder).await
    }

    // Sessions

    /// Issue a session for `email` and keep its token for later calls.
    pub async fn sign_in(&mut self, email: &str) -> Result<SessionResponse, ClientError> {
        let body = SessionRequest {
            email: email.to_string(),
        };
        let session: SessionResponse =
            Self::json(self.request(Method::POST, &["session"])?.json(&body)).await?;
        self.token = Some(session.token.clone());
        Ok(session)
    }

    pub async fn sign_out(&mut self) -> Result<(), ClientError> {
        Self::unit(self.authed(Method::DELETE, &["session"])?).await?;
        self.token = None;
        Ok(())
    }

    // Users

    pub async fn register(&self, request: &RegisterUserRequest) -> Result<UserView, ClientError> {
        self.send_authed(Method::POST, &["users"], Some(request)).await
    }

    pub async fn me(&self) -> Result<MyDataResponse, ClientError> {
        self.send_authed::<(), _>(Method::GET, &["me"], None).await
    }

    pub async fn update_me(&self, request: &UpdateProfileRequest) -> Result<UserView, ClientError> {
        self.send_authed(Method::PATCH, &["me"], Some(request)).await
    }

    pub async fn user(&self, id: Uuid) -> Result<UserView, ClientError> {
        self.get(&["users", &id.to_string()]).await
    }

    pub async fn user_by_email(&self, email: &str) -> Result<UserView, ClientError> {
        self.get(&["users", "by-email", email]).await
    }

    pub async fn user_by_username(&self, username: &str) -> Result<UserView, ClientError> {
        self.get(&["users", "by-username", username]).await
    }

    pub async fn users(&self, ids: &[Uuid]) -> Result<Vec<UserView>, ClientError> {
        let body = UsersByIdsRequest {
            user_ids: ids.to_vec(),
        };
        self.send_authed(Method::POST, &["users", "batch"], Some(&body))
            .await
    }

    pub async fn username_available(
        &self,
        username: &str,
    ) -> Result<UsernameAvailability, ClientError> {
        self.get(&["usernames", username]).await
    }

    // Posts

    pub async fn feed(&self) -> Result<Vec<PostView>, ClientError> {
        self.get(&["feed"]).await
    }

    pub async fn create_post(&self, request: &PostContentRequest) -> Result<PostView, ClientError> {
        self.send_authed(Method::POST, &["posts"], Some(request)).await
    }

    pub async fn edit_post(
        &self,
        id: Uuid,
        request: &PostContentRequest,
    ) -> Result<PostView, ClientError> {
        self.send_authed(Method::PATCH, &["posts", &id.to_string()], Some(request))
            .await
    }

    pub async fn delete_post(&self, id: Uuid) -> Result<(), ClientError> {
        Self::unit(self.authed(Method::DELETE, &["posts", &id.to_string()])?).await
    }

    pub async fn toggle_like(&self, id: Uuid) -> Result<LikeResponse, ClientError> {
        self.send_authed::<(), _>(Method::POST, &["posts", &id.to_string(), "like"], None)
            .await
    }

    pub async fn add_comment(&self, post_id: Uuid, text: &str) -> Result<CommentView, ClientError> {
        let body = CommentRequest {
            text: text.to_string(),
        };
        self.send_authed(
            Method::POST,
            &["posts", &post_id.to_string(), "comments"],
            Some(&body),
        )
        .await
    }

    pub async fn edit_comment(
        &self,
        post_id: Uuid,
        comment_id: Uuid,
        text: &str,
    ) -> Result<CommentView, ClientError> {
        let body = CommentRequest {
            text: text.to_string(),
        };
        self.send_authed(
            Method::PATCH,
            &[
                "posts",
                &post_id.to_string(),
                "comments",
                &comment_id.to_string(),
            ],
            Some(&body),
        )
        .await
    }

    pub async fn delete_comment(&self, post_id: Uuid, comment_id: Uuid) -> Result<(), ClientError> {
        Self::unit(self.authed(
            Method::DELETE,
            &[
                "posts",
                &post_id.to_string(),
                "comments",
                &comment_id.to_string(),
            ],
        )?)
        .await
    }

    // Moderation

    pub async fn pending_posts(&self) -> Result<Vec<PostView>, ClientError> {
        self.send_authed::<(), _>(Method::GET, &["moderation", "pending"], None)
            .await
    }

    pub async fn approve_post(&self, id: Uuid) -> Result<PostView, ClientError> {
        self.send_authed::<(), _>(
            Method::POST,
            &["moderation", &id.to_string(), "approve"],
            None,
        )
        .await
    }

    pub async fn reject_post(&self, id: Uuid) -> Result<PostView, ClientError> {
        self.send_authed::<(), _>(
            Method::POST,
            &["moderation", &id.to_string(), "reject"],
            None,
        )
        .await
    }

    // Relationships

    pub async fn send_friend_request(&self, target: Uuid) -> Result<RelationshipView, ClientError> {
        self.relationship_call(Method::PUT, &["friends", &target.to_string(), "request"])
            .await
    }

    pub async fn cancel_friend_request(
        &self,
        target: Uuid,
    ) -> Result<RelationshipView, ClientError> {
        self.relationship_call(Method::DELETE, &["friends", &target.to_string(), "request"])
            .await
    }

    pub async fn accept_friend_request(
        &self,
        requester: Uuid,
    ) -> Result<RelationshipView, ClientError> {
        self.relationship_call(Method::POST, &["friends", &requester.to_string(), "accept"])
            .await
    }

    pub async fn reject_friend_request(
        &self,
        requester: Uuid,
    ) -> Result<RelationshipView, ClientError> {
        self.relationship_call(Method::POST, &["friends", &requester.to_string(), "reject"])
            .await
    }

    pub async fn unfriend(&self, target: Uuid) -> Result<RelationshipView, ClientError> {
        self.relationship_call(Method::DELETE, &["friends", &target.to_string()])
            .await
    }

    pub async fn follow(&self, target: Uuid) -> Result<RelationshipView, ClientError> {
        self.relationship_call(Method::PUT, &["follows", &target.to_string()])
            .await
    }

    pub async fn unfollow(&self, target: Uuid) -> Result<RelationshipView, ClientError> {
        self.relationship_call(Method::DELETE, &["follows", &target.to_string()])
            .await
    }

    pub async fn relationship(&self, target: Uuid) -> Result<RelationshipView, ClientError> {
        self.relationship_call(Method::GET, &["relationships", &target.to_string()])
            .await
    }

    async fn relationship_call(
        &self,
        method: Method,
        segments: &[&str],
    ) -> Result<RelationshipView, ClientError> {
        self.send_authed::<(), _>(method, segments, None).await
    }

    pub async fn health(&self) -> Result<HealthResponse, ClientError> {
        self.get(&["health"]).await
    }
}

#[cfg(test)]
mod tests {
    use httpmock::MockServer;

    use super::*;

    #[test]
    fn url_encodes_path_segments() {
        let client = HearthClient::new("https://hearth.example/app/").unwrap();
        let url = client.url(&["users", "by-email", "a b@example.com"]).unwrap();
        assert_eq!(
            url.as_str(),
            "https://hearth.example/api/v1/users/by-email/a%20b@example.com"
        );
    }

    #[tokio::test]
    async fn authenticated_calls_require_a_token() {
        let client = HearthClient::new("https://hearth.example").unwrap();
        let err = client.me().await.unwrap_err();
        assert!(matches!(err, ClientError::MissingSession));
    }

    #[tokio::test]
    async fn sign_in_keeps_the_token() {
        let server = MockServer::start();
        let mock = server.mock(|when, then| {
            when.method("POST")
                .path("/api/v1/session")
                .json_body(serde_json::json!({ "email": "ada@example.com" }));
            then.status(201)
                .header("content-type", "application/json")
                .body(r#"{"token":"hs_abc_def","expires_at":"2030-01-01T00:00:00Z","user":null}"#);
        });

        let mut client = HearthClient::new(&server.base_url()).unwrap();
        let session = client.sign_in("ada@example.com").await.unwrap();
        mock.assert();
        assert!(session.user.is_none());
        assert_eq!(client.token(), Some("hs_abc_def"));
    }

    #[tokio::test]
    async fn server_errors_expose_the_code() {
        let server = MockServer::start();
        let post_id = Uuid::new_v4();
        server.mock(|when, then| {
            when.method("POST")
                .path(format!("/api/v1/posts/{post_id}/like"))
                .header("authorization", "Bearer hs_abc_def");
            then.status(404)
                .header("content-type", "application/json")
                .body(r#"{"error":{"code":"not_found","message":"Post not found","hint":null}}"#);
        });

        let client = HearthClient::new(&server.base_url())
            .unwrap()
            .with_token("hs_abc_def");
        let err = client.toggle_like(post_id).await.unwrap_err();
        assert_eq!(err.status(), Some(StatusCode::NOT_FOUND));
        assert_eq!(err.code().as_deref(), Some("not_found"));
    }
}
