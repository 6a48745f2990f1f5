use std::sync::Arc;

use axum_extra::extract::cookie::{Cookie, SameSite};
use time::Duration;

use crate::application::posts::PostService;
use crate::application::repos::{HealthRepo, PostsRepo, SessionsRepo, UsersRepo};
use crate::application::sessions::SessionService;
use crate::application::social::SocialService;
use crate::application::users::UserService;

use super::rate_limit::ApiRateLimiter;

/// Attributes of the session cookie.
#[derive(Debug, Clone)]
pub struct SessionCookie {
    pub name: String,
    /// Cross-site production front ends need `Secure; SameSite=None`.
    pub production: bool,
}

impl SessionCookie {
    pub fn issue(&self, token: String, max_age: Duration) -> Cookie<'static> {
        let same_site = if self.production {
            SameSite::None
        } else {
            SameSite::Strict
        };
        Cookie::build((self.name.clone(), token))
            .http_only(true)
            .secure(self.production)
            .same_site(same_site)
            .path("/")
            .max_age(max_age)
            .build()
    }

    pub fn removal(&self) -> Cookie<'static> {
        Cookie::build((self.name.clone(), "")).path("/").build()
    }
}

#[derive(Clone)]
pub struct ApiState {
    pub sessions: Arc<SessionService>,
    pub users: Arc<UserService>,
    pub posts: Arc<PostService>,
    pub social: Arc<SocialService>,
    pub health: Arc<dyn HealthRepo>,
    pub rate_limiter: Arc<ApiRateLimiter>,
    pub cookie: SessionCookie,
}

impl ApiState {
    /// Wire every service to one store implementing all repository traits.
    pub fn from_repositories<R>(
        repositories: Arc<R>,
        session_ttl: Duration,
        cookie: SessionCookie,
        rate_limiter: ApiRateLimiter,
    ) -> Self
    where
        R: UsersRepo + PostsRepo + SessionsRepo + HealthRepo + 'static,
    {
        let users_repo: Arc<dyn UsersRepo> = repositories.clone();
        let posts_repo: Arc<dyn PostsRepo> = repositories.clone();
        let sessions_repo: Arc<dyn SessionsRepo> = repositories.clone();
        let health_repo: Arc<dyn HealthRepo> = repositories;

        Self {
            sessions: Arc::new(SessionService::new(sessions_repo, session_ttl)),
            users: Arc::new(UserService::new(users_repo.clone())),
            posts: Arc::new(PostService::new(posts_repo, users_repo.clone())),
            social: Arc::new(SocialService::new(users_repo)),
            health: health_repo,
            rate_limiter: Arc::new(rate_limiter),
            cookie,
        }
    }
}
