//! User service
//!
//! Profiles and the user directory.

use huddle_core::{DomainError, Snowflake, User};
use tracing::{info, instrument};
use validator::Validate;

use crate::dto::{
    CurrentUserResponse, UpdateUserRequest, UserSearchQuery,
    UserWithPresenceResponse,
};

use super::context::ServiceContext;
use super::error::ServiceResult;
use super::presence::PresenceService;

const DEFAULT_SEARCH_LIMIT: i64 = 25;
const MAX_SEARCH_LIMIT: i64 = 100;

pub struct UserService<'a> {
    ctx: &'a ServiceContext,
}

impl<'a> UserService<'a> {
    pub fn new(ctx: &'a ServiceContext) -> Self {
        Self { ctx }
    }

    #[instrument(skip(self))]
    pub async fn get_current_user(&self, user_id: Snowflake) -> ServiceResult<CurrentUserResponse> {
        let user = self.get_user_entity(user_id).await?;
        Ok(CurrentUserResponse::from(&user))
    }

    pub async fn get_user_entity(&self, user_id: Snowflake) -> ServiceResult<User> {
        Ok(self
            .ctx
            .user_repo()
            .find_by_id(user_id)
            .await?
            .ok_or(DomainError::UserNotFound(user_id))?)
    }

    /// Empty strings clear the field; absent fields stay as they are
    #[instrument(skip(self, request))]
    pub async fn update_current_user(
        &self,
        user_id: Snowflake,
        request: UpdateUserRequest,
    ) -> ServiceResult<CurrentUserResponse> {
        request.validate()?;
        let mut user = self.get_user_entity(user_id).await?;

        if let Some(display_name) = request.display_name {
            let display_name = display_name.trim().to_string();
            user.set_display_name((!display_name.is_empty()).then_some(display_name));
        }
        if let Some(avatar) = request.avatar {
            let avatar = avatar.trim().to_string();
            user.set_avatar((!avatar.is_empty()).then_some(avatar));
        }

        self.ctx.user_repo().update(&user).await?;

        info!(user_id = %user_id, "User profile updated");

        Ok(CurrentUserResponse::from(&user))
    }

    /// Directory lookup with live presence. The caller is left out.
    #[instrument(skip(self, query))]
    pub async fn search(
        &self,
        caller: Snowflake,
        query: UserSearchQuery,
    ) -> ServiceResult<Vec<UserWithPresenceResponse>> {
        let limit = query
            .limit
            .unwrap_or(DEFAULT_SEARCH_LIMIT)
            .clamp(1, MAX_SEARCH_LIMIT);
        let search = query.search.as_deref().map(str::trim).filter(|s| !s.is_empty());

        let users: Vec<User> = self
            .ctx
            .user_repo()
            .search(search, limit + 1)
            .await?
            .into_iter()
            .filter(|u| u.id != caller)
            .take(limit as usize)
            .collect();

        let ids: Vec<Snowflake> = users.iter().map(|u| u.id).collect();
        let presence = PresenceService::new(self.ctx).get_many(&ids).await;

        Ok(users
            .iter()
            .zip(presence.iter())
            .map(|(user, presence)| UserWithPresenceResponse::new(user, presence))
            .collect())
    }
}
