//! Authentication service
//!
//! Handles registration, login, refresh-token rotation and logout.
//! Refresh tokens are single use: refreshing consumes the stored `jti`, so
//! replaying a rotated token fails with `TOKEN_REVOKED`.

use huddle_cache::RefreshTokenData;
use huddle_common::{hash_password, validate_password_strength, verify_password, AppError, Claims};
use huddle_core::{DomainError, Snowflake, User};
use tracing::{info, instrument, warn};
use validator::Validate;

use crate::dto::{
    AuthResponse, CurrentUserResponse, LoginRequest, LogoutRequest, RefreshTokenRequest,
    RegisterRequest,
};

use super::context::ServiceContext;
use super::error::{ServiceError, ServiceResult};

pub struct AuthService<'a> {
    ctx: &'a ServiceContext,
}

impl<'a> AuthService<'a> {
    pub fn new(ctx: &'a ServiceContext) -> Self {
        Self { ctx }
    }

    #[instrument(skip(self, request), fields(username = %request.username))]
    pub async fn register(&self, request: RegisterRequest) -> ServiceResult<AuthResponse> {
        request.validate()?;
        validate_password_strength(&request.password)?;

        let email = request.email.trim().to_lowercase();
        if self.ctx.user_repo().email_exists(&email).await? {
            return Err(DomainError::EmailAlreadyExists.into());
        }
        if self.ctx.user_repo().username_exists(&request.username).await? {
            return Err(DomainError::UsernameAlreadyExists.into());
        }

        let password_hash = hash_password(&request.password)?;

        let mut user = User::new(self.ctx.generate_id(), request.username, email);
        if let Some(display_name) = request.display_name.filter(|d| !d.trim().is_empty()) {
            user.set_display_name(Some(display_name.trim().to_string()));
        }

        self.ctx.user_repo().create(&user, &password_hash).await?;

        info!(user_id = %user.id, "User registered");

        self.issue_tokens(&user).await
    }

    #[instrument(skip(self, request))]
    pub async fn login(&self, request: LoginRequest) -> ServiceResult<AuthResponse> {
        let email = request.email.trim().to_lowercase();

        let user = self
            .ctx
            .user_repo()
            .find_by_email(&email)
            .await?
            .ok_or_else(|| {
                warn!("Login failed: unknown email");
                ServiceError::App(AppError::InvalidCredentials)
            })?;

        let password_hash = self
            .ctx
            .user_repo()
            .get_password_hash(user.id)
            .await?
            .ok_or(ServiceError::App(AppError::InvalidCredentials))?;

        if !verify_password(&request.password, &password_hash)? {
            warn!(user_id = %user.id, "Login failed: wrong password");
            return Err(ServiceError::App(AppError::InvalidCredentials));
        }

        info!(user_id = %user.id, "User logged in");

        self.issue_tokens(&user).await
    }

    /// Exchange a refresh token for a new pair. The old token stops working.
    #[instrument(skip(self, request))]
    pub async fn refresh_tokens(&self, request: RefreshTokenRequest) -> ServiceResult<AuthResponse> {
        let claims = self
            .ctx
            .jwt_service()
            .validate_refresh_token(&request.refresh_token)?;

        let stored = self
            .ctx
            .refresh_token_store()
            .consume(&claims.jti)
            .await?
            .ok_or_else(|| {
                warn!(jti = %claims.jti, "Refresh token reused or revoked");
                ServiceError::App(AppError::TokenRevoked)
            })?;

        if stored.user_id != claims.user_id()? {
            return Err(ServiceError::App(AppError::InvalidToken));
        }

        let user = self
            .ctx
            .user_repo()
            .find_by_id(stored.user_id)
            .await?
            .ok_or(DomainError::UserNotFound(stored.user_id))?;

        info!(user_id = %user.id, "Refresh token rotated");

        self.issue_tokens(&user).await
    }

    /// Revoke one refresh token, or all of the user's when none is given
    #[instrument(skip(self, request))]
    pub async fn logout(&self, user_id: Snowflake, request: LogoutRequest) -> ServiceResult<()> {
        match request.refresh_token {
            Some(token) => {
                // An expired or foreign token has nothing left to revoke
                let claims: Option<Claims> = self
                    .ctx
                    .jwt_service()
                    .validate_refresh_token(&token)
                    .ok()
                    .filter(|c| c.user_id().ok() == Some(user_id));
                if let Some(claims) = claims {
                    self.ctx.refresh_token_store().revoke(&claims.jti).await?;
                }
                info!(user_id = %user_id, "User logged out");
            }
            None => {
                let count = self
                    .ctx
                    .refresh_token_store()
                    .revoke_all_for_user(user_id)
                    .await?;
                info!(user_id = %user_id, revoked = count, "User logged out everywhere");
            }
        }
        Ok(())
    }

    async fn issue_tokens(&self, user: &User) -> ServiceResult<AuthResponse> {
        let pair = self.ctx.jwt_service().generate_token_pair(user.id)?;

        self.ctx
            .refresh_token_store()
            .store(&pair.refresh_jti, &RefreshTokenData::new(user.id))
            .await?;

        Ok(AuthResponse {
            access_token: pair.access_token,
            refresh_token: pair.refresh_token,
            token_type: pair.token_type,
            expires_in: pair.expires_in,
            user: CurrentUserResponse::from(user),
        })
    }
}
