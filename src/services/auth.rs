use crate::{
    config::Config,
    error::{AppError, Result},
    models::user::{AuthenticationResponse, LoginRequest, RegisterRequest, User},
    services::Database,
    utils::validation::validate_username,
};
use argon2::{
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use rand::rngs::OsRng;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, info, warn};
use uuid::Uuid;
use validator::Validate;

#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,  // 用户名
    pub exp: i64,     // 过期时间
    pub iat: i64,     // 签发时间
    pub jti: String,  // 令牌ID
}

/// Identity of the caller, threaded explicitly through handlers and services
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthUser {
    pub id: i64,
    pub username: String,
}

#[derive(Clone)]
pub struct AuthService {
    db: Arc<Database>,
    jwt_secret: String,
    jwt_expiry: Duration,
}

impl AuthService {
    pub async fn new(db: Arc<Database>, config: &Config) -> Result<Self> {
        Ok(Self {
            db,
            jwt_secret: config.jwt_secret.clone(),
            jwt_expiry: Duration::hours(config.jwt_expiry_hours),
        })
    }

    /// 注册新用户并签发令牌
    pub async fn register(&self, request: RegisterRequest) -> Result<AuthenticationResponse> {
        debug!("Registering user: {}", request.username);

        request.validate()?;
        validate_username(&request.username)?;

        let existing: Option<(i64,)> = sqlx::query_as("SELECT id FROM users WHERE username = ?")
            .bind(&request.username)
            .fetch_optional(self.db.pool())
            .await?;
        if existing.is_some() {
            return Err(AppError::conflict("Username is already taken"));
        }

        let password_hash = hash_password(&request.password)?;

        let user: User = sqlx::query_as(
            r#"
            INSERT INTO users (username, email, password_hash, created_at)
            VALUES (?, ?, ?, ?)
            RETURNING *
            "#,
        )
        .bind(&request.username)
        .bind(&request.email)
        .bind(&password_hash)
        .bind(Utc::now())
        .fetch_one(self.db.pool())
        .await
        .map_err(|e| {
            let err = AppError::from(e);
            if err.is_unique_violation() {
                AppError::conflict("Username is already taken")
            } else {
                err
            }
        })?;

        info!("Registered user {} ({})", user.username, user.id);

        let access_token = self.issue_token(&user).await?;
        Ok(AuthenticationResponse { access_token })
    }

    /// 登录：校验密码，吊销旧令牌后签发新令牌
    pub async fn login(&self, request: LoginRequest) -> Result<AuthenticationResponse> {
        debug!("Login attempt for user: {}", request.username);

        let invalid = || AppError::unauthorized("Invalid username or password");

        let user: User = sqlx::query_as("SELECT * FROM users WHERE username = ?")
            .bind(&request.username)
            .fetch_optional(self.db.pool())
            .await?
            .ok_or_else(invalid)?;

        if !verify_password(&request.password, &user.password_hash) {
            warn!("Failed login for user: {}", request.username);
            return Err(invalid());
        }

        self.revoke_all_tokens(user.id).await?;
        let access_token = self.issue_token(&user).await?;

        info!("User {} logged in", user.username);
        Ok(AuthenticationResponse { access_token })
    }

    pub async fn logout(&self, token: &str) -> Result<()> {
        let result = sqlx::query("UPDATE tokens SET logged_out = 1 WHERE token = ?")
            .bind(token)
            .execute(self.db.pool())
            .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::unauthorized("Unknown token"));
        }
        Ok(())
    }

    /// Issues a signed token for the user and records it as active.
    pub async fn issue_token(&self, user: &User) -> Result<String> {
        let now = Utc::now();
        let claims = Claims {
            sub: user.username.clone(),
            iat: now.timestamp(),
            exp: (now + self.jwt_expiry).timestamp(),
            jti: Uuid::new_v4().to_string(),
        };

        let token = encode(
            &Header::new(Algorithm::HS256),
            &claims,
            &EncodingKey::from_secret(self.jwt_secret.as_bytes()),
        )?;

        sqlx::query("INSERT INTO tokens (user_id, token, logged_out, created_at) VALUES (?, ?, 0, ?)")
            .bind(user.id)
            .bind(&token)
            .bind(now)
            .execute(self.db.pool())
            .await?;

        Ok(token)
    }

    /// 验证 JWT 签名与过期时间
    pub fn verify_jwt(&self, token: &str) -> Result<Claims> {
        let data = decode::<Claims>(
            token,
            &DecodingKey::from_secret(self.jwt_secret.as_bytes()),
            &Validation::new(Algorithm::HS256),
        )?;
        Ok(data.claims)
    }

    /// Resolves a bearer token to the caller. The user comes from the token
    /// row, so a later username change keeps the session valid.
    pub async fn authenticate(&self, token: &str) -> Result<AuthUser> {
        self.verify_jwt(token)?;

        let row: Option<(i64, String, bool)> = sqlx::query_as(
            r#"
            SELECT u.id, u.username, t.logged_out
            FROM tokens t
            JOIN users u ON u.id = t.user_id
            WHERE t.token = ?
            "#,
        )
        .bind(token)
        .fetch_optional(self.db.pool())
        .await?;

        match row {
            Some((id, username, false)) => Ok(AuthUser { id, username }),
            Some((_, _, true)) => Err(AppError::unauthorized("Token has been revoked")),
            None => Err(AppError::unauthorized("Unknown token")),
        }
    }

    async fn revoke_all_tokens(&self, user_id: i64) -> Result<()> {
        let result = sqlx::query("UPDATE tokens SET logged_out = 1 WHERE user_id = ? AND logged_out = 0")
            .bind(user_id)
            .execute(self.db.pool())
            .await?;
        debug!("Revoked {} tokens for user {}", result.rows_affected(), user_id);
        Ok(())
    }
}

fn hash_password(password: &str) -> Result<String> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| AppError::Internal(format!("Password hashing failed: {}", e)))
}

fn verify_password(password: &str, stored_hash: &str) -> bool {
    match PasswordHash::new(stored_hash) {
        Ok(parsed) => Argon2::default()
            .verify_password(password.as_bytes(), &parsed)
            .is_ok(),
        Err(e) => {
            warn!("Stored password hash is unreadable: {}", e);
            false
        }
    }
}
