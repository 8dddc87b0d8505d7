// shopfront_app/src/db/identity.rs

use super::{db_err, sql_state, UNIQUE_VIOLATION};
use crate::services::auth_service::{hash_password, new_session_token, verify_password};
use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use shopfront::models::Role;
use shopfront::backend::normalize_email;
use shopfront::{AuthEvent, AuthUser, Identity, Session, ShopError, ShopResult, Store};
use sqlx::PgPool;
use tokio::sync::broadcast;
use tracing::{event, instrument, Level};
use uuid::Uuid;

const MIN_PASSWORD_LEN: usize = 6;

#[derive(sqlx::FromRow)]
struct AccountRow {
  id: Uuid,
  email: String,
  password_hash: String,
}

#[derive(sqlx::FromRow)]
struct SessionRow {
  token: String,
  expires_at: DateTime<Utc>,
  user_id: Uuid,
  email: String,
}

impl From<SessionRow> for Session {
  fn from(row: SessionRow) -> Self {
    Session {
      access_token: row.token,
      user: AuthUser {
        id: row.user_id,
        email: row.email,
      },
      expires_at: row.expires_at,
    }
  }
}

/// Email and password accounts with opaque session tokens.
pub struct PgIdentity {
  pool: PgPool,
  session_ttl: Duration,
  events: broadcast::Sender<AuthEvent>,
}

impl PgIdentity {
  pub fn new(pool: PgPool, session_ttl_hours: i64) -> Self {
    let (events, _) = broadcast::channel(64);
    Self {
      pool,
      session_ttl: Duration::hours(session_ttl_hours),
      events,
    }
  }

  fn validate_credentials(email: &str, password: &str) -> ShopResult<()> {
    if email.is_empty() || !email.contains('@') {
      return Err(ShopError::Validation("a valid email is required".to_string()));
    }
    if password.chars().count() < MIN_PASSWORD_LEN {
      return Err(ShopError::Validation(format!(
        "password must have at least {} characters",
        MIN_PASSWORD_LEN
      )));
    }
    Ok(())
  }

  async fn insert_account(&self, email: &str, password: &str) -> ShopResult<AuthUser> {
    let password_hash = hash_password(password)?;
    let user = AuthUser {
      id: Uuid::new_v4(),
      email: email.to_string(),
    };
    sqlx::query("INSERT INTO users (id, email, password_hash) VALUES ($1, $2, $3)")
      .bind(user.id)
      .bind(&user.email)
      .bind(password_hash)
      .execute(&self.pool)
      .await
      .map_err(|e| match sql_state(&e).as_deref() {
        Some(UNIQUE_VIOLATION) => ShopError::Conflict(format!("account '{}' already exists", email)),
        _ => db_err(e),
      })?;
    Ok(user)
  }

  /// `email` is already normalized; `lower()` also matches rows stored
  /// before emails were lower-cased.
  async fn find_account(&self, email: &str) -> ShopResult<Option<AccountRow>> {
    sqlx::query_as("SELECT id, email, password_hash FROM users WHERE lower(email) = lower($1)")
      .bind(email)
      .fetch_optional(&self.pool)
      .await
      .map_err(db_err)
  }

  async fn open_session(&self, user: AuthUser) -> ShopResult<Session> {
    let session = Session {
      access_token: new_session_token(),
      expires_at: Utc::now() + self.session_ttl,
      user,
    };
    sqlx::query("INSERT INTO sessions (token, user_id, expires_at) VALUES ($1, $2, $3)")
      .bind(&session.access_token)
      .bind(session.user.id)
      .bind(session.expires_at)
      .execute(&self.pool)
      .await
      .map_err(db_err)?;
    let _ = self.events.send(AuthEvent::SignedIn {
      user: session.user.clone(),
    });
    Ok(session)
  }

  /// Makes sure `email` exists with an `admin` profile. An existing account
  /// keeps its password and is promoted.
  #[instrument(name = "PgIdentity::bootstrap_admin", skip(self, password, store), err(Display))]
  pub async fn bootstrap_admin(&self, store: &dyn Store, email: &str, password: &str) -> ShopResult<AuthUser> {
    let email = normalize_email(email);
    let email = email.as_str();
    let user = match self.find_account(email).await? {
      Some(row) => AuthUser {
        id: row.id,
        email: row.email,
      },
      None => {
        Self::validate_credentials(email, password)?;
        self.insert_account(email, password).await?
      }
    };
    store.upsert_profile(user.id, &user.email, Role::Admin).await?;
    event!(Level::INFO, user_id = %user.id, "Bootstrap admin ready.");
    Ok(user)
  }

  /// Drops expired sessions; returns how many were removed.
  pub async fn purge_expired(&self) -> ShopResult<u64> {
    let result = sqlx::query("DELETE FROM sessions WHERE expires_at <= now()")
      .execute(&self.pool)
      .await
      .map_err(db_err)?;
    Ok(result.rows_affected())
  }
}

#[async_trait]
impl Identity for PgIdentity {
  #[instrument(name = "PgIdentity::sign_up", skip(self, password), err(Display))]
  async fn sign_up(&self, email: &str, password: &str) -> ShopResult<Session> {
    let email = normalize_email(email);
    Self::validate_credentials(&email, password)?;
    let user = self.insert_account(&email, password).await?;
    self.open_session(user).await
  }

  #[instrument(name = "PgIdentity::sign_in", skip(self, password), err(Display))]
  async fn sign_in_with_password(&self, email: &str, password: &str) -> ShopResult<Session> {
    let Some(account) = self.find_account(&normalize_email(email)).await? else {
      return Err(ShopError::Unauthenticated);
    };
    if !verify_password(&account.password_hash, password)? {
      return Err(ShopError::Unauthenticated);
    }
    self
      .open_session(AuthUser {
        id: account.id,
        email: account.email,
      })
      .await
  }

  async fn sign_out(&self, access_token: &str) -> ShopResult<()> {
    let user_id: Option<Uuid> = sqlx::query_scalar("DELETE FROM sessions WHERE token = $1 RETURNING user_id")
      .bind(access_token)
      .fetch_optional(&self.pool)
      .await
      .map_err(db_err)?;
    if let Some(user_id) = user_id {
      event!(Level::DEBUG, %user_id, "Session closed.");
      let _ = self.events.send(AuthEvent::SignedOut { user_id });
    }
    Ok(())
  }

  async fn get_session(&self, access_token: &str) -> ShopResult<Option<Session>> {
    let row: Option<SessionRow> = sqlx::query_as(
      r#"SELECT s.token, s.expires_at, u.id AS user_id, u.email
         FROM sessions s
         JOIN users u ON u.id = s.user_id
         WHERE s.token = $1 AND s.expires_at > now()"#,
    )
    .bind(access_token)
    .fetch_optional(&self.pool)
    .await
    .map_err(db_err)?;
    Ok(row.map(Session::from))
  }

  fn subscribe(&self) -> broadcast::Receiver<AuthEvent> {
    self.events.subscribe()
  }
}
