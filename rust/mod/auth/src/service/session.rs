use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use rand::Rng;
use sha2::{Digest, Sha256};
use tracing::{debug, info};

use geobuild_core::{sortable_ts, Claims};
use geobuild_sql::{Row, Value};

use crate::model::{AuthResponse, RefreshSession, User, UserDto};
use crate::service::{parse_ts, AuthError, AuthService};

/// Random bytes in an opaque refresh token.
const REFRESH_TOKEN_BYTES: usize = 16;

fn hash_refresh_token(token: &str) -> String {
    format!("{:x}", Sha256::digest(token.as_bytes()))
}

fn new_refresh_token() -> String {
    let bytes: [u8; REFRESH_TOKEN_BYTES] = rand::thread_rng().r#gen();
    STANDARD.encode(bytes)
}

fn row_to_session(row: &Row) -> Result<RefreshSession, AuthError> {
    let text = |name: &str| -> Result<&str, AuthError> {
        row.get_str(name)
            .ok_or_else(|| AuthError::Internal(format!("refresh_tokens.{name} missing")))
    };
    Ok(RefreshSession {
        token_hash: text("token_hash")?.to_string(),
        user_id: text("user_id")?.to_string(),
        expires_at: parse_ts(text("expires_at")?)?,
        revoked: row.get_i64("revoked").unwrap_or(0) != 0,
        created_at: parse_ts(text("created_at")?)?,
    })
}

impl AuthService {
    /// Sign an access token and persist a fresh refresh token for `user`.
    pub fn issue_tokens(&self, user: &User) -> Result<AuthResponse, AuthError> {
        let now = Utc::now();
        let claims = Claims {
            sub: user.id.clone(),
            email: user.email.clone(),
            role: user.role,
            given_name: user.first_name.clone(),
            family_name: user.last_name.clone(),
            name: user.display_name(),
            iss: self.config.issuer.clone(),
            aud: self.config.audience.clone(),
            iat: now.timestamp(),
            exp: (now + Duration::seconds(self.config.access_token_ttl)).timestamp(),
        };

        let token = encode(
            &Header::new(Algorithm::HS256),
            &claims,
            &EncodingKey::from_secret(self.config.secret.as_bytes()),
        )
        .map_err(|e| AuthError::Internal(format!("JWT encode failed: {e}")))?;

        let refresh_token = new_refresh_token();
        let expires_at = now + Duration::seconds(self.config.refresh_token_ttl);
        self.sql.exec(
            "INSERT INTO refresh_tokens (token_hash, user_id, expires_at, revoked, created_at) \
             VALUES (?1, ?2, ?3, 0, ?4)",
            &[
                Value::from(hash_refresh_token(&refresh_token)),
                Value::from(user.id.as_str()),
                Value::from(sortable_ts(&expires_at)),
                Value::from(sortable_ts(&now)),
            ],
        )?;

        Ok(AuthResponse {
            token,
            refresh_token,
            user: UserDto::from(user),
        })
    }

    /// Verify signature, expiry, issuer and audience of an access token.
    pub fn verify_token(&self, token: &str) -> Result<Claims, AuthError> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 0;
        validation.set_issuer(&[self.config.issuer.as_str()]);
        validation.set_audience(&[self.config.audience.as_str()]);

        decode::<Claims>(
            token,
            &DecodingKey::from_secret(self.config.secret.as_bytes()),
            &validation,
        )
        .map(|data| data.claims)
        .map_err(|e| {
            debug!(error = %e, "token rejected");
            AuthError::Unauthorized("Invalid or expired token".into())
        })
    }

    /// Exchange a refresh token for a new pair. The presented token is
    /// revoked with a compare-and-set so it can be redeemed at most once.
    pub fn refresh(&self, refresh_token: &str) -> Result<AuthResponse, AuthError> {
        let invalid = || AuthError::Unauthorized("Invalid refresh token".into());
        let token_hash = hash_refresh_token(refresh_token.trim());

        let rows = self.sql.query(
            "SELECT token_hash, user_id, expires_at, revoked, created_at \
             FROM refresh_tokens WHERE token_hash = ?1",
            &[Value::from(token_hash.as_str())],
        )?;
        let session = match rows.first() {
            Some(row) => row_to_session(row)?,
            None => return Err(invalid()),
        };
        if !session.is_usable(Utc::now()) {
            return Err(invalid());
        }

        let revoked = self.sql.exec(
            "UPDATE refresh_tokens SET revoked = 1 WHERE token_hash = ?1 AND revoked = 0",
            &[Value::from(token_hash.as_str())],
        )?;
        if revoked == 0 {
            return Err(invalid());
        }

        let user = match self.get_user(&session.user_id) {
            Ok(u) if u.is_active => u,
            _ => return Err(invalid()),
        };

        info!(user_id = %user.id, "refresh token rotated");
        self.issue_tokens(&user)
    }
}
