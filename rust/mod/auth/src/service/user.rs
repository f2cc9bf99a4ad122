use chrono::Utc;
use tracing::{info, warn};

use geobuild_core::{new_id, sortable_ts, Role, UserDirectory, UserRef};
use geobuild_sql::{Row, Statement, Value};

use crate::model::{ChangePasswordRequest, RegisterRequest, User};
use crate::service::password::{hash_password, verify_password};
use crate::service::{parse_ts, AuthError, AuthService};

const MIN_PASSWORD_LEN: usize = 6;

const USER_COLUMNS: &str = "id, email, password_hash, first_name, last_name, role, is_active, \
                            created_at, updated_at, last_login_at";

const INVALID_CREDENTIALS: &str = "Invalid email or password.";

fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

fn row_to_user(row: &Row) -> Result<User, AuthError> {
    let text = |name: &str| -> Result<String, AuthError> {
        row.get_str(name)
            .map(str::to_string)
            .ok_or_else(|| AuthError::Internal(format!("users.{name} missing")))
    };
    let role: Role = text("role")?
        .parse()
        .map_err(|_| AuthError::Internal("users.role unreadable".into()))?;
    Ok(User {
        id: text("id")?,
        email: text("email")?,
        password_hash: text("password_hash")?,
        first_name: text("first_name")?,
        last_name: text("last_name")?,
        role,
        is_active: row.get_i64("is_active").unwrap_or(0) != 0,
        created_at: parse_ts(&text("created_at")?)?,
        updated_at: parse_ts(&text("updated_at")?)?,
        last_login_at: row.get_str("last_login_at").map(parse_ts).transpose()?,
    })
}

impl AuthService {
    /// Create an account. Email uniqueness is decided by the UNIQUE index,
    /// so two concurrent registrations of the same address cannot both win.
    pub fn register(&self, input: RegisterRequest) -> Result<User, AuthError> {
        let email = normalize_email(&input.email);
        if email.is_empty() || input.password.is_empty() {
            return Err(AuthError::Validation("Email and password are required.".into()));
        }
        if !email.contains('@') {
            return Err(AuthError::Validation("Email address is not valid.".into()));
        }
        if input.password.chars().count() < MIN_PASSWORD_LEN {
            return Err(AuthError::Validation(format!(
                "Password must be at least {MIN_PASSWORD_LEN} characters."
            )));
        }
        let role = match input.role.as_deref().map(str::trim) {
            None | Some("") => Role::Rm,
            Some(raw) => raw
                .parse::<Role>()
                .map_err(|_| AuthError::Validation(format!("Unknown role: {raw}")))?,
        };

        let now = Utc::now();
        let user = User {
            id: new_id(),
            email,
            password_hash: hash_password(&input.password)?,
            first_name: input.first_name.trim().to_string(),
            last_name: input.last_name.trim().to_string(),
            role,
            is_active: true,
            created_at: now,
            updated_at: now,
            last_login_at: None,
        };

        let ts = sortable_ts(&now);
        self.sql
            .exec(
                &format!(
                    "INSERT INTO users ({USER_COLUMNS}) VALUES (?1, ?2, ?3, ?4, ?5, ?6, 1, ?7, ?7, NULL)"
                ),
                &[
                    Value::from(user.id.as_str()),
                    Value::from(user.email.as_str()),
                    Value::from(user.password_hash.as_str()),
                    Value::from(user.first_name.as_str()),
                    Value::from(user.last_name.as_str()),
                    Value::from(user.role.as_str()),
                    Value::from(ts),
                ],
            )
            .map_err(|e| match e.unique_violation() {
                Some(_) => AuthError::Conflict("User with this email already exists.".into()),
                None => AuthError::from(e),
            })?;

        info!(user_id = %user.id, email = %user.email, role = %user.role, "user registered");
        Ok(user)
    }

    /// Check credentials and stamp `last_login_at`. Every failure reads the same.
    pub fn login(&self, email: &str, password: &str) -> Result<User, AuthError> {
        let email = normalize_email(email);
        let user = match self.find_by_email(&email)? {
            Some(u) if u.is_active && verify_password(password, &u.password_hash) => u,
            _ => {
                warn!(email = %email, "failed login");
                return Err(AuthError::Unauthorized(INVALID_CREDENTIALS.into()));
            }
        };

        let now = Utc::now();
        let ts = sortable_ts(&now);
        self.sql.exec(
            "UPDATE users SET last_login_at = ?1, updated_at = ?1 WHERE id = ?2",
            &[Value::from(ts), Value::from(user.id.as_str())],
        )?;

        info!(user_id = %user.id, "user logged in");
        Ok(User {
            last_login_at: Some(now),
            updated_at: now,
            ..user
        })
    }

    pub fn get_user(&self, id: &str) -> Result<User, AuthError> {
        let rows = self.sql.query(
            &format!("SELECT {USER_COLUMNS} FROM users WHERE id = ?1"),
            &[Value::from(id)],
        )?;
        match rows.first() {
            Some(row) => row_to_user(row),
            None => Err(AuthError::NotFound("User not found".into())),
        }
    }

    pub fn find_by_email(&self, email: &str) -> Result<Option<User>, AuthError> {
        let rows = self.sql.query(
            &format!("SELECT {USER_COLUMNS} FROM users WHERE email = ?1"),
            &[Value::from(normalize_email(email))],
        )?;
        rows.first().map(row_to_user).transpose()
    }

    /// Replace the password and revoke every refresh token the user holds.
    pub fn change_password(
        &self,
        user_id: &str,
        input: &ChangePasswordRequest,
    ) -> Result<(), AuthError> {
        if input.new_password != input.confirm_password {
            return Err(AuthError::Validation(
                "New password and confirmation do not match".into(),
            ));
        }
        if input.new_password.chars().count() < MIN_PASSWORD_LEN {
            return Err(AuthError::Validation(format!(
                "Password must be at least {MIN_PASSWORD_LEN} characters."
            )));
        }

        let user = self.get_user(user_id)?;
        if !verify_password(&input.current_password, &user.password_hash) {
            return Err(AuthError::Validation("Current password is incorrect".into()));
        }

        let hash = hash_password(&input.new_password)?;
        let ts = sortable_ts(&Utc::now());
        self.sql.transaction(&[
            Statement::new(
                "UPDATE users SET password_hash = ?1, updated_at = ?2 WHERE id = ?3",
                vec![Value::from(hash), Value::from(ts), Value::from(user_id)],
            ),
            Statement::new(
                "UPDATE refresh_tokens SET revoked = 1 WHERE user_id = ?1 AND revoked = 0",
                vec![Value::from(user_id)],
            ),
        ])?;

        info!(user_id = %user_id, "password changed");
        Ok(())
    }
}

impl UserDirectory for AuthService {
    fn lookup(&self, ids: &[String]) -> Result<Vec<UserRef>, geobuild_core::ServiceError> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let placeholders: Vec<String> = (1..=ids.len()).map(|i| format!("?{i}")).collect();
        let params: Vec<Value> = ids.iter().map(|id| Value::from(id.as_str())).collect();
        let rows = self
            .sql
            .query(
                &format!(
                    "SELECT {USER_COLUMNS} FROM users WHERE id IN ({})",
                    placeholders.join(", ")
                ),
                &params,
            )
            .map_err(AuthError::from)?;

        let mut refs = Vec::with_capacity(rows.len());
        for row in &rows {
            let user = row_to_user(row)?;
            refs.push(UserRef {
                name: user.display_name(),
                id: user.id,
                email: user.email,
            });
        }
        Ok(refs)
    }
}
