// User accessor: registration, login with the approval gate, the local
// session and the admin user management calls

use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use thiserror::Error;
use tracing::{info, warn};

use crate::{
    local_mirror::{LocalMirror, MirrorError},
    models::{EntityId, Role, User},
    repository::{AccessError, Query, Repository, Synced},
};

const SESSION_KEY: &str = "session";

#[derive(Error, Debug)]
pub enum AuthError {
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Email already registered: {0}")]
    EmailTaken(String),

    #[error("Invalid email or password")]
    InvalidCredentials,

    #[error("Account is waiting for approval")]
    ApprovalPending,

    #[error("Not logged in")]
    NotLoggedIn,

    #[error("Role {0} is not allowed here")]
    Forbidden(Role),

    #[error("Password hashing failed: {0}")]
    Hashing(String),

    #[error("Session storage error: {0}")]
    Session(#[from] MirrorError),

    #[error(transparent)]
    Access(#[from] AccessError),
}

pub fn hash_password(password: &str) -> Result<String, AuthError> {
    let salt = SaltString::generate(&mut OsRng);
    let hash = Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map_err(|e| AuthError::Hashing(e.to_string()))?;
    Ok(hash.to_string())
}

// Anything that is not a PHC string (e.g. a legacy plaintext value) never verifies
pub fn verify_password(password: &str, hash: &str) -> bool {
    let Ok(parsed) = PasswordHash::new(hash) else {
        return false;
    };
    Argon2::default()
        .verify_password(password.as_bytes(), &parsed)
        .is_ok()
}

fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

// The logged-in user as kept in the mirror, without the password hash
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionUser {
    pub id: Option<EntityId>,
    pub name: String,
    pub email: String,
    pub role: Role,
    pub is_approved: bool,
}

impl From<&User> for SessionUser {
    fn from(user: &User) -> Self {
        Self {
            id: user.id.clone(),
            name: user.name.clone(),
            email: user.email.clone(),
            role: user.role,
            is_approved: user.is_approved,
        }
    }
}

#[derive(Debug, Clone)]
pub struct NewUser {
    pub name: String,
    pub email: String,
    pub password: String,
    pub role: Role,
}

impl NewUser {
    pub fn new(name: impl Into<String>, email: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            email: email.into(),
            password: password.into(),
            role: Role::User,
        }
    }

    pub fn with_role(mut self, role: Role) -> Self {
        self.role = role;
        self
    }
}

#[derive(Clone)]
pub struct UserService {
    users: Repository<User>,
    mirror: LocalMirror,
}

impl UserService {
    pub fn new(users: Repository<User>, mirror: LocalMirror) -> Self {
        Self { users, mirror }
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<User>, AuthError> {
        let query = Query::new().filter_eq("email", email);
        let found = self.users.find(&query).await?;
        Ok(found.into_inner().into_iter().next())
    }

    // Regular users wait for approval; agents and admins do not
    pub async fn register(&self, new_user: NewUser) -> Result<Synced<User>, AuthError> {
        let email = normalize_email(&new_user.email);
        if new_user.name.trim().is_empty() {
            return Err(AuthError::InvalidInput("name is required".to_string()));
        }
        if email.is_empty() || !email.contains('@') {
            return Err(AuthError::InvalidInput("a valid email is required".to_string()));
        }
        if new_user.password.is_empty() {
            return Err(AuthError::InvalidInput("password is required".to_string()));
        }

        if self.find_by_email(&email).await?.is_some() {
            return Err(AuthError::EmailTaken(email));
        }

        let user = User {
            id: None,
            name: new_user.name.trim().to_string(),
            email,
            password_hash: hash_password(&new_user.password)?,
            role: new_user.role,
            is_approved: new_user.role != Role::User,
        };

        let created = self.users.create(user).await?;
        info!(id = ?created.data.id, role = %created.data.role, "user registered");
        Ok(created)
    }

    pub async fn login(&self, email: &str, password: &str) -> Result<SessionUser, AuthError> {
        let email = normalize_email(email);
        let Some(user) = self.find_by_email(&email).await? else {
            return Err(AuthError::InvalidCredentials);
        };

        if !verify_password(password, &user.password_hash) {
            warn!(email = %email, "login rejected");
            return Err(AuthError::InvalidCredentials);
        }
        if !user.can_log_in() {
            return Err(AuthError::ApprovalPending);
        }

        let session = SessionUser::from(&user);
        self.mirror.write(SESSION_KEY, &session)?;
        info!(id = ?session.id, role = %session.role, "user logged in");
        Ok(session)
    }

    pub fn current_user(&self) -> Result<Option<SessionUser>, AuthError> {
        Ok(self.mirror.read(SESSION_KEY)?)
    }

    // Returns whether a session existed
    pub fn logout(&self) -> Result<bool, AuthError> {
        Ok(self.mirror.remove(SESSION_KEY)?)
    }

    // UI gating only, the backend does not enforce roles
    pub fn require_role(&self, allowed: &[Role]) -> Result<SessionUser, AuthError> {
        let session = self.current_user()?.ok_or(AuthError::NotLoggedIn)?;
        if allowed.contains(&session.role) {
            Ok(session)
        } else {
            Err(AuthError::Forbidden(session.role))
        }
    }

    pub async fn list_users(&self) -> Result<Synced<Vec<User>>, AuthError> {
        Ok(self.users.list().await?)
    }

    pub async fn approve_user(&self, id: &EntityId) -> Result<Synced<User>, AuthError> {
        let approved = self.users.patch(id, json!({ "isApproved": true })).await?;
        info!(id = %id, "user approved");
        Ok(approved)
    }

    // Promotion to agent or admin also approves the account
    pub async fn set_role(&self, id: &EntityId, role: Role) -> Result<Synced<User>, AuthError> {
        let mut changes = json!({ "role": role });
        if role != Role::User {
            changes["isApproved"] = json!(true);
        }
        Ok(self.users.patch(id, changes).await?)
    }

    pub async fn delete_user(&self, id: &EntityId) -> Result<Synced<()>, AuthError> {
        Ok(self.users.delete(id).await?)
    }
}
