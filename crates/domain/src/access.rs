//! Who is asking, and which documents they may see.

use common::UserId;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;

/// Display name recorded on guest orders that don't give one.
pub const DEFAULT_GUEST_NAME: &str = "Guest User";

/// Errors raised while establishing the requester of an operation.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum AccessError {
    /// Neither a signed-in user nor a guest email was provided.
    #[error("Sign in or provide a guest email")]
    IdentityRequired,

    /// The guest email is not a plausible address.
    #[error("Invalid guest email: {0}")]
    InvalidGuestEmail(String),
}

/// Role of an authenticated principal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    #[default]
    Customer,
    Admin,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Customer => "customer",
            Role::Admin => "admin",
        }
    }
}

impl std::str::FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "customer" | "user" => Ok(Role::Customer),
            "admin" => Ok(Role::Admin),
            other => Err(format!("unknown role: {other}")),
        }
    }
}

/// An authenticated user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Principal {
    pub user_id: UserId,
    pub email: Option<String>,
    pub role: Role,
}

impl Principal {
    pub fn new(user_id: UserId, role: Role) -> Self {
        Self {
            user_id,
            email: None,
            role,
        }
    }

    pub fn with_email(mut self, email: impl Into<String>) -> Self {
        self.email = normalize_email(&email.into());
        self
    }

    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }
}

/// The party an operation is performed for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Requester {
    Authenticated(Principal),
    /// Anonymous shopper identified only by a normalized email.
    Guest { email: String },
}

impl Requester {
    /// Builds a guest requester from a raw email.
    pub fn guest(email: &str) -> Result<Self, AccessError> {
        let email = normalize_email(email).ok_or(AccessError::IdentityRequired)?;
        if !is_plausible_email(&email) {
            return Err(AccessError::InvalidGuestEmail(email));
        }
        Ok(Requester::Guest { email })
    }

    /// Resolves the requester: a principal wins over a guest email.
    pub fn resolve(
        principal: Option<Principal>,
        guest_email: Option<&str>,
    ) -> Result<Self, AccessError> {
        match (principal, guest_email) {
            (Some(principal), _) => Ok(Requester::Authenticated(principal)),
            (None, Some(email)) => Self::guest(email),
            (None, None) => Err(AccessError::IdentityRequired),
        }
    }

    /// Like [`Requester::resolve`], but a guest may fall back to the payer
    /// email given with the payment details.
    pub fn for_checkout(
        principal: Option<Principal>,
        guest_email: Option<&str>,
        payer_email: Option<&str>,
    ) -> Result<Self, AccessError> {
        let email = guest_email
            .filter(|e| !e.trim().is_empty())
            .or(payer_email.filter(|e| !e.trim().is_empty()));
        Self::resolve(principal, email)
    }

    pub fn principal(&self) -> Option<&Principal> {
        match self {
            Requester::Authenticated(principal) => Some(principal),
            Requester::Guest { .. } => None,
        }
    }

    pub fn is_admin(&self) -> bool {
        self.principal().is_some_and(Principal::is_admin)
    }

    /// Email associated with the requester, if any.
    pub fn email(&self) -> Option<&str> {
        match self {
            Requester::Authenticated(principal) => principal.email.as_deref(),
            Requester::Guest { email } => Some(email),
        }
    }

    /// Label recorded as the actor in audit logs.
    pub fn actor(&self) -> String {
        match self {
            Requester::Authenticated(principal) => format!("user:{}", principal.user_id),
            Requester::Guest { email } => format!("guest:{email}"),
        }
    }

    /// Documents the requester may read and modify.
    ///
    /// Admins see everything; everyone else sees only what they own.
    pub fn scope(&self) -> AccessScope {
        match self {
            Requester::Authenticated(principal) if principal.is_admin() => AccessScope::All,
            _ => self.owner_scope(),
        }
    }

    /// Documents the requester owns, regardless of role.
    pub fn owner_scope(&self) -> AccessScope {
        match self {
            Requester::Authenticated(principal) => AccessScope::Owner(principal.user_id),
            Requester::Guest { email } => AccessScope::Guest(email.clone()),
        }
    }
}

/// Restriction applied to every read and write of an owned document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AccessScope {
    All,
    Owner(UserId),
    Guest(String),
}

impl AccessScope {
    /// Containment filter over the flattened [`Ownership`] fields.
    pub fn filter(&self) -> Map<String, Value> {
        let mut filter = Map::new();
        match self {
            AccessScope::All => {}
            AccessScope::Owner(user_id) => {
                filter.insert("user".to_string(), Value::String(user_id.to_string()));
            }
            AccessScope::Guest(email) => {
                filter.insert("guestEmail".to_string(), Value::String(email.clone()));
                filter.insert("isGuest".to_string(), Value::Bool(true));
            }
        }
        filter
    }
}

/// Owner of a cart or order, embedded flat in the document body.
///
/// Exactly one of `user` or `guest_email` is set, and `is_guest` is true
/// exactly when the owner is a guest.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Ownership {
    pub user: Option<UserId>,
    pub guest_email: Option<String>,
    pub guest_name: Option<String>,
    pub is_guest: bool,
}

impl Ownership {
    /// Ownership for documents created on behalf of `requester`.
    ///
    /// Guests get `guest_name`, or the default name when none is given.
    pub fn for_requester(requester: &Requester, guest_name: Option<&str>) -> Self {
        match requester {
            Requester::Authenticated(principal) => Self {
                user: Some(principal.user_id),
                guest_email: None,
                guest_name: None,
                is_guest: false,
            },
            Requester::Guest { email } => Self {
                user: None,
                guest_email: Some(email.clone()),
                guest_name: Some(
                    guest_name
                        .map(str::trim)
                        .filter(|n| !n.is_empty())
                        .unwrap_or(DEFAULT_GUEST_NAME)
                        .to_string(),
                ),
                is_guest: true,
            },
        }
    }
}

/// Trims and lowercases an email; blank input yields `None`.
pub fn normalize_email(email: &str) -> Option<String> {
    let email = email.trim();
    if email.is_empty() {
        None
    } else {
        Some(email.to_lowercase())
    }
}

fn is_plausible_email(email: &str) -> bool {
    match email.split_once('@') {
        Some((local, domain)) => {
            !local.is_empty() && !domain.is_empty() && !domain.contains('@')
        }
        None => false,
    }
}
