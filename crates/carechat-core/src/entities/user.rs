//! User entity - read-only view of the platform's user directory

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::DomainError;
use crate::value_objects::Snowflake;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UserRole {
    Mom,
    Doctor,
    Midwife,
    Admin,
}

impl UserRole {
    pub const PROVIDERS: [UserRole; 2] = [Self::Doctor, Self::Midwife];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Mom => "mom",
            Self::Doctor => "doctor",
            Self::Midwife => "midwife",
            Self::Admin => "admin",
        }
    }

    /// Doctors and midwives are the care providers moms chat with
    pub fn is_provider(&self) -> bool {
        Self::PROVIDERS.contains(self)
    }
}

impl FromStr for UserRole {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "mom" => Ok(Self::Mom),
            "doctor" => Ok(Self::Doctor),
            "midwife" => Ok(Self::Midwife),
            "admin" => Ok(Self::Admin),
            other => Err(DomainError::validation(format!("unknown role: {other}"))),
        }
    }
}

impl fmt::Display for UserRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Live connection status tracked by the gateway
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PresenceStatus {
    Online,
    Away,
    #[default]
    Offline,
}

impl PresenceStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Online => "online",
            Self::Away => "away",
            Self::Offline => "offline",
        }
    }
}

impl FromStr for PresenceStatus {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "online" => Ok(Self::Online),
            "away" => Ok(Self::Away),
            "offline" => Ok(Self::Offline),
            other => Err(DomainError::validation(format!("unknown presence: {other}"))),
        }
    }
}

/// User entity
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct User {
    pub id: Snowflake,
    pub display_name: String,
    pub email: String,
    pub role: UserRole,
    pub avatar_url: Option<String>,
    pub specialty: Option<String>,
    pub is_active: bool,
}

impl User {
    pub fn new(id: Snowflake, display_name: String, email: String, role: UserRole) -> Self {
        Self {
            id,
            display_name,
            email,
            role,
            avatar_url: None,
            specialty: None,
            is_active: true,
        }
    }

    pub fn with_specialty(mut self, specialty: impl Into<String>) -> Self {
        self.specialty = Some(specialty.into());
        self
    }

    /// Case-insensitive substring match on name, specialty or email.
    /// `needle` must already be lowercase.
    pub fn matches(&self, needle: &str) -> bool {
        self.display_name.to_lowercase().contains(needle)
            || self.email.to_lowercase().contains(needle)
            || self
                .specialty
                .as_deref()
                .is_some_and(|s| s.to_lowercase().contains(needle))
    }
}
