//! # User Module
//!
//! Club members, their club pack and their roles.
//! - Client: a regular member, withdraws from their own Wallet Premium
//! - Admin / SuperAdmin / ClubAdmin: may act on any member's wallet
//! - ClientsService / Agent: back-office roles without wallet privileges

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Club pack held by a member.
///
/// Only Premium members accrue brites into the Wallet Premium.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ClubPack {
    Basic,
    Premium,
}

impl ClubPack {
    /// Code string for DB
    pub fn as_str(&self) -> &'static str {
        match self {
            ClubPack::Basic => "basic",
            ClubPack::Premium => "premium",
        }
    }

    /// Parse from string
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "basic" => Some(ClubPack::Basic),
            "premium" => Some(ClubPack::Premium),
            _ => None,
        }
    }
}

impl fmt::Display for ClubPack {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Role of a user in the platform
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UserRole {
    Admin,
    SuperAdmin,
    ClientsService,
    Agent,
    Client,
    #[serde(rename = "admin_club")]
    ClubAdmin,
}

impl UserRole {
    /// Code string for DB
    pub fn as_str(&self) -> &'static str {
        match self {
            UserRole::Admin => "admin",
            UserRole::SuperAdmin => "super_admin",
            UserRole::ClientsService => "clients_service",
            UserRole::Agent => "agent",
            UserRole::Client => "client",
            UserRole::ClubAdmin => "admin_club",
        }
    }

    /// Parse from string
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "admin" => Some(UserRole::Admin),
            "super_admin" => Some(UserRole::SuperAdmin),
            "clients_service" => Some(UserRole::ClientsService),
            "agent" => Some(UserRole::Agent),
            "client" => Some(UserRole::Client),
            "admin_club" => Some(UserRole::ClubAdmin),
            _ => None,
        }
    }

    /// Roles allowed to operate on another member's wallet
    pub fn is_admin(&self) -> bool {
        matches!(
            self,
            UserRole::Admin | UserRole::SuperAdmin | UserRole::ClubAdmin
        )
    }
}

impl fmt::Display for UserRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A club member.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: String,
    pub first_name: String,
    pub last_name: String,
    pub email: Option<String>,
    pub club_pack: ClubPack,
    /// Club card number, used as transfer destination
    pub club_card_number: Option<String>,
    pub roles: Vec<UserRole>,
    pub created_at: DateTime<Utc>,
}

impl User {
    /// Create a new member with the Client role
    pub fn new(id: &str, first_name: &str, last_name: &str, club_pack: ClubPack, created_at: DateTime<Utc>) -> Self {
        Self {
            id: id.to_string(),
            first_name: first_name.to_string(),
            last_name: last_name.to_string(),
            email: None,
            club_pack,
            club_card_number: None,
            roles: vec![UserRole::Client],
            created_at,
        }
    }

    pub fn with_email(mut self, email: &str) -> Self {
        self.email = Some(email.to_string());
        self
    }

    pub fn with_card(mut self, card_number: &str) -> Self {
        self.club_card_number = Some(card_number.to_string());
        self
    }

    pub fn with_roles(mut self, roles: Vec<UserRole>) -> Self {
        self.roles = roles;
        self
    }

    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
    }

    pub fn is_premium(&self) -> bool {
        self.club_pack == ClubPack::Premium
    }

    pub fn has_role(&self, role: UserRole) -> bool {
        self.roles.contains(&role)
    }

    pub fn is_admin(&self) -> bool {
        self.roles.iter().any(UserRole::is_admin)
    }

    /// "Name Surname (card)" or just the name when there is no card
    pub fn display_with_card(&self) -> String {
        match &self.club_card_number {
            Some(card) => format!("{} ({})", self.full_name(), card),
            None => self.full_name(),
        }
    }
}

impl fmt::Display for User {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({} - {})", self.full_name(), self.id, self.club_pack)
    }
}
