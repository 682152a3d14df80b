use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Serialize, Deserialize)]
pub struct JwtClaims {
    pub sub: String,
    pub exp: Option<u64>,
    pub email: Option<String>,
    pub name: Option<String>,
    pub role: Option<String>,
    pub iat: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    pub id: String,
    pub email: Option<String>,
    pub name: Option<String>,
    pub role: Option<String>,
    pub created_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Patient,
    Doctor,
    Secretary,
    Admin,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Role::Patient => write!(f, "patient"),
            Role::Doctor => write!(f, "doctor"),
            Role::Secretary => write!(f, "secretary"),
            Role::Admin => write!(f, "admin"),
        }
    }
}

impl FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "patient" => Ok(Role::Patient),
            "doctor" => Ok(Role::Doctor),
            "secretary" => Ok(Role::Secretary),
            "admin" => Ok(Role::Admin),
            other => Err(format!("unknown role: {}", other)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Capability {
    BookForSelf,
    BookForOthers,
    ManageLifecycle,
    AnnotateAppointment,
    CancelAppointment,
    ViewAllAppointments,
    RecordPayment,
}

impl Capability {
    pub const ALL: [Capability; 7] = [
        Capability::BookForSelf,
        Capability::BookForOthers,
        Capability::ManageLifecycle,
        Capability::AnnotateAppointment,
        Capability::CancelAppointment,
        Capability::ViewAllAppointments,
        Capability::RecordPayment,
    ];
}

impl Role {
    pub fn capabilities(&self) -> BTreeSet<Capability> {
        use Capability::*;

        match self {
            // Patients may only cancel their own appointments; ownership is
            // checked where the appointment is known.
            Role::Patient => [BookForSelf, CancelAppointment].into_iter().collect(),
            Role::Doctor => [
                ManageLifecycle,
                AnnotateAppointment,
                ViewAllAppointments,
                CancelAppointment,
            ]
            .into_iter()
            .collect(),
            Role::Secretary => [
                BookForSelf,
                BookForOthers,
                ManageLifecycle,
                AnnotateAppointment,
                ViewAllAppointments,
                CancelAppointment,
                RecordPayment,
            ]
            .into_iter()
            .collect(),
            Role::Admin => Capability::ALL.into_iter().collect(),
        }
    }
}

/// The authenticated caller, with its capability set resolved once.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CurrentUser {
    pub id: String,
    pub name: String,
    pub role: Option<Role>,
    capabilities: BTreeSet<Capability>,
}

impl CurrentUser {
    pub fn new(id: impl Into<String>, name: impl Into<String>, role: Role) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            role: Some(role),
            capabilities: role.capabilities(),
        }
    }

    /// Unknown or missing roles resolve to an empty capability set.
    pub fn from_user(user: &User) -> Self {
        let role = user.role.as_deref().and_then(|r| r.parse::<Role>().ok());
        let name = user
            .name
            .clone()
            .or_else(|| user.email.clone())
            .unwrap_or_else(|| user.id.clone());

        Self {
            id: user.id.clone(),
            name,
            role,
            capabilities: role.map(|r| r.capabilities()).unwrap_or_default(),
        }
    }

    pub fn has_capability(&self, capability: Capability) -> bool {
        self.capabilities.contains(&capability)
    }

    pub fn capabilities(&self) -> impl Iterator<Item = Capability> + '_ {
        self.capabilities.iter().copied()
    }

    pub fn is_patient(&self) -> bool {
        self.role == Some(Role::Patient)
    }
}

pub fn has_capability(user: &CurrentUser, capability: Capability) -> bool {
    user.has_capability(capability)
}
