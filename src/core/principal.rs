//! Authenticated caller identity.
//!
//! Authentication itself happens upstream; every core operation that enforces a
//! role or ownership rule receives the already-authenticated [`Principal`].

use serde::{Deserialize, Serialize};
use std::str::FromStr;

use crate::errors::{Error, Result};

/// Role of a user account.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Role {
    #[serde(rename = "ADMIN")]
    Admin,
    #[serde(rename = "BARBEIRO")]
    Barber,
    #[serde(rename = "CLIENTE")]
    Client,
}

impl FromStr for Role {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "ADMIN" => Ok(Self::Admin),
            "BARBEIRO" => Ok(Self::Barber),
            "CLIENTE" => Ok(Self::Client),
            other => Err(Error::validation(format!("unknown role {other:?}"))),
        }
    }
}

/// The user on whose behalf an operation runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Principal {
    pub id: i64,
    pub role: Role,
}

impl Principal {
    #[must_use]
    pub const fn new(id: i64, role: Role) -> Self {
        Self { id, role }
    }

    #[must_use]
    pub const fn is_admin(&self) -> bool {
        matches!(self.role, Role::Admin)
    }

    #[must_use]
    pub const fn is_staff(&self) -> bool {
        matches!(self.role, Role::Admin | Role::Barber)
    }

    /// Fails unless the principal holds one of `roles`.
    pub fn require_any(&self, roles: &[Role]) -> Result<()> {
        if roles.contains(&self.role) {
            Ok(())
        } else {
            Err(Error::forbidden(format!(
                "role {:?} may not perform this action",
                self.role
            )))
        }
    }

    pub fn require_admin(&self) -> Result<()> {
        self.require_any(&[Role::Admin])
    }

    pub fn require_staff(&self) -> Result<()> {
        self.require_any(&[Role::Admin, Role::Barber])
    }

    /// Staff may act on a barber-owned record when they are admin or that barber.
    pub fn require_admin_or_barber(&self, barber_id: i64) -> Result<()> {
        match self.role {
            Role::Admin => Ok(()),
            Role::Barber if self.id == barber_id => Ok(()),
            Role::Barber => Err(Error::forbidden("record belongs to another barber")),
            Role::Client => Err(Error::forbidden("staff only")),
        }
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    use super::*;

    #[test]
    fn test_role_parses_wire_names() {
        assert_eq!("ADMIN".parse::<Role>().unwrap(), Role::Admin);
        assert_eq!("BARBEIRO".parse::<Role>().unwrap(), Role::Barber);
        assert_eq!("CLIENTE".parse::<Role>().unwrap(), Role::Client);
        assert!("admin".parse::<Role>().is_err());
    }

    #[test]
    fn test_barber_ownership() {
        let barber = Principal::new(7, Role::Barber);
        assert!(barber.require_admin_or_barber(7).is_ok());
        assert!(matches!(
            barber.require_admin_or_barber(8),
            Err(Error::Forbidden { .. })
        ));
        assert!(Principal::new(1, Role::Admin).require_admin_or_barber(8).is_ok());
        assert!(Principal::new(8, Role::Client).require_admin_or_barber(8).is_err());
    }
}
