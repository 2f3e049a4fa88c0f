/// Role capabilities derived from access-control membership checks

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::Address;

/// Three independent role flags; an address may hold any combination
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoleCapabilities {
    pub is_verifier: bool,
    pub is_issuer: bool,
    pub is_admin: bool,
}

/// Single badge shown when a wallet holds more than one role
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RoleBadge {
    Admin,
    Verifier,
    Issuer,
}

/// Privileged screens gated on role membership
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Console {
    Verifier,
    Issuer,
}

impl RoleCapabilities {
    /// No roles; the state before resolution and after disconnect
    pub const NONE: RoleCapabilities = RoleCapabilities {
        is_verifier: false,
        is_issuer: false,
        is_admin: false,
    };

    /// Presentation precedence: admin over verifier over issuer
    pub fn badge(&self) -> Option<RoleBadge> {
        if self.is_admin {
            Some(RoleBadge::Admin)
        } else if self.is_verifier {
            Some(RoleBadge::Verifier)
        } else if self.is_issuer {
            Some(RoleBadge::Issuer)
        } else {
            None
        }
    }

    /// Admission predicate for a console; admin passes every gate
    pub fn admits(&self, console: Console) -> bool {
        match console {
            Console::Verifier => self.is_verifier || self.is_admin,
            Console::Issuer => self.is_issuer || self.is_admin,
        }
    }

    pub fn any(&self) -> bool {
        self.is_verifier || self.is_issuer || self.is_admin
    }
}

impl fmt::Display for RoleBadge {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            RoleBadge::Admin => "Admin",
            RoleBadge::Verifier => "Verifier",
            RoleBadge::Issuer => "Issuer",
        };
        f.write_str(label)
    }
}

impl fmt::Display for Console {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Console::Verifier => "verifier",
            Console::Issuer => "issuer",
        };
        f.write_str(label)
    }
}

/// Capabilities together with the connection they were resolved for
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoleSnapshot {
    pub capabilities: RoleCapabilities,
    pub is_connected: bool,
    pub address: Option<Address>,
}

impl RoleSnapshot {
    pub fn disconnected() -> Self {
        Self::default()
    }

    /// Connected, roles not resolved yet (all false)
    pub fn connecting(address: Address) -> Self {
        Self {
            capabilities: RoleCapabilities::NONE,
            is_connected: true,
            address: Some(address),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_badge_precedence() {
        let all = RoleCapabilities { is_verifier: true, is_issuer: true, is_admin: true };
        assert_eq!(all.badge(), Some(RoleBadge::Admin));

        let verifier_issuer = RoleCapabilities { is_verifier: true, is_issuer: true, is_admin: false };
        assert_eq!(verifier_issuer.badge(), Some(RoleBadge::Verifier));

        let issuer = RoleCapabilities { is_issuer: true, ..RoleCapabilities::NONE };
        assert_eq!(issuer.badge(), Some(RoleBadge::Issuer));

        assert_eq!(RoleCapabilities::NONE.badge(), None);
    }

    #[test]
    fn test_console_gates() {
        let admin = RoleCapabilities { is_admin: true, ..RoleCapabilities::NONE };
        assert!(admin.admits(Console::Verifier));
        assert!(admin.admits(Console::Issuer));

        let verifier = RoleCapabilities { is_verifier: true, ..RoleCapabilities::NONE };
        assert!(verifier.admits(Console::Verifier));
        assert!(!verifier.admits(Console::Issuer));

        let issuer = RoleCapabilities { is_issuer: true, ..RoleCapabilities::NONE };
        assert!(!issuer.admits(Console::Verifier));
        assert!(issuer.admits(Console::Issuer));

        assert!(!RoleCapabilities::NONE.admits(Console::Verifier));
        assert!(!RoleCapabilities::NONE.admits(Console::Issuer));
    }
}
