//! Closed role set and the capability table.

use core::str::FromStr;
use serde::{Deserialize, Serialize};

use gasflow_core::DomainError;

/// Role of a user. A closed set: adding a role means editing the capability
/// table below, not subclassing a user type.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Admin,
    Sales,
    Supervisor,
}

/// Operations the ingress gates on.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Capability {
    RegisterDepot,
    RegisterCustomer,
    DistributeStock,
    RecordSale,
    MarkPaid,
    IssueInvoice,
    ReadReports,
}

impl Role {
    /// Explicit capability table. Authorization is a lookup here, never
    /// inheritance-based dispatch.
    pub fn capabilities(&self) -> &'static [Capability] {
        use Capability::*;
        match self {
            Role::Admin => &[
                RegisterDepot,
                RegisterCustomer,
                DistributeStock,
                RecordSale,
                MarkPaid,
                IssueInvoice,
                ReadReports,
            ],
            Role::Sales => &[DistributeStock, RecordSale, IssueInvoice, ReadReports],
            Role::Supervisor => &[DistributeStock, MarkPaid, ReadReports],
        }
    }

    pub fn allows(&self, capability: Capability) -> bool {
        self.capabilities().contains(&capability)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Admin => "admin",
            Role::Sales => "sales",
            Role::Supervisor => "supervisor",
        }
    }
}

impl core::fmt::Display for Role {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "admin" => Ok(Role::Admin),
            "sales" => Ok(Role::Sales),
            "supervisor" => Ok(Role::Supervisor),
            other => Err(DomainError::validation(format!(
                "unknown role '{other}' (expected admin, sales or supervisor)"
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn admin_holds_every_capability() {
        use Capability::*;
        for cap in [
            RegisterDepot,
            RegisterCustomer,
            DistributeStock,
            RecordSale,
            MarkPaid,
            IssueInvoice,
            ReadReports,
        ] {
            assert!(Role::Admin.allows(cap), "admin should allow {cap:?}");
        }
    }

    #[test]
    fn sales_cannot_register_depots_or_mark_paid() {
        assert!(Role::Sales.allows(Capability::RecordSale));
        assert!(Role::Sales.allows(Capability::IssueInvoice));
        assert!(!Role::Sales.allows(Capability::RegisterDepot));
        assert!(!Role::Sales.allows(Capability::MarkPaid));
    }

    #[test]
    fn supervisor_cannot_record_sales() {
        assert!(Role::Supervisor.allows(Capability::DistributeStock));
        assert!(Role::Supervisor.allows(Capability::MarkPaid));
        assert!(!Role::Supervisor.allows(Capability::RecordSale));
        assert!(!Role::Supervisor.allows(Capability::IssueInvoice));
    }

    #[test]
    fn role_round_trips_through_str() {
        for role in [Role::Admin, Role::Sales, Role::Supervisor] {
            assert_eq!(role.as_str().parse::<Role>().unwrap(), role);
        }
        assert!("manager".parse::<Role>().is_err());
    }
}
