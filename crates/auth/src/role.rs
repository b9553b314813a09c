use serde::{Deserialize, Serialize};

/// Closed set of roles in the university procurement organization.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    /// Staff member raising requisitions for their department.
    Requester,
    /// Head of the requesting department.
    HeadOfDepartment,
    /// Dean of the faculty the department belongs to.
    FacultyDean,
    /// Budget office reviewer.
    BudgetOfficer,
    /// Finance office reviewer and payment executor.
    FinanceOfficer,
    /// Procurement office: tendering, orders, final sign-off.
    ProcurementOfficer,
    /// Store staff: goods receipt, stock issues and transfers.
    StoreKeeper,
    /// Full access (system administration).
    Admin,
}

impl Role {
    pub const ALL: [Role; 8] = [
        Role::Requester,
        Role::HeadOfDepartment,
        Role::FacultyDean,
        Role::BudgetOfficer,
        Role::FinanceOfficer,
        Role::ProcurementOfficer,
        Role::StoreKeeper,
        Role::Admin,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Requester => "requester",
            Role::HeadOfDepartment => "head_of_department",
            Role::FacultyDean => "faculty_dean",
            Role::BudgetOfficer => "budget_officer",
            Role::FinanceOfficer => "finance_officer",
            Role::ProcurementOfficer => "procurement_officer",
            Role::StoreKeeper => "store_keeper",
            Role::Admin => "admin",
        }
    }
}

impl core::fmt::Display for Role {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}
