//! Capability table: `{role x action}` -> allowed.

use std::collections::{HashMap, HashSet};

use procura_core::{DomainResult, ProcurementError};

use crate::action::Action;
use crate::actor::Actor;
use crate::role::Role;

/// Authorization matrix checked once at the engine boundary.
///
/// `Admin` is an implicit wildcard; everything else must be granted
/// explicitly. The standard matrix mirrors the university's segregation of
/// duties: the office that approves a spend never executes its payment.
#[derive(Debug, Clone)]
pub struct CapabilityTable {
    grants: HashMap<Role, HashSet<Action>>,
}

impl CapabilityTable {
    pub fn empty() -> Self {
        Self {
            grants: HashMap::new(),
        }
    }

    /// Default capability matrix for the university procurement organization.
    pub fn standard() -> Self {
        use Action::*;

        let mut table = Self::empty();
        table.grant_all(Role::Requester, [CreateRequisition, SubmitRequisition, CancelRequisition]);
        table.grant_all(Role::HeadOfDepartment, [
            ApproveHodStage,
            CreateRequisition,
            SubmitRequisition,
            CancelRequisition,
            ManagePlan,
            ProposeAmendment,
        ]);
        table.grant_all(Role::FacultyDean, [ApproveFacultyStage, DecideAmendment]);
        table.grant_all(Role::BudgetOfficer, [ApproveBudgetStage, ManageBudget]);
        table.grant_all(Role::FinanceOfficer, [
            ApproveFinanceStage,
            VerifyInvoice,
            ApproveInvoice,
            ExecutePayment,
        ]);
        table.grant_all(Role::ProcurementOfficer, [
            ApproveProcurementStage,
            CreateTender,
            PublishTender,
            EvaluateBid,
            AwardTender,
            CreatePurchaseOrder,
            ApprovePurchaseOrder,
            SendPurchaseOrder,
            CancelPurchaseOrder,
            OverrideInvoiceMatch,
            RegisterSupplier,
            VerifySupplierDocument,
            ManageCatalog,
            DecideAmendment,
        ]);
        table.grant_all(Role::StoreKeeper, [
            PostGoodsReceipt,
            IssueStock,
            TransferStock,
            AdjustStock,
            SubmitInvoice,
        ]);
        table
    }

    pub fn grant(&mut self, role: Role, action: Action) {
        self.grants.entry(role).or_default().insert(action);
    }

    pub fn grant_all(&mut self, role: Role, actions: impl IntoIterator<Item = Action>) {
        let set = self.grants.entry(role).or_default();
        set.extend(actions);
    }

    pub fn allows(&self, role: Role, action: Action) -> bool {
        if role == Role::Admin {
            return true;
        }
        self.grants.get(&role).is_some_and(|set| set.contains(&action))
    }

    /// Authorize an actor for an action.
    ///
    /// - No IO
    /// - No panics
    /// - Pure policy check (first granting role wins)
    pub fn authorize(&self, actor: &Actor, action: Action) -> DomainResult<()> {
        if actor.roles.iter().any(|r| self.allows(*r, action)) {
            Ok(())
        } else {
            Err(ProcurementError::unauthorized(format!(
                "user {} lacks a role granting {action}",
                actor.user_id
            )))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use procura_core::UserId;

    #[test]
    fn store_keeper_cannot_approve_invoices() {
        let table = CapabilityTable::standard();
        let actor = Actor::new(UserId::new(), vec![Role::StoreKeeper]);

        assert!(table.authorize(&actor, Action::PostGoodsReceipt).is_ok());
        let err = table.authorize(&actor, Action::ApproveInvoice).unwrap_err();
        assert!(matches!(err, ProcurementError::Unauthorized(_)));
    }

    #[test]
    fn admin_is_a_wildcard() {
        let table = CapabilityTable::standard();
        let actor = Actor::new(UserId::new(), vec![Role::Admin]);

        for action in [Action::AwardTender, Action::ExecutePayment, Action::AdjustStock] {
            assert!(table.authorize(&actor, action).is_ok());
        }
    }

    #[test]
    fn any_granting_role_suffices() {
        let table = CapabilityTable::standard();
        let actor = Actor::new(UserId::new(), vec![Role::Requester, Role::FinanceOfficer]);

        assert!(table.authorize(&actor, Action::ExecutePayment).is_ok());
    }
}
