use serde::{Deserialize, Serialize};

/// Closed set of engine operations subject to authorization.
///
/// One variant per workflow-boundary operation; aggregates themselves stay
/// authorization-free.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Action {
    CreateRequisition,
    SubmitRequisition,
    CancelRequisition,
    ApproveHodStage,
    ApproveFacultyStage,
    ApproveBudgetStage,
    ApproveFinanceStage,
    ApproveProcurementStage,

    CreateTender,
    PublishTender,
    EvaluateBid,
    AwardTender,

    CreatePurchaseOrder,
    ApprovePurchaseOrder,
    SendPurchaseOrder,
    CancelPurchaseOrder,

    PostGoodsReceipt,
    IssueStock,
    TransferStock,
    AdjustStock,

    SubmitInvoice,
    VerifyInvoice,
    ApproveInvoice,
    OverrideInvoiceMatch,
    ExecutePayment,

    ManagePlan,
    ProposeAmendment,
    DecideAmendment,

    RegisterSupplier,
    VerifySupplierDocument,
    ManageCatalog,
    ManageBudget,
}

impl core::fmt::Display for Action {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{self:?}")
    }
}
