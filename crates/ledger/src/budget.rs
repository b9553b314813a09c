use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use procura_catalog::ItemCategoryId;
use procura_core::{
    Aggregate, AggregateId, AggregateRoot, DepartmentId, Money, ProcurementError,
};
use procura_events::Event;

/// Budget allocation identifier.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BudgetId(pub AggregateId);

impl BudgetId {
    pub fn new(id: AggregateId) -> Self {
        Self(id)
    }
}

impl core::fmt::Display for BudgetId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        core::fmt::Display::fmt(&self.0, f)
    }
}

/// Fiscal year, e.g. 2026.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FiscalYear(pub u16);

impl core::fmt::Display for FiscalYear {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        core::fmt::Display::fmt(&self.0, f)
    }
}

/// Whether the allocation ceiling is enforced at commitment time.
///
/// `Soft` records the breach but allows it; `Hard` rejects the mutation with
/// `InsufficientBudget`.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Enforcement {
    Hard,
    Soft,
}

/// Aggregate root: BudgetAllocation.
///
/// One per (department, fiscal year, category). Invariant under `Hard`
/// enforcement: `committed + spent <= allocated` after every mutation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BudgetAllocation {
    id: BudgetId,
    department: Option<DepartmentId>,
    fiscal_year: FiscalYear,
    category: Option<ItemCategoryId>,
    allocated: Money,
    committed: Money,
    spent: Money,
    enforcement: Enforcement,
    version: u64,
    created: bool,
}

impl BudgetAllocation {
    /// Empty aggregate for rehydration.
    pub fn empty(id: BudgetId) -> Self {
        Self {
            id,
            department: None,
            fiscal_year: FiscalYear(0),
            category: None,
            allocated: Money::ZERO,
            committed: Money::ZERO,
            spent: Money::ZERO,
            enforcement: Enforcement::Hard,
            version: 0,
            created: false,
        }
    }

    pub fn id_typed(&self) -> BudgetId {
        self.id
    }

    pub fn department(&self) -> Option<DepartmentId> {
        self.department
    }

    pub fn fiscal_year(&self) -> FiscalYear {
        self.fiscal_year
    }

    pub fn allocated(&self) -> Money {
        self.allocated
    }

    pub fn committed(&self) -> Money {
        self.committed
    }

    pub fn spent(&self) -> Money {
        self.spent
    }

    pub fn enforcement(&self) -> Enforcement {
        self.enforcement
    }

    /// Headroom left for new commitments.
    pub fn available(&self) -> Money {
        self.allocated - self.committed - self.spent
    }
}

impl AggregateRoot for BudgetAllocation {
    type Id = BudgetId;

    fn id(&self) -> &Self::Id {
        &self.id
    }

    fn version(&self) -> u64 {
        self.version
    }
}

/// Command: OpenBudget.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OpenBudget {
    pub budget_id: BudgetId,
    pub department: DepartmentId,
    pub fiscal_year: FiscalYear,
    pub category: Option<ItemCategoryId>,
    pub allocated: Money,
    pub enforcement: Enforcement,
    pub occurred_at: DateTime<Utc>,
}

/// Command: ReserveFunds (commitment against future spend).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReserveFunds {
    pub budget_id: BudgetId,
    pub amount: Money,
    /// Aggregate that caused the reservation (requisition or PO), so release
    /// can reverse exactly what was reserved.
    pub reference: AggregateId,
    pub occurred_at: DateTime<Utc>,
}

/// Command: ReleaseFunds (cancellation path).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReleaseFunds {
    pub budget_id: BudgetId,
    pub amount: Money,
    pub reference: AggregateId,
    pub occurred_at: DateTime<Utc>,
}

/// Command: SettleFunds (commitment -> actual spend; actual may differ).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SettleFunds {
    pub budget_id: BudgetId,
    pub committed_amount: Money,
    pub actual_amount: Money,
    pub reference: AggregateId,
    pub occurred_at: DateTime<Utc>,
}

/// Command: ReverseSettlement (compensating entry for a prior settlement).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReverseSettlement {
    pub budget_id: BudgetId,
    pub committed_amount: Money,
    pub actual_amount: Money,
    pub reference: AggregateId,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum BudgetCommand {
    OpenBudget(OpenBudget),
    ReserveFunds(ReserveFunds),
    ReleaseFunds(ReleaseFunds),
    SettleFunds(SettleFunds),
    ReverseSettlement(ReverseSettlement),
}

/// Event: BudgetOpened.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BudgetOpened {
    pub budget_id: BudgetId,
    pub department: DepartmentId,
    pub fiscal_year: FiscalYear,
    pub category: Option<ItemCategoryId>,
    pub allocated: Money,
    pub enforcement: Enforcement,
    pub occurred_at: DateTime<Utc>,
}

/// Event: FundsReserved. Carries before/after balances (immutable ledger
/// entry).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FundsReserved {
    pub budget_id: BudgetId,
    pub amount: Money,
    pub reference: AggregateId,
    pub committed_before: Money,
    pub committed_after: Money,
    pub occurred_at: DateTime<Utc>,
}

/// Event: FundsReleased.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FundsReleased {
    pub budget_id: BudgetId,
    pub amount: Money,
    pub reference: AggregateId,
    pub committed_before: Money,
    pub committed_after: Money,
    pub occurred_at: DateTime<Utc>,
}

/// Event: FundsSettled.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FundsSettled {
    pub budget_id: BudgetId,
    pub committed_amount: Money,
    pub actual_amount: Money,
    pub reference: AggregateId,
    pub committed_before: Money,
    pub committed_after: Money,
    pub spent_before: Money,
    pub spent_after: Money,
    pub occurred_at: DateTime<Utc>,
}

/// Event: SettlementReversed. A reversing entry, never an edit of the
/// original settlement.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SettlementReversed {
    pub budget_id: BudgetId,
    pub committed_amount: Money,
    pub actual_amount: Money,
    pub reference: AggregateId,
    pub committed_before: Money,
    pub committed_after: Money,
    pub spent_before: Money,
    pub spent_after: Money,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum BudgetEvent {
    BudgetOpened(BudgetOpened),
    FundsReserved(FundsReserved),
    FundsReleased(FundsReleased),
    FundsSettled(FundsSettled),
    SettlementReversed(SettlementReversed),
}

impl Event for BudgetEvent {
    fn event_type(&self) -> &'static str {
        match self {
            BudgetEvent::BudgetOpened(_) => "ledger.budget.opened",
            BudgetEvent::FundsReserved(_) => "ledger.budget.funds_reserved",
            BudgetEvent::FundsReleased(_) => "ledger.budget.funds_released",
            BudgetEvent::FundsSettled(_) => "ledger.budget.funds_settled",
            BudgetEvent::SettlementReversed(_) => "ledger.budget.settlement_reversed",
        }
    }

    fn version(&self) -> u32 {
        1
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        match self {
            BudgetEvent::BudgetOpened(e) => e.occurred_at,
            BudgetEvent::FundsReserved(e) => e.occurred_at,
            BudgetEvent::FundsReleased(e) => e.occurred_at,
            BudgetEvent::FundsSettled(e) => e.occurred_at,
            BudgetEvent::SettlementReversed(e) => e.occurred_at,
        }
    }
}

impl Aggregate for BudgetAllocation {
    type Command = BudgetCommand;
    type Event = BudgetEvent;
    type Error = ProcurementError;

    fn apply(&mut self, event: &Self::Event) {
        match event {
            BudgetEvent::BudgetOpened(e) => {
                self.id = e.budget_id;
                self.department = Some(e.department);
                self.fiscal_year = e.fiscal_year;
                self.category = e.category;
                self.allocated = e.allocated;
                self.committed = Money::ZERO;
                self.spent = Money::ZERO;
                self.enforcement = e.enforcement;
                self.created = true;
            }
            BudgetEvent::FundsReserved(e) => {
                self.committed = e.committed_after;
            }
            BudgetEvent::FundsReleased(e) => {
                self.committed = e.committed_after;
            }
            BudgetEvent::FundsSettled(e) => {
                self.committed = e.committed_after;
                self.spent = e.spent_after;
            }
            BudgetEvent::SettlementReversed(e) => {
                self.committed = e.committed_after;
                self.spent = e.spent_after;
            }
        }

        self.version += 1;
    }

    fn handle(&self, command: &Self::Command) -> Result<Vec<Self::Event>, Self::Error> {
        match command {
            BudgetCommand::OpenBudget(cmd) => self.handle_open(cmd),
            BudgetCommand::ReserveFunds(cmd) => self.handle_reserve(cmd),
            BudgetCommand::ReleaseFunds(cmd) => self.handle_release(cmd),
            BudgetCommand::SettleFunds(cmd) => self.handle_settle(cmd),
            BudgetCommand::ReverseSettlement(cmd) => self.handle_reverse_settlement(cmd),
        }
    }
}

impl BudgetAllocation {
    fn ensure_created(&self) -> Result<(), ProcurementError> {
        if !self.created {
            return Err(ProcurementError::not_found());
        }
        Ok(())
    }

    fn handle_open(&self, cmd: &OpenBudget) -> Result<Vec<BudgetEvent>, ProcurementError> {
        if self.created {
            return Err(ProcurementError::conflict("budget allocation already exists"));
        }
        if !cmd.allocated.is_positive() {
            return Err(ProcurementError::validation("allocated amount must be positive"));
        }
        Ok(vec![BudgetEvent::BudgetOpened(BudgetOpened {
            budget_id: cmd.budget_id,
            department: cmd.department,
            fiscal_year: cmd.fiscal_year,
            category: cmd.category,
            allocated: cmd.allocated,
            enforcement: cmd.enforcement,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_reserve(&self, cmd: &ReserveFunds) -> Result<Vec<BudgetEvent>, ProcurementError> {
        self.ensure_created()?;
        if !cmd.amount.is_positive() {
            return Err(ProcurementError::validation("reservation amount must be positive"));
        }

        let committed_after = self.committed.checked_add(cmd.amount)?;
        if self.enforcement == Enforcement::Hard {
            let exposure = committed_after.checked_add(self.spent)?;
            if exposure > self.allocated {
                return Err(ProcurementError::InsufficientBudget {
                    requested: cmd.amount.minor(),
                    available: self.available().minor(),
                });
            }
        }

        Ok(vec![BudgetEvent::FundsReserved(FundsReserved {
            budget_id: cmd.budget_id,
            amount: cmd.amount,
            reference: cmd.reference,
            committed_before: self.committed,
            committed_after,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_release(&self, cmd: &ReleaseFunds) -> Result<Vec<BudgetEvent>, ProcurementError> {
        self.ensure_created()?;
        if !cmd.amount.is_positive() {
            return Err(ProcurementError::validation("release amount must be positive"));
        }
        if cmd.amount > self.committed {
            return Err(ProcurementError::validation(format!(
                "release of {} exceeds committed {}",
                cmd.amount, self.committed
            )));
        }

        Ok(vec![BudgetEvent::FundsReleased(FundsReleased {
            budget_id: cmd.budget_id,
            amount: cmd.amount,
            reference: cmd.reference,
            committed_before: self.committed,
            committed_after: self.committed - cmd.amount,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_settle(&self, cmd: &SettleFunds) -> Result<Vec<BudgetEvent>, ProcurementError> {
        self.ensure_created()?;
        if !cmd.committed_amount.is_positive() {
            return Err(ProcurementError::validation("settled commitment must be positive"));
        }
        if cmd.actual_amount.is_negative() {
            return Err(ProcurementError::validation("actual amount cannot be negative"));
        }
        if cmd.committed_amount > self.committed {
            return Err(ProcurementError::validation(format!(
                "settlement of {} exceeds committed {}",
                cmd.committed_amount, self.committed
            )));
        }

        let committed_after = self.committed - cmd.committed_amount;
        let spent_after = self.spent.checked_add(cmd.actual_amount)?;
        if self.enforcement == Enforcement::Hard {
            let exposure = committed_after.checked_add(spent_after)?;
            if exposure > self.allocated {
                return Err(ProcurementError::InsufficientBudget {
                    requested: cmd.actual_amount.minor(),
                    available: self.available().minor(),
                });
            }
        }

        Ok(vec![BudgetEvent::FundsSettled(FundsSettled {
            budget_id: cmd.budget_id,
            committed_amount: cmd.committed_amount,
            actual_amount: cmd.actual_amount,
            reference: cmd.reference,
            committed_before: self.committed,
            committed_after,
            spent_before: self.spent,
            spent_after,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_reverse_settlement(
        &self,
        cmd: &ReverseSettlement,
    ) -> Result<Vec<BudgetEvent>, ProcurementError> {
        self.ensure_created()?;
        if !cmd.committed_amount.is_positive() {
            return Err(ProcurementError::validation("reversed commitment must be positive"));
        }
        if cmd.actual_amount.is_negative() {
            return Err(ProcurementError::validation("actual amount cannot be negative"));
        }
        if cmd.actual_amount > self.spent {
            return Err(ProcurementError::validation(format!(
                "reversal of {} exceeds spent {}",
                cmd.actual_amount, self.spent
            )));
        }

        let committed_after = self.committed.checked_add(cmd.committed_amount)?;
        let spent_after = self.spent - cmd.actual_amount;
        if self.enforcement == Enforcement::Hard {
            let exposure = committed_after.checked_add(spent_after)?;
            if exposure > self.allocated {
                return Err(ProcurementError::InsufficientBudget {
                    requested: cmd.committed_amount.minor(),
                    available: self.available().minor(),
                });
            }
        }

        Ok(vec![BudgetEvent::SettlementReversed(SettlementReversed {
            budget_id: cmd.budget_id,
            committed_amount: cmd.committed_amount,
            actual_amount: cmd.actual_amount,
            reference: cmd.reference,
            committed_before: self.committed,
            committed_after,
            spent_before: self.spent,
            spent_after,
            occurred_at: cmd.occurred_at,
        })])
    }
}
