use serde::{Deserialize, Serialize};

use procura_auth::{Action, Role};
use procura_core::{DomainResult, Money, ProcurementError};

/// Approval stages in canonical order. Ordering is the chain ordering:
/// a later stage cannot be decided while an earlier required stage is open.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum ApprovalStage {
    Hod,
    Faculty,
    Budget,
    Finance,
    Procurement,
}

impl ApprovalStage {
    pub const ALL: [ApprovalStage; 5] = [
        ApprovalStage::Hod,
        ApprovalStage::Faculty,
        ApprovalStage::Budget,
        ApprovalStage::Finance,
        ApprovalStage::Procurement,
    ];

    /// The single role allowed to decide this stage.
    pub fn required_role(&self) -> Role {
        match self {
            ApprovalStage::Hod => Role::HeadOfDepartment,
            ApprovalStage::Faculty => Role::FacultyDean,
            ApprovalStage::Budget => Role::BudgetOfficer,
            ApprovalStage::Finance => Role::FinanceOfficer,
            ApprovalStage::Procurement => Role::ProcurementOfficer,
        }
    }

    /// The capability checked at the engine boundary for this stage.
    pub fn action(&self) -> Action {
        match self {
            ApprovalStage::Hod => Action::ApproveHodStage,
            ApprovalStage::Faculty => Action::ApproveFacultyStage,
            ApprovalStage::Budget => Action::ApproveBudgetStage,
            ApprovalStage::Finance => Action::ApproveFinanceStage,
            ApprovalStage::Procurement => Action::ApproveProcurementStage,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ApprovalStage::Hod => "hod",
            ApprovalStage::Faculty => "faculty",
            ApprovalStage::Budget => "budget",
            ApprovalStage::Finance => "finance",
            ApprovalStage::Procurement => "procurement",
        }
    }
}

impl core::fmt::Display for ApprovalStage {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One `[min, max)` amount bracket of the policy table. `max: None` means
/// unbounded (the table's last bracket).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ThresholdBracket {
    pub min: Money,
    pub max: Option<Money>,
    pub stages: Vec<ApprovalStage>,
    pub tender_required: bool,
}

impl ThresholdBracket {
    pub fn contains(&self, amount: Money) -> bool {
        amount >= self.min && self.max.is_none_or(|max| amount < max)
    }
}

/// A validated approval policy: contiguous, non-overlapping amount brackets
/// covering `[0, ∞)`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApprovalPolicy {
    brackets: Vec<ThresholdBracket>,
}

impl ApprovalPolicy {
    /// Build a policy, rejecting malformed tables up front: the first bracket
    /// must start at zero, each bracket's max must equal the next bracket's
    /// min, only the last bracket may be unbounded, stage sets must be
    /// non-empty and in canonical order.
    pub fn new(brackets: Vec<ThresholdBracket>) -> DomainResult<Self> {
        if brackets.is_empty() {
            return Err(ProcurementError::validation("policy requires at least one bracket"));
        }
        if brackets[0].min != Money::ZERO {
            return Err(ProcurementError::validation("first bracket must start at zero"));
        }

        for (index, bracket) in brackets.iter().enumerate() {
            if bracket.stages.is_empty() {
                return Err(ProcurementError::validation(format!(
                    "bracket {index} has no approval stages"
                )));
            }
            if !bracket.stages.is_sorted() || has_duplicates(&bracket.stages) {
                return Err(ProcurementError::validation(format!(
                    "bracket {index} stages must be unique and in canonical order"
                )));
            }

            let is_last = index + 1 == brackets.len();
            match (bracket.max, is_last) {
                (None, false) => {
                    return Err(ProcurementError::validation(
                        "only the last bracket may be unbounded",
                    ));
                }
                (Some(max), _) if max <= bracket.min => {
                    return Err(ProcurementError::validation(format!(
                        "bracket {index} is empty: max must exceed min"
                    )));
                }
                (Some(max), false) if max != brackets[index + 1].min => {
                    return Err(ProcurementError::validation(format!(
                        "brackets {index} and {} are not contiguous",
                        index + 1
                    )));
                }
                (Some(_), true) => {
                    return Err(ProcurementError::validation(
                        "last bracket must be unbounded",
                    ));
                }
                _ => {}
            }
        }

        Ok(Self { brackets })
    }

    /// The bracket governing a requisition of the given total amount.
    pub fn bracket_for(&self, amount: Money) -> DomainResult<&ThresholdBracket> {
        if amount.is_negative() {
            return Err(ProcurementError::validation("amount cannot be negative"));
        }
        self.brackets
            .iter()
            .find(|b| b.contains(amount))
            .ok_or_else(ProcurementError::not_found)
    }

    pub fn brackets(&self) -> &[ThresholdBracket] {
        &self.brackets
    }

    /// Standard university table: three brackets escalating from departmental
    /// sign-off to the full five-stage chain with mandatory tender.
    ///
    /// The top bracket deliberately runs every stage: budget sign-off stays
    /// required on tender purchases even though the tender itself adds its
    /// own scrutiny, so the largest spends never bypass the budget office.
    pub fn standard() -> Self {
        Self::new(vec![
            ThresholdBracket {
                min: Money::ZERO,
                max: Some(Money::from_minor(50_000_00)),
                stages: vec![ApprovalStage::Hod, ApprovalStage::Budget],
                tender_required: false,
            },
            ThresholdBracket {
                min: Money::from_minor(50_000_00),
                max: Some(Money::from_minor(500_000_00)),
                stages: vec![
                    ApprovalStage::Hod,
                    ApprovalStage::Faculty,
                    ApprovalStage::Budget,
                    ApprovalStage::Finance,
                ],
                tender_required: false,
            },
            ThresholdBracket {
                min: Money::from_minor(500_000_00),
                max: None,
                stages: ApprovalStage::ALL.to_vec(),
                tender_required: true,
            },
        ])
        .expect("standard policy table is well formed")
    }
}

fn has_duplicates(stages: &[ApprovalStage]) -> bool {
    stages.windows(2).any(|pair| pair[0] == pair[1])
}
