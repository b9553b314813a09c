use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use procura_catalog::CatalogItemId;
use procura_core::{Aggregate, AggregateId, AggregateRoot, Money, ProcurementError, UserId};
use procura_events::Event;
use procura_suppliers::SupplierId;

use crate::tender::TenderId;

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BidId(pub AggregateId);

impl BidId {
    pub fn new(id: AggregateId) -> Self {
        Self(id)
    }
}

impl core::fmt::Display for BidId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        core::fmt::Display::fmt(&self.0, f)
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum BidStatus {
    Submitted,
    Qualified,
    Disqualified,
    Awarded,
}

impl BidStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            BidStatus::Submitted => "submitted",
            BidStatus::Qualified => "qualified",
            BidStatus::Disqualified => "disqualified",
            BidStatus::Awarded => "awarded",
        }
    }
}

impl core::fmt::Display for BidStatus {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One bid line, mirroring a requisition line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BidLine {
    pub item: CatalogItemId,
    pub quantity: i64,
    pub unit_price: Money,
}

/// Evaluation scores in basis points (0..=10_000).
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EvaluationScores {
    pub technical: u32,
    pub financial: u32,
    pub overall: u32,
}

impl EvaluationScores {
    const MAX_BASIS_POINTS: u32 = 10_000;

    pub fn validate(&self) -> Result<(), ProcurementError> {
        for score in [self.technical, self.financial, self.overall] {
            if score > Self::MAX_BASIS_POINTS {
                return Err(ProcurementError::validation(
                    "evaluation scores are basis points in 0..=10000",
                ));
            }
        }
        Ok(())
    }
}

/// Aggregate root: Bid. One supplier's offer against a tender.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Bid {
    id: BidId,
    tender: Option<TenderId>,
    supplier: Option<SupplierId>,
    amount: Money,
    lines: Vec<BidLine>,
    scores: Option<EvaluationScores>,
    status: BidStatus,
    version: u64,
    created: bool,
}

impl Bid {
    pub fn empty(id: BidId) -> Self {
        Self {
            id,
            tender: None,
            supplier: None,
            amount: Money::ZERO,
            lines: Vec::new(),
            scores: None,
            status: BidStatus::Submitted,
            version: 0,
            created: false,
        }
    }

    pub fn status(&self) -> BidStatus {
        self.status
    }

    pub fn amount(&self) -> Money {
        self.amount
    }

    pub fn supplier(&self) -> Option<SupplierId> {
        self.supplier
    }

    pub fn tender(&self) -> Option<TenderId> {
        self.tender
    }

    pub fn scores(&self) -> Option<EvaluationScores> {
        self.scores
    }

    pub fn lines(&self) -> &[BidLine] {
        &self.lines
    }
}

impl AggregateRoot for Bid {
    type Id = BidId;

    fn id(&self) -> &Self::Id {
        &self.id
    }

    fn version(&self) -> u64 {
        self.version
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubmitBid {
    pub bid_id: BidId,
    pub tender: TenderId,
    pub supplier: SupplierId,
    pub amount: Money,
    pub lines: Vec<BidLine>,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EvaluateBid {
    pub bid_id: BidId,
    pub evaluator: UserId,
    pub scores: EvaluationScores,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QualifyBid {
    pub bid_id: BidId,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DisqualifyBid {
    pub bid_id: BidId,
    pub reason: String,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AwardBid {
    pub bid_id: BidId,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum BidCommand {
    Submit(SubmitBid),
    Evaluate(EvaluateBid),
    Qualify(QualifyBid),
    Disqualify(DisqualifyBid),
    Award(AwardBid),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BidSubmitted {
    pub bid_id: BidId,
    pub tender: TenderId,
    pub supplier: SupplierId,
    pub amount: Money,
    pub lines: Vec<BidLine>,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BidEvaluated {
    pub bid_id: BidId,
    pub evaluator: UserId,
    pub scores: EvaluationScores,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BidQualified {
    pub bid_id: BidId,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BidDisqualified {
    pub bid_id: BidId,
    pub reason: String,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BidAwarded {
    pub bid_id: BidId,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum BidEvent {
    Submitted(BidSubmitted),
    Evaluated(BidEvaluated),
    Qualified(BidQualified),
    Disqualified(BidDisqualified),
    Awarded(BidAwarded),
}

impl Event for BidEvent {
    fn event_type(&self) -> &'static str {
        match self {
            BidEvent::Submitted(_) => "sourcing.bid.submitted",
            BidEvent::Evaluated(_) => "sourcing.bid.evaluated",
            BidEvent::Qualified(_) => "sourcing.bid.qualified",
            BidEvent::Disqualified(_) => "sourcing.bid.disqualified",
            BidEvent::Awarded(_) => "sourcing.bid.awarded",
        }
    }

    fn version(&self) -> u32 {
        1
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        match self {
            BidEvent::Submitted(e) => e.occurred_at,
            BidEvent::Evaluated(e) => e.occurred_at,
            BidEvent::Qualified(e) => e.occurred_at,
            BidEvent::Disqualified(e) => e.occurred_at,
            BidEvent::Awarded(e) => e.occurred_at,
        }
    }
}

impl Aggregate for Bid {
    type Command = BidCommand;
    type Event = BidEvent;
    type Error = ProcurementError;

    fn apply(&mut self, event: &Self::Event) {
        match event {
            BidEvent::Submitted(e) => {
                self.id = e.bid_id;
                self.tender = Some(e.tender);
                self.supplier = Some(e.supplier);
                self.amount = e.amount;
                self.lines = e.lines.clone();
                self.status = BidStatus::Submitted;
                self.created = true;
            }
            BidEvent::Evaluated(e) => {
                self.scores = Some(e.scores);
            }
            BidEvent::Qualified(_) => {
                self.status = BidStatus::Qualified;
            }
            BidEvent::Disqualified(_) => {
                self.status = BidStatus::Disqualified;
            }
            BidEvent::Awarded(_) => {
                self.status = BidStatus::Awarded;
            }
        }

        self.version += 1;
    }

    fn handle(&self, command: &Self::Command) -> Result<Vec<Self::Event>, Self::Error> {
        match command {
            BidCommand::Submit(cmd) => self.handle_submit(cmd),
            BidCommand::Evaluate(cmd) => self.handle_evaluate(cmd),
            BidCommand::Qualify(cmd) => self.handle_qualify(cmd),
            BidCommand::Disqualify(cmd) => self.handle_disqualify(cmd),
            BidCommand::Award(cmd) => self.handle_award(cmd),
        }
    }
}

impl Bid {
    fn handle_submit(&self, cmd: &SubmitBid) -> Result<Vec<BidEvent>, ProcurementError> {
        if self.created {
            return Err(ProcurementError::conflict("bid already exists"));
        }
        if !cmd.amount.is_positive() {
            return Err(ProcurementError::validation("bid amount must be positive"));
        }
        if cmd.lines.is_empty() {
            return Err(ProcurementError::validation("bid requires at least one line"));
        }
        if cmd
            .lines
            .iter()
            .any(|line| line.quantity <= 0 || !line.unit_price.is_positive())
        {
            return Err(ProcurementError::validation(
                "bid lines require positive quantity and price",
            ));
        }
        Ok(vec![BidEvent::Submitted(BidSubmitted {
            bid_id: cmd.bid_id,
            tender: cmd.tender,
            supplier: cmd.supplier,
            amount: cmd.amount,
            lines: cmd.lines.clone(),
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_evaluate(&self, cmd: &EvaluateBid) -> Result<Vec<BidEvent>, ProcurementError> {
        if self.status != BidStatus::Submitted {
            return Err(ProcurementError::invalid_transition(
                self.status.as_str(),
                "evaluate",
            ));
        }
        cmd.scores.validate()?;
        Ok(vec![BidEvent::Evaluated(BidEvaluated {
            bid_id: cmd.bid_id,
            evaluator: cmd.evaluator,
            scores: cmd.scores,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_qualify(&self, cmd: &QualifyBid) -> Result<Vec<BidEvent>, ProcurementError> {
        if self.status != BidStatus::Submitted {
            return Err(ProcurementError::invalid_transition(
                self.status.as_str(),
                "qualify",
            ));
        }
        // Evaluation must be recorded before qualification.
        if self.scores.is_none() {
            return Err(ProcurementError::out_of_sequence(
                "bid must be evaluated before qualification",
            ));
        }
        Ok(vec![BidEvent::Qualified(BidQualified {
            bid_id: cmd.bid_id,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_disqualify(&self, cmd: &DisqualifyBid) -> Result<Vec<BidEvent>, ProcurementError> {
        match self.status {
            BidStatus::Submitted | BidStatus::Qualified => {
                Ok(vec![BidEvent::Disqualified(BidDisqualified {
                    bid_id: cmd.bid_id,
                    reason: cmd.reason.clone(),
                    occurred_at: cmd.occurred_at,
                })])
            }
            _ => Err(ProcurementError::invalid_transition(
                self.status.as_str(),
                "disqualify",
            )),
        }
    }

    fn handle_award(&self, cmd: &AwardBid) -> Result<Vec<BidEvent>, ProcurementError> {
        if self.status != BidStatus::Qualified {
            return Err(ProcurementError::invalid_transition(
                self.status.as_str(),
                "award",
            ));
        }
        Ok(vec![BidEvent::Awarded(BidAwarded {
            bid_id: cmd.bid_id,
            occurred_at: cmd.occurred_at,
        })])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn run(bid: &mut Bid, cmd: BidCommand) -> Result<Vec<BidEvent>, ProcurementError> {
        let events = bid.handle(&cmd)?;
        for e in &events {
            bid.apply(e);
        }
        Ok(events)
    }

    fn submitted() -> (Bid, BidId) {
        let id = BidId::new(AggregateId::new());
        let mut bid = Bid::empty(id);
        run(
            &mut bid,
            BidCommand::Submit(SubmitBid {
                bid_id: id,
                tender: TenderId::new(AggregateId::new()),
                supplier: SupplierId::new(AggregateId::new()),
                amount: Money::from_minor(720_000_00),
                lines: vec![BidLine {
                    item: CatalogItemId::new(AggregateId::new()),
                    quantity: 1,
                    unit_price: Money::from_minor(720_000_00),
                }],
                occurred_at: Utc::now(),
            }),
        )
        .unwrap();
        (bid, id)
    }

    #[test]
    fn qualification_requires_prior_evaluation() {
        let (mut bid, id) = submitted();

        let err = bid
            .handle(&BidCommand::Qualify(QualifyBid {
                bid_id: id,
                occurred_at: Utc::now(),
            }))
            .unwrap_err();
        assert!(matches!(err, ProcurementError::OutOfSequence(_)));

        run(
            &mut bid,
            BidCommand::Evaluate(EvaluateBid {
                bid_id: id,
                evaluator: UserId::new(),
                scores: EvaluationScores {
                    technical: 8_200,
                    financial: 9_000,
                    overall: 8_600,
                },
                occurred_at: Utc::now(),
            }),
        )
        .unwrap();
        run(
            &mut bid,
            BidCommand::Qualify(QualifyBid {
                bid_id: id,
                occurred_at: Utc::now(),
            }),
        )
        .unwrap();
        assert_eq!(bid.status(), BidStatus::Qualified);
    }

    #[test]
    fn scores_above_basis_point_scale_are_rejected() {
        let (bid, id) = submitted();
        let err = bid
            .handle(&BidCommand::Evaluate(EvaluateBid {
                bid_id: id,
                evaluator: UserId::new(),
                scores: EvaluationScores {
                    technical: 10_001,
                    financial: 5_000,
                    overall: 7_500,
                },
                occurred_at: Utc::now(),
            }))
            .unwrap_err();
        assert!(matches!(err, ProcurementError::Validation(_)));
    }

    #[test]
    fn only_qualified_bids_can_be_awarded() {
        let (mut bid, id) = submitted();
        let err = bid
            .handle(&BidCommand::Award(AwardBid {
                bid_id: id,
                occurred_at: Utc::now(),
            }))
            .unwrap_err();
        assert!(matches!(err, ProcurementError::InvalidTransition { .. }));

        run(
            &mut bid,
            BidCommand::Evaluate(EvaluateBid {
                bid_id: id,
                evaluator: UserId::new(),
                scores: EvaluationScores {
                    technical: 9_000,
                    financial: 9_000,
                    overall: 9_000,
                },
                occurred_at: Utc::now(),
            }),
        )
        .unwrap();
        run(
            &mut bid,
            BidCommand::Qualify(QualifyBid {
                bid_id: id,
                occurred_at: Utc::now(),
            }),
        )
        .unwrap();
        run(
            &mut bid,
            BidCommand::Award(AwardBid {
                bid_id: id,
                occurred_at: Utc::now(),
            }),
        )
        .unwrap();
        assert_eq!(bid.status(), BidStatus::Awarded);
    }

    #[test]
    fn disqualified_bid_is_terminal() {
        let (mut bid, id) = submitted();
        run(
            &mut bid,
            BidCommand::Disqualify(DisqualifyBid {
                bid_id: id,
                reason: "missing tax clearance".to_string(),
                occurred_at: Utc::now(),
            }),
        )
        .unwrap();

        let err = bid
            .handle(&BidCommand::Award(AwardBid {
                bid_id: id,
                occurred_at: Utc::now(),
            }))
            .unwrap_err();
        assert!(matches!(err, ProcurementError::InvalidTransition { .. }));
    }
}
