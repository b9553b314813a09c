//! Sourcing: tenders and bids.

pub mod bid;
pub mod tender;

pub use bid::{Bid, BidCommand, BidEvent, BidId, BidLine, BidStatus, EvaluationScores};
pub use tender::{Tender, TenderCommand, TenderEvent, TenderId, TenderStatus};
