mod constraints;
mod error;
pub mod ledger;
mod offer;
pub mod substitution;

pub use constraints::{validate_offer, ConstraintViolation, OfferConstraints};
pub use error::Error;
pub use ledger::{LedgerStats, OfferHistoryEntry, OfferLedger};
pub use offer::{upfront_percent, Offer, Party};
pub use substitution::{
    QualityImpact, SubstitutionLedger, SubstitutionProposal, SubstitutionRecord,
    SubstitutionResponse, SubstitutionStatus,
};
