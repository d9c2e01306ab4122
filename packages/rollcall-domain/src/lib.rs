pub mod fingerprint;
pub mod matcher;
pub mod member;
pub mod merge;
pub mod normalize;
pub mod seed;
pub mod similarity;

pub use fingerprint::Fingerprint;
pub use matcher::{MatchPolicy, MatchResult, MatchRule};
pub use member::{CandidateMember, ContactSet, MasterAgent};
pub use merge::{MergeOp, MergeOutcome, MergePolicy};
pub use normalize::{NormalizationError, RawDocument};
pub use similarity::NameSimilarity;
