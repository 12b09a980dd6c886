//! Matching services
//!
//! Leaf-first: normalizer → domain policy → blocking index → scorer →
//! classifier. All of them are pure and synchronous; the orchestrator
//! drives them.

pub mod blocking_index;
pub mod classifier;
pub mod domain_policy;
pub mod normalizer;
pub mod scorer;

pub use blocking_index::{BlockingIndex, BlockingSource, CandidateLookup, PreparedShell};
pub use classifier::{Classifier, Screening};
pub use domain_policy::DomainPolicy;
pub use normalizer::{NormalizedIdentity, Normalizer};
pub use scorer::ScoredCandidate;
