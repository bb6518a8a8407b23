pub mod config;
pub mod engine;
pub mod error;
pub mod hasher;
pub mod identity;
pub mod index;
pub mod normalize;
pub mod progress;
pub mod reconcile;
pub mod report;
pub mod scanner;

pub use config::{AppConfig, ScanOptions};
pub use engine::{DirectoryHasher, FileFailure, ScanOutcome, ScanStats, Verification, VerifyEngine};
pub use error::{Error, Result};
pub use hasher::{Digest, HashAlgorithm};
pub use index::HashIndex;
pub use normalize::{NormalizationRules, Normalizer};
pub use progress::{ProgressReporter, SilentReporter};
pub use reconcile::MissingItem;
pub use report::Verdict;
