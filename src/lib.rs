pub mod canonical;
pub mod clustering;
pub mod error;
pub mod ledger;
pub mod matching;
pub mod merge;
pub mod models;
pub mod rl;
pub mod store;
pub mod utils;

pub use error::ResolveError;
pub use ledger::JudgementLedger;
