//! Analysis pipeline.
//!
//! Stage order: standings resolution, power scoring and Trinity context
//! (concurrent), Tesseract simulation, optional LLMGRADE grading,
//! bias-corrected adjustment, ledger write. `oracle` owns the pipeline;
//! the other modules are its stages.

pub mod adjuster;
pub mod grading;
pub mod ledger;
pub mod oracle;
pub mod power;
pub mod standings;
pub mod tesseract;
pub mod trinity;

pub use oracle::OracleEngine;
