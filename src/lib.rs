pub mod archive;
pub mod cli;
pub mod error;
pub mod github;
pub mod ledger;
pub mod model;
pub mod reconcile;
pub mod tally;
pub mod walker;
