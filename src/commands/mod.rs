pub mod reconcile;
pub mod run;
pub mod status;
