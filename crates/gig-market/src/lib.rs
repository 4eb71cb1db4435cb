//! Core of the gig-labor marketplace: the job application lifecycle, the Shakti trust score, and the
//! polling synchronizer that keeps worker and employer dashboards in step with the store.

pub mod config;
pub mod error;
pub mod marketplace;
pub mod scoring;
pub mod sync;
pub mod telemetry;
