pub mod analysis;
pub mod baseline;
pub mod catalog;
pub mod configuration;
pub mod dispatch;
pub mod finance;
pub mod profile;
pub mod scenario;
pub mod scoring;
pub mod spike;
