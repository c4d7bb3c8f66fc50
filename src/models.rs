pub mod auth;
pub mod catalog;
pub mod dashboard;
pub mod erp;
pub mod orders;
pub mod vendor;
