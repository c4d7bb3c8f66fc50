pub mod admin;
pub mod auth;
pub mod erp;
pub mod vendor;
