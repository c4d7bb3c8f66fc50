pub mod auth;
pub mod catalog_service;
pub mod erp_service;
pub mod order_service;
pub mod storage;
