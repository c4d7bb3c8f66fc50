pub mod user_repo;
pub use user_repo::UserRepository;
pub mod vendor_repo;
pub use vendor_repo::VendorRepository;
pub mod catalog_repo;
pub use catalog_repo::CatalogRepository;
pub mod order_repo;
pub use order_repo::OrderRepository;
pub mod erp_repo;
pub use erp_repo::ErpRepository;
pub mod dashboard_repo;
pub use dashboard_repo::DashboardRepository;
#[cfg(test)]
pub mod fixtures;
