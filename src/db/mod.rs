pub mod entitlement_repository;
pub mod legacy_repository;
pub mod mock_db;
pub mod postgres_entitlement_repository;
pub mod postgres_legacy_repository;
pub mod postgres_purchase_repository;
pub mod postgres_usage_repository;
pub mod postgres_user_repository;
pub mod purchase_repository;
pub mod usage_repository;
pub mod user_repository;
