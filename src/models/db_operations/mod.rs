pub mod auth_operations;
pub mod baas_client;
pub mod commerce_db_operations;
pub mod messages_db_operations;
pub mod posts_db_operations;
pub mod products_db_operations;
pub mod profiles_db_operations;
pub mod query;
pub mod settings_db_operations;
pub mod storage_operations;
