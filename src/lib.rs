use crate::models::db_operations::baas_client::BaasClient;

/// Shared by every worker. The backend client holds the connection pool.
pub struct AppState {
    pub baas: BaasClient,
}

pub mod config;
pub mod helper;
pub mod middleware;
pub mod models;
pub mod realtime;
pub mod routes;
