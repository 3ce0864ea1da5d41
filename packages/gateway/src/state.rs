use std::sync::Arc;

use sea_orm::DatabaseConnection;

use crate::pipeline::Pipeline;

#[derive(Clone)]
pub struct AppState {
    pub pipeline: Arc<Pipeline>,
    pub db: DatabaseConnection,
}
