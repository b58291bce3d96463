pub mod cache;
pub mod config;
pub mod error;
pub mod features;
pub mod model;
pub mod schema;
pub mod server;

pub use cache::ResponseCache;
pub use config::AppConfig;
pub use error::{ServiceError, StartupError};
pub use model::{HousingRecord, Predictor};
pub use server::build_router;
