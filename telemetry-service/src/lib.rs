pub mod config;
pub mod history;
pub mod http;
pub mod metrics_server;
pub mod observability;
pub mod registry;
pub mod retention;
pub mod status;
pub mod store;
pub mod transform;

pub use registry::PlantRegistry;
pub use status::{StatusClassifier, UnitState};
pub use store::{ReadingStore, RetryPolicy};
