pub mod health;
pub mod hub;

pub use health::{HealthResponse, NodeInfo, VERSION, health_check};
pub use hub::{HubRpcState, hub_routes};
