pub mod access;
pub mod audit;
pub mod config;
pub mod engine;
pub mod error;
pub mod events;
pub mod identity;
pub mod model;
pub mod store;

pub use engine::Hub;
pub use error::{Envelope, HubError, HubResult};
