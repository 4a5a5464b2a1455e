//! Dependency injection

pub mod service_container;

pub use service_container::EngineContainer;
