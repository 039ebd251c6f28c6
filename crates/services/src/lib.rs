#![forbid(unsafe_code)]

pub mod config;
pub mod dashboard;
pub mod dispatch;
pub mod environment;
pub mod error;
pub mod lifecycle;
pub mod session_manager;
pub mod tracker;

pub use beacon_core::Clock;

pub use config::TelemetryConfig;
pub use dashboard::{DashboardService, DashboardState, DashboardView};
pub use dispatch::{Delivery, Dispatcher};
pub use environment::{Environment, StaticEnvironment};
pub use error::{ConfigError, DashboardError};
pub use lifecycle::{BinderState, LifecycleBinder, LifecycleSignal, Visibility};
pub use session_manager::{PageState, SessionManager};
pub use tracker::PageVisitTracker;
