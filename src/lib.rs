// Exports which are used in integration/e2e test cases.
pub mod device;
pub mod hold_time;
pub mod settings;

pub mod action;
pub mod action_dispatcher;
pub mod action_resolver;
pub mod config;
pub mod event;
pub mod event_handler;
pub mod runner;

pub use config::ConfigStore;
pub use settings::Settings;
