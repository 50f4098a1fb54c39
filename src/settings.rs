use log::debug;
use std::path::PathBuf;

use crate::config::{ConfigStore, DEFAULT_CONFIG_PATH};
use crate::device::{Pin, PinActivation};
use crate::event_handler::DEFAULT_CLICK_COUNT_LIMIT;
use crate::hold_time::TimeMode;

/// Everything the daemon needs to run, fixed at startup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    pub pin: Pin,
    pub activation: PinActivation,
    pub config_path: PathBuf,
    // 0 means unlimited
    pub click_count_limit: u32,
    pub time_mode: TimeMode,
}

impl Default for Settings {
    fn default() -> Self {
        Settings {
            pin: Pin::default(),
            activation: PinActivation::default(),
            config_path: PathBuf::from(DEFAULT_CONFIG_PATH),
            click_count_limit: DEFAULT_CLICK_COUNT_LIMIT,
            time_mode: TimeMode::default(),
        }
    }
}

impl Settings {
    pub fn config_store(&self) -> ConfigStore {
        ConfigStore::new(&self.config_path)
    }

    /// Picks the click count limit: command line, then the config file, then
    /// the built-in default. A malformed config value keeps the default.
    pub fn resolve_click_count_limit(&mut self, from_command_line: Option<u32>) {
        self.click_count_limit = match from_command_line {
            Some(limit) => limit,
            None => self
                .config_store()
                .click_count_limit()
                .unwrap_or(DEFAULT_CLICK_COUNT_LIMIT),
        };
        debug!("Click count limit is {}", self.click_count_limit);
    }
}
