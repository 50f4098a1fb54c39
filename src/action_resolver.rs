use log::{debug, error};
use std::path::Path;

use crate::action::Action;
use crate::config::{Binding, ConfigStore, MAX_VALUE_LEN};
use crate::hold_time::TimeMode;

// Longest command line handed to the shell.
pub const MAX_COMMAND_LEN: usize = MAX_VALUE_LEN + 64;

/// Maps button actions to the command lines bound to them in the config file.
#[derive(Debug, Clone)]
pub struct ActionResolver {
    store: ConfigStore,
    time_mode: TimeMode,
}

impl ActionResolver {
    pub fn new(store: ConfigStore, time_mode: TimeMode) -> Self {
        ActionResolver { store, time_mode }
    }

    pub fn time_mode(&self) -> TimeMode {
        self.time_mode
    }

    /// Returns the command line for `action`, or `None` when nothing should run.
    pub fn resolve(&self, action: &Action) -> Option<String> {
        let binding = self.find_binding(action)?;
        debug!("script = '{}', args = '{}'", binding.command, binding.argument);
        if binding.command.is_empty() {
            return None;
        }

        let mut command = if binding.command.starts_with('/') {
            binding.command
        } else {
            join_relative(self.store.base_dir(), &binding.command)
        };

        let arguments = match *action {
            Action::Down | Action::Up => None,
            _ if !binding.argument.is_empty() => Some(binding.argument),
            Action::Click { count } => Some(count.to_string()),
            Action::Hold { count, held_ms } => Some(format!("{count} {held_ms}")),
        };
        if let Some(arguments) = arguments {
            command.push(' ');
            command.push_str(&arguments);
        }

        if command.len() >= MAX_COMMAND_LEN {
            error!("Failed setting up arguments for {action:?}: command is {} bytes long", command.len());
            return None;
        }
        Some(command)
    }

    fn find_binding(&self, action: &Action) -> Option<Binding> {
        let name = action.name(self.time_mode);
        debug!(
            "{action:?} ({} seconds) yields action name {name}",
            self.hold_seconds(action).unwrap_or(0)
        );
        if let Some(binding) = self.store.lookup(name.as_str()) {
            return Some(binding);
        }
        let fallback = name.fallback()?;
        debug!("No binding for {name}, trying {fallback}");
        self.store.lookup(fallback.as_str())
    }

    fn hold_seconds(&self, action: &Action) -> Option<u64> {
        match *action {
            Action::Hold { held_ms, .. } => Some(self.time_mode.seconds(held_ms)),
            _ => None,
        }
    }
}

fn join_relative(base: &Path, command: &str) -> String {
    base.join(command).to_string_lossy().into_owned()
}
