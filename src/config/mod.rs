
use log::{debug, trace, warn};
use std::{
    fs,
    path::{Path, PathBuf},
};

pub const DEFAULT_CONFIG_PATH: &str = "/etc/inzown/button.conf";
pub const CLICK_COUNT_LIMIT_NAME: &str = "CLICK_COUNT_LIMIT";

// Longest value or argument accepted from a single line.
pub const MAX_VALUE_LEN: usize = 4096;

const WHITESPACE: [char; 2] = [' ', '\t'];

/// Command bound to an action name: `NAME COMMAND [ARG...]`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Binding {
    pub command: String,
    pub argument: String,
}

/// Read-only view of the button config file.
///
/// Nothing is cached: every lookup re-reads the file so edits take effect
/// on the next button event without restarting the daemon.
#[derive(Debug, Clone)]
pub struct ConfigStore {
    path: PathBuf,
}

impl ConfigStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        ConfigStore { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Directory relative commands are resolved against.
    pub fn base_dir(&self) -> &Path {
        match self.path.parent() {
            Some(dir) if !dir.as_os_str().is_empty() => dir,
            _ => Path::new("."),
        }
    }

    /// Finds the first binding named `name`. `None` when the file is missing
    /// or has no usable line for it.
    pub fn lookup(&self, name: &str) -> Option<Binding> {
        let contents = match fs::read(&self.path) {
            Ok(bytes) => bytes,
            Err(e) => {
                debug!("Cannot read {}: {e}", self.path.display());
                return None;
            }
        };
        let contents = String::from_utf8_lossy(&contents);

        for (index, line) in contents.split('\n').enumerate() {
            let line_number = index + 1;
            let (key, binding) = match parse_line(line) {
                Line::Blank => continue,
                Line::Malformed => {
                    warn!("Unexpected syntax in {} on line {line_number}!", self.path.display());
                    continue;
                }
                Line::Entry(key, binding) => (key, binding),
            };
            if key != name {
                continue;
            }
            if binding.command.len() >= MAX_VALUE_LEN || binding.argument.len() >= MAX_VALUE_LEN {
                warn!("Too long value set in {} on line {line_number}!", self.path.display());
                continue;
            }
            trace!("Located {name} on line {line_number}");
            return Some(binding);
        }

        trace!("Did not find {name} in {}", self.path.display());
        None
    }

    /// Reads an unsigned decimal value. Malformed values are reported and
    /// treated as absent.
    pub fn lookup_uint(&self, name: &str) -> Option<u32> {
        let binding = self.lookup(name)?;
        match binding.command.parse() {
            Ok(value) => Some(value),
            Err(e) => {
                warn!("Ignoring {name} '{}' in {}: {e}", binding.command, self.path.display());
                None
            }
        }
    }

    pub fn click_count_limit(&self) -> Option<u32> {
        self.lookup_uint(CLICK_COUNT_LIMIT_NAME)
    }
}

enum Line<'a> {
    Blank,
    Malformed,
    Entry(&'a str, Binding),
}

fn parse_line(line: &str) -> Line<'_> {
    let line = match line.find('#') {
        Some(comment) => &line[..comment],
        None => line,
    };
    let line = line.trim_start_matches(WHITESPACE);
    if line.len() <= 1 {
        return Line::Blank;
    }

    let (name, value_region) = match line.split_once(WHITESPACE) {
        Some((name, rest)) => (name, rest.trim_start_matches(WHITESPACE)),
        None => (line, ""),
    };
    if name.is_empty() {
        return Line::Malformed;
    }

    let (command, argument) = match value_region.split_once(WHITESPACE) {
        Some((command, rest)) => (command, rest.trim_start_matches(WHITESPACE)),
        None => (value_region, ""),
    };

    Line::Entry(
        name,
        Binding {
            command: command.to_string(),
            argument: argument.to_string(),
        },
    )
}
