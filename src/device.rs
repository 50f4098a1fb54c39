use anyhow::{bail, Context};
use log::{debug, info, warn};
use nix::poll::PollFlags;
use std::fmt;
use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::os::fd::{AsFd, BorrowedFd};
use std::path::{Path, PathBuf};
use std::thread;
use std::time::Duration;

pub const SYSFS_GPIO_ROOT: &str = "/sys/class/gpio";
pub const DEFAULT_PIN: u8 = 17;

// udev needs a moment to set up permissions on a freshly exported pin.
const EXPORT_SETTLE_TIME: Duration = Duration::from_millis(100);

/// GPIO pin number, 0 through 99.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pin(u8);

impl Pin {
    pub const MAX: u8 = 99;

    pub fn new(number: u32) -> anyhow::Result<Pin> {
        match u8::try_from(number) {
            Ok(number) if number <= Pin::MAX => Ok(Pin(number)),
            _ => bail!("Invalid pin number {number}!"),
        }
    }

    pub fn number(&self) -> u8 {
        self.0
    }
}

impl Default for Pin {
    fn default() -> Self {
        Pin(DEFAULT_PIN)
    }
}

impl fmt::Display for Pin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Edge {
    None,
    Rising,
    Falling,
    Both,
}

impl Edge {
    pub fn as_str(&self) -> &'static str {
        match self {
            Edge::None => "none",
            Edge::Rising => "rising",
            Edge::Falling => "falling",
            Edge::Both => "both",
        }
    }
}

/// Whether the pin's `active_low` attribute is rewritten on startup.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum PinActivation {
    #[default]
    Unspecified,
    ActiveLow,
    ActiveHigh,
}

impl PinActivation {
    pub fn active_low(&self) -> Option<bool> {
        match self {
            PinActivation::Unspecified => None,
            PinActivation::ActiveLow => Some(true),
            PinActivation::ActiveHigh => Some(false),
        }
    }
}

/// Where button level changes come from.
pub trait ButtonSource {
    /// Descriptor that becomes ready when the level may have changed.
    fn edge_fd(&self) -> BorrowedFd<'_>;
    /// Poll events signalling readiness on `edge_fd`.
    fn edge_events(&self) -> PollFlags;
    /// Reads the current level, `true` while pressed.
    fn read_level(&mut self) -> anyhow::Result<bool>;
}

/// The legacy `/sys/class/gpio` interface.
#[derive(Debug, Clone)]
pub struct SysfsGpio {
    root: PathBuf,
}

impl Default for SysfsGpio {
    fn default() -> Self {
        SysfsGpio::new(SYSFS_GPIO_ROOT)
    }
}

impl SysfsGpio {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        SysfsGpio { root: root.into() }
    }

    fn pin_dir(&self, pin: Pin) -> PathBuf {
        self.root.join(format!("gpio{pin}"))
    }

    /// Exports `pin`. Returns `true` if this call exported it, `false` if it
    /// already was.
    pub fn export(&self, pin: Pin) -> anyhow::Result<bool> {
        if self.pin_dir(pin).exists() {
            debug!("GPIO #{pin} is already exported");
            return Ok(false);
        }
        write_attribute(&self.root.join("export"), format!("{pin}\0").as_bytes())?;
        thread::sleep(EXPORT_SETTLE_TIME);
        info!("Exported GPIO #{pin}");
        Ok(true)
    }

    pub fn unexport(&self, pin: Pin) -> anyhow::Result<()> {
        if !self.pin_dir(pin).exists() {
            return Ok(());
        }
        write_attribute(&self.root.join("unexport"), format!("{pin}\0").as_bytes())?;
        info!("Unexported GPIO #{pin}");
        Ok(())
    }

    /// Exports `pin` and unexports it again when the guard drops, unless it
    /// was exported by someone else.
    pub fn export_guarded(&self, pin: Pin) -> anyhow::Result<ExportGuard> {
        let exported = self.export(pin)?;
        Ok(ExportGuard {
            gpio: self.clone(),
            pin,
            exported,
        })
    }

    pub fn set_edge(&self, pin: Pin, edge: Edge) -> anyhow::Result<()> {
        let value = format!("{}\0", edge.as_str());
        write_attribute(&self.pin_dir(pin).join("edge"), value.as_bytes())
    }

    pub fn set_active_low(&self, pin: Pin, active_low: bool) -> anyhow::Result<()> {
        let value: &[u8] = if active_low { b"1" } else { b"0" };
        write_attribute(&self.pin_dir(pin).join("active_low"), value)
    }

    pub fn open_button(&self, pin: Pin) -> anyhow::Result<SysfsButton> {
        let path = self.pin_dir(pin).join("value");
        let file = File::open(&path).with_context(|| format!("Failed opening {}", path.display()))?;
        Ok(SysfsButton { file })
    }
}

fn write_attribute(path: &Path, value: &[u8]) -> anyhow::Result<()> {
    let mut file = OpenOptions::new()
        .write(true)
        .truncate(true)
        .open(path)
        .with_context(|| format!("Failed to open {}", path.display()))?;
    file.write_all(value)
        .with_context(|| format!("Failed writing to {}", path.display()))
}

pub struct ExportGuard {
    gpio: SysfsGpio,
    pin: Pin,
    exported: bool,
}

impl ExportGuard {
    pub fn exported(&self) -> bool {
        self.exported
    }
}

impl Drop for ExportGuard {
    fn drop(&mut self) {
        if self.exported {
            if let Err(e) = self.gpio.unexport(self.pin) {
                warn!("{e:#}");
            }
        }
    }
}

/// The `value` attribute of an exported pin with edge detection enabled.
pub struct SysfsButton {
    file: File,
}

impl ButtonSource for SysfsButton {
    fn edge_fd(&self) -> BorrowedFd<'_> {
        self.file.as_fd()
    }

    // sysfs reports edges as exceptional conditions.
    fn edge_events(&self) -> PollFlags {
        PollFlags::POLLPRI
    }

    fn read_level(&mut self) -> anyhow::Result<bool> {
        let mut buffer = [0u8; 16];
        let n = self.file.read(&mut buffer).context("Reading button value failed")?;
        if n == 0 {
            bail!("Reading button value returned 0.");
        }
        self.file
            .seek(SeekFrom::Start(0))
            .context("Rewinding button failed")?;
        Ok(parse_level(&buffer[..n]))
    }
}

/// Leading decimal digits of a level reading, nonzero meaning pressed.
pub fn parse_level(raw: &[u8]) -> bool {
    raw.iter()
        .skip_while(|b| b.is_ascii_whitespace())
        .take_while(|b| b.is_ascii_digit())
        .any(|&b| b != b'0')
}
