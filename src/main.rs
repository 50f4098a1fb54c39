use clap::{CommandFactory, Parser};
use clap_complete::Shell;
use inzown_btn::config::DEFAULT_CONFIG_PATH;
use inzown_btn::device::{Pin, PinActivation, DEFAULT_PIN};
use inzown_btn::hold_time::{TimeMode, HELP_TIME};
use inzown_btn::{runner, Settings};
use log::{error, LevelFilter};
use nix::errno::Errno;
use std::io;
use std::path::PathBuf;
use std::process::ExitCode;

#[derive(Parser, Debug)]
#[command(version, about, after_help = ENVIRONMENT_HELP)]
struct Args {
    /// The pin GPIO number to use for the button.
    #[arg(long, value_name = "n", default_value_t = DEFAULT_PIN as u32,
          value_parser = clap::value_parser!(u32).range(0..=Pin::MAX as i64))]
    gpio: u32,
    /// Configure the pin for active high triggering.
    #[arg(long, overrides_with = "active_low")]
    active_high: bool,
    /// Reverse the sense of the active state. If neither --active-high nor
    /// --active-low is given, this GPIO setting is left as is.
    #[arg(long, overrides_with = "active_high")]
    active_low: bool,
    /// Path to the configuration file.
    #[arg(long, value_name = "path", env = "INZOWN_BTN_CFG", default_value = DEFAULT_CONFIG_PATH)]
    conf: PathBuf,
    /// Set the click count limit to n. Use 0 for no limit. Defaults to
    /// CLICK_COUNT_LIMIT from the configuration file, or 8.
    #[arg(long, short = 'n', value_name = "n")]
    click_count_limit: Option<u32>,
    /// Enable debugging at level n (higher value = more logging).
    #[arg(long, value_name = "n", default_value_t = 1)]
    debug: u32,
    /// Short for --debug 0 (turns off all but warnings and errors).
    #[arg(short)]
    quiet: bool,
    /// Report both odd and even seconds in hold events (see --help-time).
    #[arg(long)]
    full_time: bool,
    /// Offset the hold time boundaries by 1/2 second (see --help-time).
    #[arg(long)]
    offset_time: bool,
    /// Explain the time options above.
    #[arg(long)]
    help_time: bool,
    /// Generate shell completions
    ///
    /// You can use them by storing in your shells completion file or by running
    /// - in bash: eval "$(inzown-btn --completions bash)"
    /// - in fish: inzown-btn --completions fish | source
    #[arg(long, value_enum, display_order = 100, value_name = "SHELL", verbatim_doc_comment)]
    completions: Option<Shell>,
}

const ENVIRONMENT_HELP: &str = "Environment Variables:
  INZOWN_BTN_CFG  Equivalent to --conf; --conf takes precedence";

impl Args {
    fn log_level(&self) -> LevelFilter {
        let level = if self.quiet { 0 } else { self.debug };
        match level {
            0 => LevelFilter::Warn,
            1 => LevelFilter::Info,
            2 => LevelFilter::Debug,
            _ => LevelFilter::Trace,
        }
    }

    fn activation(&self) -> PinActivation {
        if self.active_low {
            PinActivation::ActiveLow
        } else if self.active_high {
            PinActivation::ActiveHigh
        } else {
            PinActivation::Unspecified
        }
    }

    fn settings(&self) -> anyhow::Result<Settings> {
        let mut settings = Settings {
            pin: Pin::new(self.gpio)?,
            activation: self.activation(),
            config_path: self.conf.clone(),
            time_mode: TimeMode::new(self.full_time, self.offset_time),
            ..Settings::default()
        };
        settings.resolve_click_count_limit(self.click_count_limit);
        Ok(settings)
    }
}

fn main() -> ExitCode {
    let args = Args::parse();

    if let Some(shell) = args.completions {
        clap_complete::generate(shell, &mut Args::command(), "inzown-btn", &mut io::stdout());
        return ExitCode::SUCCESS;
    }
    if args.help_time {
        print!("{HELP_TIME}");
        return ExitCode::SUCCESS;
    }

    env_logger::Builder::new()
        .filter_level(args.log_level())
        .parse_default_env()
        .init();

    match start(&args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{e:#}");
            ExitCode::from(exit_status(&e))
        }
    }
}

fn start(args: &Args) -> anyhow::Result<()> {
    let settings = args.settings()?;
    runner::run(&settings)
}

// errno of the first OS error in the chain, 255 when there is none.
fn exit_status(e: &anyhow::Error) -> u8 {
    e.chain()
        .find_map(|cause| {
            if let Some(errno) = cause.downcast_ref::<Errno>() {
                Some(*errno as i32)
            } else {
                cause.downcast_ref::<io::Error>().and_then(io::Error::raw_os_error)
            }
        })
        .and_then(|code| u8::try_from(code).ok())
        .filter(|code| *code != 0)
        .unwrap_or(u8::MAX)
}
