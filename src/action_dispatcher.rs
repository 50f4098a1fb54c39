use anyhow::anyhow;
use fork::{fork, setsid, Fork};
use log::{debug, error, info, trace};
use nix::sys::signal;
use nix::sys::signal::{sigaction, SaFlags, SigAction, SigHandler, SigSet};
use std::os::unix::process::CommandExt;
use std::process::{exit, Command, Stdio};

use crate::action::Action;
use crate::action_resolver::ActionResolver;

pub const SHELL: &str = "/bin/sh";

pub struct ActionDispatcher {
    resolver: ActionResolver,
    // Whether we've called a sigaction for spawning commands or not
    sigaction_set: bool,
}

impl ActionDispatcher {
    pub fn new(resolver: ActionResolver) -> ActionDispatcher {
        ActionDispatcher {
            resolver,
            sigaction_set: false,
        }
    }

    // Execute Actions created by EventHandler. This should be the only public method of ActionDispatcher.
    pub fn on_action(&mut self, action: Action) {
        let name = action.name(self.resolver.time_mode());
        match self.resolver.resolve(&action) {
            Some(command) => {
                info!("{name}: executing {command}");
                if let Err(e) = self.spawn_detached(&command) {
                    error!("{name}: {e:#}");
                }
            }
            None => debug!("No command for {name} ({action:?})"),
        }
    }

    fn spawn_detached(&mut self, command: &str) -> anyhow::Result<()> {
        self.ignore_child_exits();
        match fork().map_err(|e| anyhow!("fork failed: {e:?}"))? {
            Fork::Parent(pid) => {
                trace!("Forked {pid} to launch {command:?}");
                Ok(())
            }
            Fork::Child => exit(launch_in_new_session(command)),
        }
    }

    fn ignore_child_exits(&mut self) {
        if self.sigaction_set {
            return;
        }
        // The forked launchers exit right away and must not linger as zombies.
        let sig_action = SigAction::new(SigHandler::SigDfl, SaFlags::SA_NOCLDWAIT, SigSet::empty());
        match unsafe { sigaction(signal::SIGCHLD, &sig_action) } {
            Ok(_) => self.sigaction_set = true,
            Err(e) => error!("Failed to register SIGCHLD handler: {e}"),
        }
    }
}

// Runs in the launcher process. Forks once more so the shell is adopted by
// init, and returns the launcher's exit status.
fn launch_in_new_session(command: &str) -> i32 {
    match fork() {
        Ok(Fork::Parent(_)) => 0,
        Ok(Fork::Child) => {
            if let Err(e) = setsid() {
                error!("Failed to setsid: {e:?}");
                return 1;
            }
            let e = Command::new(SHELL)
                .arg("-c")
                .arg(command)
                .stdin(Stdio::null())
                .stdout(Stdio::null())
                .stderr(Stdio::null())
                .exec();
            error!("Failed to execute {SHELL}: {e}");
            127
        }
        Err(e) => {
            error!("Error spawning process: {e:?}");
            1
        }
    }
}
