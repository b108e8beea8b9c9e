//! First fallback: hand the tone file to a command-line player

use std::path::{Path, PathBuf};
use std::process::{Child, Command, Stdio};
use std::thread;
use std::time::{Duration, Instant};

use tracing::debug;

use super::player::{SoundError, ToneOutput};
use super::volume::Volume;

/// How long a freshly launched player gets to fail before it counts as playing
const LAUNCH_GRACE: Duration = Duration::from_millis(80);
const POLL_INTERVAL: Duration = Duration::from_millis(5);

/// Launches `<program> -v <volume> <tone>` and lets it run detached
pub struct ExternalPlayer {
    program: PathBuf,
    tone_path: PathBuf,
}

impl ExternalPlayer {
    pub fn new(program: &Path, tone_path: &Path) -> Self {
        Self {
            program: program.to_owned(),
            tone_path: tone_path.to_owned(),
        }
    }

    fn command(&self, volume: Volume) -> Command {
        let mut command = Command::new(&self.program);
        command
            .arg("-v")
            .arg(volume.get().to_string())
            .arg(&self.tone_path)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null());
        command
    }
}

impl ToneOutput for ExternalPlayer {
    fn name(&self) -> &'static str {
        "external-player"
    }

    fn play(&self, volume: Volume) -> Result<(), SoundError> {
        // afplay reports an unreadable file only after it has started
        std::fs::File::open(&self.tone_path).map_err(|e| {
            SoundError::ExternalProcessFailure(format!("tone {}: {e}", self.tone_path.display()))
        })?;

        let mut child = self.command(volume).spawn().map_err(|e| {
            SoundError::ExternalProcessFailure(format!("launching {}: {e}", self.program.display()))
        })?;

        if let Err(e) = wait_for_early_exit(&mut child, LAUNCH_GRACE) {
            return Err(SoundError::ExternalProcessFailure(format!(
                "{}: {e}",
                self.program.display()
            )));
        }

        let program = self.program.clone();
        thread::spawn(move || match child.wait() {
            Ok(status) => debug!(?program, %status, "external player finished"),
            Err(e) => debug!(?program, %e, "external player could not be reaped"),
        });

        Ok(())
    }
}

/// Watch a just-launched player for `grace`; an error exit in that window is a failure.
///
/// A player that is still running, or already exited cleanly, is accepted.
fn wait_for_early_exit(child: &mut Child, grace: Duration) -> Result<(), String> {
    let deadline = Instant::now() + grace;
    loop {
        match child.try_wait() {
            Ok(Some(status)) if status.success() => return Ok(()),
            Ok(Some(status)) => return Err(format!("exited with {status}")),
            Ok(None) if Instant::now() >= deadline => return Ok(()),
            Ok(None) => thread::sleep(POLL_INTERVAL),
            Err(e) => return Err(format!("polling failed: {e}")),
        }
    }
}
