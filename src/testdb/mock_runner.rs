//! Scripted process runner
//!
//! A `ProcessRunner` that never spawns anything. Responses are keyed by the
//! full command line (`"adb -s ABC123 shell getprop ro.product.model"`), can
//! be changed between ticks, and every call is logged.

use std::collections::{HashMap, HashSet};
use std::path::Path;
use std::sync::{Mutex, PoisonError, RwLock};
use std::thread;
use std::time::Duration;

use crate::device::traits::{CommandOutput, ProcessRunner};

/// What a scripted command does
#[derive(Debug, Clone, PartialEq, Eq)]
enum Scripted {
    Reply(CommandOutput),
    /// Never finishes; the call waits out its timeout
    Hang,
}

/// Fake runner answering from a table of command lines
#[derive(Debug)]
pub struct ScriptedRunner {
    responses: RwLock<HashMap<String, Scripted>>,
    unavailable: RwLock<HashSet<String>>,
    calls: Mutex<Vec<String>>,
    fallback: CommandOutput,
}

impl ScriptedRunner {
    /// Unscripted commands exit 1 with "unknown command"
    pub fn new() -> Self {
        Self {
            responses: RwLock::new(HashMap::new()),
            unavailable: RwLock::new(HashSet::new()),
            calls: Mutex::new(Vec::new()),
            fallback: CommandOutput::exited(1, "", "unknown command"),
        }
    }

    /// Set the response for `program` followed by `args`
    pub fn respond(&self, program: &str, args: &str, output: CommandOutput) {
        self.script(program, args, Scripted::Reply(output));
    }

    pub fn respond_adb(&self, args: &str, output: CommandOutput) {
        self.respond("adb", args, output);
    }

    pub fn respond_fastboot(&self, args: &str, output: CommandOutput) {
        self.respond("fastboot", args, output);
    }

    /// Make a full command line hang until its timeout
    pub fn hang(&self, command_line: &str) {
        self.responses
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(command_line.to_string(), Scripted::Hang);
    }

    /// Drop the response for a full command line
    pub fn forget(&self, command_line: &str) {
        self.responses
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(command_line);
    }

    /// Pretend `program` cannot be started
    pub fn set_unavailable(&self, program: &str, unavailable: bool) {
        let mut set = self
            .unavailable
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        if unavailable {
            set.insert(program.to_string());
        } else {
            set.remove(program);
        }
    }

    /// Every command line run so far, in order
    pub fn calls(&self) -> Vec<String> {
        self.calls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Number of calls made to `program`
    pub fn call_count(&self, program: &str) -> usize {
        self.calls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .filter(|line| line.split(' ').next() == Some(program))
            .count()
    }

    fn script(&self, program: &str, args: &str, scripted: Scripted) {
        let key = command_line(program, args);
        self.responses
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(key, scripted);
    }
}

impl Default for ScriptedRunner {
    fn default() -> Self {
        Self::new()
    }
}

fn command_line(program: &str, args: &str) -> String {
    if args.is_empty() {
        program.to_string()
    } else {
        format!("{} {}", program, args)
    }
}

/// Bare tool name, so configured absolute paths hit the same script
fn program_name(program: &Path) -> String {
    program
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| program.display().to_string())
}

impl ProcessRunner for ScriptedRunner {
    fn run(&self, program: &Path, args: &[&str], timeout: Duration) -> CommandOutput {
        let program = program_name(program);
        let key = command_line(&program, &args.join(" "));
        self.calls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(key.clone());

        let unavailable = self
            .unavailable
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .contains(&program);
        if unavailable {
            return CommandOutput::spawn_failed(&format!("binary not found ({})", program));
        }

        let scripted = self
            .responses
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&key)
            .cloned();
        match scripted {
            Some(Scripted::Reply(output)) => output,
            Some(Scripted::Hang) => {
                thread::sleep(timeout);
                CommandOutput::timed_out()
            }
            None => self.fallback.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::traits::RunStatus;
    use std::time::Instant;

    fn run(runner: &ScriptedRunner, program: &str, args: &[&str]) -> CommandOutput {
        runner.run(Path::new(program), args, Duration::from_millis(50))
    }

    #[test]
    fn test_scripted_and_fallback() {
        let runner = ScriptedRunner::new();
        runner.respond_adb("devices", CommandOutput::exited(0, "List of devices attached\n", ""));

        assert!(run(&runner, "adb", &["devices"]).success());
        assert_eq!(run(&runner, "adb", &["version"]).exit_code(), Some(1));
        assert_eq!(runner.calls(), vec!["adb devices", "adb version"]);
    }

    #[test]
    fn test_absolute_path_matches_bare_name() {
        let runner = ScriptedRunner::new();
        runner.respond_fastboot("devices -l", CommandOutput::exited(0, "X\tfastboot\n", ""));
        assert!(run(&runner, "/opt/platform-tools/fastboot", &["devices", "-l"]).success());
        assert_eq!(runner.call_count("fastboot"), 1);
    }

    #[test]
    fn test_unavailable_program() {
        let runner = ScriptedRunner::new();
        runner.set_unavailable("adb", true);
        assert!(matches!(
            run(&runner, "adb", &["devices"]).status,
            RunStatus::SpawnFailed(_)
        ));
        runner.set_unavailable("adb", false);
        assert!(!run(&runner, "adb", &["devices"]).is_spawn_failure());
    }

    #[test]
    fn test_hang_waits_for_timeout() {
        let runner = ScriptedRunner::new();
        runner.hang("adb devices");
        let start = Instant::now();
        assert!(run(&runner, "adb", &["devices"]).is_timed_out());
        assert!(start.elapsed() >= Duration::from_millis(50));
    }

    #[test]
    fn test_responses_change_between_calls() {
        let runner = ScriptedRunner::new();
        runner.respond_adb("devices", CommandOutput::exited(0, "a", ""));
        assert_eq!(run(&runner, "adb", &["devices"]).stdout, "a");
        runner.respond_adb("devices", CommandOutput::exited(0, "b", ""));
        assert_eq!(run(&runner, "adb", &["devices"]).stdout, "b");
        runner.forget("adb devices");
        assert!(!run(&runner, "adb", &["devices"]).success());
    }
}
