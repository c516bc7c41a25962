use crate::project::{ProjectError, ProjectIo, ProjectRecords};
use std::{
    env,
    io::{self, Write},
    path::{Path, PathBuf},
    process::{Command, Stdio},
    thread,
};

pub const BRIDGE_ENV: &str = "PMMPATH_BRIDGE";
const BRIDGE_RELATIVE: &str = "bridge/PmmBridge.dll";

// The PMM format itself is handled by a .NET helper wrapping the native
// library; this side only speaks JSON to it over pipes.
pub struct DotnetBridge;

impl DotnetBridge {
    pub fn new() -> Self {
        Self
    }

    fn helper_path(&self) -> Result<PathBuf, ProjectError> {
        if let Ok(configured) = env::var(BRIDGE_ENV) {
            let path = PathBuf::from(configured);
            if path.is_file() {
                return Ok(path);
            }
            return Err(ProjectError::Environment(format!(
                "bridge helper not found at {BRIDGE_ENV}={}",
                path.display()
            )));
        }

        let exe = env::current_exe()
            .map_err(|err| ProjectError::Environment(format!("resolve executable path: {err}")))?;
        let beside = exe
            .parent()
            .map(|dir| dir.join(BRIDGE_RELATIVE))
            .unwrap_or_default();
        if beside.is_file() {
            return Ok(beside);
        }
        Err(ProjectError::Environment(format!(
            "bridge helper not found at {} (set {BRIDGE_ENV} to override)",
            beside.display()
        )))
    }

    fn run(&self, verb: &str, project: &Path, stdin: Option<Vec<u8>>) -> Result<Vec<u8>, ProjectError> {
        let helper = self.helper_path()?;
        let mut command = Command::new("dotnet");
        command.arg(&helper).arg(verb).arg(project);
        Self::exchange(command, stdin).map_err(|err| match err {
            ProjectError::Parse(message) => {
                ProjectError::Parse(format!("bridge {verb} failed: {message}"))
            }
            other => other,
        })
    }

    fn exchange(mut command: Command, stdin: Option<Vec<u8>>) -> Result<Vec<u8>, ProjectError> {
        command
            .stdin(if stdin.is_some() {
                Stdio::piped()
            } else {
                Stdio::null()
            })
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());

        let mut child = match command.spawn() {
            Ok(child) => child,
            Err(err) if err.kind() == io::ErrorKind::NotFound => {
                return Err(ProjectError::Environment(
                    ".NET runtime not found (dotnet is not on PATH)".to_string(),
                ));
            }
            Err(err) => {
                return Err(ProjectError::Environment(format!("launch bridge helper: {err}")));
            }
        };

        // The payload goes in from its own thread while this one drains
        // stdout/stderr, so a helper that talks before it has finished
        // reading cannot fill a pipe and stall both sides.
        let writer = match (stdin, child.stdin.take()) {
            (Some(payload), Some(mut pipe)) => {
                Some(thread::spawn(move || pipe.write_all(&payload)))
            }
            _ => None,
        };

        let output = child
            .wait_with_output()
            .map_err(|err| ProjectError::Parse(format!("wait for helper: {err}")))?;
        let sent = writer.map_or(Ok(()), |handle| handle.join().unwrap_or(Ok(())));

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(ProjectError::Parse(stderr.trim().to_string()));
        }
        sent.map_err(|err| ProjectError::Parse(format!("send records to helper: {err}")))?;
        Ok(output.stdout)
    }
}

impl ProjectIo for DotnetBridge {
    fn extract(&self, path: &Path) -> Result<ProjectRecords, ProjectError> {
        let stdout = self.run("extract", path, None)?;
        serde_json::from_slice(&stdout)
            .map_err(|err| ProjectError::Parse(format!("decode bridge output: {err}")))
    }

    fn apply(&self, path: &Path, records: &ProjectRecords) -> Result<(), ProjectError> {
        let payload = serde_json::to_vec(records)
            .map_err(|err| ProjectError::Parse(format!("encode records: {err}")))?;
        self.run("apply", path, Some(payload))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write as _;

    // single test because the env var is process-global
    #[test]
    fn helper_path_honors_env_override() {
        let dir = tempfile::tempdir().unwrap();
        let dll = dir.path().join("PmmBridge.dll");
        std::fs::File::create(&dll)
            .unwrap()
            .write_all(b"stub")
            .unwrap();

        env::set_var(BRIDGE_ENV, &dll);
        let found = DotnetBridge::new().helper_path();
        assert_eq!(found.unwrap(), dll);

        env::set_var(BRIDGE_ENV, "/nonexistent/PmmBridge.dll");
        let err = DotnetBridge::new().helper_path().unwrap_err();
        env::remove_var(BRIDGE_ENV);
        assert!(matches!(err, ProjectError::Environment(_)));
    }

    // The helper emits well past the pipe buffer before it starts reading,
    // and the payload is just as large; this hangs if either end is pumped
    // sequentially.
    #[test]
    fn exchange_survives_chatty_helper_with_large_payload() {
        let dir = tempfile::tempdir().unwrap();
        let script = dir.path().join("pump.sh");
        std::fs::write(
            &script,
            "#!/bin/sh\nhead -c 1048576 /dev/zero\ncat > /dev/null\n",
        )
        .unwrap();

        let mut command = Command::new("sh");
        command.arg(&script);
        let out = DotnetBridge::exchange(command, Some(vec![b'x'; 1_048_576])).unwrap();
        assert_eq!(out.len(), 1_048_576);
    }
}
