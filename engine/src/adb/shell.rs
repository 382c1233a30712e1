use super::AdbClient;
use crate::error::{EngineError, Result};

#[derive(Debug, Clone)]
pub struct ShellOutput {
    pub stdout: String,
    pub stderr: String,
    pub exit_code: i32,
}

pub(super) async fn shell(client: &AdbClient, device: &str, command: &str) -> Result<ShellOutput> {
    let output = client.run(&["-s", device, "shell", command]).await?;
    Ok(ShellOutput {
        stdout: String::from_utf8_lossy(&output.stdout).to_string(),
        stderr: String::from_utf8_lossy(&output.stderr).to_string(),
        exit_code: output.status.code().unwrap_or(-1),
    })
}

/// Binary-safe command output, used for pulling files such as screenshots.
pub(super) async fn exec_out(client: &AdbClient, device: &str, command: &str) -> Result<Vec<u8>> {
    let args: Vec<&str> = command.split_whitespace().collect();
    let mut full_args = vec!["-s", device, "exec-out"];
    full_args.extend(args);

    let output = client.run(&full_args).await?;
    if !output.status.success() {
        return Err(EngineError::Transport(format!(
            "exec-out failed: {}",
            String::from_utf8_lossy(&output.stderr)
        )));
    }
    Ok(output.stdout)
}
