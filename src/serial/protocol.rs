use crate::device::{Command, DeviceProfile};

use super::{Result, SerialError, SerialInterface};

/// Command/response layer on top of [`SerialInterface`].
///
/// Each command is preceded by a handshake, and a reply equal to the
/// profile's failure sentinel is retried once after a backoff.
pub struct ProjectorProtocol {
    interface: SerialInterface,
    profile: DeviceProfile,
}

impl ProjectorProtocol {
    pub fn new(interface: SerialInterface, profile: DeviceProfile) -> Self {
        Self { interface, profile }
    }

    /// Run one of the profile's named commands and return the reply value.
    pub async fn run(&mut self, command: Command) -> Result<String> {
        let wire = self.profile.commands.wire(command);
        self.execute(wire).await
    }

    /// Send a wire command and return the value part of its `*key=value#` reply.
    pub async fn execute(&mut self, cmd: &str) -> Result<String> {
        self.interface.handshake().await?;

        let mut output = self.interface.send_raw(cmd).await?;
        if self.is_failed_response(&output) {
            log::warn!(
                "Projector returned failed response {:?} for {}. Trying again in {:?}.",
                output.trim(),
                cmd,
                self.profile.retry_backoff
            );
            tokio::time::sleep(self.profile.retry_backoff).await;

            output = self.interface.send_raw(cmd).await?;
            if self.is_failed_response(&output) {
                log::warn!("Projector returned failed response {:?} for {} again", output.trim(), cmd);
                return Err(SerialError::CommandFailed {
                    command: cmd.to_string(),
                    response: output.trim().to_string(),
                });
            }
        }

        parse_response(&output)
    }

    pub fn interface_mut(&mut self) -> &mut SerialInterface {
        &mut self.interface
    }

    fn is_failed_response(&self, output: &str) -> bool {
        output.trim() == self.profile.failed_response
    }
}

/// Extract the value from a `*key=value#` frame.
pub fn parse_response(raw: &str) -> Result<String> {
    let malformed = || SerialError::MalformedResponse(raw.to_string());

    let frame = raw
        .trim()
        .strip_prefix('*')
        .and_then(|rest| rest.strip_suffix('#'))
        .ok_or_else(malformed)?;
    let (key, value) = frame.split_once('=').ok_or_else(malformed)?;
    if key.is_empty() || value.contains('=') {
        return Err(malformed());
    }

    Ok(value.to_string())
}
