use crate::device::{DeviceProfile, Handshake};

use super::{LinkOpener, Result, SerialError, SerialLink};

/// Owns the serial connection to the projector.
///
/// Every exchange is paced by a fixed settle wait followed by a drain of
/// whatever the device buffered. The firmware needs that turnaround; reading
/// as soon as bytes arrive yields partial frames.
pub struct SerialInterface {
    port_name: String,
    handshake: Handshake,
    link: Option<Box<dyn SerialLink>>,
}

impl SerialInterface {
    /// Open `port_name` with the profile's line framing.
    pub async fn open(opener: &dyn LinkOpener, profile: &DeviceProfile, port_name: &str) -> Result<Self> {
        let link = opener.open(port_name, profile.serial_settings()).await?;
        Ok(Self::with_link(link, profile, port_name))
    }

    /// Wrap an already opened link.
    pub fn with_link(link: Box<dyn SerialLink>, profile: &DeviceProfile, port_name: &str) -> Self {
        Self {
            port_name: port_name.to_string(),
            handshake: profile.handshake,
            link: Some(link),
        }
    }

    pub fn port_name(&self) -> &str {
        &self.port_name
    }

    pub fn is_connected(&self) -> bool {
        self.link.is_some()
    }

    /// Wake the console and check it answers with the expected prompt.
    pub async fn handshake(&mut self) -> Result<()> {
        let output = self.exchange(self.handshake.send).await?;
        if output != self.handshake.expect {
            return Err(SerialError::ProtocolError {
                expected: self.handshake.expect.to_string(),
                received: output,
            });
        }
        Ok(())
    }

    /// Send `cmd` followed by the probe terminator and return the raw reply.
    pub async fn send_raw(&mut self, cmd: &str) -> Result<String> {
        let line = format!("{}{}", cmd, self.handshake.send);
        log::debug!("Command sent to {}: {}", self.port_name, cmd);
        let output = self.exchange(&line).await?;
        log::debug!("Output received from {}: {}", self.port_name, output.trim());
        Ok(output)
    }

    pub fn close(&mut self) {
        if let Some(mut link) = self.link.take() {
            link.close();
        }
    }

    async fn exchange(&mut self, payload: &str) -> Result<String> {
        let bytes = payload.as_bytes().to_vec();
        self.on_link(move |link| link.write(&bytes)).await?;
        tokio::time::sleep(self.handshake.wait).await;
        self.on_link(drain).await
    }

    /// Run blocking port I/O off the async workers.
    ///
    /// The link is moved into the blocking task and handed back afterwards; if
    /// the task dies the link is gone and the interface reads as disconnected.
    async fn on_link<T, F>(&mut self, io: F) -> Result<T>
    where
        F: FnOnce(&mut dyn SerialLink) -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let mut link = self.link.take().ok_or(SerialError::NotConnected)?;
        let (link, result) = tokio::task::spawn_blocking(move || {
            let result = io(link.as_mut());
            (link, result)
        })
        .await
        .map_err(|e| SerialError::ConnectionFailed(format!("serial I/O task failed: {}", e)))?;
        self.link = Some(link);
        result
    }
}

impl Drop for SerialInterface {
    fn drop(&mut self) {
        self.close();
    }
}

/// Read every byte currently buffered, without waiting for more.
fn drain(link: &mut dyn SerialLink) -> Result<String> {
    let mut bytes = Vec::new();
    while link.bytes_available()? > 0 {
        bytes.push(link.read_byte()?);
    }
    Ok(String::from_utf8_lossy(&bytes).into_owned())
}
