// src/hardware/mod.rs - Serial transports and the meter reader child
use std::process::Stdio;

use serial2_tokio::SerialPort;
use thiserror::Error;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::{Child, Command};
use tokio::sync::mpsc;

use crate::control::PowerLevel;

/// Both the power controller and the probe rig talk 9600 8N1.
pub const SERIAL_BAUD: u32 = 9600;

#[derive(Debug, Error)]
pub enum HardwareError {
    #[error("failed to open serial port {path}: {source}")]
    OpenPort {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to spawn meter reader {command:?}: {source}")]
    SpawnReader {
        command: String,
        #[source]
        source: std::io::Error,
    },
    #[error("power port write failed: {0}")]
    PowerWrite(#[source] std::io::Error),
    #[error("power port control line failed: {0}")]
    ControlLine(#[source] std::io::Error),
}

/// Serial transport to the heater power controller.
///
/// Text protocol: `"<percent>%\r\n"` commands a level; the DTR line is
/// the hardware enable signal, asserted while the controller should be
/// armed and dropped on shutdown.
pub struct PowerPort {
    port: SerialPort,
    path: String,
}

impl PowerPort {
    pub fn open(path: &str) -> Result<Self, HardwareError> {
        let port = SerialPort::open(path, SERIAL_BAUD).map_err(|source| {
            HardwareError::OpenPort {
                path: path.to_string(),
                source,
            }
        })?;
        port.set_dtr(true).map_err(HardwareError::ControlLine)?;
        tracing::info!(path, "power controller port open");
        Ok(Self {
            port,
            path: path.to_string(),
        })
    }

    /// Transmit a power level. The transmitted value is capped at 99%
    /// (the controller misbehaves at 100); the enable line is re-asserted
    /// with every command.
    pub async fn send(&self, level: PowerLevel) -> Result<(), HardwareError> {
        self.port.set_dtr(true).map_err(HardwareError::ControlLine)?;
        let command = format!("{}%\r\n", level.for_transmit());
        tracing::trace!(path = %self.path, command = command.trim(), "power TX");
        self.port
            .write_all(command.as_bytes())
            .await
            .map_err(HardwareError::PowerWrite)
    }

    /// Drive the heater to zero and disarm the controller. Called on
    /// session shutdown; the heater must never stay energized.
    pub async fn shutdown(&self) -> Result<(), HardwareError> {
        self.port
            .write_all(b"0%\r\n")
            .await
            .map_err(HardwareError::PowerWrite)?;
        self.port.set_dtr(false).map_err(HardwareError::ControlLine)?;
        tracing::info!(path = %self.path, "power controller disarmed");
        Ok(())
    }
}

/// Non-blocking line intake shared by every reading source: a spawned
/// pump task forwards complete lines into an unbounded channel, and the
/// tick handler drains whatever is available without ever waiting.
#[derive(Debug)]
pub struct LineIntake {
    rx: mpsc::UnboundedReceiver<String>,
}

impl LineIntake {
    /// Drain one buffered line, if any. Never blocks the heartbeat.
    pub fn try_next_line(&mut self) -> Option<String> {
        self.rx.try_recv().ok()
    }
}

/// Spawn the pump task reading lines from `reader` into an intake.
fn spawn_line_pump<R>(reader: R, label: &'static str) -> LineIntake
where
    R: AsyncRead + Unpin + Send + 'static,
{
    let (tx, rx) = mpsc::unbounded_channel();
    tokio::spawn(async move {
        let mut lines = BufReader::new(reader).lines();
        loop {
            match lines.next_line().await {
                Ok(Some(line)) => {
                    let line = line.trim().to_string();
                    if line.is_empty() {
                        continue;
                    }
                    if tx.send(line).is_err() {
                        break;
                    }
                }
                Ok(None) => {
                    tracing::info!(source = label, "line source closed");
                    break;
                }
                Err(e) => {
                    tracing::error!(source = label, "line source read error: {e}");
                    break;
                }
            }
        }
    });
    LineIntake { rx }
}

/// The external meter reader child process. One raw frame per stdout
/// line; killed on session shutdown.
pub struct MeterReader {
    child: Child,
    intake: LineIntake,
}

impl MeterReader {
    pub fn spawn(command: &str) -> Result<Self, HardwareError> {
        let mut child = Command::new(command)
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .spawn()
            .map_err(|source| HardwareError::SpawnReader {
                command: command.to_string(),
                source,
            })?;
        let stdout = child.stdout.take().ok_or_else(|| HardwareError::SpawnReader {
            command: command.to_string(),
            source: std::io::Error::other("no stdout pipe"),
        })?;
        tracing::info!(command, "meter reader started");
        Ok(Self {
            child,
            intake: spawn_line_pump(stdout, "dmm"),
        })
    }

    pub fn try_next_line(&mut self) -> Option<String> {
        self.intake.try_next_line()
    }

    /// Terminate the reader child. Best-effort; the process may already
    /// have exited.
    pub fn terminate(&mut self) {
        if let Err(e) = self.child.start_kill() {
            tracing::warn!("meter reader kill failed: {e}");
        } else {
            tracing::info!("meter reader terminated");
        }
    }
}

/// Serial intake for the secondary probe rig.
pub struct ProbePort {
    intake: LineIntake,
}

impl ProbePort {
    pub fn open(path: &str) -> Result<Self, HardwareError> {
        let port = SerialPort::open(path, SERIAL_BAUD).map_err(|source| {
            HardwareError::OpenPort {
                path: path.to_string(),
                source,
            }
        })?;
        tracing::info!(path, "probe port open");
        let (tx, rx) = mpsc::unbounded_channel();
        tokio::spawn(async move {
            let mut buf = [0u8; 256];
            let mut pending = String::new();
            loop {
                match port.read(&mut buf).await {
                    Ok(0) => {
                        tracing::info!("probe port closed");
                        break;
                    }
                    Ok(n) => {
                        pending.push_str(&String::from_utf8_lossy(&buf[..n]));
                        if drain_complete_lines(&mut pending, &tx).is_err() {
                            break;
                        }
                    }
                    Err(e) => {
                        tracing::error!("probe port read error: {e}");
                        break;
                    }
                }
            }
        });
        Ok(Self {
            intake: LineIntake { rx },
        })
    }

    pub fn try_next_line(&mut self) -> Option<String> {
        self.intake.try_next_line()
    }
}

/// Split complete lines out of a serial receive buffer, keeping any
/// trailing partial line for the next read.
fn drain_complete_lines(
    pending: &mut String,
    tx: &mpsc::UnboundedSender<String>,
) -> Result<(), ()> {
    while let Some(pos) = pending.find('\n') {
        let line: String = pending.drain(..=pos).collect();
        let line = line.trim();
        if !line.is_empty() && tx.send(line.to_string()).is_err() {
            return Err(());
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::AsyncWriteExt;

    #[test]
    fn test_drain_complete_lines_keeps_partial_tail() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut pending = String::from("T 24.0 180.0 181.0\r\n25.0 150");
        drain_complete_lines(&mut pending, &tx).unwrap();
        assert_eq!(rx.try_recv().unwrap(), "T 24.0 180.0 181.0");
        assert!(rx.try_recv().is_err());
        assert_eq!(pending, "25.0 150");

        pending.push_str(".0 151.0\n");
        drain_complete_lines(&mut pending, &tx).unwrap();
        assert_eq!(rx.try_recv().unwrap(), "25.0 150.0 151.0");
        assert!(pending.is_empty());
    }

    #[test]
    fn test_drain_skips_blank_lines() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut pending = String::from("\r\n\n  \nhello\n");
        drain_complete_lines(&mut pending, &tx).unwrap();
        assert_eq!(rx.try_recv().unwrap(), "hello");
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_line_pump_delivers_without_blocking() {
        let (mut writer, reader) = tokio::io::duplex(256);
        let mut intake = spawn_line_pump(reader, "test");
        assert_eq!(intake.try_next_line(), None);

        writer.write_all(b"one line\nanother\n").await.unwrap();
        // Give the pump task a moment to run.
        tokio::time::sleep(std::time::Duration::from_millis(20)).await;
        assert_eq!(intake.try_next_line().as_deref(), Some("one line"));
        assert_eq!(intake.try_next_line().as_deref(), Some("another"));
        assert_eq!(intake.try_next_line(), None);
    }
}
