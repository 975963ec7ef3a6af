use std::io::{self, Read};
use std::time::Duration;

use serialport::{ClearBuffer, DataBits, FlowControl, Parity, SerialPort, SerialPortType, StopBits};

use crate::config::LoggerConfig;
use crate::error::CaptureError;

/// A byte stream that yields complete lines.
pub trait LineSource {
    /// Next complete line (terminator stripped), or `Ok(None)` when nothing
    /// is waiting. Must not block longer than the channel's read timeout.
    fn poll_line(&mut self) -> io::Result<Option<Vec<u8>>>;

    /// Drop anything already buffered.
    fn discard_input(&mut self) -> io::Result<()>;
}

/// Largest single read from the port.
const READ_CHUNK: usize = 1024;

/// Serial connection to the measurement board: 8N1, no flow control.
pub struct SerialChannel {
    port: Box<dyn SerialPort>,
    pending: Vec<u8>,
}

impl SerialChannel {
    pub fn open(name: &str, config: &LoggerConfig) -> Result<Self, CaptureError> {
        Self::open_with(name, config.baud_rate, config.read_timeout())
    }

    pub fn open_with(name: &str, baud_rate: u32, timeout: Duration) -> Result<Self, CaptureError> {
        let port = serialport::new(name, baud_rate)
            .data_bits(DataBits::Eight)
            .parity(Parity::None)
            .stop_bits(StopBits::One)
            .flow_control(FlowControl::None)
            .timeout(timeout)
            .open()
            .map_err(|e| CaptureError::Connection {
                port: name.to_string(),
                reason: e.to_string(),
            })?;

        tracing::info!("Opened {name} at {baud_rate} baud");
        Ok(Self {
            port,
            pending: Vec::new(),
        })
    }
}

impl LineSource for SerialChannel {
    fn poll_line(&mut self) -> io::Result<Option<Vec<u8>>> {
        if let Some(line) = take_line(&mut self.pending) {
            return Ok(Some(line));
        }

        let available = self.port.bytes_to_read().map_err(io::Error::from)? as usize;
        if available == 0 {
            return Ok(None);
        }

        let mut chunk = [0u8; READ_CHUNK];
        let want = available.min(READ_CHUNK);
        match self.port.read(&mut chunk[..want]) {
            Ok(0) => {}
            Ok(n) => self.pending.extend_from_slice(&chunk[..n]),
            Err(e) if matches!(e.kind(), io::ErrorKind::TimedOut | io::ErrorKind::Interrupted) => {}
            Err(e) => return Err(e),
        }

        Ok(take_line(&mut self.pending))
    }

    fn discard_input(&mut self) -> io::Result<()> {
        self.pending.clear();
        self.port.clear(ClearBuffer::Input).map_err(io::Error::from)
    }
}

/// Split the first `\n`-terminated line off `buffer`, without the newline.
fn take_line(buffer: &mut Vec<u8>) -> Option<Vec<u8>> {
    let end = buffer.iter().position(|&b| b == b'\n')?;
    let mut line: Vec<u8> = buffer.drain(..=end).collect();
    line.pop();
    Some(line)
}

/// A serial port found on the host.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PortInfo {
    pub name: String,
    pub description: String,
}

pub fn discover_ports() -> Result<Vec<PortInfo>, CaptureError> {
    let ports = serialport::available_ports().map_err(|e| CaptureError::Discovery(e.to_string()))?;
    Ok(ports
        .into_iter()
        .map(|p| PortInfo {
            description: describe(&p.port_type),
            name: p.port_name,
        })
        .collect())
}

fn describe(port_type: &SerialPortType) -> String {
    match port_type {
        SerialPortType::UsbPort(usb) => {
            let label = usb
                .product
                .as_deref()
                .or(usb.manufacturer.as_deref())
                .unwrap_or("USB serial");
            format!("{label} ({:04x}:{:04x})", usb.vid, usb.pid)
        }
        SerialPortType::PciPort => "PCI serial".to_string(),
        SerialPortType::BluetoothPort => "Bluetooth serial".to_string(),
        SerialPortType::Unknown => "serial port".to_string(),
    }
}

/// The preferred port when it was discovered, else the first one.
/// Fails with [`CaptureError::NoPorts`] when nothing was discovered.
pub fn select_port<'a>(ports: &'a [PortInfo], preferred: Option<&str>) -> Result<&'a PortInfo, CaptureError> {
    preferred
        .and_then(|want| ports.iter().find(|p| p.name == want))
        .or_else(|| ports.first())
        .ok_or(CaptureError::NoPorts)
}
