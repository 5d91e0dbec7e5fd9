//! # onrobot-rs
//!
//! `onrobot-rs` is a library for interfacing with OnRobot RG series grippers
//! over Modbus, either through a TCP-attached toolchanger or a direct RS-485
//! serial link.
//! ### Compatible products
//! - [x] RG2
//! - [x] RG6
//! - [ ] 2FG7
//! - [ ] VG10
//!
//! ## Example
//! ```no_run
//! use onrobot_rs::*;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), RgError> {
//!     // connect through the toolchanger (Modbus TCP, port 502)
//!     let endpoint = TransportEndpoint::resolve(Some("192.168.1.1".into()), None, None)?;
//!     let mut gripper = RgGripper::connect(GripperModel::Rg6, endpoint).await?;
//!
//!     // the gripper only accepts motion commands while no motion is ongoing,
//!     // so poll the status word between commands
//!     if !gripper.get_status().await?.motion_ongoing {
//!         println!(
//!             "current opening width: {} mm",
//!             gripper.get_width_with_offset().await?
//!         );
//!
//!         // fully open, then wait for the fingers to settle
//!         gripper.open_gripper(DEFAULT_FORCE).await?;
//!         loop {
//!             tokio::time::sleep(std::time::Duration::from_millis(500)).await;
//!             if !gripper.get_status().await?.motion_ongoing {
//!                 break;
//!             }
//!         }
//!
//!         // fully close
//!         gripper.close_gripper(DEFAULT_FORCE).await?;
//!         loop {
//!             tokio::time::sleep(std::time::Duration::from_millis(500)).await;
//!             if !gripper.get_status().await?.motion_ongoing {
//!                 break;
//!             }
//!         }
//!
//!         // move to 80.0 mm (device units are mm * 10)
//!         gripper.move_gripper(800, DEFAULT_FORCE).await?;
//!     }
//!
//!     gripper.close_connection().await;
//!     Ok(())
//! }
//! ```
//!
//! ## Settling protocol
//! The gripper rejects motion commands while one is in progress. The driver is
//! a stateless protocol translator and does not track motion itself; callers
//! must poll [`RgGripper::get_status`] until
//! [`StatusFlags::motion_ongoing`] clears before issuing the next motion
//! command or reading a settled width. A 500 ms poll interval works well; no
//! interval or timeout is enforced here.

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use async_trait::async_trait;
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio_modbus::prelude::*;
use tokio_serial::SerialPortBuilderExt;

/// The Modbus unit/slave id of the RG gripper, fixed for every register
/// operation.
pub const UNIT_ID: u8 = 65;
/// Default target force in device units (N * 10), used by the original
/// vendor tooling for open/close/move.
pub const DEFAULT_FORCE: u16 = 400;
/// Standard Modbus TCP port, used when no port is given for a TCP endpoint.
pub const DEFAULT_TCP_PORT: u16 = 502;

/// Baud rate of the toolchanger RS-485 bus.
const BAUD_RATE: u32 = 115_200;
/// Response timeout applied to every register operation.
const RESPONSE_TIMEOUT: Duration = Duration::from_secs(1);

/// The one control mode the gripper documents: move to the target
/// force/width latched at registers 0 and 1.
const MODE_MOVE_TO_TARGET: u16 = 16;

// Holding register map. A motion command is one atomic 3-register write
// starting at `REG_TARGET_FORCE`.
const REG_TARGET_FORCE: u16 = 0;
const REG_TARGET_WIDTH: u16 = 1;
const REG_CONTROL_MODE: u16 = 2;
const REG_FINGERTIP_OFFSET: u16 = 258;
const REG_WIDTH: u16 = 267;
const REG_STATUS: u16 = 268;
const REG_WIDTH_WITH_OFFSET: u16 = 275;

/// The two supported gripper variants. They speak the same register protocol
/// and differ only in travel and force limits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum GripperModel {
    /// RG2: 110 mm stroke.
    Rg2,
    /// RG6: 160 mm stroke.
    Rg6,
}

impl GripperModel {
    /// Fully-open target width in device units (mm * 10).
    pub fn max_width_units(&self) -> u16 {
        match self {
            GripperModel::Rg2 => 1100,
            GripperModel::Rg6 => 1600,
        }
    }

    /// Maximum target force in device units (N * 10).
    pub fn max_force_units(&self) -> u16 {
        match self {
            GripperModel::Rg2 => 400,
            GripperModel::Rg6 => 1200,
        }
    }

    /// Fully-open width in millimeters.
    pub fn max_width_mm(&self) -> f64 {
        self.max_width_units() as f64 / 10.0
    }
}

impl FromStr for GripperModel {
    type Err = RgError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "rg2" => Ok(GripperModel::Rg2),
            "rg6" => Ok(GripperModel::Rg6),
            other => Err(RgError::UnknownModel(other.to_string())),
        }
    }
}

impl fmt::Display for GripperModel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GripperModel::Rg2 => write!(f, "rg2"),
            GripperModel::Rg6 => write!(f, "rg6"),
        }
    }
}

/// Where the gripper is reachable: over the network through the toolchanger,
/// or directly on a serial bus.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum TransportEndpoint {
    /// Modbus TCP through the toolchanger.
    Tcp { host: String, port: u16 },
    /// Modbus RTU on a local serial device.
    Serial { path: String },
}

impl TransportEndpoint {
    /// Resolve the usual driver options (`--ip`, `--port`, `--device`) into a
    /// single endpoint. Empty strings count as absent. If both an IP address
    /// and a serial device are given, the IP address takes precedence and the
    /// decision is logged. With neither, resolution fails with
    /// [`RgError::MissingEndpoint`].
    pub fn resolve(
        ip: Option<String>,
        port: Option<u16>,
        device: Option<String>,
    ) -> Result<Self, RgError> {
        let ip = ip.filter(|s| !s.is_empty());
        let device = device.filter(|s| !s.is_empty());
        match (ip, device) {
            (Some(host), device) => {
                if device.is_some() {
                    warn!("both an IP address and a serial device provided, using the IP address");
                }
                Ok(TransportEndpoint::Tcp {
                    host,
                    port: port.unwrap_or(DEFAULT_TCP_PORT),
                })
            }
            (None, Some(path)) => Ok(TransportEndpoint::Serial { path }),
            (None, None) => Err(RgError::MissingEndpoint),
        }
    }
}

impl fmt::Display for TransportEndpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransportEndpoint::Tcp { host, port } => write!(f, "tcp://{}:{}", host, port),
            TransportEndpoint::Serial { path } => write!(f, "serial:{}", path),
        }
    }
}

/// Status of the gripper, decoded from the 16-bit status word at register
/// 268. Bit 0 is the least significant bit. Always read fresh from the
/// device; never cached by the driver.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusFlags {
    /// Bit 0, a motion is ongoing and new commands are not accepted.
    pub motion_ongoing: bool,
    /// Bit 1, an internal or external grip is detected.
    pub grip_detected: bool,
    /// Bit 2, safety switch 1 is pushed.
    pub safety_switch_1: bool,
    /// Bit 3, safety circuit 1 is activated, the gripper cannot move.
    pub safety_circuit_1: bool,
    /// Bit 4, safety switch 2 is pushed.
    pub safety_switch_2: bool,
    /// Bit 5, safety circuit 2 is activated, the gripper cannot move.
    pub safety_circuit_2: bool,
    /// Bit 6, any safety switch is pushed.
    pub any_safety_switch: bool,
}

/// Human-readable description of each status bit, in bit order.
static CONDITIONS: [&str; 7] = [
    "a motion is ongoing so new commands are not accepted",
    "an internal or external grip is detected",
    "safety switch 1 is pushed",
    "safety circuit 1 is activated so the gripper cannot move",
    "safety switch 2 is pushed",
    "safety circuit 2 is activated so the gripper cannot move",
    "a safety switch is pushed",
];

impl StatusFlags {
    /// Decode the raw status register. Pure and side-effect free.
    pub fn decode(raw: u16) -> Self {
        let bit = |n: u16| raw & (1 << n) != 0;
        StatusFlags {
            motion_ongoing: bit(0),
            grip_detected: bit(1),
            safety_switch_1: bit(2),
            safety_circuit_1: bit(3),
            safety_switch_2: bit(4),
            safety_circuit_2: bit(5),
            any_safety_switch: bit(6),
        }
    }

    /// The seven flags in bit order, bit 0 first.
    pub fn as_array(&self) -> [bool; 7] {
        [
            self.motion_ongoing,
            self.grip_detected,
            self.safety_switch_1,
            self.safety_circuit_1,
            self.safety_switch_2,
            self.safety_circuit_2,
            self.any_safety_switch,
        ]
    }

    /// Descriptions of every asserted flag, for diagnostics and logging.
    /// Control flow should branch on the boolean fields instead.
    pub fn active_conditions(&self) -> Vec<&'static str> {
        self.as_array()
            .into_iter()
            .zip(CONDITIONS)
            .filter(|(set, _)| *set)
            .map(|(_, condition)| condition)
            .collect()
    }
}

/// A motion set point: target force and target width in device units.
///
/// Encoded as one atomic 3-register write `[force, width, mode]` starting at
/// register 0, with the mode register fixed to "move to target". The gripper
/// latches all three values together, so a partial update never triggers a
/// motion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MotionCommand {
    /// Target force in device units (N * 10).
    pub force: u16,
    /// Target width in device units (mm * 10).
    pub width: u16,
}

impl MotionCommand {
    /// Make the register array for the atomic motion write.
    pub fn to_registers(&self) -> [u16; 3] {
        [self.force, self.width, MODE_MOVE_TO_TARGET]
    }
}

/// Errors at the register-transport level.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),
    #[error("modbus protocol or transport error: {0}")]
    Modbus(#[from] tokio_modbus::Error),
    #[error("modbus server exception: {0}")]
    Exception(#[from] tokio_modbus::Exception),
    #[error("no response within {RESPONSE_TIMEOUT:?}")]
    Timeout,
    #[error("connection is closed")]
    Closed,
    #[error("device returned {got} registers, expected {expected}")]
    ShortResponse { expected: u16, got: usize },
}

/// Errors of the gripper driver.
///
/// Configuration and connection errors are fatal at construction. Read and
/// write failures are per-operation: they name the field or command involved,
/// carry the transport cause, and leave the controller usable for the next
/// call. A failed read means "value unknown", never zero.
#[derive(Debug, Error)]
pub enum RgError {
    #[error("either an IP address or a serial device must be provided")]
    MissingEndpoint,
    #[error("unknown gripper model `{0}`, expected \"rg2\" or \"rg6\"")]
    UnknownModel(String),
    #[error("failed to connect to the gripper: {0}")]
    Connection(#[source] TransportError),
    #[error("failed to read {field}: {source}")]
    ReadFailed {
        field: &'static str,
        #[source]
        source: TransportError,
    },
    #[error("failed to write {field}: {source}")]
    WriteFailed {
        field: &'static str,
        #[source]
        source: TransportError,
    },
}

/// Register-level access to the device, the one seam between the driver and
/// the Modbus client. The unit/slave id is bound when the session is opened.
///
/// A multi-register write is one indivisible request on the wire.
#[async_trait]
pub trait RegisterTransport: Send {
    /// Open the underlying link. Idempotent.
    async fn connect(&mut self) -> Result<(), TransportError>;
    /// Release the underlying link. Idempotent, safe on a closed session.
    async fn disconnect(&mut self) -> Result<(), TransportError>;
    /// Read `count` holding registers starting at `address`.
    async fn read_registers(
        &mut self,
        address: u16,
        count: u16,
    ) -> Result<Vec<u16>, TransportError>;
    /// Write holding registers starting at `address` in one request.
    async fn write_registers(
        &mut self,
        address: u16,
        values: &[u16],
    ) -> Result<(), TransportError>;
}

/// [`RegisterTransport`] over `tokio-modbus`, TCP or RTU depending on the
/// endpoint. Register operations on a session that was never connected, or
/// that has been disconnected, fail with [`TransportError::Closed`].
pub struct ModbusTransport {
    endpoint: TransportEndpoint,
    ctx: Option<client::Context>,
}

impl ModbusTransport {
    pub fn new(endpoint: TransportEndpoint) -> Self {
        Self {
            endpoint,
            ctx: None,
        }
    }

    async fn open_context(endpoint: &TransportEndpoint) -> Result<client::Context, TransportError> {
        match endpoint {
            TransportEndpoint::Tcp { host, port } => {
                let mut addrs = tokio::net::lookup_host((host.as_str(), *port)).await?;
                let addr = addrs.next().ok_or_else(|| {
                    TransportError::Io(std::io::Error::new(
                        std::io::ErrorKind::AddrNotAvailable,
                        format!("could not resolve `{}`", host),
                    ))
                })?;
                Ok(tcp::connect_slave(addr, Slave(UNIT_ID)).await?)
            }
            TransportEndpoint::Serial { path } => {
                let port = tokio_serial::new(path.as_str(), BAUD_RATE)
                    .data_bits(tokio_serial::DataBits::Eight)
                    .stop_bits(tokio_serial::StopBits::One)
                    .parity(tokio_serial::Parity::Even)
                    .timeout(RESPONSE_TIMEOUT)
                    .open_native_async()
                    .map_err(std::io::Error::from)?;
                Ok(rtu::attach_slave(port, Slave(UNIT_ID)))
            }
        }
    }
}

#[async_trait]
impl RegisterTransport for ModbusTransport {
    async fn connect(&mut self) -> Result<(), TransportError> {
        if self.ctx.is_none() {
            debug!("opening modbus session at {}", self.endpoint);
            self.ctx = Some(Self::open_context(&self.endpoint).await?);
        }
        Ok(())
    }

    async fn disconnect(&mut self) -> Result<(), TransportError> {
        if let Some(mut ctx) = self.ctx.take() {
            debug!("closing modbus session at {}", self.endpoint);
            let _ = ctx.disconnect().await;
        }
        Ok(())
    }

    async fn read_registers(
        &mut self,
        address: u16,
        count: u16,
    ) -> Result<Vec<u16>, TransportError> {
        let ctx = self.ctx.as_mut().ok_or(TransportError::Closed)?;
        let response =
            tokio::time::timeout(RESPONSE_TIMEOUT, ctx.read_holding_registers(address, count))
                .await
                .map_err(|_| TransportError::Timeout)?;
        Ok(response??)
    }

    async fn write_registers(
        &mut self,
        address: u16,
        values: &[u16],
    ) -> Result<(), TransportError> {
        let ctx = self.ctx.as_mut().ok_or(TransportError::Closed)?;
        let response =
            tokio::time::timeout(RESPONSE_TIMEOUT, ctx.write_multiple_registers(address, values))
                .await
                .map_err(|_| TransportError::Timeout)?;
        Ok(response??)
    }
}

/// Data structure for interfacing with an OnRobot RG gripper.
///
/// The controller is a stateless protocol translator over a stateful device:
/// it holds the model parameters and the transport session, nothing else.
/// Motion state lives in the device and is observed through
/// [`get_status`](RgGripper::get_status); see the crate documentation for the
/// settling protocol. Operations take `&mut self` and the session is a single
/// physical link, so access from multiple threads must be serialized by the
/// caller.
pub struct RgGripper {
    model: GripperModel,
    transport: Box<dyn RegisterTransport>,
}

impl RgGripper {
    /// Connect to the gripper at the given endpoint. The session stays open
    /// for the lifetime of the controller; release it with
    /// [`close_connection`](RgGripper::close_connection).
    pub async fn connect(
        model: GripperModel,
        endpoint: TransportEndpoint,
    ) -> Result<Self, RgError> {
        info!("connecting to {} gripper at {}", model, endpoint);
        let mut transport = ModbusTransport::new(endpoint);
        transport.connect().await.map_err(RgError::Connection)?;
        Ok(Self::with_transport(model, Box::new(transport)))
    }

    /// Constructor from an already-established transport session.
    pub fn with_transport(model: GripperModel, transport: Box<dyn RegisterTransport>) -> Self {
        Self { model, transport }
    }

    /// The model this controller was constructed for.
    pub fn model(&self) -> GripperModel {
        self.model
    }

    async fn read_field(&mut self, address: u16, field: &'static str) -> Result<u16, RgError> {
        let regs = self
            .transport
            .read_registers(address, 1)
            .await
            .map_err(|source| RgError::ReadFailed { field, source })?;
        regs.first().copied().ok_or(RgError::ReadFailed {
            field,
            source: TransportError::ShortResponse {
                expected: 1,
                got: 0,
            },
        })
    }

    async fn write_field(
        &mut self,
        address: u16,
        values: &[u16],
        field: &'static str,
    ) -> Result<(), RgError> {
        self.transport
            .write_registers(address, values)
            .await
            .map_err(|source| RgError::WriteFailed { field, source })
    }

    /// Offset of the mounted fingertips in millimeters.
    pub async fn get_fingertip_offset(&mut self) -> Result<f64, RgError> {
        let raw = self
            .read_field(REG_FINGERTIP_OFFSET, "fingertip_offset")
            .await?;
        Ok(raw as f64 / 10.0)
    }

    /// Current opening width in millimeters, without the fingertip offset.
    pub async fn get_width(&mut self) -> Result<f64, RgError> {
        let raw = self.read_field(REG_WIDTH, "width").await?;
        Ok(raw as f64 / 10.0)
    }

    /// Current opening width in millimeters, fingertip offset included.
    pub async fn get_width_with_offset(&mut self) -> Result<f64, RgError> {
        let raw = self
            .read_field(REG_WIDTH_WITH_OFFSET, "width_with_offset")
            .await?;
        Ok(raw as f64 / 10.0)
    }

    /// Read and decode the status word.
    pub async fn get_status(&mut self) -> Result<StatusFlags, RgError> {
        let raw = self.read_field(REG_STATUS, "status").await?;
        let status = StatusFlags::decode(raw);
        for condition in status.active_conditions() {
            debug!("gripper status: {}", condition);
        }
        Ok(status)
    }

    /// Write the control mode register directly.
    pub async fn set_control_mode(&mut self, mode: u16) -> Result<(), RgError> {
        self.write_field(REG_CONTROL_MODE, &[mode], "control_mode")
            .await
    }

    /// Latch a target force (device units) without triggering a motion.
    /// Not range checked against [`GripperModel::max_force_units`].
    pub async fn set_target_force(&mut self, force: u16) -> Result<(), RgError> {
        self.write_field(REG_TARGET_FORCE, &[force], "target_force")
            .await
    }

    /// Latch a target width (device units) without triggering a motion.
    /// Not range checked against [`GripperModel::max_width_units`].
    pub async fn set_target_width(&mut self, width: u16) -> Result<(), RgError> {
        self.write_field(REG_TARGET_WIDTH, &[width], "target_width")
            .await
    }

    async fn issue_motion(
        &mut self,
        command: MotionCommand,
        field: &'static str,
    ) -> Result<(), RgError> {
        debug!("{}: {:?}", field, command);
        self.write_field(REG_TARGET_FORCE, &command.to_registers(), field)
            .await
    }

    /// Close the gripper fully with the given force (device units).
    /// [`DEFAULT_FORCE`] matches the vendor tooling.
    pub async fn close_gripper(&mut self, force: u16) -> Result<(), RgError> {
        self.issue_motion(MotionCommand { force, width: 0 }, "close_gripper")
            .await
    }

    /// Open the gripper fully with the given force (device units).
    pub async fn open_gripper(&mut self, force: u16) -> Result<(), RgError> {
        let width = self.model.max_width_units();
        self.issue_motion(MotionCommand { force, width }, "open_gripper")
            .await
    }

    /// Move the fingers to `width` (device units, mm * 10) with the given
    /// force. The width is not range checked against the model's stroke.
    pub async fn move_gripper(&mut self, width: u16, force: u16) -> Result<(), RgError> {
        self.issue_motion(MotionCommand { force, width }, "move_gripper")
            .await
    }

    /// Release the transport session. Safe to call more than once; register
    /// operations afterwards fail with [`TransportError::Closed`].
    pub async fn close_connection(&mut self) {
        let _ = self.transport.disconnect().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::collections::HashMap;
    use std::sync::{Arc, Mutex};

    /// In-memory transport: records every write, serves scripted reads, and
    /// echoes the width of the last motion command back through the width
    /// registers, like a settled gripper would.
    #[derive(Default)]
    struct FakeInner {
        writes: Vec<(u16, Vec<u16>)>,
        reads: HashMap<u16, u16>,
        fail_reads: bool,
        fail_writes: bool,
        closed: bool,
    }

    #[derive(Clone, Default)]
    struct FakeTransport(Arc<Mutex<FakeInner>>);

    impl FakeTransport {
        fn with_register(self, address: u16, value: u16) -> Self {
            self.0.lock().unwrap().reads.insert(address, value);
            self
        }

        fn fail_reads(self) -> Self {
            self.0.lock().unwrap().fail_reads = true;
            self
        }

        fn fail_writes(self) -> Self {
            self.0.lock().unwrap().fail_writes = true;
            self
        }

        fn writes(&self) -> Vec<(u16, Vec<u16>)> {
            self.0.lock().unwrap().writes.clone()
        }
    }

    #[async_trait]
    impl RegisterTransport for FakeTransport {
        async fn connect(&mut self) -> Result<(), TransportError> {
            self.0.lock().unwrap().closed = false;
            Ok(())
        }

        async fn disconnect(&mut self) -> Result<(), TransportError> {
            self.0.lock().unwrap().closed = true;
            Ok(())
        }

        async fn read_registers(
            &mut self,
            address: u16,
            count: u16,
        ) -> Result<Vec<u16>, TransportError> {
            let inner = self.0.lock().unwrap();
            if inner.closed {
                return Err(TransportError::Closed);
            }
            if inner.fail_reads {
                return Err(TransportError::Timeout);
            }
            let value = inner.reads.get(&address).copied().unwrap_or(0);
            Ok(vec![value; count as usize])
        }

        async fn write_registers(
            &mut self,
            address: u16,
            values: &[u16],
        ) -> Result<(), TransportError> {
            let mut inner = self.0.lock().unwrap();
            if inner.closed {
                return Err(TransportError::Closed);
            }
            if inner.fail_writes {
                return Err(TransportError::Timeout);
            }
            inner.writes.push((address, values.to_vec()));
            // a motion command eventually settles at its target width
            if address == REG_TARGET_FORCE && values.len() == 3 {
                let width = values[1];
                inner.reads.insert(REG_WIDTH, width);
                inner.reads.insert(REG_WIDTH_WITH_OFFSET, width);
            }
            Ok(())
        }
    }

    fn gripper(model: GripperModel) -> (RgGripper, FakeTransport) {
        let fake = FakeTransport::default();
        let rg = RgGripper::with_transport(model, Box::new(fake.clone()));
        (rg, fake)
    }

    #[test]
    fn model_parsing() {
        assert_eq!("rg2".parse::<GripperModel>().unwrap(), GripperModel::Rg2);
        assert_eq!("RG6".parse::<GripperModel>().unwrap(), GripperModel::Rg6);
        assert!(matches!(
            "rg3".parse::<GripperModel>(),
            Err(RgError::UnknownModel(tag)) if tag == "rg3"
        ));
    }

    #[test]
    fn model_limits() {
        assert_eq!(GripperModel::Rg2.max_width_units(), 1100);
        assert_eq!(GripperModel::Rg2.max_force_units(), 400);
        assert_eq!(GripperModel::Rg6.max_width_units(), 1600);
        assert_eq!(GripperModel::Rg6.max_force_units(), 1200);
        assert_eq!(GripperModel::Rg6.max_width_mm(), 160.0);
    }

    #[test]
    fn endpoint_tcp_wins_when_both_given() {
        let endpoint = TransportEndpoint::resolve(
            Some("10.0.0.5".into()),
            Some(1502),
            Some("/dev/ttyUSB0".into()),
        )
        .unwrap();
        assert_eq!(
            endpoint,
            TransportEndpoint::Tcp {
                host: "10.0.0.5".into(),
                port: 1502
            }
        );
    }

    #[test]
    fn endpoint_defaults_and_failures() {
        let endpoint = TransportEndpoint::resolve(Some("10.0.0.5".into()), None, None).unwrap();
        assert_eq!(
            endpoint,
            TransportEndpoint::Tcp {
                host: "10.0.0.5".into(),
                port: DEFAULT_TCP_PORT
            }
        );

        let endpoint =
            TransportEndpoint::resolve(None, None, Some("/dev/ttyUSB0".into())).unwrap();
        assert_eq!(
            endpoint,
            TransportEndpoint::Serial {
                path: "/dev/ttyUSB0".into()
            }
        );

        assert!(matches!(
            TransportEndpoint::resolve(None, Some(502), None),
            Err(RgError::MissingEndpoint)
        ));
        // empty strings count as absent
        assert!(matches!(
            TransportEndpoint::resolve(Some(String::new()), None, Some(String::new())),
            Err(RgError::MissingEndpoint)
        ));
    }

    #[test]
    fn status_decoding() {
        let status = StatusFlags::decode(0b0000_0000_0000_0011);
        assert!(status.motion_ongoing);
        assert!(status.grip_detected);
        assert_eq!(
            status.as_array(),
            [true, true, false, false, false, false, false]
        );

        assert_eq!(StatusFlags::decode(0).as_array(), [false; 7]);
        assert_eq!(
            StatusFlags::decode(0).active_conditions(),
            Vec::<&str>::new()
        );

        let all = StatusFlags::decode(0b0111_1111);
        assert_eq!(all.as_array(), [true; 7]);
        assert_eq!(all.active_conditions().len(), 7);

        let grip_only = StatusFlags::decode(0b10);
        assert_eq!(
            grip_only.active_conditions(),
            vec!["an internal or external grip is detected"]
        );
    }

    #[test]
    fn status_ignores_bits_above_six() {
        assert_eq!(StatusFlags::decode(0xFF80).as_array(), [false; 7]);
    }

    #[test]
    fn motion_command_encoding() {
        let cmd = MotionCommand {
            force: 400,
            width: 800,
        };
        assert_eq!(cmd.to_registers(), [400, 800, 16]);
    }

    #[tokio::test]
    async fn open_gripper_writes_model_stroke() {
        let (mut rg, fake) = gripper(GripperModel::Rg6);
        rg.open_gripper(DEFAULT_FORCE).await.unwrap();
        assert_eq!(fake.writes(), vec![(0, vec![400, 1600, 16])]);

        let (mut rg, fake) = gripper(GripperModel::Rg2);
        rg.open_gripper(DEFAULT_FORCE).await.unwrap();
        assert_eq!(fake.writes(), vec![(0, vec![400, 1100, 16])]);
    }

    #[tokio::test]
    async fn close_gripper_targets_zero_width() {
        let (mut rg, fake) = gripper(GripperModel::Rg6);
        rg.close_gripper(300).await.unwrap();
        assert_eq!(fake.writes(), vec![(0, vec![300, 0, 16])]);
    }

    #[tokio::test]
    async fn move_gripper_encodes_width_and_force() {
        let (mut rg, fake) = gripper(GripperModel::Rg6);
        rg.move_gripper(800, DEFAULT_FORCE).await.unwrap();
        assert_eq!(fake.writes(), vec![(0, vec![400, 800, 16])]);
    }

    #[tokio::test]
    async fn single_register_setters() {
        let (mut rg, fake) = gripper(GripperModel::Rg6);
        rg.set_target_force(500).await.unwrap();
        rg.set_target_width(750).await.unwrap();
        rg.set_control_mode(16).await.unwrap();
        assert_eq!(
            fake.writes(),
            vec![(0, vec![500]), (1, vec![750]), (2, vec![16])]
        );
    }

    #[tokio::test]
    async fn width_reads_scale_to_millimeters() {
        let fake = FakeTransport::default()
            .with_register(REG_WIDTH, 875)
            .with_register(REG_FINGERTIP_OFFSET, 100)
            .with_register(REG_WIDTH_WITH_OFFSET, 975);
        let mut rg = RgGripper::with_transport(GripperModel::Rg6, Box::new(fake));
        assert_eq!(rg.get_width().await.unwrap(), 87.5);
        assert_eq!(rg.get_fingertip_offset().await.unwrap(), 10.0);
        assert_eq!(rg.get_width_with_offset().await.unwrap(), 97.5);
    }

    #[tokio::test]
    async fn read_failure_names_the_field() {
        let fake = FakeTransport::default().fail_reads();
        let mut rg = RgGripper::with_transport(GripperModel::Rg6, Box::new(fake));
        assert!(matches!(
            rg.get_width().await,
            Err(RgError::ReadFailed { field: "width", .. })
        ));
        assert!(matches!(
            rg.get_status().await,
            Err(RgError::ReadFailed {
                field: "status",
                ..
            })
        ));
        assert!(matches!(
            rg.get_fingertip_offset().await,
            Err(RgError::ReadFailed {
                field: "fingertip_offset",
                ..
            })
        ));
    }

    #[tokio::test]
    async fn write_failure_names_the_operation_and_controller_survives() {
        let fake = FakeTransport::default().fail_writes();
        let mut rg = RgGripper::with_transport(GripperModel::Rg6, Box::new(fake.clone()));
        assert!(matches!(
            rg.open_gripper(DEFAULT_FORCE).await,
            Err(RgError::WriteFailed {
                field: "open_gripper",
                ..
            })
        ));
        assert_eq!(rg.model(), GripperModel::Rg6);

        // the same controller works again once the transport does
        fake.0.lock().unwrap().fail_writes = false;
        rg.open_gripper(DEFAULT_FORCE).await.unwrap();
        assert_eq!(fake.writes(), vec![(0, vec![400, 1600, 16])]);
    }

    #[tokio::test]
    async fn close_connection_is_idempotent() {
        let (mut rg, _fake) = gripper(GripperModel::Rg6);
        rg.close_connection().await;
        rg.close_connection().await;

        // register operations after close report a closed connection
        assert!(matches!(
            rg.get_width().await,
            Err(RgError::ReadFailed {
                field: "width",
                source: TransportError::Closed,
            })
        ));
    }

    #[tokio::test]
    async fn move_then_read_round_trips_width() {
        let (mut rg, _fake) = gripper(GripperModel::Rg6);
        for width in [0u16, 1, 800, 1599, 1600] {
            rg.move_gripper(width, DEFAULT_FORCE).await.unwrap();
            assert_eq!(rg.get_width().await.unwrap(), width as f64 / 10.0);
        }
    }
}
