//! Connection Manager object (class 0x06).
//!
//! Implements Forward_Open (0x54), Large_Forward_Open (0x5B) and
//! Forward_Close (0x4E). A successful open allocates a fresh Target->
//! Originator connection id and installs a producer and a consumer entry
//! in the runtime; a close retires them by the originator's triad.

use crate::connection::IoConnection;
use crate::runtime::IoRuntime;
use bytes::{BufMut, BytesMut};
use eipkit_cip::error::{ext_status, status};
use eipkit_cip::path::{parse_segments, PathSegment};
use eipkit_cip::types::service;
use eipkit_cip::{class, CipError, CipObject};
use eipkit_objects::AssemblyObject;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// First Target->Originator id handed out, above the range typical peers
/// pick for their side.
const FIRST_TO_CONNECTION_ID: u32 = 0x8000_0000;

fn connection_failure(ext: u16) -> CipError {
    CipError::with_ext(status::CONNECTION_FAILURE, ext)
}

struct Reader<'a> {
    data: &'a [u8],
    offset: usize,
}

impl<'a> Reader<'a> {
    fn new(data: &'a [u8]) -> Self {
        Self { data, offset: 0 }
    }

    fn take(&mut self, n: usize) -> Result<&'a [u8], CipError> {
        if self.data.len() < self.offset + n {
            return Err(connection_failure(ext_status::VENDOR_SPECIFIC));
        }
        let out = &self.data[self.offset..self.offset + n];
        self.offset += n;
        Ok(out)
    }

    fn u8(&mut self) -> Result<u8, CipError> {
        Ok(self.take(1)?[0])
    }

    fn u16(&mut self) -> Result<u16, CipError> {
        let raw = self.take(2)?;
        Ok(u16::from_le_bytes([raw[0], raw[1]]))
    }

    fn u32(&mut self) -> Result<u32, CipError> {
        let raw = self.take(4)?;
        Ok(u32::from_le_bytes([raw[0], raw[1], raw[2], raw[3]]))
    }
}

/// Forward_Open / Large_Forward_Open request body.
///
/// The standard form carries 16-bit network connection parameters; the
/// large form widens both parameter words to 32 bits.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ForwardOpenRequest {
    pub priority_time_tick: u8,
    pub timeout_ticks: u8,
    pub ot_connection_id: u32,
    pub to_connection_id: u32,
    pub connection_serial: u16,
    pub vendor_id: u16,
    pub originator_serial: u32,
    pub timeout_mult: u8,
    /// O->T requested packet interval, microseconds.
    pub ot_rpi: u32,
    pub ot_net_params: u32,
    /// T->O requested packet interval, microseconds.
    pub to_rpi: u32,
    pub to_net_params: u32,
    pub transport_trigger: u8,
    pub path: Vec<u8>,
    pub large: bool,
}

impl ForwardOpenRequest {
    /// Transport class from the low nibble of the trigger byte.
    pub fn transport_class(&self) -> u8 {
        self.transport_trigger & 0x0F
    }

    pub fn encode(&self) -> BytesMut {
        let mut buf = BytesMut::with_capacity(36 + self.path.len());
        buf.put_u8(self.priority_time_tick);
        buf.put_u8(self.timeout_ticks);
        buf.put_u32_le(self.ot_connection_id);
        buf.put_u32_le(self.to_connection_id);
        buf.put_u16_le(self.connection_serial);
        buf.put_u16_le(self.vendor_id);
        buf.put_u32_le(self.originator_serial);
        buf.put_u8(self.timeout_mult);
        buf.put_slice(&[0, 0, 0]); // reserved
        buf.put_u32_le(self.ot_rpi);
        if self.large {
            buf.put_u32_le(self.ot_net_params);
        } else {
            buf.put_u16_le(self.ot_net_params as u16);
        }
        buf.put_u32_le(self.to_rpi);
        if self.large {
            buf.put_u32_le(self.to_net_params);
        } else {
            buf.put_u16_le(self.to_net_params as u16);
        }
        buf.put_u8(self.transport_trigger);
        buf.put_u8((self.path.len() / 2) as u8);
        buf.put_slice(&self.path);
        buf
    }

    pub fn decode(data: &[u8], large: bool) -> Result<Self, CipError> {
        let mut r = Reader::new(data);
        let priority_time_tick = r.u8()?;
        let timeout_ticks = r.u8()?;
        let ot_connection_id = r.u32()?;
        let to_connection_id = r.u32()?;
        let connection_serial = r.u16()?;
        let vendor_id = r.u16()?;
        let originator_serial = r.u32()?;
        let timeout_mult = r.u8()?;
        r.take(3)?; // reserved
        let ot_rpi = r.u32()?;
        let ot_net_params = if large { r.u32()? } else { r.u16()? as u32 };
        let to_rpi = r.u32()?;
        let to_net_params = if large { r.u32()? } else { r.u16()? as u32 };
        let transport_trigger = r.u8()?;
        let path_words = r.u8()? as usize;
        let path = r.take(path_words * 2)?.to_vec();

        Ok(Self {
            priority_time_tick,
            timeout_ticks,
            ot_connection_id,
            to_connection_id,
            connection_serial,
            vendor_id,
            originator_serial,
            timeout_mult,
            ot_rpi,
            ot_net_params,
            to_rpi,
            to_net_params,
            transport_trigger,
            path,
            large,
        })
    }
}

/// Forward_Open success reply body (26 bytes, empty application reply).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ForwardOpenResponse {
    pub ot_connection_id: u32,
    pub to_connection_id: u32,
    pub connection_serial: u16,
    pub vendor_id: u16,
    pub originator_serial: u32,
    /// Actual packet intervals, microseconds (the requested RPIs echoed).
    pub ot_api: u32,
    pub to_api: u32,
}

impl ForwardOpenResponse {
    pub fn encode(&self) -> Vec<u8> {
        let mut buf = BytesMut::with_capacity(26);
        buf.put_u32_le(self.ot_connection_id);
        buf.put_u32_le(self.to_connection_id);
        buf.put_u16_le(self.connection_serial);
        buf.put_u16_le(self.vendor_id);
        buf.put_u32_le(self.originator_serial);
        buf.put_u32_le(self.ot_api);
        buf.put_u32_le(self.to_api);
        buf.put_u8(0); // application reply size
        buf.put_u8(0); // reserved
        buf.to_vec()
    }

    pub fn decode(data: &[u8]) -> Result<Self, CipError> {
        let mut r = Reader::new(data);
        let resp = Self {
            ot_connection_id: r.u32()?,
            to_connection_id: r.u32()?,
            connection_serial: r.u16()?,
            vendor_id: r.u16()?,
            originator_serial: r.u32()?,
            ot_api: r.u32()?,
            to_api: r.u32()?,
        };
        r.u8()?; // application reply size
        r.u8()?; // reserved
        Ok(resp)
    }
}

/// Forward_Close request body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ForwardCloseRequest {
    pub priority_time_tick: u8,
    pub timeout_ticks: u8,
    pub connection_serial: u16,
    pub vendor_id: u16,
    pub originator_serial: u32,
    pub path: Vec<u8>,
}

impl ForwardCloseRequest {
    pub fn encode(&self) -> BytesMut {
        let mut buf = BytesMut::with_capacity(12 + self.path.len());
        buf.put_u8(self.priority_time_tick);
        buf.put_u8(self.timeout_ticks);
        buf.put_u16_le(self.connection_serial);
        buf.put_u16_le(self.vendor_id);
        buf.put_u32_le(self.originator_serial);
        buf.put_u8((self.path.len() / 2) as u8);
        buf.put_u8(0); // reserved
        buf.put_slice(&self.path);
        buf
    }

    pub fn decode(data: &[u8]) -> Result<Self, CipError> {
        let mut r = Reader::new(data);
        let priority_time_tick = r.u8()?;
        let timeout_ticks = r.u8()?;
        let connection_serial = r.u16()?;
        let vendor_id = r.u16()?;
        let originator_serial = r.u32()?;
        let path_words = r.u8()? as usize;
        r.u8()?; // reserved
        let path = r.take(path_words * 2)?.to_vec();
        Ok(Self {
            priority_time_tick,
            timeout_ticks,
            connection_serial,
            vendor_id,
            originator_serial,
            path,
        })
    }
}

/// Forward_Close success reply body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ForwardCloseResponse {
    pub connection_serial: u16,
    pub vendor_id: u16,
    pub originator_serial: u32,
}

impl ForwardCloseResponse {
    pub fn encode(&self) -> Vec<u8> {
        let mut buf = BytesMut::with_capacity(10);
        buf.put_u16_le(self.connection_serial);
        buf.put_u16_le(self.vendor_id);
        buf.put_u32_le(self.originator_serial);
        buf.put_u8(0); // application reply size
        buf.put_u8(0); // reserved
        buf.to_vec()
    }

    pub fn decode(data: &[u8]) -> Result<Self, CipError> {
        let mut r = Reader::new(data);
        let resp = Self {
            connection_serial: r.u16()?,
            vendor_id: r.u16()?,
            originator_serial: r.u32()?,
        };
        r.u8()?;
        r.u8()?;
        Ok(resp)
    }
}

/// The originator's identifying triad for an open connection.
type Triad = (u16, u16, u32);

struct OpenConnection {
    consumer_id: u32,
    producer_id: u32,
}

/// Connection Manager: owns the open-connection table and installs runtime
/// entries on behalf of originators.
pub struct ConnectionManager {
    runtime: Arc<IoRuntime>,
    assemblies: Arc<AssemblyObject>,
    open: Mutex<HashMap<Triad, OpenConnection>>,
    next_to_id: AtomicU32,
}

impl ConnectionManager {
    pub fn new(runtime: Arc<IoRuntime>, assemblies: Arc<AssemblyObject>) -> Self {
        Self {
            runtime,
            assemblies,
            open: Mutex::new(HashMap::new()),
            next_to_id: AtomicU32::new(FIRST_TO_CONNECTION_ID),
        }
    }

    /// Resolves the application path into (O->T, T->O) connection points.
    ///
    /// Both `0x24` instance segments and `0x2C` connection-point segments
    /// are accepted after the assembly class segment; a three-point path
    /// leads with the configuration instance.
    fn resolve_points(&self, path: &[u8]) -> Result<(u32, u32), CipError> {
        let segments = parse_segments(path)
            .map_err(|_| connection_failure(ext_status::INVALID_SEGMENT_IN_PATH))?;
        let mut iter = segments.into_iter();

        match iter.next() {
            Some(PathSegment::Class(id)) if id == class::ASSEMBLY => {}
            _ => return Err(connection_failure(ext_status::INVALID_SEGMENT_IN_PATH)),
        }

        let mut points = Vec::new();
        for segment in iter {
            match segment {
                PathSegment::Instance(id) | PathSegment::ConnectionPoint(id) => points.push(id),
                _ => return Err(connection_failure(ext_status::INVALID_SEGMENT_IN_PATH)),
            }
        }

        match points.len() {
            2 => Ok((points[0], points[1])),
            3 => Ok((points[1], points[2])),
            _ => Err(connection_failure(ext_status::INVALID_SEGMENT_IN_PATH)),
        }
    }

    fn handle_forward_open(&self, data: &[u8], large: bool) -> Result<Vec<u8>, CipError> {
        let req = ForwardOpenRequest::decode(data, large)?;
        let triad = (req.connection_serial, req.vendor_id, req.originator_serial);

        let (ot_point, to_point) = self.resolve_points(&req.path)?;
        let ot_assembly = self
            .assemblies
            .instance(ot_point)
            .ok_or_else(|| connection_failure(ext_status::INVALID_SEGMENT_IN_PATH))?;
        let to_assembly = self
            .assemblies
            .instance(to_point)
            .ok_or_else(|| connection_failure(ext_status::INVALID_SEGMENT_IN_PATH))?;

        let mut open = self.open.lock();
        if open.contains_key(&triad) {
            return Err(connection_failure(ext_status::CONNECTION_IN_USE));
        }

        let to_id = self.next_to_id.fetch_add(1, Ordering::Relaxed);
        let run_idle = req.transport_class() == 1;

        // O->T: we consume what the originator produces, keyed by the id the
        // originator stamps on its frames.
        self.runtime.add_connection(
            IoConnection::new(req.ot_connection_id, Duration::from_micros(req.ot_rpi as u64))
                .consuming()
                .with_assembly(ot_assembly)
                .with_run_idle_header(run_idle)
                .with_timeout_mult(req.timeout_mult),
        );
        // T->O: we produce under the freshly allocated id.
        self.runtime.add_connection(
            IoConnection::new(to_id, Duration::from_micros(req.to_rpi as u64))
                .producing()
                .with_assembly(to_assembly)
                .with_run_idle_header(run_idle)
                .with_timeout_mult(req.timeout_mult),
        );

        open.insert(
            triad,
            OpenConnection {
                consumer_id: req.ot_connection_id,
                producer_id: to_id,
            },
        );

        tracing::info!(
            "Forward_Open: serial={:#06X} O->T {:#010X} (rpi={}us, point {}) T->O {:#010X} (rpi={}us, point {})",
            req.connection_serial,
            req.ot_connection_id,
            req.ot_rpi,
            ot_point,
            to_id,
            req.to_rpi,
            to_point
        );

        Ok(ForwardOpenResponse {
            ot_connection_id: req.ot_connection_id,
            to_connection_id: to_id,
            connection_serial: req.connection_serial,
            vendor_id: req.vendor_id,
            originator_serial: req.originator_serial,
            ot_api: req.ot_rpi,
            to_api: req.to_rpi,
        }
        .encode())
    }

    fn handle_forward_close(&self, data: &[u8]) -> Result<Vec<u8>, CipError> {
        let req = ForwardCloseRequest::decode(data)?;
        let triad = (req.connection_serial, req.vendor_id, req.originator_serial);

        // An unknown triad is already closed; that is still a success.
        if let Some(entry) = self.open.lock().remove(&triad) {
            self.runtime.remove_connection(entry.consumer_id);
            self.runtime.remove_connection(entry.producer_id);
            tracing::info!(
                "Forward_Close: serial={:#06X} retired O->T {:#010X} T->O {:#010X}",
                req.connection_serial,
                entry.consumer_id,
                entry.producer_id
            );
        }

        Ok(ForwardCloseResponse {
            connection_serial: req.connection_serial,
            vendor_id: req.vendor_id,
            originator_serial: req.originator_serial,
        }
        .encode())
    }
}

impl CipObject for ConnectionManager {
    fn handle(&self, svc: u8, _path: &[u8], data: &[u8]) -> Result<Vec<u8>, CipError> {
        match svc {
            service::FORWARD_OPEN => self.handle_forward_open(data, false),
            service::LARGE_FORWARD_OPEN => self.handle_forward_open(data, true),
            service::FORWARD_CLOSE => self.handle_forward_close(data),
            _ => Err(CipError::service_not_supported()),
        }
    }
}
