//! USB HID authenticators via hidapi
//!
//! [`HidEnumerator`] lists FIDO devices (usage page 0xF1D0, usage 0x01) and
//! [`HidChannel`] speaks CTAPHID to one of them on a freshly allocated channel.

use crate::ctaphid::{
    Assembler, Cmd, Message, Packet, BROADCAST_CID, CAPABILITY_CBOR, ERR_CHANNEL_BUSY,
    PACKET_SIZE,
};
use crate::error::{Result, TransportError};
use crate::{DeviceDescriptor, DeviceEnumerator, Transport};

use std::collections::HashSet;
use std::ffi::CString;
use std::time::{Duration, Instant};

use hidapi::{HidApi, HidDevice};
use rand::{rngs::OsRng, RngCore};

/// FIDO Alliance HID usage page
pub const FIDO_USAGE_PAGE: u16 = 0xF1D0;

/// CTAPHID usage within the FIDO usage page
pub const FIDO_USAGE: u16 = 0x01;

/// Longest single blocking read; keeps the deadline check responsive
const POLL_INTERVAL: Duration = Duration::from_millis(100);

fn hid_error(err: hidapi::HidError) -> TransportError {
    TransportError::Hid(err.to_string())
}

/// Enumerates FIDO HID devices
pub struct HidEnumerator {
    api: HidApi,
    timeout: Duration,
}

impl HidEnumerator {
    /// Initialise hidapi; `timeout` bounds each command on opened devices
    pub fn new(timeout: Duration) -> Result<Self> {
        let api = HidApi::new().map_err(hid_error)?;
        Ok(Self { api, timeout })
    }
}

impl DeviceEnumerator for HidEnumerator {
    type Device = HidChannel;

    fn list(&mut self) -> Result<Vec<DeviceDescriptor>> {
        self.api.refresh_devices().map_err(hid_error)?;

        let mut seen = HashSet::new();
        let mut devices = Vec::new();
        for info in self.api.device_list() {
            if info.usage_page() != FIDO_USAGE_PAGE || info.usage() != FIDO_USAGE {
                continue;
            }
            let id = info.path().to_string_lossy().into_owned();
            if !seen.insert(id.clone()) {
                continue;
            }
            devices.push(DeviceDescriptor {
                id,
                product: info.product_string().map(str::to_owned),
                manufacturer: info.manufacturer_string().map(str::to_owned),
                vendor_id: info.vendor_id(),
                product_id: info.product_id(),
            });
        }

        log::debug!("Found {} FIDO HID device(s)", devices.len());
        Ok(devices)
    }

    fn open(&mut self, descriptor: &DeviceDescriptor) -> Result<HidChannel> {
        let path = CString::new(descriptor.id.as_str())
            .map_err(|_| TransportError::NotFound(descriptor.id.clone()))?;
        let device = self.api.open_path(&path).map_err(hid_error)?;
        log::debug!("Opened {}", descriptor);
        HidChannel::connect(device, self.timeout)
    }
}

/// Details reported by the INIT response
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct InitInfo {
    protocol_version: u8,
    device_version: (u8, u8, u8),
    capabilities: u8,
}

/// A CTAPHID channel on one opened HID device
///
/// The device is closed when the channel is dropped.
pub struct HidChannel {
    device: HidDevice,
    cid: u32,
    timeout: Duration,
}

impl HidChannel {
    /// Allocate a channel with CTAPHID_INIT on the broadcast channel
    pub fn connect(device: HidDevice, timeout: Duration) -> Result<Self> {
        let mut nonce = [0u8; 8];
        OsRng.fill_bytes(&mut nonce);

        write_message(&device, &Message::new(BROADCAST_CID, Cmd::Init, nonce.to_vec()))?;

        let deadline = Instant::now() + timeout;
        let reply = loop {
            let message = read_message(&device, BROADCAST_CID, deadline)?;
            if message.cmd != Cmd::Init {
                return Err(TransportError::InvalidResponse(format!(
                    "expected INIT reply, got {:?}",
                    message.cmd
                )));
            }
            // Replies to other clients' INIT requests carry their nonce
            if message.data.len() >= 17 && message.data[..8] == nonce {
                break message.data;
            }
        };

        let cid = u32::from_be_bytes([reply[8], reply[9], reply[10], reply[11]]);
        let info = InitInfo {
            protocol_version: reply[12],
            device_version: (reply[13], reply[14], reply[15]),
            capabilities: reply[16],
        };
        log::debug!(
            "Allocated CTAPHID channel 0x{:08x} (protocol {}, device {:?}, capabilities 0x{:02x})",
            cid,
            info.protocol_version,
            info.device_version,
            info.capabilities
        );

        if info.capabilities & CAPABILITY_CBOR == 0 {
            return Err(TransportError::InvalidResponse(
                "device does not support CTAP2".into(),
            ));
        }

        Ok(Self {
            device,
            cid,
            timeout,
        })
    }
}

impl Transport for HidChannel {
    fn send_cbor(&mut self, command: u8, payload: &[u8]) -> Result<Vec<u8>> {
        let mut data = Vec::with_capacity(payload.len() + 1);
        data.push(command);
        data.extend_from_slice(payload);

        log::debug!(
            "CTAPHID_CBOR command 0x{:02x} with {} byte payload",
            command,
            payload.len()
        );
        write_message(&self.device, &Message::new(self.cid, Cmd::Cbor, data))?;

        let deadline = Instant::now() + self.timeout;
        loop {
            let message = read_message(&self.device, self.cid, deadline)?;
            match message.cmd {
                Cmd::Cbor => {
                    log::debug!("CTAPHID_CBOR response of {} bytes", message.data.len());
                    return Ok(message.data);
                }
                Cmd::Keepalive => {
                    log::debug!("Keepalive status {:?}", message.data.first());
                }
                Cmd::Error => {
                    let code = message.data.first().copied().unwrap_or(0);
                    return Err(if code == ERR_CHANNEL_BUSY {
                        TransportError::ChannelBusy
                    } else {
                        TransportError::Device(code)
                    });
                }
                other => {
                    return Err(TransportError::InvalidResponse(format!(
                        "unexpected CTAPHID command {:?}",
                        other
                    )));
                }
            }
        }
    }
}

fn write_message(device: &HidDevice, message: &Message) -> Result<()> {
    for packet in message.to_packets()? {
        // Leading report ID byte; FIDO devices use report 0
        let mut report = [0u8; PACKET_SIZE + 1];
        report[1..].copy_from_slice(packet.as_bytes());
        device.write(&report).map_err(hid_error)?;
    }
    Ok(())
}

/// Read one complete message on `cid`, skipping traffic for other channels
fn read_message(device: &HidDevice, cid: u32, deadline: Instant) -> Result<Message> {
    let mut assembler = Assembler::default();
    loop {
        let remaining = deadline.saturating_duration_since(Instant::now());
        if remaining.is_zero() {
            return Err(TransportError::Timeout);
        }

        let Some(packet) = read_packet(device, remaining.min(POLL_INTERVAL))? else {
            continue;
        };
        if packet.cid() != cid {
            continue;
        }
        if let Some(message) = assembler.push(&packet)? {
            return Ok(message);
        }
    }
}

fn read_packet(device: &HidDevice, timeout: Duration) -> Result<Option<Packet>> {
    let mut buf = [0u8; PACKET_SIZE + 1];
    let millis = i32::try_from(timeout.as_millis()).unwrap_or(i32::MAX);
    let len = device.read_timeout(&mut buf, millis).map_err(hid_error)?;

    let mut bytes = [0u8; PACKET_SIZE];
    match len {
        0 => Ok(None),
        PACKET_SIZE => {
            bytes.copy_from_slice(&buf[..PACKET_SIZE]);
            Ok(Some(Packet::from_bytes(bytes)))
        }
        n if n == PACKET_SIZE + 1 => {
            bytes.copy_from_slice(&buf[1..]);
            Ok(Some(Packet::from_bytes(bytes)))
        }
        n => Err(TransportError::InvalidResponse(format!(
            "unexpected HID report length {}",
            n
        ))),
    }
}
