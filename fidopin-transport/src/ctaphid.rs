//! CTAPHID message framing
//!
//! Messages travel as 64-byte HID reports. The first packet of a message
//! (initialization packet) carries the channel, the command and the total
//! payload length; continuation packets carry the channel and a sequence
//! number.
//!
//! ```text
//! init: CID(4) | 0x80|CMD(1) | BCNTH(1) | BCNTL(1) | DATA(57)
//! cont: CID(4) | SEQ(1)                             | DATA(59)
//! ```
//!
//! Spec: <https://fidoalliance.org/specs/fido-v2.1-ps-20210615/fido-client-to-authenticator-protocol-v2.1-ps-20210615.html#usb-message-and-packet-structure>

use crate::error::{Result, TransportError};

/// HID report size
pub const PACKET_SIZE: usize = 64;

/// Payload bytes in an initialization packet
pub const INIT_DATA_SIZE: usize = PACKET_SIZE - 7;

/// Payload bytes in a continuation packet
pub const CONT_DATA_SIZE: usize = PACKET_SIZE - 5;

/// Largest message that fits in one init and 128 continuation packets
pub const MAX_MESSAGE_SIZE: usize = INIT_DATA_SIZE + 128 * CONT_DATA_SIZE;

/// Channel used before a channel has been allocated
pub const BROADCAST_CID: u32 = 0xFFFF_FFFF;

/// INIT response capability flag: the device implements CTAPHID_CBOR
pub const CAPABILITY_CBOR: u8 = 0x04;

/// CTAPHID_ERROR code for a busy channel
pub const ERR_CHANNEL_BUSY: u8 = 0x06;

/// CTAPHID commands
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Cmd {
    /// Transaction that echoes the data back.
    Ping = 0x01,
    /// Encapsulated CTAP1/U2F message.
    Msg = 0x03,
    /// Place an exclusive lock for one channel
    Lock = 0x04,
    /// Allocate a new CID or synchronize channel.
    Init = 0x06,
    /// Request authenticator to provide some visual or audible identification
    Wink = 0x08,
    /// Encapsulated CTAP CBOR encoded message.
    Cbor = 0x10,
    /// Cancel any outstanding requests on the given CID.
    Cancel = 0x11,
    /// The request is still being processed
    Keepalive = 0x3b,
    /// Error response message
    Error = 0x3f,
}

impl Cmd {
    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            0x01 => Some(Cmd::Ping),
            0x03 => Some(Cmd::Msg),
            0x04 => Some(Cmd::Lock),
            0x06 => Some(Cmd::Init),
            0x08 => Some(Cmd::Wink),
            0x10 => Some(Cmd::Cbor),
            0x11 => Some(Cmd::Cancel),
            0x3b => Some(Cmd::Keepalive),
            0x3f => Some(Cmd::Error),
            _ => None,
        }
    }
}

impl From<Cmd> for u8 {
    fn from(cmd: Cmd) -> Self {
        cmd as u8
    }
}

/// One 64-byte CTAPHID packet
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Packet([u8; PACKET_SIZE]);

impl Packet {
    pub fn from_bytes(bytes: [u8; PACKET_SIZE]) -> Self {
        Self(bytes)
    }

    /// Build an initialization packet; `data` is truncated to fit
    pub fn init(cid: u32, cmd: Cmd, total_len: u16, data: &[u8]) -> Self {
        let mut bytes = [0u8; PACKET_SIZE];
        bytes[..4].copy_from_slice(&cid.to_be_bytes());
        bytes[4] = 0x80 | u8::from(cmd);
        bytes[5..7].copy_from_slice(&total_len.to_be_bytes());
        let n = data.len().min(INIT_DATA_SIZE);
        bytes[7..7 + n].copy_from_slice(&data[..n]);
        Self(bytes)
    }

    /// Build a continuation packet; `data` is truncated to fit
    pub fn cont(cid: u32, seq: u8, data: &[u8]) -> Self {
        let mut bytes = [0u8; PACKET_SIZE];
        bytes[..4].copy_from_slice(&cid.to_be_bytes());
        bytes[4] = seq & 0x7F;
        let n = data.len().min(CONT_DATA_SIZE);
        bytes[5..5 + n].copy_from_slice(&data[..n]);
        Self(bytes)
    }

    pub fn cid(&self) -> u32 {
        u32::from_be_bytes([self.0[0], self.0[1], self.0[2], self.0[3]])
    }

    pub fn is_init(&self) -> bool {
        self.0[4] & 0x80 != 0
    }

    /// Command of an initialization packet
    ///
    /// `None` for continuation packets and unknown commands.
    pub fn cmd(&self) -> Option<Cmd> {
        if self.is_init() {
            Cmd::from_u8(self.0[4] & 0x7F)
        } else {
            None
        }
    }

    /// Sequence number of a continuation packet
    pub fn seq(&self) -> Option<u8> {
        if self.is_init() {
            None
        } else {
            Some(self.0[4])
        }
    }

    /// Total message length announced by an initialization packet
    pub fn payload_len(&self) -> Option<u16> {
        if self.is_init() {
            Some(u16::from_be_bytes([self.0[5], self.0[6]]))
        } else {
            None
        }
    }

    /// Payload area of the packet, including any zero fill
    pub fn payload(&self) -> &[u8] {
        if self.is_init() {
            &self.0[7..]
        } else {
            &self.0[5..]
        }
    }

    pub fn as_bytes(&self) -> &[u8; PACKET_SIZE] {
        &self.0
    }
}

/// A complete CTAPHID message
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    pub cid: u32,
    pub cmd: Cmd,
    pub data: Vec<u8>,
}

impl Message {
    pub fn new(cid: u32, cmd: Cmd, data: Vec<u8>) -> Self {
        Self { cid, cmd, data }
    }

    /// Fragment into one init packet and as many continuation packets as needed
    pub fn to_packets(&self) -> Result<Vec<Packet>> {
        if self.data.len() > MAX_MESSAGE_SIZE {
            return Err(TransportError::InvalidResponse(format!(
                "message of {} bytes exceeds the CTAPHID limit",
                self.data.len()
            )));
        }
        // MAX_MESSAGE_SIZE fits in u16
        let total = self.data.len() as u16;

        let first = self.data.len().min(INIT_DATA_SIZE);
        let mut packets = vec![Packet::init(self.cid, self.cmd, total, &self.data[..first])];
        for (seq, chunk) in self.data[first..].chunks(CONT_DATA_SIZE).enumerate() {
            packets.push(Packet::cont(self.cid, seq as u8, chunk));
        }
        Ok(packets)
    }

    /// Reassemble from an init packet followed by its continuation packets
    pub fn from_packets(packets: &[Packet]) -> Result<Self> {
        let mut assembler = Assembler::default();
        for packet in packets {
            if let Some(message) = assembler.push(packet)? {
                return Ok(message);
            }
        }
        Err(TransportError::InvalidResponse(
            "incomplete CTAPHID message".into(),
        ))
    }
}

/// Incremental reassembly of one message on one channel
#[derive(Debug, Default)]
pub struct Assembler {
    pending: Option<Pending>,
}

#[derive(Debug)]
struct Pending {
    cid: u32,
    cmd: Cmd,
    total: usize,
    next_seq: u8,
    data: Vec<u8>,
}

impl Assembler {
    /// Feed one packet; returns the message once it is complete
    ///
    /// An init packet restarts reassembly. Continuation packets for another
    /// channel, or with no message in progress, are ignored.
    pub fn push(&mut self, packet: &Packet) -> Result<Option<Message>> {
        if packet.is_init() {
            let cmd = packet.cmd().ok_or_else(|| {
                TransportError::InvalidResponse(format!(
                    "unknown CTAPHID command 0x{:02x}",
                    packet.as_bytes()[4] & 0x7F
                ))
            })?;
            let total = usize::from(packet.payload_len().unwrap_or(0));
            if total > MAX_MESSAGE_SIZE {
                return Err(TransportError::InvalidResponse(format!(
                    "announced length {} exceeds the CTAPHID limit",
                    total
                )));
            }
            let take = total.min(INIT_DATA_SIZE);
            let mut data = Vec::with_capacity(total);
            data.extend_from_slice(&packet.payload()[..take]);
            self.pending = Some(Pending {
                cid: packet.cid(),
                cmd,
                total,
                next_seq: 0,
                data,
            });
        } else {
            let Some(pending) = self.pending.as_mut() else {
                return Ok(None);
            };
            if pending.cid != packet.cid() {
                return Ok(None);
            }
            let seq = packet.seq().unwrap_or(0);
            if seq != pending.next_seq {
                let expected = pending.next_seq;
                self.pending = None;
                return Err(TransportError::InvalidResponse(format!(
                    "unexpected continuation sequence {} (expected {})",
                    seq, expected
                )));
            }
            pending.next_seq = pending.next_seq.wrapping_add(1);
            let take = (pending.total - pending.data.len()).min(CONT_DATA_SIZE);
            pending.data.extend_from_slice(&packet.payload()[..take]);
        }

        match &self.pending {
            Some(pending) if pending.data.len() >= pending.total => {
                let done = self.pending.take().map(|p| Message {
                    cid: p.cid,
                    cmd: p.cmd,
                    data: p.data,
                });
                Ok(done)
            }
            _ => Ok(None),
        }
    }
}
