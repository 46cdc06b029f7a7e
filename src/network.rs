//! The peer-to-peer protocol: message framing, typed payloads and a
//! blocking single-connection node

use std::io::{Read, Write};
use std::net::TcpStream;
use std::time::{SystemTime, UNIX_EPOCH};

use log::{debug, info};

use crate::block::Block;
use crate::constants::{MAGIC_MAIN, MAGIC_TEST, PROTOCOL_VERSION};
use crate::entropy;
use crate::error::{CoreError, Result};
use crate::hashes::hash256;
use crate::transaction::{encode_varint, read_bytes, read_u32_le, read_varint};

pub const CMD_VERSION: &[u8] = b"version";
pub const CMD_VERACK: &[u8] = b"verack";
pub const CMD_PING: &[u8] = b"ping";
pub const CMD_PONG: &[u8] = b"pong";
pub const CMD_GETHEADERS: &[u8] = b"getheaders";
pub const CMD_HEADERS: &[u8] = b"headers";

/// Reference client nodes reject anything larger.
const MAX_PAYLOAD: u32 = 32 * 1024 * 1024;

/// One wire frame: magic, NUL-padded command, length, checksum, payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NetworkEnvelope {
    pub command: Vec<u8>,
    pub payload: Vec<u8>,
    magic: [u8; 4],
}

impl NetworkEnvelope {
    pub fn new(command: &[u8], payload: Vec<u8>, testnet: bool) -> Self {
        Self {
            command: command.to_vec(),
            payload,
            magic: if testnet { MAGIC_TEST } else { MAGIC_MAIN },
        }
    }

    pub fn is(&self, command: &[u8]) -> bool {
        self.command == command
    }

    pub fn parse<R: Read>(reader: &mut R, testnet: bool) -> Result<Self> {
        let expected_magic = if testnet { MAGIC_TEST } else { MAGIC_MAIN };
        let magic = read_bytes(reader, 4)?;
        if magic != expected_magic {
            return Err(CoreError::Protocol(format!(
                "magic mismatch: got {}, want {}",
                hex::encode(&magic),
                hex::encode(expected_magic)
            )));
        }
        let mut command = read_bytes(reader, 12)?;
        while command.last() == Some(&0) {
            command.pop();
        }
        let payload_len = read_u32_le(reader)?;
        if payload_len > MAX_PAYLOAD {
            return Err(CoreError::Protocol(format!(
                "payload length {} over limit",
                payload_len
            )));
        }
        let checksum = read_bytes(reader, 4)?;
        let payload = read_bytes(reader, payload_len as usize)?;
        if checksum != hash256(&payload)[..4] {
            return Err(CoreError::Protocol(format!(
                "payload checksum mismatch for command {}",
                String::from_utf8_lossy(&command)
            )));
        }
        Ok(Self {
            command,
            payload,
            magic: expected_magic,
        })
    }

    pub fn serialize(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(24 + self.payload.len());
        out.extend_from_slice(&self.magic);
        out.extend_from_slice(&self.command);
        out.resize(4 + 12, 0x00);
        out.extend_from_slice(&(self.payload.len() as u32).to_le_bytes());
        out.extend_from_slice(&hash256(&self.payload)[..4]);
        out.extend_from_slice(&self.payload);
        out
    }
}

/// A typed payload that knows its wire command.
pub trait NetworkMessage {
    fn command(&self) -> &'static [u8];
    fn serialize(&self) -> Vec<u8>;
}

/// The `version` handshake announcement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VersionMessage {
    pub version: u32,
    pub services: u64,
    pub timestamp: u64,
    pub receiver_services: u64,
    pub receiver_ip: [u8; 4],
    pub receiver_port: u16,
    pub sender_services: u64,
    pub sender_ip: [u8; 4],
    pub sender_port: u16,
    pub nonce: [u8; 8],
    pub user_agent: Vec<u8>,
    pub latest_block: u32,
    pub relay: bool,
}

impl Default for VersionMessage {
    fn default() -> Self {
        let timestamp = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or(0);
        let mut nonce = [0u8; 8];
        nonce.copy_from_slice(&entropy::rand_bytes(8));
        Self {
            version: PROTOCOL_VERSION,
            services: 0,
            timestamp,
            receiver_services: 0,
            receiver_ip: [0; 4],
            receiver_port: 8333,
            sender_services: 0,
            sender_ip: [0; 4],
            sender_port: 8333,
            nonce,
            user_agent: b"/satoshi-core:0.1/".to_vec(),
            latest_block: 0,
            relay: false,
        }
    }
}

fn put_net_addr(out: &mut Vec<u8>, services: u64, ip: &[u8; 4], port: u16) {
    out.extend_from_slice(&services.to_le_bytes());
    // IPv4 in the IPv6-mapped form
    out.extend_from_slice(&[0u8; 10]);
    out.extend_from_slice(&[0xff, 0xff]);
    out.extend_from_slice(ip);
    out.extend_from_slice(&port.to_be_bytes());
}

impl NetworkMessage for VersionMessage {
    fn command(&self) -> &'static [u8] {
        CMD_VERSION
    }

    fn serialize(&self) -> Vec<u8> {
        let mut out = Vec::new();
        out.extend_from_slice(&self.version.to_le_bytes());
        out.extend_from_slice(&self.services.to_le_bytes());
        out.extend_from_slice(&self.timestamp.to_le_bytes());
        put_net_addr(
            &mut out,
            self.receiver_services,
            &self.receiver_ip,
            self.receiver_port,
        );
        put_net_addr(
            &mut out,
            self.sender_services,
            &self.sender_ip,
            self.sender_port,
        );
        out.extend_from_slice(&self.nonce);
        out.extend_from_slice(&encode_varint(self.user_agent.len() as u64));
        out.extend_from_slice(&self.user_agent);
        out.extend_from_slice(&self.latest_block.to_le_bytes());
        out.push(if self.relay { 0x01 } else { 0x00 });
        out
    }
}

/// The empty `verack` acknowledgment.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VerAckMessage;

impl NetworkMessage for VerAckMessage {
    fn command(&self) -> &'static [u8] {
        CMD_VERACK
    }

    fn serialize(&self) -> Vec<u8> {
        Vec::new()
    }
}

/// Keepalive probe carrying an 8-byte nonce.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PingMessage {
    pub nonce: [u8; 8],
}

impl PingMessage {
    pub fn parse<R: Read>(reader: &mut R) -> Result<Self> {
        let mut nonce = [0u8; 8];
        nonce.copy_from_slice(&read_bytes(reader, 8)?);
        Ok(Self { nonce })
    }
}

impl NetworkMessage for PingMessage {
    fn command(&self) -> &'static [u8] {
        CMD_PING
    }

    fn serialize(&self) -> Vec<u8> {
        self.nonce.to_vec()
    }
}

/// Reply echoing a ping's nonce.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PongMessage {
    pub nonce: [u8; 8],
}

impl NetworkMessage for PongMessage {
    fn command(&self) -> &'static [u8] {
        CMD_PONG
    }

    fn serialize(&self) -> Vec<u8> {
        self.nonce.to_vec()
    }
}

/// Request for a batch of headers following `start_block`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GetHeadersMessage {
    pub version: u32,
    pub start_block: [u8; 32],
    pub end_block: [u8; 32],
}

impl GetHeadersMessage {
    /// Ask for everything after `start_block`, given in displayed order.
    pub fn new(start_block: [u8; 32]) -> Self {
        Self {
            version: PROTOCOL_VERSION,
            start_block,
            end_block: [0u8; 32],
        }
    }
}

impl NetworkMessage for GetHeadersMessage {
    fn command(&self) -> &'static [u8] {
        CMD_GETHEADERS
    }

    fn serialize(&self) -> Vec<u8> {
        let mut out = Vec::new();
        out.extend_from_slice(&self.version.to_le_bytes());
        // a single locator hash
        out.extend_from_slice(&encode_varint(1));
        out.extend(self.start_block.iter().rev());
        out.extend(self.end_block.iter().rev());
        out
    }
}

/// A batch of block headers, each followed by its zero tx count on the wire.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HeadersMessage {
    pub blocks: Vec<Block>,
}

impl HeadersMessage {
    pub fn parse<R: Read>(reader: &mut R) -> Result<Self> {
        let count = read_varint(reader)?;
        let mut blocks = Vec::with_capacity(count as usize);
        for _ in 0..count {
            blocks.push(Block::parse(reader)?);
            let num_txs = read_varint(reader)?;
            if num_txs != 0 {
                return Err(CoreError::Protocol(format!(
                    "headers entry carries {} transactions",
                    num_txs
                )));
            }
        }
        Ok(Self { blocks })
    }
}

/// A blocking node speaking to one peer over one stream. All reads and
/// writes happen on the caller's thread; dropping or closing the stream
/// cancels any in-flight read.
pub struct SimpleNode<S> {
    stream: S,
    testnet: bool,
}

impl SimpleNode<TcpStream> {
    /// Open a TCP connection to a peer.
    pub fn connect(host: &str, port: u16, testnet: bool) -> Result<Self> {
        info!("connecting to {}:{}", host, port);
        let stream = TcpStream::connect((host, port))?;
        Ok(Self { stream, testnet })
    }
}

impl<S: Read + Write> SimpleNode<S> {
    /// Wrap an already-open stream.
    pub fn new(stream: S, testnet: bool) -> Self {
        Self { stream, testnet }
    }

    pub fn send(&mut self, message: &dyn NetworkMessage) -> Result<()> {
        let envelope =
            NetworkEnvelope::new(message.command(), message.serialize(), self.testnet);
        debug!("sending {}", String::from_utf8_lossy(&envelope.command));
        self.stream.write_all(&envelope.serialize())?;
        self.stream.flush()?;
        Ok(())
    }

    pub fn read(&mut self) -> Result<NetworkEnvelope> {
        let envelope = NetworkEnvelope::parse(&mut self.stream, self.testnet)?;
        debug!(
            "received {} ({} bytes)",
            String::from_utf8_lossy(&envelope.command),
            envelope.payload.len()
        );
        Ok(envelope)
    }

    /// Read frames until one of the wanted commands arrives. Pings are
    /// answered transparently; any other command is a protocol error.
    pub fn wait_for(&mut self, commands: &[&[u8]]) -> Result<NetworkEnvelope> {
        loop {
            let envelope = self.read()?;
            if envelope.is(CMD_PING) {
                let ping = PingMessage::parse(&mut envelope.payload.as_slice())?;
                self.send(&PongMessage { nonce: ping.nonce })?;
                continue;
            }
            if commands.iter().any(|c| envelope.is(c)) {
                return Ok(envelope);
            }
            return Err(CoreError::Protocol(format!(
                "unexpected command {}",
                String::from_utf8_lossy(&envelope.command)
            )));
        }
    }

    /// The opening exchange: our version, their version, veracks both ways.
    pub fn handshake(&mut self) -> Result<()> {
        self.send(&VersionMessage::default())?;
        self.wait_for(&[CMD_VERSION])?;
        self.send(&VerAckMessage)?;
        self.wait_for(&[CMD_VERACK])?;
        info!("handshake complete");
        Ok(())
    }

    /// Request the headers following `start_block` (displayed order) and
    /// return the peer's batch, at most 2000 entries.
    pub fn get_headers(&mut self, start_block: [u8; 32]) -> Result<Vec<Block>> {
        self.send(&GetHeadersMessage::new(start_block))?;
        let envelope = self.wait_for(&[CMD_HEADERS])?;
        let headers = HeadersMessage::parse(&mut envelope.payload.as_slice())?;
        Ok(headers.blocks)
    }
}
