//! Bitcoin Script: byte codec and a stack machine for the P2PKH subset

use std::fmt;
use std::io::Read;

use num_bigint::BigUint;
use serde::{Deserialize, Serialize};

use crate::ecdsa;
use crate::error::{CoreError, Result};
use crate::hashes::hash160;
use crate::keys::PublicKey;
use crate::transaction::{encode_varint, read_bytes, read_varint};

pub const OP_0: u8 = 0x00;
pub const OP_PUSHDATA1: u8 = 0x4c;
pub const OP_PUSHDATA2: u8 = 0x4d;
pub const OP_PUSHDATA4: u8 = 0x4e;
pub const OP_1: u8 = 0x51;
pub const OP_16: u8 = 0x60;
pub const OP_DUP: u8 = 0x76;
pub const OP_EQUALVERIFY: u8 = 0x88;
pub const OP_HASH160: u8 = 0xa9;
pub const OP_CHECKSIG: u8 = 0xac;

/// One script command: an opcode, or raw bytes to push on the stack.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Cmd {
    Op(u8),
    Push(Vec<u8>),
}

/// An ordered list of commands.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Script {
    pub cmds: Vec<Cmd>,
}

impl Script {
    pub fn new(cmds: Vec<Cmd>) -> Self {
        Self { cmds }
    }

    /// The standard P2PKH locking script:
    /// `OP_DUP OP_HASH160 <h160> OP_EQUALVERIFY OP_CHECKSIG`.
    pub fn p2pkh(h160: &[u8; 20]) -> Self {
        Self::new(vec![
            Cmd::Op(OP_DUP),
            Cmd::Op(OP_HASH160),
            Cmd::Push(h160.to_vec()),
            Cmd::Op(OP_EQUALVERIFY),
            Cmd::Op(OP_CHECKSIG),
        ])
    }

    /// The standard P2PKH unlocking script: `<signature> <pubkey sec>`.
    pub fn p2pkh_unlock(signature: Vec<u8>, sec: Vec<u8>) -> Self {
        Self::new(vec![Cmd::Push(signature), Cmd::Push(sec)])
    }

    /// Read a script preceded by its varint body length.
    pub fn parse<R: Read>(reader: &mut R) -> Result<Self> {
        let length = read_varint(reader)?;
        let mut cmds = Vec::new();
        let mut count = 0u64;
        while count < length {
            let current = read_bytes(reader, 1)?[0];
            count += 1;
            match current {
                // direct pushes of 1..=75 bytes
                1..=75 => {
                    cmds.push(Cmd::Push(read_bytes(reader, current as usize)?));
                    count += current as u64;
                }
                OP_PUSHDATA1 => {
                    let data_len = read_bytes(reader, 1)?[0] as usize;
                    cmds.push(Cmd::Push(read_bytes(reader, data_len)?));
                    count += 1 + data_len as u64;
                }
                OP_PUSHDATA2 => {
                    let len_bytes = read_bytes(reader, 2)?;
                    let data_len = u16::from_le_bytes([len_bytes[0], len_bytes[1]]) as usize;
                    cmds.push(Cmd::Push(read_bytes(reader, data_len)?));
                    count += 2 + data_len as u64;
                }
                OP_PUSHDATA4 => {
                    let len_bytes = read_bytes(reader, 4)?;
                    let data_len =
                        u32::from_le_bytes([len_bytes[0], len_bytes[1], len_bytes[2], len_bytes[3]])
                            as usize;
                    cmds.push(Cmd::Push(read_bytes(reader, data_len)?));
                    count += 4 + data_len as u64;
                }
                op => cmds.push(Cmd::Op(op)),
            }
        }
        if count != length {
            return Err(CoreError::Parse(format!(
                "script body ran past its declared length: {} > {}",
                count, length
            )));
        }
        Ok(Self { cmds })
    }

    fn raw_serialize(&self) -> Vec<u8> {
        let mut out = Vec::new();
        for cmd in &self.cmds {
            match cmd {
                Cmd::Op(op) => out.push(*op),
                Cmd::Push(data) => {
                    let len = data.len();
                    if len <= 75 {
                        out.push(len as u8);
                    } else if len < 0x100 {
                        out.push(OP_PUSHDATA1);
                        out.push(len as u8);
                    } else if len < 0x10000 {
                        out.push(OP_PUSHDATA2);
                        out.extend_from_slice(&(len as u16).to_le_bytes());
                    } else {
                        out.push(OP_PUSHDATA4);
                        out.extend_from_slice(&(len as u32).to_le_bytes());
                    }
                    out.extend_from_slice(data);
                }
            }
        }
        out
    }

    /// Serialize with the varint body-length prefix.
    pub fn serialize(&self) -> Vec<u8> {
        let body = self.raw_serialize();
        let mut out = encode_varint(body.len() as u64);
        out.extend_from_slice(&body);
        out
    }

    /// Concatenate unlocking and locking scripts into one command stream.
    pub fn concat(&self, other: &Script) -> Script {
        let mut cmds = self.cmds.clone();
        cmds.extend(other.cmds.iter().cloned());
        Script { cmds }
    }

    /// Run the command stream against a fresh stack. `z` is the sighash
    /// digest CHECKSIG verifies against. Any failure evaluates to false;
    /// malformed signatures or keys are not errors here.
    pub fn evaluate(&self, z: &BigUint) -> bool {
        let mut stack: Vec<Vec<u8>> = Vec::new();
        for cmd in &self.cmds {
            match cmd {
                Cmd::Push(data) => stack.push(data.clone()),
                Cmd::Op(op) => {
                    if !execute_op(*op, &mut stack, z) {
                        return false;
                    }
                }
            }
        }
        match stack.last() {
            Some(top) => is_truthy(top),
            None => false,
        }
    }
}

/// Empty strings and all-zero strings are false.
fn is_truthy(element: &[u8]) -> bool {
    element.iter().any(|&b| b != 0)
}

fn execute_op(op: u8, stack: &mut Vec<Vec<u8>>, z: &BigUint) -> bool {
    match op {
        OP_0 => {
            stack.push(vec![]);
            true
        }
        OP_1..=OP_16 => {
            stack.push(vec![op - OP_1 + 1]);
            true
        }
        OP_DUP => match stack.last().cloned() {
            Some(top) => {
                stack.push(top);
                true
            }
            None => false,
        },
        OP_HASH160 => match stack.pop() {
            Some(top) => {
                stack.push(hash160(&top).to_vec());
                true
            }
            None => false,
        },
        OP_EQUALVERIFY => {
            if stack.len() < 2 {
                return false;
            }
            let a = stack.pop().expect("checked length");
            let b = stack.pop().expect("checked length");
            a == b
        }
        OP_CHECKSIG => {
            if stack.len() < 2 {
                return false;
            }
            let sec = stack.pop().expect("checked length");
            let mut sig_bytes = stack.pop().expect("checked length");
            // the final byte is the sighash type; only SIGHASH_ALL here
            match sig_bytes.pop() {
                Some(0x01) => {}
                _ => return false,
            }
            let verified = match (PublicKey::from_sec(&sec), ecdsa::Signature::from_der(&sig_bytes))
            {
                (Ok(pubkey), Ok(sig)) => ecdsa::verify(&pubkey, z, &sig),
                _ => false,
            };
            stack.push(if verified { vec![1] } else { vec![0] });
            true
        }
        // anything outside the P2PKH set fails evaluation
        _ => false,
    }
}

fn op_name(op: u8) -> Option<&'static str> {
    Some(match op {
        0x00 => "OP_0",
        0x4c => "OP_PUSHDATA1",
        0x4d => "OP_PUSHDATA2",
        0x4e => "OP_PUSHDATA4",
        0x4f => "OP_1NEGATE",
        0x51 => "OP_1",
        0x52 => "OP_2",
        0x53 => "OP_3",
        0x54 => "OP_4",
        0x55 => "OP_5",
        0x56 => "OP_6",
        0x57 => "OP_7",
        0x58 => "OP_8",
        0x59 => "OP_9",
        0x5a => "OP_10",
        0x5b => "OP_11",
        0x5c => "OP_12",
        0x5d => "OP_13",
        0x5e => "OP_14",
        0x5f => "OP_15",
        0x60 => "OP_16",
        0x61 => "OP_NOP",
        0x69 => "OP_VERIFY",
        0x6a => "OP_RETURN",
        0x75 => "OP_DROP",
        0x76 => "OP_DUP",
        0x7c => "OP_SWAP",
        0x82 => "OP_SIZE",
        0x87 => "OP_EQUAL",
        0x88 => "OP_EQUALVERIFY",
        0x93 => "OP_ADD",
        0x94 => "OP_SUB",
        0xa6 => "OP_RIPEMD160",
        0xa8 => "OP_SHA256",
        0xa9 => "OP_HASH160",
        0xaa => "OP_HASH256",
        0xac => "OP_CHECKSIG",
        0xad => "OP_CHECKSIGVERIFY",
        0xae => "OP_CHECKMULTISIG",
        0xb1 => "OP_CHECKLOCKTIMEVERIFY",
        0xb2 => "OP_CHECKSEQUENCEVERIFY",
        _ => return None,
    })
}

impl fmt::Display for Script {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for cmd in &self.cmds {
            if !first {
                write!(f, " ")?;
            }
            first = false;
            match cmd {
                Cmd::Op(op) => match op_name(*op) {
                    Some(name) => write!(f, "{}", name)?,
                    None => write!(f, "OP_[{}]", op)?,
                },
                Cmd::Push(data) => write!(f, "{}", hex::encode(data))?,
            }
        }
        Ok(())
    }
}
