//! Transactions: wire codec, sighash computation and P2PKH validation

use std::collections::HashMap;
use std::io::{self, Read};

use num_bigint::BigUint;
use serde::{Deserialize, Serialize};

use crate::constants::SIGHASH_ALL;
use crate::ecdsa;
use crate::error::{CoreError, Result};
use crate::hashes::hash256;
use crate::keys::PrivateKey;
use crate::script::Script;

// ---------------------------------------------------------------------------
// wire primitives shared with the script and network codecs

pub fn read_bytes<R: Read>(reader: &mut R, n: usize) -> Result<Vec<u8>> {
    let mut buf = vec![0u8; n];
    reader.read_exact(&mut buf)?;
    Ok(buf)
}

pub(crate) fn read_u32_le<R: Read>(reader: &mut R) -> Result<u32> {
    let mut buf = [0u8; 4];
    reader.read_exact(&mut buf)?;
    Ok(u32::from_le_bytes(buf))
}

pub(crate) fn read_u64_le<R: Read>(reader: &mut R) -> Result<u64> {
    let mut buf = [0u8; 8];
    reader.read_exact(&mut buf)?;
    Ok(u64::from_le_bytes(buf))
}

/// Read Bitcoin's variable-length integer.
pub fn read_varint<R: Read>(reader: &mut R) -> Result<u64> {
    let prefix = read_bytes(reader, 1)?[0];
    Ok(match prefix {
        0xfd => {
            let buf = read_bytes(reader, 2)?;
            u16::from_le_bytes([buf[0], buf[1]]) as u64
        }
        0xfe => read_u32_le(reader)? as u64,
        0xff => read_u64_le(reader)?,
        small => small as u64,
    })
}

/// Encode Bitcoin's variable-length integer.
pub fn encode_varint(n: u64) -> Vec<u8> {
    if n < 0xfd {
        vec![n as u8]
    } else if n <= 0xffff {
        let mut out = vec![0xfd];
        out.extend_from_slice(&(n as u16).to_le_bytes());
        out
    } else if n <= 0xffff_ffff {
        let mut out = vec![0xfe];
        out.extend_from_slice(&(n as u32).to_le_bytes());
        out
    } else {
        let mut out = vec![0xff];
        out.extend_from_slice(&n.to_le_bytes());
        out
    }
}

// ---------------------------------------------------------------------------
// the transaction model

/// A transaction input. `prev_tx` is held in displayed (big-endian) order
/// and reversed on the wire.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TxIn {
    pub prev_tx: [u8; 32],
    pub prev_index: u32,
    pub script_sig: Script,
    pub sequence: u32,
    pub witness: Option<Vec<Vec<u8>>>,
}

impl TxIn {
    pub fn new(prev_tx: [u8; 32], prev_index: u32) -> Self {
        Self {
            prev_tx,
            prev_index,
            script_sig: Script::default(),
            sequence: 0xffff_ffff,
            witness: None,
        }
    }

    pub fn parse<R: Read>(reader: &mut R) -> Result<Self> {
        let mut prev_tx = [0u8; 32];
        let bytes = read_bytes(reader, 32)?;
        for (dst, src) in prev_tx.iter_mut().zip(bytes.iter().rev()) {
            *dst = *src;
        }
        let prev_index = read_u32_le(reader)?;
        let script_sig = Script::parse(reader)?;
        let sequence = read_u32_le(reader)?;
        Ok(Self {
            prev_tx,
            prev_index,
            script_sig,
            sequence,
            witness: None,
        })
    }

    pub fn serialize(&self) -> Vec<u8> {
        let mut out = Vec::new();
        out.extend(self.prev_tx.iter().rev());
        out.extend_from_slice(&self.prev_index.to_le_bytes());
        out.extend_from_slice(&self.script_sig.serialize());
        out.extend_from_slice(&self.sequence.to_le_bytes());
        out
    }

    /// The referenced txid as displayed hex, the form prev-tx fetchers key on.
    pub fn prev_tx_id(&self) -> String {
        hex::encode(self.prev_tx)
    }
}

/// A transaction output: an amount in satoshis and its locking script.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TxOut {
    pub amount: i64,
    pub script_pubkey: Script,
}

impl TxOut {
    pub fn new(amount: i64, script_pubkey: Script) -> Self {
        Self {
            amount,
            script_pubkey,
        }
    }

    pub fn parse<R: Read>(reader: &mut R) -> Result<Self> {
        let amount = read_u64_le(reader)? as i64;
        let script_pubkey = Script::parse(reader)?;
        Ok(Self {
            amount,
            script_pubkey,
        })
    }

    pub fn serialize(&self) -> Vec<u8> {
        let mut out = Vec::new();
        out.extend_from_slice(&(self.amount as u64).to_le_bytes());
        out.extend_from_slice(&self.script_pubkey.serialize());
        out
    }
}

/// A transaction. The `segwit` flag records whether the wire form carried
/// the marker/flag bytes and witness data.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tx {
    pub version: u32,
    pub tx_ins: Vec<TxIn>,
    pub tx_outs: Vec<TxOut>,
    pub locktime: u32,
    pub segwit: bool,
}

impl Tx {
    pub fn new(version: u32, tx_ins: Vec<TxIn>, tx_outs: Vec<TxOut>, locktime: u32) -> Self {
        Self {
            version,
            tx_ins,
            tx_outs,
            locktime,
            segwit: false,
        }
    }

    /// Parse a transaction, detecting the SegWit marker.
    pub fn parse<R: Read>(reader: &mut R) -> Result<Self> {
        let version = read_u32_le(reader)?;

        // a zero input count is the segwit marker; the real count follows
        // the 0x01 flag byte
        let mut segwit = false;
        let mut num_inputs = read_varint(reader)?;
        if num_inputs == 0 {
            let flag = read_bytes(reader, 1)?[0];
            if flag != 0x01 {
                return Err(CoreError::Parse(format!(
                    "bad segwit flag byte {:#04x}",
                    flag
                )));
            }
            segwit = true;
            num_inputs = read_varint(reader)?;
        }

        let mut tx_ins = Vec::with_capacity(num_inputs as usize);
        for _ in 0..num_inputs {
            tx_ins.push(TxIn::parse(reader)?);
        }

        let num_outputs = read_varint(reader)?;
        let mut tx_outs = Vec::with_capacity(num_outputs as usize);
        for _ in 0..num_outputs {
            tx_outs.push(TxOut::parse(reader)?);
        }

        if segwit {
            for tx_in in &mut tx_ins {
                let num_items = read_varint(reader)?;
                let mut items = Vec::with_capacity(num_items as usize);
                for _ in 0..num_items {
                    let item_len = read_varint(reader)? as usize;
                    items.push(read_bytes(reader, item_len)?);
                }
                tx_in.witness = Some(items);
            }
        }

        let locktime = read_u32_le(reader)?;
        Ok(Self {
            version,
            tx_ins,
            tx_outs,
            locktime,
            segwit,
        })
    }

    /// Full wire serialization, marker/flag/witness included for SegWit.
    pub fn serialize(&self) -> Vec<u8> {
        let mut out = Vec::new();
        out.extend_from_slice(&self.version.to_le_bytes());
        if self.segwit {
            out.push(0x00);
            out.push(0x01);
        }
        out.extend_from_slice(&encode_varint(self.tx_ins.len() as u64));
        for tx_in in &self.tx_ins {
            out.extend_from_slice(&tx_in.serialize());
        }
        out.extend_from_slice(&encode_varint(self.tx_outs.len() as u64));
        for tx_out in &self.tx_outs {
            out.extend_from_slice(&tx_out.serialize());
        }
        if self.segwit {
            for tx_in in &self.tx_ins {
                let empty = Vec::new();
                let items = tx_in.witness.as_ref().unwrap_or(&empty);
                out.extend_from_slice(&encode_varint(items.len() as u64));
                for item in items {
                    out.extend_from_slice(&encode_varint(item.len() as u64));
                    out.extend_from_slice(item);
                }
            }
        }
        out.extend_from_slice(&self.locktime.to_le_bytes());
        out
    }

    /// Serialization without marker, flag or witnesses. The txid and the
    /// legacy sighash are computed over this form.
    pub fn serialize_legacy(&self) -> Vec<u8> {
        let mut out = Vec::new();
        out.extend_from_slice(&self.version.to_le_bytes());
        out.extend_from_slice(&encode_varint(self.tx_ins.len() as u64));
        for tx_in in &self.tx_ins {
            out.extend_from_slice(&tx_in.serialize());
        }
        out.extend_from_slice(&encode_varint(self.tx_outs.len() as u64));
        for tx_out in &self.tx_outs {
            out.extend_from_slice(&tx_out.serialize());
        }
        out.extend_from_slice(&self.locktime.to_le_bytes());
        out
    }

    /// HASH256 of the legacy serialization, reversed into displayed order.
    pub fn hash(&self) -> [u8; 32] {
        let mut digest = hash256(&self.serialize_legacy());
        digest.reverse();
        digest
    }

    /// The txid as displayed hex.
    pub fn id(&self) -> String {
        hex::encode(self.hash())
    }

    /// A coinbase input spends the null outpoint.
    pub fn is_coinbase(&self) -> bool {
        self.tx_ins.len() == 1
            && self.tx_ins[0].prev_tx == [0u8; 32]
            && self.tx_ins[0].prev_index == 0xffff_ffff
    }

    /// The digest signed for `input_index` under SIGHASH_ALL, built by a
    /// serializing walk that substitutes `prev_script_pubkey` for the
    /// signed input and empties every other script_sig. The live
    /// transaction is never modified.
    pub fn sighash(&self, input_index: usize, prev_script_pubkey: &Script) -> Result<BigUint> {
        if input_index >= self.tx_ins.len() {
            return Err(CoreError::Invariant(format!(
                "sighash input index {} out of range",
                input_index
            )));
        }
        let mut out = Vec::new();
        out.extend_from_slice(&self.version.to_le_bytes());
        out.extend_from_slice(&encode_varint(self.tx_ins.len() as u64));
        for (i, tx_in) in self.tx_ins.iter().enumerate() {
            out.extend(tx_in.prev_tx.iter().rev());
            out.extend_from_slice(&tx_in.prev_index.to_le_bytes());
            if i == input_index {
                out.extend_from_slice(&prev_script_pubkey.serialize());
            } else {
                out.extend_from_slice(&Script::default().serialize());
            }
            out.extend_from_slice(&tx_in.sequence.to_le_bytes());
        }
        out.extend_from_slice(&encode_varint(self.tx_outs.len() as u64));
        for tx_out in &self.tx_outs {
            out.extend_from_slice(&tx_out.serialize());
        }
        out.extend_from_slice(&self.locktime.to_le_bytes());
        out.extend_from_slice(&SIGHASH_ALL.to_le_bytes());
        Ok(BigUint::from_bytes_be(&hash256(&out)))
    }

    fn prev_output(&self, input_index: usize, fetcher: &mut dyn TxFetcher) -> Result<TxOut> {
        let tx_in = &self.tx_ins[input_index];
        let prev_tx = fetcher.fetch(&tx_in.prev_tx_id())?;
        prev_tx
            .tx_outs
            .get(tx_in.prev_index as usize)
            .cloned()
            .ok_or_else(|| {
                CoreError::Parse(format!(
                    "input {} references missing output {}:{}",
                    input_index,
                    tx_in.prev_tx_id(),
                    tx_in.prev_index
                ))
            })
    }

    /// Input sum minus output sum, in satoshis.
    pub fn fee(&self, fetcher: &mut dyn TxFetcher) -> Result<i64> {
        let mut input_sum = 0i64;
        for i in 0..self.tx_ins.len() {
            input_sum += self.prev_output(i, fetcher)?.amount;
        }
        let output_sum: i64 = self.tx_outs.iter().map(|o| o.amount).sum();
        Ok(input_sum - output_sum)
    }

    /// Check one input's unlocking script against its funding output.
    pub fn validate_input(&self, input_index: usize, fetcher: &mut dyn TxFetcher) -> Result<bool> {
        let prev_out = self.prev_output(input_index, fetcher)?;
        let z = self.sighash(input_index, &prev_out.script_pubkey)?;
        let combined = self.tx_ins[input_index]
            .script_sig
            .concat(&prev_out.script_pubkey);
        Ok(combined.evaluate(&z))
    }

    /// Validate every P2PKH input against the outputs it spends and check
    /// the transaction does not create money. Funding transactions come
    /// from the injected fetcher.
    pub fn validate(&self, fetcher: &mut dyn TxFetcher) -> Result<bool> {
        if self.is_coinbase() {
            return Ok(true);
        }
        if self.fee(fetcher)? < 0 {
            return Ok(false);
        }
        for i in 0..self.tx_ins.len() {
            if !self.validate_input(i, fetcher)? {
                return Ok(false);
            }
        }
        Ok(true)
    }

    /// Sign `input_index` with `key` under SIGHASH_ALL, installing the
    /// standard P2PKH unlocking script.
    pub fn sign_input(
        &mut self,
        input_index: usize,
        key: &PrivateKey,
        prev_script_pubkey: &Script,
    ) -> Result<()> {
        let z = self.sighash(input_index, prev_script_pubkey)?;
        let mut signature = ecdsa::sign(key, &z).der();
        signature.push(SIGHASH_ALL as u8);
        let sec = key.public_key().sec(true);
        self.tx_ins[input_index].script_sig = Script::p2pkh_unlock(signature, sec);
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// the prev-tx fetcher seam

/// Source of funding transactions for [`Tx::fee`] and [`Tx::validate`].
/// Implementations may sit on a cache, an explorer or a peer connection.
pub trait TxFetcher {
    /// Return the transaction with the given displayed-hex txid.
    fn fetch(&mut self, txid: &str) -> Result<Tx>;
}

/// In-memory fetcher, keyed by txid.
#[derive(Debug, Default)]
pub struct MapFetcher {
    txs: HashMap<String, Tx>,
}

impl MapFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, tx: Tx) {
        self.txs.insert(tx.id(), tx);
    }
}

impl TxFetcher for MapFetcher {
    fn fetch(&mut self, txid: &str) -> Result<Tx> {
        self.txs.get(txid).cloned().ok_or_else(|| {
            io::Error::new(
                io::ErrorKind::NotFound,
                format!("transaction {} not in cache", txid),
            )
            .into()
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    use crate::hashes::hash160;

    // the much-studied mainnet transaction
    // 452c629d67e41baec3ac6f04fe744b4b9617f8f859c63b3002f8684e7a4fee03
    const TX_HEX: &str = "0100000001813f79011acb80925dfe69b3def355fe914bd1d96a3f5f71bf8303c6a989c7d1000000006b483045022100ed81ff192e75a3fd2304004dcadb746fa5e24c5031ccfcf21320b0277457c98f02207a986d955c6e0cb35d446a89d3f56100f4d7f67801c31967743a9c8e10615bed01210349fc4e631e3624a545de3f89f5d8684c7b8138bd94bdd531d2e213bf016b278afeffffff02a135ef01000000001976a914bc3b654dca7e56b04dca18f2566cdaf02e8d9ada88ac99c39800000000001976a9141c4bc762dd5423e332166702cb75f40df79fea1288ac19430600";

    fn parse_fixture() -> Tx {
        let raw = hex::decode(TX_HEX).unwrap();
        Tx::parse(&mut Cursor::new(&raw)).unwrap()
    }

    #[test]
    fn test_varint_round_trip() {
        for n in [0u64, 1, 0xfc, 0xfd, 0xffff, 0x10000, 0xffff_ffff, 0x1_0000_0000] {
            let encoded = encode_varint(n);
            let decoded = read_varint(&mut Cursor::new(&encoded)).unwrap();
            assert_eq!(decoded, n);
        }
        assert_eq!(encode_varint(0xfc).len(), 1);
        assert_eq!(encode_varint(0xfd).len(), 3);
        assert_eq!(encode_varint(0x10000).len(), 5);
        assert_eq!(encode_varint(0x1_0000_0000).len(), 9);
    }

    #[test]
    fn test_parse_legacy_transaction() {
        let tx = parse_fixture();
        assert_eq!(tx.version, 1);
        assert!(!tx.segwit);
        assert_eq!(tx.tx_ins.len(), 1);
        assert_eq!(
            tx.tx_ins[0].prev_tx_id(),
            "d1c789a9c60383bf715f3f6ad9d14b91fe55f3deb369fe5d9280cb1a01793f81"
        );
        assert_eq!(tx.tx_ins[0].prev_index, 0);
        assert_eq!(tx.tx_ins[0].sequence, 0xffff_fffe);
        assert_eq!(tx.tx_outs.len(), 2);
        assert_eq!(tx.tx_outs[0].amount, 32_454_049);
        assert_eq!(tx.tx_outs[1].amount, 10_011_545);
        assert_eq!(tx.locktime, 410_393);
    }

    #[test]
    fn test_serialize_round_trip() {
        let raw = hex::decode(TX_HEX).unwrap();
        let tx = Tx::parse(&mut Cursor::new(&raw)).unwrap();
        assert_eq!(tx.serialize(), raw);
        assert_eq!(tx.serialize_legacy(), raw);
    }

    #[test]
    fn test_id() {
        assert_eq!(
            parse_fixture().id(),
            "452c629d67e41baec3ac6f04fe744b4b9617f8f859c63b3002f8684e7a4fee03"
        );
    }

    #[test]
    fn test_parse_rejects_bad_segwit_flag() {
        // version, segwit marker, then a flag byte that is not 0x01
        let raw = [0x01u8, 0, 0, 0, 0x00, 0x02];
        assert!(Tx::parse(&mut Cursor::new(&raw[..])).is_err());
    }

    #[test]
    fn test_parse_rejects_truncation() {
        let raw = hex::decode(TX_HEX).unwrap();
        assert!(Tx::parse(&mut Cursor::new(&raw[..raw.len() - 3])).is_err());
    }

    #[test]
    fn test_segwit_round_trip() {
        let mut tx_in = TxIn::new([0x11; 32], 1);
        tx_in.witness = Some(vec![vec![], vec![0xaa, 0xbb], vec![0xcc; 72]]);
        let mut tx = Tx::new(
            2,
            vec![tx_in],
            vec![TxOut::new(5000, Script::p2pkh(&hash160(b"payee")))],
            0,
        );
        tx.segwit = true;

        let raw = tx.serialize();
        assert_eq!(&raw[4..6], &[0x00, 0x01]);
        let parsed = Tx::parse(&mut Cursor::new(&raw)).unwrap();
        assert_eq!(parsed, tx);
        // the id ignores witness bytes
        assert_eq!(parsed.id(), tx.id());
    }

    #[test]
    fn test_txid_excludes_witness() {
        let mut tx_in = TxIn::new([0x11; 32], 1);
        tx_in.witness = Some(vec![vec![0xaa]]);
        let mut segwit_tx = Tx::new(
            2,
            vec![tx_in.clone()],
            vec![TxOut::new(5000, Script::default())],
            0,
        );
        segwit_tx.segwit = true;

        tx_in.witness = None;
        let legacy_tx = Tx::new(2, vec![tx_in], vec![TxOut::new(5000, Script::default())], 0);
        assert_eq!(segwit_tx.id(), legacy_tx.id());
    }

    #[test]
    fn test_is_coinbase() {
        let coinbase = Tx::new(
            1,
            vec![TxIn::new([0u8; 32], 0xffff_ffff)],
            vec![TxOut::new(50_0000_0000, Script::default())],
            0,
        );
        assert!(coinbase.is_coinbase());
        assert!(!parse_fixture().is_coinbase());
    }

    #[test]
    fn test_sighash_index_out_of_range() {
        let tx = parse_fixture();
        assert!(tx.sighash(1, &Script::default()).is_err());
    }
}
