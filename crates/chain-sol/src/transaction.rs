//! Solana versioned (v0) transaction wire format.
//!
//! Transactions are compiled by hand, without `solana-sdk`. The custody
//! provider signs, so everything here produces *unsigned* transactions whose
//! signature slots are zero-filled placeholders:
//!
//! ```text
//! Transaction:
//!   num_signatures          compact-u16
//!   signatures              64 bytes * num_signatures (zeroed until signed)
//!   message (v0):
//!     version prefix        u8 (0x80 | 0)
//!     num_required_sigs     u8
//!     num_readonly_signed   u8
//!     num_readonly_unsigned u8
//!     num_accounts          compact-u16
//!     account_keys          32 bytes * num_accounts
//!     recent_blockhash      32 bytes
//!     num_instructions      compact-u16
//!     instructions[]        (see below)
//!     num_lookup_tables     compact-u16 (always 0 here)
//!
//! Instruction:
//!   program_id_index        u8
//!   num_accounts            compact-u16
//!   account_indices         u8 * num_accounts
//!   data_len                compact-u16
//!   data                    u8 * data_len
//! ```

use crate::error::SolError;

// ---------------------------------------------------------------------------
// Constants
// ---------------------------------------------------------------------------

/// The Solana System Program public key: 32 zero bytes.
/// Base58: `11111111111111111111111111111111`
pub const SYSTEM_PROGRAM_ID: [u8; 32] = [0u8; 32];

/// Length of an Ed25519 signature slot in the wire format.
pub const SIGNATURE_LEN: usize = 64;

/// System Program `Transfer` instruction index (little-endian u32).
const SYSTEM_TRANSFER_IX_INDEX: u32 = 2;

/// High bit marks a versioned message; the low bits carry the version.
const VERSION_PREFIX_MASK: u8 = 0x80;

/// The only message version this crate emits.
pub const MESSAGE_VERSION: u8 = 0;

// ---------------------------------------------------------------------------
// Compact-u16 encoding
// ---------------------------------------------------------------------------

/// Encode a `u16` value in Solana's compact-u16 format.
///
/// - Values 0..0x7f       -> 1 byte
/// - Values 0x80..0x3fff  -> 2 bytes
/// - Values 0x4000..      -> 3 bytes
pub fn encode_compact_u16(value: u16) -> Vec<u8> {
    let mut val = u32::from(value);
    let mut out = Vec::with_capacity(3);

    loop {
        let mut byte = (val & 0x7f) as u8;
        val >>= 7;
        if val > 0 {
            byte |= 0x80;
        }
        out.push(byte);
        if val == 0 {
            break;
        }
    }

    out
}

/// Decode a compact-u16 value from a byte slice.
///
/// Returns `(value, bytes_consumed)` or an error if the data is truncated.
pub fn decode_compact_u16(data: &[u8]) -> Result<(u16, usize), SolError> {
    let mut value: u32 = 0;
    let mut consumed = 0usize;

    loop {
        let byte = *data.get(consumed).ok_or_else(|| {
            SolError::SerializationError(
                "unexpected end of data while decoding compact-u16".into(),
            )
        })?;
        value |= u32::from(byte & 0x7f) << (7 * consumed);
        consumed += 1;

        if byte & 0x80 == 0 || consumed >= 3 {
            break;
        }
    }

    let value = u16::try_from(value)
        .map_err(|_| SolError::SerializationError("compact-u16 value overflow".into()))?;
    Ok((value, consumed))
}

fn compact_len(len: usize, what: &str) -> Result<Vec<u8>, SolError> {
    let len = u16::try_from(len)
        .map_err(|_| SolError::SerializationError(format!("too many {what}: {len}")))?;
    Ok(encode_compact_u16(len))
}

// ---------------------------------------------------------------------------
// Data structures
// ---------------------------------------------------------------------------

/// A single account reference in a Solana instruction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SolAccountMeta {
    pub pubkey: [u8; 32],
    pub is_signer: bool,
    pub is_writable: bool,
}

/// A Solana instruction (before it is compiled into a message).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SolInstruction {
    pub program_id: [u8; 32],
    pub accounts: Vec<SolAccountMeta>,
    pub data: Vec<u8>,
}

/// A compiled instruction where account references are replaced by u8 indices
/// into the message's `account_keys` array.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompiledInstruction {
    /// Index into `account_keys` for the program to invoke.
    pub program_id_index: u8,
    /// Indices into `account_keys` for each account the instruction reads/writes.
    pub account_indices: Vec<u8>,
    /// Opaque instruction data.
    pub data: Vec<u8>,
}

/// A compiled version-0 message with no address lookup tables.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessageV0 {
    /// All account keys referenced by this message, in canonical order:
    ///   1. writable signers (fee payer first)
    ///   2. read-only signers
    ///   3. writable non-signers
    ///   4. read-only non-signers
    pub account_keys: Vec<[u8; 32]>,

    /// Number of required signatures (first N accounts are signers).
    pub num_required_signatures: u8,
    /// How many of the signing accounts are read-only.
    pub num_readonly_signed: u8,
    /// How many of the non-signing accounts are read-only.
    pub num_readonly_unsigned: u8,

    /// Blockhash the transaction lifetime is bound to.
    pub recent_blockhash: [u8; 32],

    pub instructions: Vec<CompiledInstruction>,
}

impl MessageV0 {
    /// The fee payer is always the first account key.
    pub fn fee_payer(&self) -> Option<&[u8; 32]> {
        self.account_keys.first()
    }
}

/// A wire transaction parsed back into its parts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedTransaction {
    pub version: u8,
    pub signatures: Vec<[u8; SIGNATURE_LEN]>,
    pub message: MessageV0,
}

impl DecodedTransaction {
    pub fn fee_payer(&self) -> Option<&[u8; 32]> {
        self.message.fee_payer()
    }

    /// True while every signature slot is still the zero placeholder.
    pub fn is_unsigned(&self) -> bool {
        self.signatures
            .iter()
            .all(|sig| sig.iter().all(|b| *b == 0))
    }
}

// ---------------------------------------------------------------------------
// Building and compiling
// ---------------------------------------------------------------------------

/// Build a System Program `Transfer` instruction.
///
/// `from` is marked as a signer without holding any key: the custody provider
/// supplies the signature later.
pub fn system_transfer_instruction(
    from: &[u8; 32],
    to: &[u8; 32],
    lamports: u64,
) -> SolInstruction {
    // Instruction data: u32 LE instruction index (2 = Transfer) + u64 LE lamports.
    let mut data = Vec::with_capacity(12);
    data.extend_from_slice(&SYSTEM_TRANSFER_IX_INDEX.to_le_bytes());
    data.extend_from_slice(&lamports.to_le_bytes());

    SolInstruction {
        program_id: SYSTEM_PROGRAM_ID,
        accounts: vec![
            SolAccountMeta {
                pubkey: *from,
                is_signer: true,
                is_writable: true,
            },
            SolAccountMeta {
                pubkey: *to,
                is_signer: false,
                is_writable: true,
            },
        ],
        data,
    }
}

/// Compile instructions into a v0 message with a single fee payer.
///
/// The fee payer is always a writable signer and lands at index 0.
pub fn compile_message(
    instructions: &[SolInstruction],
    fee_payer: &[u8; 32],
    recent_blockhash: &[u8; 32],
) -> Result<MessageV0, SolError> {
    struct AccountEntry {
        pubkey: [u8; 32],
        is_signer: bool,
        is_writable: bool,
    }

    // Instruction account lists are tiny, a Vec beats a map here.
    let mut entries: Vec<AccountEntry> = Vec::new();

    let mut upsert = |pubkey: [u8; 32], signer: bool, writable: bool| {
        if let Some(entry) = entries.iter_mut().find(|e| e.pubkey == pubkey) {
            entry.is_signer |= signer;
            entry.is_writable |= writable;
        } else {
            entries.push(AccountEntry {
                pubkey,
                is_signer: signer,
                is_writable: writable,
            });
        }
    };

    upsert(*fee_payer, true, true);

    for ix in instructions {
        for meta in &ix.accounts {
            upsert(meta.pubkey, meta.is_signer, meta.is_writable);
        }
        // Program IDs are non-signer, read-only accounts.
        upsert(ix.program_id, false, false);
    }

    // Stable sort: the fee payer was inserted first with the lowest rank, so it
    // stays at index 0.
    entries.sort_by_key(|e| match (e.is_signer, e.is_writable) {
        (true, true) => 0u8,
        (true, false) => 1,
        (false, true) => 2,
        (false, false) => 3,
    });

    let count = |pred: &dyn Fn(&AccountEntry) -> bool| -> Result<u8, SolError> {
        let n = entries.iter().filter(|e| pred(e)).count();
        u8::try_from(n).map_err(|_| {
            SolError::TransactionBuildError(format!("too many accounts in header: {n}"))
        })
    };
    let num_required_signatures = count(&|e: &AccountEntry| e.is_signer)?;
    let num_readonly_signed = count(&|e: &AccountEntry| e.is_signer && !e.is_writable)?;
    let num_readonly_unsigned = count(&|e: &AccountEntry| !e.is_signer && !e.is_writable)?;

    let account_keys: Vec<[u8; 32]> = entries.iter().map(|e| e.pubkey).collect();

    let index_of = |key: &[u8; 32], what: &str| -> Result<u8, SolError> {
        let pos = account_keys
            .iter()
            .position(|k| k == key)
            .ok_or_else(|| SolError::TransactionBuildError(format!("{what} not in account keys")))?;
        u8::try_from(pos)
            .map_err(|_| SolError::TransactionBuildError(format!("{what} index {pos} exceeds u8")))
    };

    let mut compiled = Vec::with_capacity(instructions.len());
    for ix in instructions {
        let program_id_index = index_of(&ix.program_id, "program_id")?;
        let account_indices = ix
            .accounts
            .iter()
            .map(|meta| index_of(&meta.pubkey, "account"))
            .collect::<Result<Vec<_>, _>>()?;

        compiled.push(CompiledInstruction {
            program_id_index,
            account_indices,
            data: ix.data.clone(),
        });
    }

    Ok(MessageV0 {
        account_keys,
        num_required_signatures,
        num_readonly_signed,
        num_readonly_unsigned,
        recent_blockhash: *recent_blockhash,
        instructions: compiled,
    })
}

// ---------------------------------------------------------------------------
// Serialization
// ---------------------------------------------------------------------------

/// Serialize the v0 message (the bytes that get signed).
pub fn serialize_message(msg: &MessageV0) -> Result<Vec<u8>, SolError> {
    let mut buf = Vec::with_capacity(256);

    buf.push(VERSION_PREFIX_MASK | MESSAGE_VERSION);

    // Header: 3 bytes.
    buf.push(msg.num_required_signatures);
    buf.push(msg.num_readonly_signed);
    buf.push(msg.num_readonly_unsigned);

    buf.extend_from_slice(&compact_len(msg.account_keys.len(), "account keys")?);
    for key in &msg.account_keys {
        buf.extend_from_slice(key);
    }

    buf.extend_from_slice(&msg.recent_blockhash);

    buf.extend_from_slice(&compact_len(msg.instructions.len(), "instructions")?);
    for ix in &msg.instructions {
        buf.push(ix.program_id_index);

        buf.extend_from_slice(&compact_len(ix.account_indices.len(), "instruction accounts")?);
        buf.extend_from_slice(&ix.account_indices);

        buf.extend_from_slice(&compact_len(ix.data.len(), "instruction data bytes")?);
        buf.extend_from_slice(&ix.data);
    }

    // No address lookup tables.
    buf.extend_from_slice(&encode_compact_u16(0));

    Ok(buf)
}

/// Serialize an unsigned transaction: zeroed signature slots for every
/// required signer, followed by the message.
pub fn encode_wire_transaction(msg: &MessageV0) -> Result<Vec<u8>, SolError> {
    let message_bytes = serialize_message(msg)?;
    let num_sigs = usize::from(msg.num_required_signatures);

    let mut wire = Vec::with_capacity(3 + num_sigs * SIGNATURE_LEN + message_bytes.len());
    wire.extend_from_slice(&compact_len(num_sigs, "signatures")?);
    wire.resize(wire.len() + num_sigs * SIGNATURE_LEN, 0);
    wire.extend_from_slice(&message_bytes);

    Ok(wire)
}

// ---------------------------------------------------------------------------
// Decoding
// ---------------------------------------------------------------------------

struct Reader<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }

    fn take(&mut self, n: usize, what: &str) -> Result<&'a [u8], SolError> {
        let end = self.pos.checked_add(n).filter(|end| *end <= self.data.len());
        let end = end.ok_or_else(|| {
            SolError::SerializationError(format!("transaction too short: truncated {what}"))
        })?;
        let out = &self.data[self.pos..end];
        self.pos = end;
        Ok(out)
    }

    fn u8(&mut self, what: &str) -> Result<u8, SolError> {
        Ok(self.take(1, what)?[0])
    }

    fn compact_u16(&mut self) -> Result<usize, SolError> {
        let rest = self.data.get(self.pos..).unwrap_or_default();
        let (value, consumed) = decode_compact_u16(rest)?;
        self.pos += consumed;
        Ok(usize::from(value))
    }

    fn array<const N: usize>(&mut self, what: &str) -> Result<[u8; N], SolError> {
        let mut out = [0u8; N];
        out.copy_from_slice(self.take(N, what)?);
        Ok(out)
    }

    fn is_empty(&self) -> bool {
        self.pos >= self.data.len()
    }
}

/// Parse a wire transaction produced by [`encode_wire_transaction`] (or a
/// signed copy of it) back into its parts.
///
/// Only v0 messages without address lookup tables are accepted.
pub fn decode_wire_transaction(raw_tx: &[u8]) -> Result<DecodedTransaction, SolError> {
    let mut r = Reader::new(raw_tx);

    let num_sigs = r.compact_u16()?;
    let mut signatures = Vec::with_capacity(num_sigs);
    for _ in 0..num_sigs {
        signatures.push(r.array::<SIGNATURE_LEN>("signature")?);
    }

    let prefix = r.u8("version prefix")?;
    if prefix & VERSION_PREFIX_MASK == 0 {
        return Err(SolError::SerializationError(
            "legacy messages are not supported".into(),
        ));
    }
    let version = prefix & !VERSION_PREFIX_MASK;
    if version != MESSAGE_VERSION {
        return Err(SolError::SerializationError(format!(
            "unsupported message version {version}"
        )));
    }

    let num_required_signatures = r.u8("header")?;
    let num_readonly_signed = r.u8("header")?;
    let num_readonly_unsigned = r.u8("header")?;

    if usize::from(num_required_signatures) != num_sigs {
        return Err(SolError::SerializationError(format!(
            "{num_sigs} signature slots for {num_required_signatures} required signers"
        )));
    }

    let num_accounts = r.compact_u16()?;
    let mut account_keys = Vec::with_capacity(num_accounts);
    for _ in 0..num_accounts {
        account_keys.push(r.array::<32>("account keys")?);
    }

    let recent_blockhash = r.array::<32>("recent blockhash")?;

    let num_instructions = r.compact_u16()?;
    let mut instructions = Vec::with_capacity(num_instructions);
    for _ in 0..num_instructions {
        let program_id_index = r.u8("instruction")?;
        let n = r.compact_u16()?;
        let account_indices = r.take(n, "instruction accounts")?.to_vec();
        let n = r.compact_u16()?;
        let data = r.take(n, "instruction data")?.to_vec();

        let out_of_range = std::iter::once(&program_id_index)
            .chain(account_indices.iter())
            .any(|idx| usize::from(*idx) >= account_keys.len());
        if out_of_range {
            return Err(SolError::SerializationError(
                "instruction references an unknown account".into(),
            ));
        }

        instructions.push(CompiledInstruction {
            program_id_index,
            account_indices,
            data,
        });
    }

    if r.compact_u16()? != 0 {
        return Err(SolError::SerializationError(
            "address lookup tables are not supported".into(),
        ));
    }
    if !r.is_empty() {
        return Err(SolError::SerializationError(
            "trailing bytes after message".into(),
        ));
    }

    Ok(DecodedTransaction {
        version,
        signatures,
        message: MessageV0 {
            account_keys,
            num_required_signatures,
            num_readonly_signed,
            num_readonly_unsigned,
            recent_blockhash,
            instructions,
        },
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn transfer_message(
        from: [u8; 32],
        to: [u8; 32],
        lamports: u64,
        blockhash: [u8; 32],
    ) -> MessageV0 {
        let ix = system_transfer_instruction(&from, &to, lamports);
        compile_message(&[ix], &from, &blockhash).unwrap()
    }

    // -- compact-u16 encoding -----------------------------------------------

    #[test]
    fn compact_u16_zero() {
        assert_eq!(encode_compact_u16(0), vec![0x00]);
    }

    #[test]
    fn compact_u16_boundary_128() {
        // 128 = 0x80 -> two bytes: (0x00 | 0x80), 0x01
        assert_eq!(encode_compact_u16(128), vec![0x80, 0x01]);
    }

    #[test]
    fn compact_u16_boundary_16384() {
        assert_eq!(encode_compact_u16(16384), vec![0x80, 0x80, 0x01]);
    }

    #[test]
    fn compact_u16_max_value() {
        assert_eq!(encode_compact_u16(u16::MAX), vec![0xff, 0xff, 0x03]);
    }

    #[test]
    fn decode_compact_u16_reads_prefix_only() {
        assert_eq!(decode_compact_u16(&[0x80, 0x01, 0xff]).unwrap(), (128, 2));
    }

    #[test]
    fn decode_compact_u16_truncated() {
        assert!(decode_compact_u16(&[]).is_err());
        assert!(decode_compact_u16(&[0x80]).is_err());
    }

    #[test]
    fn decode_compact_u16_overflow() {
        assert!(decode_compact_u16(&[0xff, 0xff, 0x7f]).is_err());
    }

    // -- transfer instruction -----------------------------------------------

    #[test]
    fn transfer_instruction_data_is_12_bytes() {
        let ix = system_transfer_instruction(&[1u8; 32], &[2u8; 32], 1_000_000);
        assert_eq!(ix.data.len(), 12);
        assert_eq!(&ix.data[..4], &[2, 0, 0, 0]);
        assert_eq!(&ix.data[4..], &1_000_000u64.to_le_bytes());
    }

    #[test]
    fn transfer_instruction_accounts() {
        let from = [0xAAu8; 32];
        let to = [0xBBu8; 32];
        let ix = system_transfer_instruction(&from, &to, 500);

        assert_eq!(ix.program_id, SYSTEM_PROGRAM_ID);
        assert_eq!(ix.accounts.len(), 2);
        assert!(ix.accounts[0].is_signer && ix.accounts[0].is_writable);
        assert_eq!(ix.accounts[1].pubkey, to);
        assert!(!ix.accounts[1].is_signer && ix.accounts[1].is_writable);
    }

    // -- compilation --------------------------------------------------------

    #[test]
    fn compiled_message_account_order() {
        let from = [1u8; 32];
        let msg = transfer_message(from, [2u8; 32], 1000, [0xAA; 32]);

        // from (signer+writable), to (writable), system program (read-only)
        assert_eq!(msg.account_keys.len(), 3);
        assert_eq!(msg.fee_payer(), Some(&from));
        assert_eq!(msg.num_required_signatures, 1);
        assert_eq!(msg.num_readonly_signed, 0);
        assert_eq!(msg.num_readonly_unsigned, 1);
    }

    #[test]
    fn self_transfer_collapses_accounts() {
        let payer = [7u8; 32];
        let msg = transfer_message(payer, payer, 1_000_000, [0u8; 32]);

        // payer appears once, plus the system program
        assert_eq!(msg.account_keys, vec![payer, SYSTEM_PROGRAM_ID]);
        assert_eq!(msg.instructions[0].account_indices, vec![0, 0]);
        assert_eq!(msg.instructions[0].program_id_index, 1);
    }

    #[test]
    fn compiled_instruction_indices() {
        let from = [1u8; 32];
        let to = [2u8; 32];
        let msg = transfer_message(from, to, 100, [0u8; 32]);

        let cix = &msg.instructions[0];
        let sys_idx = msg.account_keys.iter().position(|k| *k == SYSTEM_PROGRAM_ID).unwrap();
        let to_idx = msg.account_keys.iter().position(|k| *k == to).unwrap();
        assert_eq!(cix.program_id_index as usize, sys_idx);
        assert_eq!(cix.account_indices, vec![0, to_idx as u8]);
    }

    // -- serialization ------------------------------------------------------

    #[test]
    fn serialized_message_has_v0_prefix_and_header() {
        let msg = transfer_message([1u8; 32], [2u8; 32], 100, [0u8; 32]);
        let bytes = serialize_message(&msg).unwrap();

        assert_eq!(bytes[0], 0x80);
        assert_eq!(bytes[1], msg.num_required_signatures);
        assert_eq!(bytes[2], msg.num_readonly_signed);
        assert_eq!(bytes[3], msg.num_readonly_unsigned);
        // empty lookup table list closes the message
        assert_eq!(*bytes.last().unwrap(), 0);
    }

    #[test]
    fn serialized_message_contains_blockhash() {
        let blockhash = [0xCCu8; 32];
        let msg = transfer_message([1u8; 32], [2u8; 32], 500, blockhash);
        let bytes = serialize_message(&msg).unwrap();

        // prefix(1) + header(3) + compact-u16(3) + 3 keys
        let offset = 1 + 3 + 1 + 32 * 3;
        assert_eq!(&bytes[offset..offset + 32], &blockhash);
    }

    #[test]
    fn wire_transaction_has_zeroed_signature_slot() {
        let msg = transfer_message([1u8; 32], [2u8; 32], 500, [3u8; 32]);
        let wire = encode_wire_transaction(&msg).unwrap();

        assert_eq!(wire[0], 1);
        assert!(wire[1..1 + SIGNATURE_LEN].iter().all(|b| *b == 0));
        assert_eq!(&wire[1 + SIGNATURE_LEN..], &serialize_message(&msg).unwrap()[..]);
    }

    // -- decoding -----------------------------------------------------------

    #[test]
    fn decode_recovers_fee_payer_and_instruction() {
        let from = [1u8; 32];
        let msg = transfer_message(from, [2u8; 32], 42, [9u8; 32]);
        let wire = encode_wire_transaction(&msg).unwrap();

        let decoded = decode_wire_transaction(&wire).unwrap();
        assert_eq!(decoded.version, 0);
        assert_eq!(decoded.fee_payer(), Some(&from));
        assert_eq!(decoded.message.instructions.len(), 1);
        assert!(decoded.is_unsigned());
        assert_eq!(decoded.message, msg);
    }

    #[test]
    fn decode_rejects_legacy_message() {
        let msg = transfer_message([1u8; 32], [2u8; 32], 42, [9u8; 32]);
        let mut wire = encode_wire_transaction(&msg).unwrap();
        // Replace the version prefix with a legacy header byte.
        wire[1 + SIGNATURE_LEN] = 1;
        assert!(decode_wire_transaction(&wire).is_err());
    }

    #[test]
    fn decode_rejects_truncated_input() {
        let msg = transfer_message([1u8; 32], [2u8; 32], 42, [9u8; 32]);
        let wire = encode_wire_transaction(&msg).unwrap();
        let err = decode_wire_transaction(&wire[..wire.len() - 10]).unwrap_err();
        assert!(matches!(err, SolError::SerializationError(_)));
    }

    #[test]
    fn decode_rejects_trailing_bytes() {
        let msg = transfer_message([1u8; 32], [2u8; 32], 42, [9u8; 32]);
        let mut wire = encode_wire_transaction(&msg).unwrap();
        wire.push(0);
        assert!(decode_wire_transaction(&wire).is_err());
    }

    #[test]
    fn signed_copy_is_not_unsigned() {
        let msg = transfer_message([1u8; 32], [2u8; 32], 42, [9u8; 32]);
        let mut wire = encode_wire_transaction(&msg).unwrap();
        wire[1..1 + SIGNATURE_LEN].copy_from_slice(&[0x11; SIGNATURE_LEN]);
        assert!(!decode_wire_transaction(&wire).unwrap().is_unsigned());
    }
}
