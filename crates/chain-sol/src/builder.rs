//! Unsigned SOL transfer builder.
//!
//! Pipeline, in order: fetch a recent blockhash, build the System Program
//! transfer instruction, compile a v0 message with the fee payer and the
//! blockhash lifetime, serialize to the wire format, base64-encode for
//! hand-off and decode back to raw bytes for the signer.

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;

use crate::address::address_to_bytes;
use crate::error::SolError;
use crate::rpc::{BlockhashSource, LatestBlockhash};
use crate::transaction::{
    compile_message, decode_wire_transaction, encode_wire_transaction,
    system_transfer_instruction, DecodedTransaction,
};

/// A compiled, unsigned transaction in wire format.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WireTransaction {
    bytes: Vec<u8>,
    last_valid_block_height: u64,
}

impl WireTransaction {
    pub fn from_base64(encoded: &str) -> Result<Self, SolError> {
        let bytes = STANDARD
            .decode(encoded)
            .map_err(|e| SolError::SerializationError(format!("base64 decode failed: {e}")))?;
        Ok(Self {
            bytes,
            last_valid_block_height: 0,
        })
    }

    pub fn to_base64(&self) -> String {
        STANDARD.encode(&self.bytes)
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.bytes
    }

    /// Block height after which the network rejects this transaction.
    pub fn last_valid_block_height(&self) -> u64 {
        self.last_valid_block_height
    }

    pub fn decode(&self) -> Result<DecodedTransaction, SolError> {
        decode_wire_transaction(&self.bytes)
    }
}

/// Builds single-instruction SOL transfers against a blockhash source.
#[derive(Debug, Clone)]
pub struct TransferBuilder<R> {
    rpc: R,
}

impl<R: BlockhashSource> TransferBuilder<R> {
    pub fn new(rpc: R) -> Self {
        Self { rpc }
    }

    pub fn rpc(&self) -> &R {
        &self.rpc
    }

    /// Build an unsigned transfer of `lamports` from `fee_payer` to
    /// `destination`.
    ///
    /// A failed blockhash fetch is returned as-is with no retry; address
    /// errors surface when the instruction is built.
    pub async fn build(
        &self,
        fee_payer: &str,
        destination: &str,
        lamports: u64,
    ) -> Result<WireTransaction, SolError> {
        let latest = self.rpc.latest_blockhash().await?;
        tracing::debug!(
            blockhash = %latest.to_base58(),
            last_valid_block_height = latest.last_valid_block_height,
            "fetched blockhash"
        );
        build_with_blockhash(fee_payer, destination, lamports, &latest)
    }
}

/// The synchronous tail of the pipeline, once a blockhash is known.
pub fn build_with_blockhash(
    fee_payer: &str,
    destination: &str,
    lamports: u64,
    latest: &LatestBlockhash,
) -> Result<WireTransaction, SolError> {
    let payer = address_to_bytes(fee_payer)?;
    let to = address_to_bytes(destination)?;

    let instruction = system_transfer_instruction(&payer, &to, lamports);
    let message = compile_message(&[instruction], &payer, &latest.blockhash)?;
    let wire = encode_wire_transaction(&message)?;

    // The signer consumes raw bytes; base64 is the hand-off encoding.
    let encoded = STANDARD.encode(&wire);
    let mut tx = WireTransaction::from_base64(&encoded)?;
    tx.last_valid_block_height = latest.last_valid_block_height;
    Ok(tx)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::address::bytes_to_address;
    use crate::rpc::{FailingBlockhash, StaticBlockhash};
    use crate::transaction::SYSTEM_PROGRAM_ID;

    fn addr(byte: u8) -> String {
        bytes_to_address(&[byte; 32])
    }

    #[tokio::test]
    async fn builds_decodable_transfer() {
        let builder = TransferBuilder::new(StaticBlockhash::new([0x42; 32]));
        let tx = builder.build(&addr(1), &addr(2), 1_000_000).await.unwrap();

        let decoded = tx.decode().unwrap();
        assert_eq!(decoded.version, 0);
        assert_eq!(decoded.fee_payer(), Some(&[1u8; 32]));
        assert_eq!(decoded.message.instructions.len(), 1);
        assert_eq!(decoded.message.recent_blockhash, [0x42; 32]);
        assert!(decoded.is_unsigned());

        let ix = &decoded.message.instructions[0];
        let program = decoded.message.account_keys[usize::from(ix.program_id_index)];
        assert_eq!(program, SYSTEM_PROGRAM_ID);
        assert_eq!(&ix.data[4..], &1_000_000u64.to_le_bytes());
    }

    #[tokio::test]
    async fn blockhash_failure_produces_no_transaction() {
        let builder = TransferBuilder::new(FailingBlockhash("node unreachable".into()));
        let err = builder.build(&addr(1), &addr(2), 1_000_000).await.unwrap_err();
        assert!(matches!(err, SolError::BlockhashFetchFailed(_)));
    }

    #[tokio::test]
    async fn malformed_destination_is_invalid_address() {
        let builder = TransferBuilder::new(StaticBlockhash::new([0x42; 32]));
        let err = builder.build(&addr(1), "not base58 !!", 5).await.unwrap_err();
        assert!(matches!(err, SolError::InvalidAddress(_)));
    }

    #[tokio::test]
    async fn self_transfer_is_allowed() {
        let builder = TransferBuilder::new(StaticBlockhash::new([0x42; 32]));
        let tx = builder.build(&addr(3), &addr(3), 1).await.unwrap();
        assert_eq!(tx.decode().unwrap().message.account_keys.len(), 2);
    }

    #[test]
    fn base64_round_trip_preserves_bytes() {
        let latest = LatestBlockhash {
            blockhash: [9u8; 32],
            last_valid_block_height: 77,
        };
        let tx = build_with_blockhash(&addr(1), &addr(2), 10, &latest).unwrap();
        assert_eq!(tx.last_valid_block_height(), 77);

        let again = WireTransaction::from_base64(&tx.to_base64()).unwrap();
        assert_eq!(again.as_bytes(), tx.as_bytes());
    }

    #[test]
    fn invalid_base64_is_rejected() {
        assert!(WireTransaction::from_base64("***").is_err());
    }
}
