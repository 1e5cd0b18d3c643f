//! # Protocol Configuration & Constants
//!
//! Every fixed parameter of LendPact lives here: wire widths, the signed
//! message prefix, operation signatures used as discriminators, and the
//! defaults the devnet node starts with.
//!
//! The encodings are chosen to match the EVM tooling borrowers already sign
//! with, so a signature produced by a stock wallet verifies here unchanged.

// ---------------------------------------------------------------------------
// Protocol Version
// ---------------------------------------------------------------------------

/// The full protocol version string.
pub const PROTOCOL_VERSION: &str = "0.1.0";

// ---------------------------------------------------------------------------
// Cryptographic Parameters
// ---------------------------------------------------------------------------

/// secp256k1 ECDSA with public-key recovery.
pub const SIGNING_ALGORITHM: &str = "secp256k1-ecdsa-recoverable";

/// Secret key length in bytes.
pub const SECRET_KEY_LENGTH: usize = 32;

/// Recoverable signature length: `r (32) || s (32) || v (1)`.
pub const SIGNATURE_LENGTH: usize = 65;

/// Length of the compact `r || s` part of a signature.
pub const COMPACT_SIGNATURE_LENGTH: usize = 64;

/// Offset added to the raw recovery id in the canonical `v` encoding.
/// Geth emits 27/28, some local test chains emit 0/1.
pub const RECOVERY_ID_OFFSET: u8 = 27;

/// Address length: trailing 20 bytes of the public key hash.
pub const ADDRESS_LENGTH: usize = 20;

/// Loan identifiers are full 32-byte digests.
pub const LOAN_ID_LENGTH: usize = 32;

/// Width of one packed integer word in a digest preimage (`uint256`).
pub const WORD_LENGTH: usize = 32;

/// Function discriminators are the first four bytes of the signature hash.
pub const SELECTOR_LENGTH: usize = 4;

/// Prefix wallets apply before signing a 32-byte digest.
pub const SIGNED_MESSAGE_PREFIX: &[u8] = b"\x19Ethereum Signed Message:\n32";

// ---------------------------------------------------------------------------
// Operation Signatures
// ---------------------------------------------------------------------------

/// Canonical signature of the claim operation, hashed into its discriminator.
pub const TAKE_LOAN_SIGNATURE: &str = "takeLoan(bytes32)";

/// Canonical signature of the decline operation.
pub const REFUSE_LOAN_SIGNATURE: &str = "refuseLoan(bytes32)";

// ---------------------------------------------------------------------------
// Devnet Defaults
// ---------------------------------------------------------------------------

/// Default HTTP API port for the devnet node.
pub const DEFAULT_RPC_PORT: u16 = 8645;

/// Default Prometheus metrics port.
pub const DEFAULT_METRICS_PORT: u16 = 8646;

/// Default ttl window, in blocks, suggested to clients creating a request.
pub const DEFAULT_TTL_WINDOW: u64 = 100;

/// Largest number of blocks a single `POST /blocks` call may mine.
pub const MAX_BLOCKS_PER_ADVANCE: u64 = 1_000_000;
