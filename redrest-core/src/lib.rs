pub mod codec;
pub mod command;
pub mod error;
pub mod keywords;
pub mod wire;

pub use codec::{Codec, CompressionConfig, COMPRESSED_PREFIX, DEFAULT_COMPRESSION_THRESHOLD};
pub use command::{Arg, Batch, BatchKind, Command};
pub use error::{ErrorKind, RedisError, TransportError};
pub use keywords::{can_compress_command, is_keyword};
pub use wire::{parse_batch_response, WireOutcome};

/// Result of a single Redis command after decoding.
pub type CommandResult = Result<serde_json::Value, RedisError>;
