use crate::command::{Arg, Command};
use crate::error::RedisError;
use crate::keywords::{can_compress_command, is_keyword};
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use flate2::read::{DeflateDecoder, DeflateEncoder};
use flate2::Compression;
use serde_json::Value;
use std::io::Read;
use tracing::trace;

/// Marks a string argument as deflated and base64 encoded.
pub const COMPRESSED_PREFIX: &str = "~z:";

/// Strings shorter than this many bytes are not worth compressing.
pub const DEFAULT_COMPRESSION_THRESHOLD: usize = 64;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CompressionConfig {
    pub enabled: bool,
    /// Minimum length in bytes of a string argument before it is compressed
    pub threshold: usize,
}

impl Default for CompressionConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            threshold: DEFAULT_COMPRESSION_THRESHOLD,
        }
    }
}

impl CompressionConfig {
    pub fn enabled() -> Self {
        Self {
            enabled: true,
            ..Default::default()
        }
    }
}

/// Applies the per-client argument and result policy.
///
/// Encoding decides compression per argument: the verb, protocol keywords,
/// non-string values and short strings are sent verbatim, and commands on
/// the denylist are never touched. Decoding inflates compressed strings and,
/// when automatic deserialization is on, parses JSON strings into values.
#[derive(Debug, Clone, Default)]
pub struct Codec {
    compression: CompressionConfig,
    automatic_deserialization: bool,
}

impl Codec {
    pub fn new(compression: CompressionConfig, automatic_deserialization: bool) -> Self {
        Self {
            compression,
            automatic_deserialization,
        }
    }

    pub fn compression(&self) -> CompressionConfig {
        self.compression
    }

    pub fn automatic_deserialization(&self) -> bool {
        self.automatic_deserialization
    }

    pub fn encode_command(&self, command: &Command) -> Result<Command, RedisError> {
        if !self.compression.enabled || !can_compress_command(command.name()) {
            return Ok(command.clone());
        }

        let mut args = Vec::with_capacity(command.len());
        for (position, arg) in command.as_args().iter().enumerate() {
            if position == 0 {
                args.push(arg.clone());
            } else {
                args.push(self.encode_arg(arg)?);
            }
        }
        Ok(Command::from_args(args))
    }

    pub fn encode_arg(&self, arg: &Arg) -> Result<Arg, RedisError> {
        match arg {
            Arg::Str(s) if self.should_compress(s) => {
                let compressed = compress(s)?;
                trace!(
                    original = s.len(),
                    compressed = compressed.len(),
                    "compressed argument"
                );
                Ok(Arg::Str(compressed))
            }
            other => Ok(other.clone()),
        }
    }

    /// Reverses [`Codec::encode_arg`].
    pub fn decode_arg(&self, arg: &Arg) -> Result<Arg, RedisError> {
        match arg {
            Arg::Str(s) if self.compression.enabled => Ok(Arg::Str(decompress(s)?)),
            other => Ok(other.clone()),
        }
    }

    pub fn decode(&self, value: Value) -> Result<Value, RedisError> {
        let value = if self.compression.enabled {
            decompress_value(value)?
        } else {
            value
        };

        if self.automatic_deserialization {
            Ok(deserialize_value(value))
        } else {
            Ok(value)
        }
    }

    fn should_compress(&self, s: &str) -> bool {
        if !self.compression.enabled || is_keyword(s) {
            return false;
        }
        // Strings that already look compressed are always wrapped so decoding
        // cannot mistake them for our own payloads.
        s.len() >= self.compression.threshold || s.starts_with(COMPRESSED_PREFIX)
    }
}

pub fn compress(input: &str) -> Result<String, RedisError> {
    let mut encoder = DeflateEncoder::new(input.as_bytes(), Compression::default());
    let mut deflated = Vec::new();
    encoder
        .read_to_end(&mut deflated)
        .map_err(|e| RedisError::codec(format!("deflate failed: {}", e)))?;

    let mut out = String::with_capacity(COMPRESSED_PREFIX.len() + deflated.len() * 4 / 3 + 4);
    out.push_str(COMPRESSED_PREFIX);
    STANDARD.encode_string(&deflated, &mut out);
    Ok(out)
}

/// Inflates a string produced by [`compress`]; other strings are returned as-is.
pub fn decompress(input: &str) -> Result<String, RedisError> {
    let Some(payload) = input.strip_prefix(COMPRESSED_PREFIX) else {
        return Ok(input.to_string());
    };

    let deflated = STANDARD
        .decode(payload)
        .map_err(|e| RedisError::codec(format!("invalid base64 in compressed value: {}", e)))?;

    let mut inflated = Vec::new();
    DeflateDecoder::new(deflated.as_slice())
        .read_to_end(&mut inflated)
        .map_err(|e| RedisError::codec(format!("inflate failed: {}", e)))?;

    String::from_utf8(inflated)
        .map_err(|e| RedisError::codec(format!("decompressed value is not UTF-8: {}", e)))
}

fn decompress_value(value: Value) -> Result<Value, RedisError> {
    match value {
        Value::String(s) => Ok(Value::String(decompress(&s)?)),
        Value::Array(items) => items
            .into_iter()
            .map(decompress_value)
            .collect::<Result<Vec<_>, _>>()
            .map(Value::Array),
        other => Ok(other),
    }
}

/// Parses JSON-looking strings, recursing element-wise into arrays.
///
/// A string that parses to a number whose canonical form differs from the
/// original text (precision loss, `1.50`, exponent forms) stays a string.
pub fn deserialize_value(value: Value) -> Value {
    match value {
        Value::Array(items) => Value::Array(items.into_iter().map(deserialize_value).collect()),
        Value::String(s) => parse_json_string(s),
        other => other,
    }
}

fn parse_json_string(s: String) -> Value {
    match serde_json::from_str::<Value>(&s) {
        Ok(Value::Number(n)) if n.to_string() != s => Value::String(s),
        Ok(parsed) => parsed,
        Err(_) => Value::String(s),
    }
}
