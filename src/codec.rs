use serde::{Serialize, de::DeserializeOwned};

use crate::error::CodecError;

/// Turns values into storage strings and back.
pub trait Codec<T> {
    fn encode(&self, value: &T) -> Result<String, CodecError>;
    fn decode(&self, raw: &str) -> Result<T, CodecError>;
}

/// Structural JSON, the default codec.
#[derive(Debug, Clone, Copy, Default)]
pub struct Json;

impl<T: Serialize + DeserializeOwned> Codec<T> for Json {
    fn encode(&self, value: &T) -> Result<String, CodecError> {
        Ok(serde_json::to_string(value)?)
    }

    fn decode(&self, raw: &str) -> Result<T, CodecError> {
        Ok(serde_json::from_str(raw)?)
    }
}

/// Stores strings verbatim, without quoting.
#[derive(Debug, Clone, Copy, Default)]
pub struct Raw;

impl Codec<String> for Raw {
    fn encode(&self, value: &String) -> Result<String, CodecError> {
        Ok(value.clone())
    }

    fn decode(&self, raw: &str) -> Result<String, CodecError> {
        Ok(raw.to_string())
    }
}

/// A codec assembled from a pair of closures.
pub struct FnCodec<E, D> {
    encode: E,
    decode: D,
}

impl<E, D> FnCodec<E, D> {
    pub fn new(encode: E, decode: D) -> Self {
        Self { encode, decode }
    }
}

impl<T, E, D> Codec<T> for FnCodec<E, D>
where
    E: Fn(&T) -> Result<String, CodecError>,
    D: Fn(&str) -> Result<T, CodecError>,
{
    fn encode(&self, value: &T) -> Result<String, CodecError> {
        (self.encode)(value)
    }

    fn decode(&self, raw: &str) -> Result<T, CodecError> {
        (self.decode)(raw)
    }
}
