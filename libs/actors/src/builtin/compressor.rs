//! Compressor: rewrite bodies with gzip, deflate or zlib

use super::transform::{Transform, TransformActor};
use crate::actor::Actor;
use crate::{ActorError, Context, Result};
use flate2::write::{DeflateEncoder, GzEncoder, ZlibEncoder};
use flate2::Compression;
use flow_config::{lenient, Params};
use flow_types::{Message, MessageStatus};
use serde::Deserialize;
use std::io::Write;
use std::str::FromStr;
use std::sync::Arc;

/// Metadata attribute announcing the applied encoding
pub const CONTENT_ENCODING: &str = "content-encoding";

const DEFAULT_LEVEL: u32 = 6;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Algorithm {
    Gzip,
    Deflate,
    Zlib,
}

impl Algorithm {
    pub fn as_str(self) -> &'static str {
        match self {
            Algorithm::Gzip => "gzip",
            Algorithm::Deflate => "deflate",
            Algorithm::Zlib => "zlib",
        }
    }
}

impl FromStr for Algorithm {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "gzip" => Ok(Algorithm::Gzip),
            "deflate" => Ok(Algorithm::Deflate),
            "zlib" => Ok(Algorithm::Zlib),
            other => Err(format!("unsupported compression '{other}'")),
        }
    }
}

#[derive(Debug, Deserialize)]
struct CompressorParams {
    compress: String,
    #[serde(default, deserialize_with = "lenient::option")]
    level: Option<u32>,
}

pub fn build(name: &str, ctx: &Context, params: &Params) -> Result<Arc<dyn Actor>> {
    let params: CompressorParams = params.parse(name)?;
    let algorithm = params
        .compress
        .parse()
        .map_err(|reason: String| ActorError::construction(name, reason))?;
    let level = params.level.unwrap_or(DEFAULT_LEVEL);
    if level > 9 {
        return Err(ActorError::construction(
            name,
            format!("compression level {level} out of range 0-9"),
        ));
    }
    let compressor = Compressor::new(algorithm, level);
    Ok(Arc::new(TransformActor::new(name, ctx, compressor)))
}

pub struct Compressor {
    algorithm: Algorithm,
    level: Compression,
}

impl Compressor {
    pub fn new(algorithm: Algorithm, level: u32) -> Self {
        Self {
            algorithm,
            level: Compression::new(level.min(9)),
        }
    }

    pub fn compress(&self, body: &[u8]) -> std::io::Result<Vec<u8>> {
        match self.algorithm {
            Algorithm::Gzip => {
                let mut encoder = GzEncoder::new(Vec::new(), self.level);
                encoder.write_all(body)?;
                encoder.finish()
            }
            Algorithm::Deflate => {
                let mut encoder = DeflateEncoder::new(Vec::new(), self.level);
                encoder.write_all(body)?;
                encoder.finish()
            }
            Algorithm::Zlib => {
                let mut encoder = ZlibEncoder::new(Vec::new(), self.level);
                encoder.write_all(body)?;
                encoder.finish()
            }
        }
    }
}

impl Transform for Compressor {
    fn apply(&self, msg: &mut Message) -> std::result::Result<(), MessageStatus> {
        let compressed = self
            .compress(msg.body())
            .map_err(|_| MessageStatus::Failed)?;
        msg.set_body(compressed);
        msg.set_meta(CONTENT_ENCODING, self.algorithm.as_str());
        Ok(())
    }
}
