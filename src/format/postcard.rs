use crate::format::{Format, FormatOptions};
use crate::payload::{Payload, Table};
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

/// Structured binary serialization of arbitrary payloads via the postcard
/// wire format.
///
/// Postcard is not self-describing, so `Json` payloads are framed as
/// serde_json bytes inside the postcard envelope rather than serialized
/// directly (`serde_json::Value` deserialization needs a self-describing
/// format).
pub struct PostcardFormat;

#[derive(Serialize, Deserialize)]
enum Frame {
    Text(String),
    Bytes(Vec<u8>),
    Json(Vec<u8>),
    Table(Table),
}

impl Format for PostcardFormat {
    fn encode(&self, payload: &Payload, _opts: &FormatOptions) -> Result<Vec<u8>> {
        let frame = match payload {
            Payload::Text(s) => Frame::Text(s.clone()),
            Payload::Bytes(b) => Frame::Bytes(b.clone()),
            Payload::Json(v) => {
                Frame::Json(serde_json::to_vec(v).context("frame JSON payload")?)
            }
            Payload::Table(t) => Frame::Table(t.clone()),
        };
        postcard::to_allocvec(&frame).context("postcard-encode payload")
    }

    fn decode(&self, bytes: &[u8], _opts: &FormatOptions) -> Result<Payload> {
        let frame: Frame = postcard::from_bytes(bytes).context("postcard-decode payload")?;
        Ok(match frame {
            Frame::Text(s) => Payload::Text(s),
            Frame::Bytes(b) => Payload::Bytes(b),
            Frame::Json(raw) => Payload::Json(
                serde_json::from_slice(&raw).context("unframe JSON payload")?,
            ),
            Frame::Table(t) => Payload::Table(t),
        })
    }
}
