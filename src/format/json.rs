use crate::format::{Format, FormatOptions};
use crate::payload::Payload;
use anyhow::{Context, Result, bail};

/// JSON documents via serde_json.
///
/// `Text` payloads are written as-is on the assumption they already contain
/// serialized JSON; everything read back is parsed into a `Json` payload.
pub struct JsonFormat;

impl Format for JsonFormat {
    fn encode(&self, payload: &Payload, opts: &FormatOptions) -> Result<Vec<u8>> {
        match payload {
            Payload::Json(v) => {
                let bytes = if opts.pretty {
                    serde_json::to_vec_pretty(v)
                } else {
                    serde_json::to_vec(v)
                };
                bytes.context("serialize JSON document")
            }
            Payload::Text(s) => Ok(s.clone().into_bytes()),
            other => bail!("json handler expects a Json or Text payload, got {other:?}"),
        }
    }

    fn decode(&self, bytes: &[u8], _opts: &FormatOptions) -> Result<Payload> {
        let v: serde_json::Value =
            serde_json::from_slice(bytes).context("parse JSON document")?;
        Ok(Payload::Json(v))
    }
}
