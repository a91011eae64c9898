use crate::format::{Format, FormatOptions};
use crate::payload::Payload;
use anyhow::{Context, Result, bail};

/// Raw UTF-8 text. Registered under both the `text` and `html` tags; there is
/// no semantic HTML handling.
pub struct TextFormat;

impl Format for TextFormat {
    fn encode(&self, payload: &Payload, _opts: &FormatOptions) -> Result<Vec<u8>> {
        match payload {
            Payload::Text(s) => Ok(s.clone().into_bytes()),
            other => bail!("text handler expects a Text payload, got {other:?}"),
        }
    }

    fn decode(&self, bytes: &[u8], _opts: &FormatOptions) -> Result<Payload> {
        let s = String::from_utf8(bytes.to_vec()).context("decode UTF-8 text")?;
        Ok(Payload::Text(s))
    }
}
