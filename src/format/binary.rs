use crate::format::{Format, FormatOptions};
use crate::payload::Payload;
use anyhow::{Result, bail};

/// Raw byte passthrough: bytes in, the same bytes out.
pub struct BinaryFormat;

impl Format for BinaryFormat {
    fn encode(&self, payload: &Payload, _opts: &FormatOptions) -> Result<Vec<u8>> {
        match payload {
            Payload::Bytes(b) => Ok(b.clone()),
            other => bail!("binary handler expects a Bytes payload, got {other:?}"),
        }
    }

    fn decode(&self, bytes: &[u8], _opts: &FormatOptions) -> Result<Payload> {
        Ok(Payload::Bytes(bytes.to_vec()))
    }
}
