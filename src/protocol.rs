//! swaybar / i3bar JSON protocol.
//!
//! The header goes out once, followed by the opening bracket of an infinite
//! array. Every refresh then appends the whole status line as one JSON array
//! value plus a comma. The outer array is never closed.

use anyhow::{Context, Result};
use serde::Serialize;
use tokio::io::{AsyncWrite, AsyncWriteExt};

/// Signal the bar sends to resume us.
#[cfg(unix)]
pub const SIGCONT: i32 = libc::SIGCONT;
/// Signal the bar sends to pause us.
#[cfg(unix)]
pub const SIGSTOP: i32 = libc::SIGSTOP;

// No job-control signals here; advertise the Linux numbers.
#[cfg(not(unix))]
pub const SIGCONT: i32 = 18;
#[cfg(not(unix))]
pub const SIGSTOP: i32 = 19;

const HEADER_GLUE: &[u8] = b"\n[";
const BODY_GLUE: &[u8] = b",";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Header {
    pub version: u32,
    pub click_events: bool,
    pub cont_signal: i32,
    pub stop_signal: i32,
}

impl Default for Header {
    fn default() -> Self {
        Self {
            version: 1,
            click_events: false,
            cont_signal: SIGCONT,
            stop_signal: SIGSTOP,
        }
    }
}

/// One entry of the status line. Only the required field is emitted.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Block {
    pub full_text: String,
}

pub async fn write_header<W>(out: &mut W, header: &Header) -> Result<()>
where
    W: AsyncWrite + Unpin + ?Sized,
{
    write(out, header, HEADER_GLUE).await
}

pub async fn write_body<W>(out: &mut W, blocks: &[Block]) -> Result<()>
where
    W: AsyncWrite + Unpin + ?Sized,
{
    write(out, blocks, BODY_GLUE).await
}

/// Serialize `value`, append `glue`, and push it out in a single write.
async fn write<W, T>(out: &mut W, value: &T, glue: &[u8]) -> Result<()>
where
    W: AsyncWrite + Unpin + ?Sized,
    T: Serialize + ?Sized,
{
    let mut buf = serde_json::to_vec(value).context("failed to encode bar output")?;
    buf.extend_from_slice(glue);
    out.write_all(&buf).await.context("failed to write bar output")?;
    out.flush().await.context("failed to flush bar output")?;
    Ok(())
}
