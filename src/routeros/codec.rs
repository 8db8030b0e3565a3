//! RouterOS API word and sentence framing.
//!
//! A word is a length prefix followed by that many bytes; a sentence is a run
//! of words terminated by an empty word.

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use crate::router::RouterError;

/// Upper bound on a single word; anything larger is treated as a corrupt stream.
pub(crate) const MAX_WORD_LEN: u32 = 16 * 1024 * 1024;

pub(crate) fn encode_length(buf: &mut Vec<u8>, len: u32) {
    match len {
        0..=0x7F => buf.push(len.to_be_bytes()[3]),
        0x80..=0x3FFF => buf.extend_from_slice(&(len | 0x8000).to_be_bytes()[2..]),
        0x4000..=0x001F_FFFF => buf.extend_from_slice(&(len | 0x00C0_0000).to_be_bytes()[1..]),
        0x0020_0000..=0x0FFF_FFFF => buf.extend_from_slice(&(len | 0xE000_0000).to_be_bytes()),
        _ => {
            buf.push(0xF0);
            buf.extend_from_slice(&len.to_be_bytes());
        }
    }
}

pub(crate) fn encode_sentence<W: AsRef<str>>(words: &[W]) -> Result<Vec<u8>, RouterError> {
    let mut buf = Vec::new();
    for word in words {
        let word = word.as_ref().as_bytes();
        let len = u32::try_from(word.len())
            .ok()
            .filter(|len| *len <= MAX_WORD_LEN)
            .ok_or_else(|| RouterError::Protocol(format!("word too long; len={}", word.len())))?;
        encode_length(&mut buf, len);
        buf.extend_from_slice(word);
    }
    buf.push(0);

    Ok(buf)
}

pub(crate) async fn write_sentence<S, W>(stream: &mut S, words: &[W]) -> Result<(), RouterError>
where
    S: AsyncWrite + Unpin,
    W: AsRef<str>,
{
    let buf = encode_sentence(words)?;
    stream.write_all(&buf).await?;
    stream.flush().await?;

    Ok(())
}

#[allow(clippy::arithmetic_side_effects)]
pub(crate) async fn read_length<S>(stream: &mut S) -> Result<u32, RouterError>
where
    S: AsyncRead + Unpin,
{
    let first = stream.read_u8().await?;
    let (extra, high) = match first {
        0x00..=0x7F => (0, first),
        0x80..=0xBF => (1, first & 0x3F),
        0xC0..=0xDF => (2, first & 0x1F),
        0xE0..=0xEF => (3, first & 0x0F),
        0xF0 => (4, 0),
        _ => return Err(RouterError::Protocol(format!("control byte; byte={first:#04x}"))),
    };

    let mut len = u32::from(high);
    for _ in 0..extra {
        len = (len << 8) | u32::from(stream.read_u8().await?);
    }

    Ok(len)
}

pub(crate) async fn read_sentence<S>(stream: &mut S) -> Result<Vec<String>, RouterError>
where
    S: AsyncRead + Unpin,
{
    let mut words = Vec::new();
    loop {
        let len = read_length(stream).await?;
        if len == 0 {
            return Ok(words);
        }
        if len > MAX_WORD_LEN {
            return Err(RouterError::Protocol(format!("word too long; len={len}")));
        }

        let mut word = vec![0; len as usize];
        stream.read_exact(&mut word).await?;
        words.push(String::from_utf8_lossy(&word).into_owned());
    }
}
