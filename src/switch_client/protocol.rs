//! RouterOS API wire framing: length-prefixed words grouped into sentences.
//!
//! There is no published crate for this protocol, so framing is hand rolled
//! here the way the teacher's `ethernet`/`ipv4` modules hand roll their own
//! wire formats — this is the lowest layer the rest of `switch_client`
//! builds on.

use std::collections::HashMap;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;

use crate::error::SwitchError;

/// Encodes a RouterOS API word length using the protocol's variable-width
/// scheme (1, 2, 3, or 4 control bytes depending on magnitude).
fn encode_length(len: usize) -> Vec<u8> {
    if len < 0x80 {
        vec![len as u8]
    } else if len < 0x4000 {
        let len = len as u32 | 0x8000;
        vec![(len >> 8) as u8, len as u8]
    } else if len < 0x20_0000 {
        let len = len as u32 | 0xC0_0000;
        vec![(len >> 16) as u8, (len >> 8) as u8, len as u8]
    } else if len < 0x1000_0000 {
        let len = len as u32 | 0xE000_0000;
        vec![
            (len >> 24) as u8,
            (len >> 16) as u8,
            (len >> 8) as u8,
            len as u8,
        ]
    } else {
        vec![
            0xF0,
            (len >> 24) as u8,
            (len >> 16) as u8,
            (len >> 8) as u8,
            len as u8,
        ]
    }
}

async fn read_length(stream: &mut TcpStream) -> Result<usize, SwitchError> {
    let first = read_byte(stream).await?;
    if first & 0x80 == 0 {
        Ok(first as usize)
    } else if first & 0xC0 == 0x80 {
        let second = read_byte(stream).await?;
        Ok((((first & 0x3F) as usize) << 8) | second as usize)
    } else if first & 0xE0 == 0xC0 {
        let b = read_n(stream, 2).await?;
        Ok((((first & 0x1F) as usize) << 16) | ((b[0] as usize) << 8) | b[1] as usize)
    } else if first & 0xF0 == 0xE0 {
        let b = read_n(stream, 3).await?;
        Ok((((first & 0x0F) as usize) << 24)
            | ((b[0] as usize) << 16)
            | ((b[1] as usize) << 8)
            | b[2] as usize)
    } else {
        let b = read_n(stream, 4).await?;
        Ok(((b[0] as usize) << 24) | ((b[1] as usize) << 16) | ((b[2] as usize) << 8) | b[3] as usize)
    }
}

async fn read_byte(stream: &mut TcpStream) -> Result<u8, SwitchError> {
    let mut buf = [0u8; 1];
    stream
        .read_exact(&mut buf)
        .await
        .map_err(|source| SwitchError::Protocol(source.to_string()))?;
    Ok(buf[0])
}

async fn read_n(stream: &mut TcpStream, n: usize) -> Result<Vec<u8>, SwitchError> {
    let mut buf = vec![0u8; n];
    stream
        .read_exact(&mut buf)
        .await
        .map_err(|source| SwitchError::Protocol(source.to_string()))?;
    Ok(buf)
}

pub async fn write_word(stream: &mut TcpStream, word: &str) -> Result<(), SwitchError> {
    let bytes = word.as_bytes();
    let mut out = encode_length(bytes.len());
    out.extend_from_slice(bytes);
    stream
        .write_all(&out)
        .await
        .map_err(|source| SwitchError::Protocol(source.to_string()))
}

pub async fn write_sentence(stream: &mut TcpStream, words: &[String]) -> Result<(), SwitchError> {
    for word in words {
        write_word(stream, word).await?;
    }
    write_word(stream, "").await?;
    stream
        .flush()
        .await
        .map_err(|source| SwitchError::Protocol(source.to_string()))
}

/// Reads one sentence (a run of words up to a zero-length terminator).
pub async fn read_sentence(stream: &mut TcpStream) -> Result<Vec<String>, SwitchError> {
    let mut words = Vec::new();
    loop {
        let len = read_length(stream).await?;
        if len == 0 {
            return Ok(words);
        }
        let bytes = read_n(stream, len).await?;
        words.push(
            String::from_utf8(bytes).map_err(|e| SwitchError::Protocol(e.to_string()))?,
        );
    }
}

/// A decoded `!re` reply: the `key=value` attribute words with the leading
/// `=` stripped.
pub fn reply_to_map(words: &[String]) -> HashMap<String, String> {
    let mut map = HashMap::new();
    for word in words {
        if let Some(rest) = word.strip_prefix('=') {
            if let Some((key, value)) = rest.split_once('=') {
                map.insert(key.to_string(), value.to_string());
            }
        }
    }
    map
}
