//! Chunk payload decoding for every WAD compression type.

use std::io::Read;

use byteorder::{ByteOrder, LE};
use flate2::read::GzDecoder;
use ltk_hashtable::CancellationToken;

use crate::chunk::CompressionType;
use crate::error::DecompressError;

pub const ZSTD_MAGIC: [u8; 4] = [0x28, 0xB5, 0x2F, 0xFD];

/// Decodes `raw` according to `kind`.
///
/// For [`CompressionType::Satellite`] the result is the payload behind the
/// length subheader, i.e. the target archive path, not file content. Callers
/// that want file bytes should check for satellites first
/// (see [`WadArchive::load_chunk`](crate::WadArchive::load_chunk)).
pub fn decompress(raw: &[u8], kind: CompressionType, expected_size: u32) -> Result<Vec<u8>, DecompressError> {
    decompress_cancellable(raw, kind, expected_size, &CancellationToken::new())
}

/// Same as [`decompress`], checking `cancel` between zstd-chunked frames.
pub fn decompress_cancellable(
    raw: &[u8],
    kind: CompressionType,
    expected_size: u32,
    cancel: &CancellationToken,
) -> Result<Vec<u8>, DecompressError> {
    let data = match kind {
        CompressionType::Raw => raw.to_vec(),
        CompressionType::Gzip => decompress_gzip(raw, expected_size)?,
        CompressionType::Satellite => strip_satellite_header(raw)?.to_vec(),
        CompressionType::Zstd => decompress_zstd(raw, expected_size)?,
        CompressionType::ZstdChunked => decompress_zstd_chunked(raw, expected_size, cancel)?,
    };

    if kind != CompressionType::Satellite && data.len() != expected_size as usize {
        tracing::warn!(
            "{} chunk decoded to {} bytes, header declares {}",
            kind,
            data.len(),
            expected_size
        );
    }
    Ok(data)
}

/// Largest ratio between declared and stored size trusted for pre-allocation.
const MAX_PREALLOC_RATIO: usize = 16;

/// Initial buffer size for a decoded payload.
///
/// The declared size comes from the entry table and is only a hint; buffers
/// still grow past it when the data really is larger.
pub(crate) fn capacity_hint(expected_size: u32, stored_len: usize) -> usize {
    (expected_size as usize).min(stored_len.saturating_mul(MAX_PREALLOC_RATIO))
}

fn decompress_gzip(raw: &[u8], expected_size: u32) -> Result<Vec<u8>, DecompressError> {
    let mut data = Vec::with_capacity(capacity_hint(expected_size, raw.len()));
    GzDecoder::new(raw)
        .read_to_end(&mut data)
        .map_err(|e| DecompressError::Corrupt(format!("gzip: {}", e)))?;
    Ok(data)
}

fn decompress_zstd(raw: &[u8], expected_size: u32) -> Result<Vec<u8>, DecompressError> {
    let mut data = Vec::with_capacity(capacity_hint(expected_size, raw.len()));
    zstd::stream::copy_decode(raw, &mut data).map_err(|e| DecompressError::Corrupt(format!("zstd: {}", e)))?;
    Ok(data)
}

/// Decodes a subchunked payload: an optional stored prefix followed by
/// consecutive zstd frames.
///
/// The prefix ends at a zstd magic. Stored bytes may contain the magic
/// themselves, so every magic offset is tried in order until the remainder
/// decodes as whole frames; a candidate whose total matches `expected_size`
/// wins over one that merely decodes.
fn decompress_zstd_chunked(
    raw: &[u8],
    expected_size: u32,
    cancel: &CancellationToken,
) -> Result<Vec<u8>, DecompressError> {
    if cancel.is_cancelled() {
        return Err(DecompressError::Cancelled);
    }

    let mut fallback = None;
    let mut first_error = None;
    let mut search_from = 0;
    while let Some(found) = find_zstd_magic_offset(&raw[search_from..]) {
        let prefix_len = search_from + found;
        search_from = prefix_len + 1;

        match decode_frames(raw, prefix_len, expected_size, cancel) {
            Ok(data) if data.len() == expected_size as usize => return Ok(data),
            Ok(data) => {
                fallback.get_or_insert(data);
            }
            Err(DecompressError::Cancelled) => return Err(DecompressError::Cancelled),
            Err(error) => {
                tracing::trace!("No zstd frame sequence at offset {}: {}", prefix_len, error);
                first_error.get_or_insert(error);
            }
        }
    }

    match (fallback, first_error) {
        (Some(data), _) => Ok(data),
        (None, Some(error)) => Err(error),
        // No frame at all: the whole payload is stored
        (None, None) => Ok(raw.to_vec()),
    }
}

fn decode_frames(
    raw: &[u8],
    prefix_len: usize,
    expected_size: u32,
    cancel: &CancellationToken,
) -> Result<Vec<u8>, DecompressError> {
    let mut data = Vec::with_capacity(capacity_hint(expected_size, raw.len()));
    data.extend_from_slice(&raw[..prefix_len]);

    let mut position = prefix_len;
    while position < raw.len() {
        if cancel.is_cancelled() {
            return Err(DecompressError::Cancelled);
        }

        let rest = &raw[position..];
        let frame_size = zstd::zstd_safe::find_frame_compressed_size(rest).map_err(|code| {
            DecompressError::Corrupt(format!(
                "zstd frame at offset {}: {}",
                position,
                zstd::zstd_safe::get_error_name(code)
            ))
        })?;
        zstd::stream::copy_decode(&rest[..frame_size], &mut data)
            .map_err(|e| DecompressError::Corrupt(format!("zstd frame at offset {}: {}", position, e)))?;
        position += frame_size;
    }

    Ok(data)
}

/// Find the offset of ZSTD magic bytes in data.
pub fn find_zstd_magic_offset(raw: &[u8]) -> Option<usize> {
    raw.windows(ZSTD_MAGIC.len()).position(|w| w == ZSTD_MAGIC)
}

/// Splits a satellite payload into its `u32` length subheader and body.
pub fn strip_satellite_header(raw: &[u8]) -> Result<&[u8], DecompressError> {
    if raw.len() < 4 {
        return Err(DecompressError::Corrupt("satellite subheader is truncated".to_string()));
    }
    let len = LE::read_u32(&raw[..4]) as usize;
    raw.get(4..4 + len).ok_or_else(|| {
        DecompressError::Corrupt(format!(
            "satellite payload declares {} bytes, {} available",
            len,
            raw.len() - 4
        ))
    })
}

/// Returns the archive path a satellite entry points at.
pub fn satellite_target(raw: &[u8]) -> Result<String, DecompressError> {
    let payload = strip_satellite_header(raw)?;
    String::from_utf8(payload.to_vec())
        .map_err(|_| DecompressError::Corrupt("satellite target is not valid UTF-8".to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use flate2::write::GzEncoder;
    use flate2::Compression;
    use std::io::Write;

    fn payloads() -> Vec<Vec<u8>> {
        // xorshift noise stands in for incompressible data
        let mut state = 0x2545_f491_4f6c_dd1du64;
        let noise = (0..70_000)
            .map(|_| {
                state ^= state << 13;
                state ^= state >> 7;
                state ^= state << 17;
                state as u8
            })
            .collect();
        vec![
            Vec::new(),
            vec![0x42],
            b"assets/characters/aatrox/skins/base/aatrox.dds".repeat(2_000),
            noise,
        ]
    }

    fn gzip(data: &[u8]) -> Vec<u8> {
        let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(data).unwrap();
        encoder.finish().unwrap()
    }

    fn size(data: &[u8]) -> u32 {
        data.len() as u32
    }

    #[test]
    fn test_raw_passthrough() {
        for data in payloads() {
            assert_eq!(decompress(&data, CompressionType::Raw, size(&data)).unwrap(), data);
        }
    }

    #[test]
    fn test_raw_length_mismatch_is_not_fatal() {
        assert_eq!(decompress(b"padded\0\0", CompressionType::Raw, 6).unwrap(), b"padded\0\0");
    }

    #[test]
    fn test_gzip() {
        for data in payloads() {
            let compressed = gzip(&data);
            assert_eq!(
                decompress(&compressed, CompressionType::Gzip, size(&data)).unwrap(),
                data
            );
        }
    }

    #[test]
    fn test_zstd() {
        for data in payloads() {
            let compressed = zstd::encode_all(&data[..], 3).unwrap();
            assert_eq!(
                decompress(&compressed, CompressionType::Zstd, size(&data)).unwrap(),
                data
            );
        }
    }

    #[test]
    fn test_satellite_strips_subheader() {
        for data in payloads() {
            let mut raw = size(&data).to_le_bytes().to_vec();
            raw.extend_from_slice(&data);
            assert_eq!(
                decompress(&raw, CompressionType::Satellite, size(&raw)).unwrap(),
                data
            );
        }

        let mut raw = 13u32.to_le_bytes().to_vec();
        raw.extend_from_slice(b"Map11.wad.client");
        // Bytes past the declared length are ignored
        assert_eq!(strip_satellite_header(&raw), Ok(&b"Map11.wad.cli"[..]));
        assert_eq!(satellite_target(&raw).unwrap(), "Map11.wad.cli");
    }

    #[test]
    fn test_zstd_chunked_mixes_stored_and_compressed_subchunks() {
        let first = b"first subchunk ".repeat(100);
        let second = b"second subchunk".repeat(100);
        let mut raw = b"STORED-PREFIX".to_vec();
        raw.extend(zstd::encode_all(&first[..], 3).unwrap());
        raw.extend(zstd::encode_all(&second[..], 3).unwrap());

        let mut expected = b"STORED-PREFIX".to_vec();
        expected.extend_from_slice(&first);
        expected.extend_from_slice(&second);

        assert_eq!(
            decompress(&raw, CompressionType::ZstdChunked, size(&expected)).unwrap(),
            expected
        );
    }

    #[test]
    fn test_zstd_chunked_prefix_containing_magic() {
        let mut prefix = b"HEADER".to_vec();
        prefix.extend_from_slice(&ZSTD_MAGIC);
        prefix.extend_from_slice(b"still stored");
        let body = b"compressed body ".repeat(64);

        let mut raw = prefix.clone();
        raw.extend(zstd::encode_all(&body[..], 3).unwrap());
        let mut expected = prefix;
        expected.extend_from_slice(&body);

        assert_eq!(
            decompress(&raw, CompressionType::ZstdChunked, size(&expected)).unwrap(),
            expected
        );
    }

    #[test]
    fn test_zstd_chunked_without_frames_is_stored() {
        assert_eq!(
            decompress(b"no frames here", CompressionType::ZstdChunked, 14).unwrap(),
            b"no frames here"
        );
    }

    #[test]
    fn test_oversized_declared_size_is_not_preallocated() {
        assert_eq!(capacity_hint(u32::MAX, 10), 160);
        assert_eq!(capacity_hint(100, 10), 100);

        let compressed = zstd::encode_all(&b"tiny"[..], 3).unwrap();
        assert_eq!(
            decompress(&compressed, CompressionType::Zstd, u32::MAX).unwrap(),
            b"tiny"
        );
        let compressed = gzip(b"tiny");
        assert_eq!(decompress(&compressed, CompressionType::Gzip, u32::MAX).unwrap(), b"tiny");
    }

    #[test]
    fn test_zstd_chunked_observes_cancellation() {
        let raw = zstd::encode_all(&b"data"[..], 3).unwrap();
        let cancel = CancellationToken::new();
        cancel.cancel();
        assert_eq!(
            decompress_cancellable(&raw, CompressionType::ZstdChunked, 4, &cancel),
            Err(DecompressError::Cancelled)
        );
    }

    #[test]
    fn test_corrupt_inputs() {
        assert!(matches!(
            decompress(b"definitely not gzip", CompressionType::Gzip, 10),
            Err(DecompressError::Corrupt(_))
        ));
        assert!(matches!(
            decompress(&[0x28, 0xB5, 0x2F, 0xFD, 0xff, 0xff], CompressionType::Zstd, 10),
            Err(DecompressError::Corrupt(_))
        ));
        assert!(matches!(
            decompress(&[0x28, 0xB5, 0x2F, 0xFD, 0x00], CompressionType::ZstdChunked, 10),
            Err(DecompressError::Corrupt(_))
        ));
        assert!(matches!(
            decompress(&[1, 0], CompressionType::Satellite, 0),
            Err(DecompressError::Corrupt(_))
        ));
    }

    #[test]
    fn test_find_zstd_magic() {
        let data = [0x00, 0x01, 0x28, 0xB5, 0x2F, 0xFD, 0x02];
        assert_eq!(find_zstd_magic_offset(&data), Some(2));
        assert_eq!(find_zstd_magic_offset(&[0x00, 0x01, 0x02]), None);
    }
}
