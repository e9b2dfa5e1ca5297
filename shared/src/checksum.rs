//! CRC-32 (ISO-HDLC, the zlib polynomial) computed over fixed-size chunks.

use crc32fast::Hasher;

use crate::{constants::CHECKSUM_CHUNK_SIZE, types::Checksum};

/// Computes the checksum of `data`, one chunk at a time.
///
/// Each chunk is seeded with the running value of the previous one, so the result is identical
/// to hashing the whole buffer at once. Chunking only bounds how much is hashed per call.
pub fn checksum(data: &[u8]) -> Checksum {
    checksum_chunked(data, CHECKSUM_CHUNK_SIZE)
}

fn checksum_chunked(data: &[u8], chunk_size: usize) -> Checksum {
    data.chunks(chunk_size).fold(0, |crc, chunk| {
        let mut hasher = Hasher::new_with_initial(crc);
        hasher.update(chunk);
        hasher.finalize()
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample(len: usize) -> Vec<u8> {
        (0..len).map(|i| (i * 31 % 251) as u8).collect()
    }

    #[test]
    fn known_vector() {
        assert_eq!(checksum(b"123456789"), 0xCBF4_3926);
    }

    #[test]
    fn empty_buffer() {
        assert_eq!(checksum(&[]), 0);
        assert_eq!(checksum(&[]), crc32fast::hash(&[]));
    }

    #[test]
    fn chunk_boundaries_do_not_change_the_result() {
        for len in [
            1,
            1000,
            CHECKSUM_CHUNK_SIZE - 1,
            CHECKSUM_CHUNK_SIZE,
            CHECKSUM_CHUNK_SIZE + 1,
            3 * CHECKSUM_CHUNK_SIZE + 12345,
        ] {
            let data = sample(len);
            assert_eq!(checksum(&data), crc32fast::hash(&data), "length {len}");
        }
    }

    #[test]
    fn small_chunks_match_single_pass() {
        let data = sample(10_000);
        for chunk_size in [1, 7, 64, 4096] {
            assert_eq!(checksum_chunked(&data, chunk_size), crc32fast::hash(&data));
        }
    }
}
