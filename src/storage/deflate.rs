//! The deflate (zlib) filter pipeline.

use std::io::Read;

use flate2::read::{ZlibDecoder, ZlibEncoder};
use flate2::Compression;

use super::{FilterError, FilterPipeline};
use crate::chunk::FilterSpec;

/// A [`FilterPipeline`] decoding deflate-compressed chunk payloads.
///
/// Handles [`FilterSpec::DEFLATE`] stages only; any other filter id fails
/// with [`FilterError::UnsupportedFilter`]. Stages are undone in reverse of
/// their application order.
#[derive(Clone, Copy, Debug, Default)]
pub struct DeflatePipeline;

impl DeflatePipeline {
    /// Deflate-compress a chunk payload, for writers and test fixtures.
    ///
    /// # Errors
    /// Returns the underlying I/O error if compression fails.
    pub fn encode(bytes: &[u8], level: u32) -> std::io::Result<Vec<u8>> {
        let mut encoded = Vec::new();
        ZlibEncoder::new(bytes, Compression::new(level)).read_to_end(&mut encoded)?;
        Ok(encoded)
    }
}

impl FilterPipeline for DeflatePipeline {
    fn decode(&self, bytes: Vec<u8>, filters: &[FilterSpec]) -> Result<Vec<u8>, FilterError> {
        let mut bytes = bytes;
        for filter in filters.iter().rev() {
            if filter.id != FilterSpec::DEFLATE {
                return Err(FilterError::UnsupportedFilter(filter.id));
            }
            let mut decoded = Vec::new();
            ZlibDecoder::new(bytes.as_slice())
                .read_to_end(&mut decoded)
                .map_err(|source| FilterError::Decode {
                    id: filter.id,
                    source,
                })?;
            bytes = decoded;
        }
        Ok(bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deflate_round_trip() {
        let payload: Vec<u8> = (0..200u8).cycle().take(4096).collect();
        let encoded = DeflatePipeline::encode(&payload, 6).unwrap();
        assert!(encoded.len() < payload.len());
        let decoded = DeflatePipeline
            .decode(encoded, &[FilterSpec::new(FilterSpec::DEFLATE)])
            .unwrap();
        assert_eq!(decoded, payload);
    }

    #[test]
    fn deflate_rejects_unknown_filter() {
        assert!(matches!(
            DeflatePipeline.decode(vec![0], &[FilterSpec::new(99)]),
            Err(FilterError::UnsupportedFilter(99))
        ));
    }

    #[test]
    fn deflate_rejects_corrupt_payload() {
        assert!(matches!(
            DeflatePipeline.decode(
                vec![1, 2, 3],
                &[FilterSpec::new(FilterSpec::DEFLATE)]
            ),
            Err(FilterError::Decode { id: 1, .. })
        ));
    }
}
