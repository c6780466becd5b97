//! Chunk planning
//!
//! [`plan`] maps a transfer length, a maximum segment size and the caller's
//! options to the ordered list of segments the transport will be called
//! with. It never performs I/O, so every framing rule can be checked
//! without hardware.

use crate::error::TransferError;
use crate::flags::Framing;
use crate::transport::TransportResult;
use core::num::NonZeroUsize;
use core::ops::Range;

/// Largest segment the MPSSE link accepts (16-bit length field, length - 1)
pub const MAX_SEGMENT_SIZE: NonZeroUsize = match NonZeroUsize::new(65536) {
    Some(n) => n,
    None => panic!("segment size must be non-zero"),
};

/// One bounded slice of a logical transfer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Segment<F> {
    /// First byte of the segment
    pub begin: usize,
    /// One past the last byte of the segment
    pub end: usize,
    /// Options in effect for this segment only
    pub flags: F,
}

impl<F> Segment<F> {
    /// Number of bytes in the segment
    pub fn len(&self) -> usize {
        self.end - self.begin
    }

    /// Whether the segment carries no data (only possible for empty transfers)
    pub fn is_empty(&self) -> bool {
        self.begin == self.end
    }

    /// Byte range covered by the segment
    pub fn range(&self) -> Range<usize> {
        self.begin..self.end
    }
}

/// Ordered, contiguous list of segments covering `[0, total_len)`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChunkPlan<F> {
    total_len: usize,
    segments: Vec<Segment<F>>,
}

impl<F> ChunkPlan<F> {
    /// Length of the logical transfer
    pub fn total_len(&self) -> usize {
        self.total_len
    }

    /// The planned segments, in transfer order
    pub fn segments(&self) -> &[Segment<F>] {
        &self.segments
    }

    /// Number of segments (at least one)
    pub fn len(&self) -> usize {
        self.segments.len()
    }

    /// Always false: even an empty transfer has one (empty) segment
    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    /// Iterate over the segments
    pub fn iter(&self) -> core::slice::Iter<'_, Segment<F>> {
        self.segments.iter()
    }
}

impl<'a, F> IntoIterator for &'a ChunkPlan<F> {
    type Item = &'a Segment<F>;
    type IntoIter = core::slice::Iter<'a, Segment<F>>;

    fn into_iter(self) -> Self::IntoIter {
        self.segments.iter()
    }
}

/// Split a transfer of `total_len` bytes into segments of at most
/// `max_segment` bytes
///
/// Produces `ceil(total_len / max_segment)` segments, or a single empty
/// segment when `total_len` is zero, so framing-only transactions still
/// reach the bus.
///
/// Effective options per segment:
/// - leading options survive on segment 0 only;
/// - trailing options are removed from every segment but the last, and the
///   last keeps whatever trailing options were requested, even when empty;
/// - continuation options are added to every segment after the first.
pub fn plan<F: Framing>(total_len: usize, max_segment: NonZeroUsize, flags: F) -> ChunkPlan<F> {
    let step = max_segment.get();
    let count = total_len.div_ceil(step).max(1);

    let segments = (0..count)
        .map(|index| {
            let begin = index * step;
            let end = begin.saturating_add(step).min(total_len);

            let mut effective = flags;
            if index > 0 {
                effective.remove(F::LEADING);
                effective.insert(F::CONTINUATION);
            }
            if index + 1 < count {
                effective.remove(F::TRAILING);
            }

            Segment {
                begin,
                end,
                flags: effective,
            }
        })
        .collect();

    ChunkPlan {
        total_len,
        segments,
    }
}

/// Issue one transport call per segment, stopping at the first failure
///
/// Returns the total byte count on success. On failure the count is the sum
/// of all completed segments plus the partial count of the failing one,
/// clamped to that segment's length.
pub(crate) fn execute<F, C>(plan: &ChunkPlan<F>, mut call: C) -> Result<usize, TransferError>
where
    F: Framing,
    C: FnMut(&Segment<F>) -> TransportResult,
{
    let mut done = 0usize;

    for (index, segment) in plan.iter().enumerate() {
        let requested = segment.len();
        log::trace!(
            "Segment {}/{}: [{:#x}, {:#x}) {:?}",
            index + 1,
            plan.len(),
            segment.begin,
            segment.end,
            segment.flags
        );

        match call(segment) {
            Ok(n) if n >= requested => done += requested,
            Ok(n) => {
                return Err(TransferError::ShortCount {
                    segment: index,
                    transferred: done + n,
                    requested: plan.total_len(),
                });
            }
            Err(e) => {
                return Err(TransferError::Failed {
                    segment: index,
                    transferred: done + e.transferred.min(requested),
                    status: e.status,
                });
            }
        }
    }

    Ok(done)
}
