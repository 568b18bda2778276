use crate::position::{Direction, Quantity, Range};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PlanError {
    #[error("Determination of disk size failed or disk has size zero.")]
    EmptyDevice,
    #[error("Block size must be at least one byte.")]
    ZeroBlockSize,
}

/// Absolute byte window `[min, max)` on the device. `max >= min` always holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TestWindow {
    pub min: u64,
    pub max: u64,
}

impl TestWindow {
    pub fn len(&self) -> u64 {
        self.max - self.min
    }

    pub fn is_empty(&self) -> bool {
        self.max == self.min
    }
}

/// One unit of work for the block tester.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Block {
    pub offset: u64,
    pub len: u64,
}

/// Everything computed up front for a single run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Plan {
    pub disksize: u64,
    pub origin: i64,
    pub testrange: i64,
    pub direction: Direction,
    pub window: TestWindow,
    pub block_size: u64,
}

impl Plan {
    pub fn block_count(&self) -> u64 {
        self.window.len().div_ceil(self.block_size)
    }

    /// Blocks tiling the window in increasing offset order. The last block is
    /// truncated to what is left of the window.
    pub fn blocks(&self) -> impl Iterator<Item = Block> + '_ {
        (0..self.block_count()).map(move |idx| {
            let offset = self.window.min + idx * self.block_size;
            let len = (self.window.max - offset).min(self.block_size);
            Block { offset, len }
        })
    }
}

/// Resolve `origin` and `range` against a disk of `disksize` bytes and compute
/// the window to test.
///
/// With `align` set the lower bound is rounded down and the upper bound up to
/// a multiple of `block_size`. Rounding up happens after clamping to the disk
/// size, so the aligned window may reach past the end of the device.
pub fn plan(
    disksize: u64,
    origin: &Quantity,
    range: &Range,
    block_size: u64,
    align: bool,
) -> Result<Plan, PlanError> {
    if disksize == 0 {
        return Err(PlanError::EmptyDevice);
    }
    if block_size == 0 {
        return Err(PlanError::ZeroBlockSize);
    }

    let origin_bytes = origin.resolve(disksize);
    let testrange = range.quantity.resolve(disksize);
    let (o, r, size) = (origin_bytes as i128, testrange as i128, disksize as i128);

    let (mut min, mut max) = match range.direction {
        Direction::Backward => ((o - r).max(0), o.min(size)),
        Direction::Forward => (o.max(0), (o + r).min(size)),
        Direction::Both => ((o - r).max(0), (o + r).min(size)),
    };

    if align {
        let bs = block_size as i128;
        min = min.div_euclid(bs) * bs;
        max = (max + bs - 1).div_euclid(bs) * bs;
    }

    let min = min as u64;
    let max = if max > min as i128 { max as u64 } else { min };

    Ok(Plan {
        disksize,
        origin: origin_bytes,
        testrange,
        direction: range.direction,
        window: TestWindow { min, max },
        block_size,
    })
}
