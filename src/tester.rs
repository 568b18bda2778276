//! Destructive but restoring per-block test.
//!
//! Every block goes through the same sequence: read and keep the original
//! content, overwrite it with random bytes, read it back, compare, and write
//! the original content back. The original is always captured in full before
//! anything is written, and once captured it is written back whatever the
//! comparison or a later I/O step reports.

use std::io;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use rand::rngs::ThreadRng;
use rand::RngCore;
use serde_json::json;

use crate::device::BlockDevice;
use crate::format::human_size;
use crate::plan::{Block, Plan, TestWindow};

#[derive(Debug, thiserror::Error)]
pub enum TestError {
    #[error("I/O error at offset {offset}: {source}")]
    Io {
        offset: u64,
        #[source]
        source: io::Error,
    },
    #[error("Tried to read {expected} bytes at offset {offset}, but got {actual}.")]
    ShortRead { offset: u64, expected: usize, actual: usize },
    #[error(
        "Deviation at offset {offset} ({}): Cannot guarantee integrity of original content, block readback failed.",
        human_size(.offset)
    )]
    Deviation { offset: u64 },
    #[error("Interrupted before offset {offset}; every tested block was restored.")]
    Interrupted { offset: u64 },
}

pub type Result<T> = std::result::Result<T, TestError>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockOutcome {
    Passed,
    /// Read-back differed from what was written. The block was restored.
    Deviation,
}

/// Reported to the run observer right before a block is tested.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlockProgress {
    pub index: u64,
    pub count: u64,
    pub block: Block,
}

impl BlockProgress {
    pub fn percent_done(&self) -> f64 {
        self.index as f64 / self.count as f64 * 100.0
    }
}

#[derive(Debug, Clone)]
pub struct RunSummary {
    pub disksize: u64,
    pub window: TestWindow,
    pub block_size: u64,
    pub blocks_tested: u64,
    pub bytes_tested: u64,
    pub elapsed: Duration,
}

impl RunSummary {
    pub fn to_json(&self) -> serde_json::Value {
        json!({
            "disk_size": self.disksize,
            "window_min": self.window.min,
            "window_max": self.window.max,
            "block_size": self.block_size,
            "blocks_tested": self.blocks_tested,
            "bytes_tested": self.bytes_tested,
            "elapsed_seconds": self.elapsed.as_secs_f64(),
        })
    }
}

/// Random overwrite payload, kept while consecutive blocks share a length.
#[derive(Debug, Default)]
struct RandomBlock {
    buf: Vec<u8>,
    refreshes: u64,
}

impl RandomBlock {
    fn for_len<R: RngCore>(&mut self, rng: &mut R, len: usize) -> &[u8] {
        if self.buf.len() != len || self.refreshes == 0 {
            self.buf.resize(len, 0);
            rng.fill_bytes(&mut self.buf);
            self.refreshes += 1;
        }
        &self.buf
    }
}

pub struct BlockTester<D, R = ThreadRng> {
    device: D,
    rng: R,
    pattern: RandomBlock,
    original: Vec<u8>,
    readback: Vec<u8>,
    device_size: Option<u64>,
}

impl<D: BlockDevice> BlockTester<D, ThreadRng> {
    pub fn new(device: D) -> Self {
        BlockTester::with_rng(device, rand::thread_rng())
    }
}

impl<D: BlockDevice, R: RngCore> BlockTester<D, R> {
    pub fn with_rng(device: D, rng: R) -> Self {
        BlockTester {
            device,
            rng,
            pattern: RandomBlock::default(),
            original: Vec::new(),
            readback: Vec::new(),
            device_size: None,
        }
    }

    pub fn device(&self) -> &D {
        &self.device
    }

    pub fn into_device(self) -> D {
        self.device
    }

    /// How many times a fresh random payload had to be generated.
    pub fn pattern_refreshes(&self) -> u64 {
        self.pattern.refreshes
    }

    /// Test a single block and restore its content.
    ///
    /// A short read of the original content aborts before anything is
    /// written. Blocks reaching past the end of the device are reported as
    /// such a short read without buffering them. Any failure after that point
    /// still writes the original back before the error is returned.
    pub fn test_block(&mut self, block: Block) -> Result<BlockOutcome> {
        let offset = block.offset;
        let len = block.len as usize;

        let device_size = self.device_size(offset)?;
        if offset.saturating_add(block.len) > device_size {
            return Err(TestError::ShortRead {
                offset,
                expected: len,
                actual: device_size.saturating_sub(offset) as usize,
            });
        }

        self.original.resize(len, 0);
        read_full(&mut self.device, offset, &mut self.original)?;

        let compared = self.overwrite_and_verify(offset, len);
        let restored = self
            .device
            .write_at(offset, &self.original)
            .map_err(|source| TestError::Io { offset, source });

        match (compared, restored) {
            (Err(e), _) => Err(e),
            (Ok(_), Err(e)) => Err(e),
            (Ok(true), Ok(())) => Ok(BlockOutcome::Passed),
            (Ok(false), Ok(())) => Ok(BlockOutcome::Deviation),
        }
    }

    fn device_size(&mut self, offset: u64) -> Result<u64> {
        if let Some(size) = self.device_size {
            return Ok(size);
        }
        let size = self.device.size().map_err(|source| TestError::Io { offset, source })?;
        self.device_size = Some(size);
        Ok(size)
    }

    fn overwrite_and_verify(&mut self, offset: u64, len: usize) -> Result<bool> {
        let pattern = self.pattern.for_len(&mut self.rng, len);
        self.device
            .write_at(offset, pattern)
            .map_err(|source| TestError::Io { offset, source })?;

        self.readback.resize(len, 0);
        read_full(&mut self.device, offset, &mut self.readback)?;
        Ok(self.readback.as_slice() == pattern)
    }

    /// Test every block of `plan` in order, stopping at the first deviation.
    ///
    /// `stop` is checked between blocks, never inside one. `on_block` sees
    /// each block right before it is tested.
    pub fn run<F>(&mut self, plan: &Plan, stop: &AtomicBool, mut on_block: F) -> Result<RunSummary>
    where
        F: FnMut(BlockProgress),
    {
        let start = Instant::now();
        let count = plan.block_count();
        let mut summary = RunSummary {
            disksize: plan.disksize,
            window: plan.window,
            block_size: plan.block_size,
            blocks_tested: 0,
            bytes_tested: 0,
            elapsed: Duration::ZERO,
        };

        for (index, block) in plan.blocks().enumerate() {
            if stop.load(Ordering::SeqCst) {
                return Err(TestError::Interrupted { offset: block.offset });
            }
            on_block(BlockProgress { index: index as u64, count, block });
            match self.test_block(block)? {
                BlockOutcome::Passed => {
                    summary.blocks_tested += 1;
                    summary.bytes_tested += block.len;
                }
                BlockOutcome::Deviation => {
                    return Err(TestError::Deviation { offset: block.offset });
                }
            }
        }

        summary.elapsed = start.elapsed();
        Ok(summary)
    }
}

fn read_full<D: BlockDevice>(device: &mut D, offset: u64, buf: &mut [u8]) -> Result<()> {
    let actual = device
        .read_at(offset, buf)
        .map_err(|source| TestError::Io { offset, source })?;
    if actual != buf.len() {
        return Err(TestError::ShortRead { offset, expected: buf.len(), actual });
    }
    Ok(())
}
