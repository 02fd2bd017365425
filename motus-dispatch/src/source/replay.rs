use std::path::Path;

use async_trait::async_trait;
use motus_edge::{BusError, Transfer, TransferSource};
use tracing::info;

use super::{InterruptLine, Signal};
use crate::RunError;

/// Streams a recorded FIFO dump as if it were read off the bus.
pub struct ReplaySource {
    data: Vec<u8>,
    pos: usize,
    chunk_sizes: Vec<usize>,
    next_chunk: usize,
}

impl ReplaySource {
    /// Zero-sized chunks are dropped. An empty list means one page per read.
    pub fn new(data: Vec<u8>, chunk_sizes: &[usize]) -> Self {
        let mut chunk_sizes: Vec<usize> = chunk_sizes.iter().copied().filter(|&n| n > 0).collect();
        if chunk_sizes.is_empty() {
            chunk_sizes.push(usize::MAX);
        }

        Self {
            data,
            pos: 0,
            chunk_sizes,
            next_chunk: 0,
        }
    }

    pub async fn load(path: &Path, chunk_sizes: &[usize]) -> Result<Self, RunError> {
        let data = tokio::fs::read(path)
            .await
            .map_err(|source| RunError::Replay {
                path: path.to_path_buf(),
                source,
            })?;

        info!(path = ?path, bytes = data.len(), "Loaded FIFO dump");
        Ok(Self::new(data, chunk_sizes))
    }

    pub fn remaining(&self) -> usize {
        self.data.len() - self.pos
    }
}

impl TransferSource for ReplaySource {
    fn fill(&mut self, region: &mut [u8]) -> Result<Transfer, BusError> {
        let chunk = self.chunk_sizes[self.next_chunk];
        self.next_chunk = (self.next_chunk + 1) % self.chunk_sizes.len();

        let n = chunk.min(region.len()).min(self.remaining());
        region[..n].copy_from_slice(&self.data[self.pos..self.pos + n]);
        self.pos += n;

        Ok(Transfer {
            written: n,
            pending: self.remaining(),
        })
    }
}

#[async_trait(?Send)]
impl InterruptLine for ReplaySource {
    async fn wait_ready(&mut self) -> Signal {
        if self.remaining() == 0 {
            Signal::Closed
        } else {
            Signal::Ready
        }
    }
}
