use core::fmt;

/// Snapshot of the allocator counters
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SpaceStats {
    pub low: usize,
    pub high: usize,
    pub active_pages: usize,
    /// Active pages whose chunks were all freed
    pub zero_chunk_pages: usize,
    pub free_pages: usize,
    pub chunks: usize,
    pub holes: usize,
    /// Bytes handed out, excluding headers
    pub allocated: usize,
}

impl SpaceStats {
    /// Pages in the region, active or free
    pub fn total_pages(&self) -> usize {
        self.active_pages + self.free_pages
    }
}

impl fmt::Display for SpaceStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "heap [{:#x}, {:#x})", self.low, self.high)?;
        writeln!(
            f,
            "  pages: {} active ({} empty), {} free",
            self.active_pages, self.zero_chunk_pages, self.free_pages
        )?;
        write!(
            f,
            "  chunks: {} live, {} holes, {} bytes allocated",
            self.chunks, self.holes, self.allocated
        )
    }
}
