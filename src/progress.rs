//! Progress reporting for batch runs.
//!
//! The library never prints; callers that want visible progress (the CLI,
//! a TUI, a log shipper) implement [`BatchProgress`] and pass it through
//! [`crate::batch::BatchOptions`]. Callbacks fire from the batch driver's
//! single processing thread, in file order.

use crate::batch::FileStatus;
use std::path::Path;

/// Observer for batch processing events.
pub trait BatchProgress: Send + Sync {
    /// A batch is starting with `total` discovered files.
    fn on_batch_start(&self, total: usize) {
        let _ = total;
    }

    /// Processing of one file is about to begin.
    fn on_file_start(&self, path: &Path, index: usize, total: usize) {
        let _ = (path, index, total);
    }

    /// One file finished with the given status.
    fn on_file_done(&self, path: &Path, status: &FileStatus) {
        let _ = (path, status);
    }

    /// The batch is complete.
    fn on_batch_complete(&self, produced: usize, skipped: usize, errored: usize) {
        let _ = (produced, skipped, errored);
    }
}
