//! Progress reporting for index builds.

/// Receives progress from [`crate::builder::build_from_store`].
///
/// The builder calls [`Self::set_total`] once with the number of chunks,
/// [`Self::inc`] after each chunk, and [`Self::finish`] with a summary.
pub trait ProgressCallback: Send + Sync {
    /// Number of chunks the build will process.
    fn set_total(&self, total: u64);

    /// Marks `delta` more chunks as done.
    fn inc(&self, delta: u64);

    /// Replaces the status text.
    fn set_message(&self, msg: String);

    /// Ends the build with a summary line.
    fn finish(&self, msg: String);
}

/// Discards progress, for library callers and tests.
pub struct NullProgress;

impl ProgressCallback for NullProgress {
    fn set_total(&self, _total: u64) {}
    fn inc(&self, _delta: u64) {}
    fn set_message(&self, _msg: String) {}
    fn finish(&self, _msg: String) {}
}
