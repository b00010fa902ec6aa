use crate::error::TrackerError;
use crate::state::Fix;
use tokio::sync::mpsc;

/// Seam over the platform positioning subsystem.
///
/// Fixes are delivered asynchronously over the sender handed to
/// [`begin_updates`](LocationSource::begin_updates). The method may be called
/// repeatedly; a later registration replaces the earlier one.
pub trait LocationSource: Send + Sync {
    /// Whether the process currently holds the positioning privilege.
    fn has_permission(&self) -> bool;

    /// Start streaming fixes into `sink`. Fails with
    /// [`TrackerError::PrivilegeDenied`] when the privilege is missing and
    /// [`TrackerError::AcquisitionStart`] when the subsystem rejects the
    /// request.
    fn begin_updates(&self, sink: mpsc::Sender<Fix>) -> Result<(), TrackerError>;

    /// Stop the fix stream. Safe to call when no stream is active.
    fn end_updates(&self);

    /// Most recent fix cached by the subsystem, if any.
    fn last_known_fix(&self) -> Option<Fix>;
}
