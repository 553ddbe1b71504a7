/// Fence trait - monotonically increasing GPU completion counter

use std::any::Any;
use crate::error::Result;

/// GPU fence
///
/// Values are signaled from the queue with `GraphicsDevice::signal()`.
pub trait Fence: Send + Sync {
    /// Highest value the GPU has completed
    fn completed_value(&self) -> Result<u64>;

    /// Block the calling thread until the completed value reaches `value`
    ///
    /// There is no timeout.
    fn wait(&self, value: u64) -> Result<()>;

    fn as_any(&self) -> &dyn Any;
}
