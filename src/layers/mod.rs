pub mod style;
pub mod sync;

pub use style::{BoundaryStyle, Color};
pub use sync::{DrawnLayerHandle, LayerSyncManager, SyncOutcome, SyncStats};
