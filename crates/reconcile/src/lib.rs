pub mod codec;
pub mod infer;
pub mod session;

pub use codec::{decode, encode, OccupancySnapshot, SnapshotFormatError, RAW_SNAPSHOT_LEN};
pub use infer::{infer, InferredMove};
pub use session::{Reconciler, ReconcilerConfig, SessionOutcome};
