pub mod barrier;
pub mod block;
pub mod machine;

pub use barrier::CompactionBarrier;
pub use block::{Block, BlockId, BlockKind, BlockLedger};
pub use machine::{Phase, SessionMachine, Step};
