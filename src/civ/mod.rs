// Icom CI-V protocol: frame codec, command table, mode table and transaction engine
pub mod commands;
pub mod engine;
pub mod frame;
pub mod mode;

pub use commands::{Command, CommandSpec, CommandTable, ReplyKind, ICOM_COMMANDS};
pub use engine::{EngineState, FailureReason, Reply, RetryPolicy, TransactionEngine};
pub use frame::{Frame, FrameDecoder, FrameError};
pub use mode::{Filter, Mode, OperatingMode};
