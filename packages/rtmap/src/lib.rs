pub mod channel;
pub mod config;
pub mod error;
pub mod mapper;
pub mod pool;
pub mod replay;
pub mod scheduler;
pub mod source;
pub mod store;
pub mod testing;
pub mod threaded;
pub mod types;

pub use channel::{ChannelState, ReadPhase};
pub use config::{ActiveChannels, RtMapConfig};
pub use error::{MapError, Result};
pub use mapper::{ChunkMapper, MapStep, MapperFactory};
pub use pool::{MapPool, Submission};
pub use replay::{ReplayAlignment, ReplayMapper, ReplayTable};
pub use scheduler::{MapScheduler, SchedulerStats};
pub use source::{JsonlReadSource, ReadSource, VecReadSource};
pub use store::LoadSummary;
pub use threaded::ThreadedMapPool;
pub use types::*;
