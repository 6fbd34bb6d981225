pub mod config;
pub mod error;
pub mod event;
pub mod normalize;
pub mod traits;
pub mod types;

pub use config::AppConfig;
pub use error::{Result, SyllabotError};
pub use event::{AgentEvent, EventBus};
pub use types::*;
