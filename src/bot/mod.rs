/// Outbound Telegram API seam
pub mod api;
/// Explicit handler context (channel, owners, assets)
pub mod context;
/// Delayed follow-up scheduling
pub mod followup;
/// Subscription gate handlers
pub mod gate;
/// Command definitions and update glue helpers
pub mod handlers;
/// User-facing texts and keyboards
pub mod views;

pub use api::{ApiError, ChannelGateApi, TelegramGate};
pub use context::GateContext;
pub use followup::{FollowUpJob, FollowUpScheduler};
