pub mod capture;
pub mod monitor;
pub mod window;

pub use capture::{CapturedFrame, FrameSource, StaticFrameSource};
pub use monitor::EngagementMonitor;
pub use window::{EngagementAlert, EngagementClass, EngagementWindow};
