pub mod config;
pub mod decoder;
pub mod device;
pub mod display;
pub mod errors;
pub mod frame;
pub mod pacing;
pub mod segment;
pub mod session;
pub mod sink;
pub mod source;
pub mod supervisor;
pub mod upload;

pub use frame::{Frame, compose_side_by_side};
pub use source::FrameSource;
pub use supervisor::SourcePair;
