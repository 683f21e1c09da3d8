//! Request handlers.

pub mod clips;
pub mod events;
pub mod health;
pub mod jobs;
pub mod video_info;

pub use clips::*;
pub use events::*;
pub use health::*;
pub use jobs::*;
pub use video_info::*;
