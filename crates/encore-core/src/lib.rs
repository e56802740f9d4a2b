pub mod app;
pub mod audio_link;
pub mod challenge;
pub mod clock;
pub mod falling_notes;
pub mod ipc;
pub mod playback_engine;
pub mod replication;
pub mod scheduler;
pub mod session;

pub use app::*;
pub use audio_link::*;
pub use challenge::*;
pub use clock::*;
pub use falling_notes::*;
pub use ipc::*;
pub use playback_engine::*;
pub use replication::*;
pub use scheduler::*;
pub use session::*;
