pub mod audio;
pub mod clock;
pub mod model;
pub mod note;
pub mod playback;
pub mod storage;
pub mod types;

pub use audio::*;
pub use clock::*;
pub use model::*;
pub use note::*;
pub use playback::*;
pub use storage::*;
pub use types::*;
