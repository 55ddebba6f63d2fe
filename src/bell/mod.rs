#[cfg(feature = "audio")]
pub mod audio;
pub mod player;
pub mod settings;
pub mod trigger;
