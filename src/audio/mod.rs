//! Audio normalization and per-request audio file handling.

mod convert;
mod lifecycle;

pub use convert::AudioConverter;
pub use lifecycle::{AudioLifecycle, AudioUpload, RecordingSession, SynthesizedAudio};
