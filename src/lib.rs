//! mediapub - resumable media package publication
//!
//! Drives dropped media packages (tar archives with a descriptor, or bare
//! mp4 files) through a persisted linear state machine: copy, extract,
//! validate, upload to a media platform, stage slides and timecodes in a
//! public directory, then clean up.

pub mod cli;
pub mod config;
pub mod error;
pub mod fs;
pub mod logging;
pub mod model;
pub mod package;
pub mod provider;
pub mod publisher;
pub mod setup;
pub mod store;
pub mod timecode;
