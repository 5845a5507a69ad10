//! `cw-generator`: consumes a [`cw_core::tone_queue::ToneQueue`], renders
//! tones to PCM samples with a shared slope envelope, and drives an
//! [`sink::AudioSink`] from a dedicated synthesis thread.

pub mod generator;
pub mod sink;

pub use generator::{Generator, GeneratorConfig};
pub use sink::AudioSink;

pub mod prelude {
    pub use crate::generator::{
        Generator, GeneratorConfig, DEFAULT_FREQUENCY_HZ, DEFAULT_GAP, DEFAULT_SLOPE_SHAPE,
        DEFAULT_SLOPE_US, DEFAULT_SPEED_WPM, DEFAULT_VOLUME_PCT, DEFAULT_WEIGHTING,
    };
    pub use crate::sink::AudioSink;
}
