pub mod image_codec;
pub mod prompt_builder;
pub mod sampling_estimator;
