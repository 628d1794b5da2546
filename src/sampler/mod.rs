pub mod pipeline;

pub use pipeline::SamplerPipeline;
