pub mod chain;
pub mod postprocess;
pub mod providers;
pub mod templates;

pub use chain::{
    Generated, GenerationChain, GenerationRequest, GenerationSource, UNCONFIGURED_PLACEHOLDER,
};
pub use postprocess::{enforce_length, MAX_POST_LENGTH};
pub use providers::{InferenceApiProvider, OpenAiProvider};
