pub mod builtin;
pub mod chain;
pub mod error;
pub mod pipeline;
pub mod registry;
pub mod response;
pub mod traits;

pub use chain::Pipeline;
pub use error::MiddlewareError;
pub use pipeline::{PipelineBuilder, Stage};
pub use registry::{MiddlewareRegistry, StageFactory, StageOptions};
pub use response::handle_middleware_error;
pub use traits::{Flow, Middleware, Phase};
