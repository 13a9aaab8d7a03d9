pub mod context;
pub mod factory;
pub mod gateway;
pub mod handlers;
pub mod processor;
pub mod registry;
pub mod resolver;
pub mod result;

pub use context::PaymentContext;
pub use factory::HandlerFactory;
pub use gateway::{GatewayProvider, PaymentGateway};
pub use handlers::PaymentHandler;
pub use processor::{PaymentProcessor, PipelineError};
pub use registry::HandlerRegistry;
pub use resolver::{GatewayResolver, AGENT_HANDLER_ID};
pub use result::{PaymentResult, PrepareResult};
