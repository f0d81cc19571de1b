mod operations_model;
mod operations_service;
mod operations_traits;


pub use operations_model::*;
pub use operations_service::OperationService;
pub use operations_traits::{OperationRepositoryTrait, OperationServiceTrait};
