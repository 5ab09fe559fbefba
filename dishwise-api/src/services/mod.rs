//! Application services hosted by the API process

pub mod status;
pub mod submit;

pub use status::{StatusPayload, StatusResolver};
pub use submit::{AcceptedInfo, DishSubmitter, SubmitError};
