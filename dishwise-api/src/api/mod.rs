//! API endpoint handlers

pub mod dishes;
pub mod health;
pub mod progress;
pub mod status;
pub mod vision;

pub use dishes::dish_routes;
pub use health::health_routes;
pub use progress::progress_routes;
pub use status::status_routes;
pub use vision::detect_text_routes;
