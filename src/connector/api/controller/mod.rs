pub mod ask_controller;
pub mod health_controller;

pub use ask_controller::ask;
pub use health_controller::health;
