pub mod accessor;
pub mod bridge;
pub mod partial;
