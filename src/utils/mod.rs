pub mod image;
pub mod middleware;
pub mod stomp;
pub mod validation;
