pub mod action;
pub mod app;
pub mod clock;
pub mod context;
pub mod session;
