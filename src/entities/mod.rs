pub mod climate;
pub mod event;
