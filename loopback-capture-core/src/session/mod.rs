pub mod recorder;
pub mod stop;
