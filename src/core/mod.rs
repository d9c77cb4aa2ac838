pub mod item;

pub mod sink;
