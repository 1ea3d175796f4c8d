pub mod rid;
pub mod rwlatch;
