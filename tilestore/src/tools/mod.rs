pub mod fragment;
pub mod path;
pub mod probe;
pub mod read;
