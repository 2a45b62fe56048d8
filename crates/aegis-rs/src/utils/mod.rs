pub mod duration_fmt;
pub mod keys;
pub mod path;
