/// Local filesystem helpers used by the file-backed creators.
pub mod fs;
