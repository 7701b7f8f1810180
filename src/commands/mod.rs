pub mod annotate;
pub mod compare;
pub mod fusion;
