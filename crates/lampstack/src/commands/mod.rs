pub mod graph;
pub mod init;
pub mod synth;
pub mod validate;
