// Output module - destinations shipped with the crate
//
// Physical device transports implement the destination trait out of tree;
// what lives here is the file sink used for diagnosis and regression
// capture.

mod file_output;

pub use file_output::{FileOutput, FileOutputError};
