//! examples of usage of RustedSITforC
/// formula parsing, fitting, identification demo and the parallel batch driver
pub mod identification_examples;
