// Control plane: database bootstrap and diagnostics
pub mod control;
// Data plane: cache reads and writes
pub mod data;
