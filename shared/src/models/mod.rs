//! Domain models for the Farm Operations platform

mod alert;
mod crop;
mod farm;
mod finance;
mod inventory;
mod profile;
mod schedule;
mod task;

pub use alert::*;
pub use crop::*;
pub use farm::*;
pub use finance::*;
pub use inventory::*;
pub use profile::*;
pub use schedule::*;
pub use task::*;
