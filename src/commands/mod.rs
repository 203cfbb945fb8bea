pub mod admin;
pub mod events;
pub mod general;
pub mod profile;
pub mod rating;

pub use admin::{backup, delete, disable, export, grant, logs, reset, update_photo};
pub use events::{delete_event, event, events};
pub use general::{cancel, help, info, ping, register, start};
pub use profile::{history, invite, profile};
pub use rating::{my_rank, rating};
