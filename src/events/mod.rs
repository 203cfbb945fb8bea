pub mod guild;
pub mod interaction;
pub mod message;

pub use guild::{
    handle_guild_create, handle_invite_create, handle_member_add, handle_member_remove,
};
pub use interaction::handle_component;
pub use message::handle_message;
