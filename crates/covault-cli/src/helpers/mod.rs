//! Helper utilities shared across commands.

mod input;
mod parsing;

pub use input::{
    confirm_destructive, prompt_init_passphrase, prompt_passphrase, prompt_rotation_passphrase,
    read_secret, validate_passphrase,
};
pub use parsing::{
    parse_datetime, parse_id, resolve_category, resolve_client, resolve_group, resolve_tags,
};
