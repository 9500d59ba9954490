pub mod geo;
pub mod security;
pub mod slug;
