pub mod encode;
pub mod inspect;
pub mod keys;
pub mod monitor;
