pub mod dto;
pub mod listener;
pub mod use_case;
