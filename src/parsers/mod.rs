//! Chat export parsers.
//!
//! Each parser implements the [`Parser`](crate::parser::Parser) trait.
//!
//! # Available Parsers
//!
//! - [`WhatsAppParser`] - Parses WhatsApp TXT exports (feature `whatsapp`)
//! - [`TelegramParser`] - Parses Telegram Desktop HTML exports (feature `telegram`)

#[cfg(feature = "telegram")]
mod telegram;
#[cfg(feature = "whatsapp")]
mod whatsapp;

#[cfg(feature = "telegram")]
pub use telegram::TelegramParser;
#[cfg(feature = "whatsapp")]
pub use whatsapp::WhatsAppParser;
