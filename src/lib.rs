//! # Shop Bot
//!
//! Backend for multi-tenant Telegram shop bots: owners register a bot and a
//! catalog, buyers browse and fill a cart in chat, pay in crypto through a
//! NOWPayments-compatible processor, then give a delivery address and a note.
//! The owner is paid out once the order is complete.

pub mod admin;
pub mod bot;
pub mod cart;
pub mod catalog;
pub mod checkout;
pub mod circuit_breaker;
pub mod config;
pub mod currency_cache;
pub mod db;
pub mod dialogue;
pub mod errors;
pub mod localization;
pub mod order_lifecycle;
pub mod payments;
pub mod payout;
pub mod shop_model;
pub mod store;
pub mod web;
