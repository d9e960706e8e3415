//! # Image Generation Telegram Bot
//!
//! A Telegram bot and Mini App HTTP API for AI image generation. Users browse
//! categories and trending prompts, submit prompts, and buy image credits
//! recorded in an append-only ledger.

pub mod api;
pub mod bot;
pub mod config;
pub mod db;
pub mod deposit;
pub mod dialogue;
pub mod errors;
pub mod generation;
pub mod ledger;
pub mod localization;
pub mod models;
pub mod seed;
pub mod storage;
