//! Core use-case services.
//!
//! # Responsibility
//! - Orchestrate repository calls into matching and lifecycle passes.
//! - Keep scheduler and CLI layers decoupled from storage details.

pub mod diary_service;
pub mod lifecycle_service;
pub mod matching_service;
pub mod message_service;
pub mod room_factory;
