//! Conversational trip planner.
//!
//! A requirements-gathering workflow that extracts trip details from free
//! text, asks for what is missing, and produces a day-by-day itinerary.

pub mod config;
pub mod error;
pub mod llm;
pub mod planner;
pub mod tools;
