//! Studytrack - student attendance and productivity tracking
//!
//! This library provides the core functionality for the Studytrack
//! attendance system: daily check-in/check-out sessions, end-of-day
//! autoclose sweeps, productivity analytics and admin reporting.

pub mod api;
pub mod config;
pub mod db;
pub mod models;
pub mod services;
pub mod time;
