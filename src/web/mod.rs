//! Server-rendered web interface
//!
//! Login and sign-up, the team views (events, calendar, members, settings)
//! and the admin panel with the live log viewer.

mod access;
mod account;
pub mod admin;
pub mod auth;
mod events;
mod members;
pub mod pages;
pub mod server;

pub use auth::{create_session_store, SharedSessionStore};
pub use server::{start_web_server, AppState};
