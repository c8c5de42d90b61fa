// Content descriptors, facades and the content state store
pub mod content;

// Broadcaster, play events and metrics
pub mod state;

// HTTP and WebSocket APIs
pub mod api;

// Subscription registry, wire protocol and connection sessions
pub mod subscription;

// Display-side reconciler and connection loop
pub mod client;

// TOML configuration and environment overrides
pub mod config;
