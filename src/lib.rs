//! Toolsmith: typed tools behind a validated HTTP execution runtime.
//!
//! A tool is a [`ToolHandler`](tools::ToolHandler) plus a
//! [`ToolSchema`](schema::ToolSchema) built with the field DSL in
//! [`schema`]. [`ToolRuntime`](tools::ToolRuntime) compiles the schema once,
//! then runs each request through auth, rate limiting, validation and a
//! timeout budget. [`server`] exposes the runtime over HTTP.

pub mod cli;
pub mod clock;
pub mod config;
pub mod docs;
pub mod error;
pub mod schema;
pub mod server;
pub mod testing;
pub mod tools;
pub mod validation;
