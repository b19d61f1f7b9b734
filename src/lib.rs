//! Live Chat - One-to-one chat and presence over server-sent event streams
//!
//! Every logged-in user holds one long-lived event stream. Chat messages and
//! presence announcements travel through a pub/sub broker and are written to
//! the streams of the users they concern. Clients fold the stream into two
//! pure reducers: a per-peer message box and the set of online users.

pub mod adapters;
pub mod application;
pub mod config;
pub mod domain;
pub mod ports;
