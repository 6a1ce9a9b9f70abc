//! `shelfmate_core`
//!
//! Core library for the platform-independent logic of Shelfmate. This library aims to provide a
//! crate that can be used by the HTTP server as well as any other front end, so that catalog
//! access, ranking and book reconciliation are implemented only once.

pub mod catalog;

pub mod database;

pub mod library;

pub mod preferences;

pub mod reconcile;

#[cfg(test)]
mod test_support;
