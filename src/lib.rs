//! Client core of the log console's search bar and authentication wizard.
//!
//! Time ranges are modelled in [`timerange`], rendered for display by
//! [`format`], and shaped into validation requests by [`validation`]. The
//! REST calls live in [`api`] and are driven off the UI thread by [`worker`].

pub mod api;
pub mod config;
pub mod datetime;
pub mod format;
pub mod login;
pub mod timerange;
pub mod validation;
pub mod worker;
