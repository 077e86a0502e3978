//! # Page objects
//!
//! [`BasePage`] is the element interaction layer; every other page object is
//! a thin set of locators and screen-level operations on top of it.
//!
//! ## Module structure
//! - `base`: timeout-bounded element verbs with sentinel results
//! - `login`: login form, submit fallbacks and outcome detection
//! - `home`: readiness indicators and the language switcher
//! - `catalog`: the ng2-smart-table catalogue screens

pub mod base;
pub mod login;
pub mod home;
pub mod catalog;

pub use base::BasePage;
pub use catalog::{CatalogPage, CatalogScreen, CellKind, Column, FilterField, ScreenDescriptor, TableRow};
pub use home::{HomePage, HomeReadiness};
pub use login::{LoginOutcome, LoginPage};
