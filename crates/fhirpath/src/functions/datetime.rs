//! `today()`/`now()`/`timeOfDay()` (§6 supplemented features).
//!
//! These read the system clock through `chrono`, the same crate the lexer's
//! date/time literal grammar is modeled on, so the strings they produce are
//! always parseable by that same grammar.

use chrono::{Local, SecondsFormat};

pub fn today() -> String {
    Local::now().format("%Y-%m-%d").to_string()
}

pub fn now() -> String {
    Local::now().to_rfc3339_opts(SecondsFormat::Millis, false)
}

pub fn time_of_day() -> String {
    Local::now().format("%H:%M:%S%.3f").to_string()
}
