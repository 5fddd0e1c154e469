//! Legos: reusable composite blocks for known protocol fragments.
//!
//! A lego is expanded with [`Request::push_lego`](crate::Request::push_lego),
//! which opens a uniquely named block, lets the lego declare its fields using
//! the ordinary construction API, and checks that it closed everything it
//! opened.

pub mod dnp3;

use crate::error::SpecError;
use crate::request::Request;
use std::str::FromStr;

pub use dnp3::Dnp3Options;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Lego {
    /// DNP3 link-layer framing around an application payload.
    Dnp3(Dnp3Options),
}

impl FromStr for Lego {
    type Err = SpecError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "dnp3" => Ok(Lego::Dnp3(Dnp3Options::default())),
            _ => Err(SpecError::invalid(format!("unknown lego type '{}'", s))),
        }
    }
}

impl Lego {
    pub fn kind(&self) -> &'static str {
        match self {
            Lego::Dnp3(_) => "dnp3",
        }
    }

    /// Declare the lego's block `name` (and everything inside it) on `req`.
    pub(crate) fn build(&self, req: &mut Request, name: &str, payload: &[u8]) -> Result<(), SpecError> {
        match self {
            Lego::Dnp3(opts) => dnp3::build(req, name, payload, opts),
        }
    }
}
