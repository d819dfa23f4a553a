extern crate self as form_schema;

pub mod form;
pub mod prelude;
