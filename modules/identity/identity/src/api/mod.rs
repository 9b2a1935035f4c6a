//! HTTP/REST interface. Thin call-sites on the domain services; may
//! import the domain for orchestration, never the other way around.

pub mod rest;
