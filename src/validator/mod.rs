// src/validator/mod.rs
mod check;
mod checker;
mod probe;

pub use check::{CheckResult, EndpointCheck};
pub use checker::{EndpointValidator, ExhaustedCheck, ValidationError};
pub use probe::{HttpProbe, ProbeError, ProbeResponse, ReqwestProbe};
