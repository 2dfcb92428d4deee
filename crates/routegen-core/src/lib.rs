//! Routegen Core Library
//!
//! This library synthesizes HTTP request-binding plans for annotated
//! service interfaces: server-direction plans that read, convert and
//! validate request values, and mirror client-direction plans that
//! serialize outbound calls.

pub mod classify;
pub mod client;
pub mod config;
pub mod convert;
pub mod decode;
pub mod emit;
pub mod error;
pub mod flatten;
pub mod generate;
pub mod invocation;
pub mod metadata;
pub mod path_template;
pub mod plan;
pub mod server;
pub mod utils;

pub use crate::{
    client::{ClientCall, ClientSerializer},
    config::Config,
    convert::ConversionSelector,
    error::{Error, Position, Result},
    generate::{generate, GeneratedInterface},
    invocation::{FrameworkKind, InvocationCatalog},
    metadata::InterfaceDescriptor,
    plan::{select_shape, BindingPlan, BindingShape},
    server::{BindingPlanSynthesizer, MethodBinding},
};

/// Result type for routegen synthesis operations
pub type RoutegenResult<T> = std::result::Result<T, Error>;
