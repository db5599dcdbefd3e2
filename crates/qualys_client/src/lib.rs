//! Client for the Qualys Vulnerability Management, Web Application Scanning
//! and Asset Management APIs.
//!
//! Every request runs through [`qualys_rate_limit::RequestExecutor`], so the
//! subscription's quota and concurrency cap are honored across all calls a
//! client (and its clones) make. Collections are exposed as streams that page
//! through results lazily.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

mod client;
mod config;
mod lenient;
mod models;
mod request;
mod response;
mod xml;

pub use client::QualysClient;
pub use config::{ClientConfig, ClientConfigBuilder};
pub use models::{
    Cve, Cvss, Detection, FindingWebApp, HostAsset, HostDetections, Vulnerability, WebApp,
    WebAppFinding,
};
pub use request::{Operator, ServiceRequest};
pub use response::{ResponseErrorDetails, ServiceResponse};
