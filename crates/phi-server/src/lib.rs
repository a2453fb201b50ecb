// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! PHI access control and audit engine.
//!
//! Request handlers build an [`IdentityContext`], pass it through
//! [`AccessGate`] before reading patient data, and hand the completed request
//! to [`PhiEngine::finish_request`] for auditing.

pub mod engine;
pub mod error;
pub mod gate;
pub mod telemetry;

pub use engine::{bootstrap, build_sinks, PhiEngine};
pub use error::{Result, ServerError};
pub use gate::AccessGate;
pub use telemetry::init_tracing;

pub use phi_server_auth::IdentityContext;
