// SPDX-FileCopyrightText: 2026 Tessera Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Capability gate handed to running plugin code.

use crate::capability::CapabilityRequest;
use crate::error::TesseraError;

/// Authorizes privileged requests on behalf of one bound plugin.
///
/// A denial must abort the privileged call at the call site; callers propagate
/// the `PermissionDenied` error and never retry.
pub trait CapabilityGate: Send + Sync {
    /// Check a request, returning `PermissionDenied` when it is not granted.
    fn check(&self, request: &CapabilityRequest) -> Result<(), TesseraError>;
}
