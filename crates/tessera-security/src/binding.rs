// SPDX-FileCopyrightText: 2026 Tessera Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Execution contexts and the guards that bind a plugin identity to them.
//!
//! An [`ExecutionContext`] is an explicit value passed along with a unit of
//! work. It holds at most one bound plugin id. A [`BindingGuard`] releases its
//! binding exactly once, either through [`BindingGuard::unbind`] or on drop,
//! so early returns, errors and unwinding panics all clear the slot.

use std::sync::Arc;

use arc_swap::ArcSwapOption;
use tessera_core::TesseraError;
use tracing::trace;

/// A slot recording which plugin, if any, is executing on behalf of a task.
#[derive(Debug, Default)]
pub struct ExecutionContext {
    bound: ArcSwapOption<String>,
}

impl ExecutionContext {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// The plugin id bound right now, if any.
    pub fn bound_plugin(&self) -> Option<String> {
        self.bound.load_full().map(|id| id.as_str().to_owned())
    }

    pub fn is_bound(&self) -> bool {
        self.bound.load().is_some()
    }

    /// Whether `plugin_id` is the plugin bound right now.
    pub fn is_bound_to(&self, plugin_id: &str) -> bool {
        match &*self.bound.load() {
            Some(id) => id.as_str() == plugin_id,
            None => false,
        }
    }

    /// Bind `plugin_id` to this context. Fails if the slot is occupied.
    pub(crate) fn bind(self: &Arc<Self>, plugin_id: &str) -> Result<BindingGuard, TesseraError> {
        let token = Arc::new(plugin_id.to_string());
        let empty: Option<Arc<String>> = None;
        let previous = self.bound.compare_and_swap(&empty, Some(Arc::clone(&token)));
        if let Some(bound) = &*previous {
            return Err(TesseraError::BindingActive {
                bound: bound.as_str().to_owned(),
                requested: plugin_id.to_string(),
            });
        }
        trace!(plugin_id = %plugin_id, "execution context bound");
        Ok(BindingGuard {
            context: Arc::clone(self),
            token,
            released: false,
        })
    }
}

/// Holds a binding until released. Releasing only clears the slot if it
/// still holds this guard's binding.
#[derive(Debug)]
#[must_use = "dropping the guard releases the binding immediately"]
pub struct BindingGuard {
    context: Arc<ExecutionContext>,
    token: Arc<String>,
    released: bool,
}

impl BindingGuard {
    pub fn plugin_id(&self) -> &str {
        self.token.as_str()
    }

    pub fn context(&self) -> &Arc<ExecutionContext> {
        &self.context
    }

    /// Release the binding now.
    pub fn unbind(mut self) {
        self.release();
    }

    fn release(&mut self) {
        if self.released {
            return;
        }
        self.released = true;
        let current = Some(Arc::clone(&self.token));
        self.context.bound.compare_and_swap(&current, None);
        trace!(plugin_id = %self.token, "execution context released");
    }
}

impl Drop for BindingGuard {
    fn drop(&mut self) {
        self.release();
    }
}
