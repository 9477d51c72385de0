//! Host window used when running without a desktop shell

use std::collections::HashMap;
use std::sync::Mutex;

use crate::browser::context::HostWindow;
use crate::core::{ContextId, LayoutRect};

#[derive(Debug, Default)]
struct HostState {
    attached: Vec<ContextId>,
    bounds: HashMap<ContextId, LayoutRect>,
    auto_resize: HashMap<ContextId, bool>,
}

/// Fixed-size host that records attachment and layout
#[derive(Debug)]
pub struct HeadlessHost {
    content: LayoutRect,
    state: Mutex<HostState>,
}

impl HeadlessHost {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            content: LayoutRect::new(0, 0, width, height),
            state: Mutex::new(HostState::default()),
        }
    }

    fn with_state<R>(&self, f: impl FnOnce(&mut HostState) -> R) -> R {
        match self.state.lock() {
            Ok(mut guard) => f(&mut guard),
            Err(poisoned) => f(&mut poisoned.into_inner()),
        }
    }

    /// Contexts currently attached, in attachment order
    pub fn attached(&self) -> Vec<ContextId> {
        self.with_state(|s| s.attached.clone())
    }

    /// Last bounds applied to a context
    pub fn bounds_of(&self, context: ContextId) -> Option<LayoutRect> {
        self.with_state(|s| s.bounds.get(&context).copied())
    }
}

impl HostWindow for HeadlessHost {
    fn attach(&self, context: ContextId) {
        self.with_state(|s| {
            if !s.attached.contains(&context) {
                s.attached.push(context);
            }
        });
        tracing::debug!(context, "attached");
    }

    fn detach(&self, context: ContextId) {
        self.with_state(|s| s.attached.retain(|c| *c != context));
        tracing::debug!(context, "detached");
    }

    fn set_bounds(&self, context: ContextId, bounds: LayoutRect) {
        self.with_state(|s| s.bounds.insert(context, bounds));
        tracing::trace!(context, ?bounds, "bounds applied");
    }

    fn set_auto_resize(&self, context: ContextId, enabled: bool) {
        self.with_state(|s| s.auto_resize.insert(context, enabled));
    }

    fn content_bounds(&self) -> LayoutRect {
        self.content
    }
}
