//! Explicit ambient context for queries.
//!
//! A [`ScopeStack`] holds immutable [`Scope`] frames. Pushing a frame returns
//! a [`ScopeGuard`] that pops it again when dropped, so nested blocks restore
//! the outer scope on every exit path.

use std::ops::{Deref, DerefMut};
use std::sync::Arc;

use crate::query::{Properties, PropertyValue};
use crate::resource::ProjectRef;

/// One immutable frame of ambient context.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Scope {
    project: Option<Arc<ProjectRef>>,
    properties: Properties,
}

impl Scope {
    pub fn with_project(mut self, project: ProjectRef) -> Self {
        self.project = Some(Arc::new(project));
        self
    }

    /// Merge properties into this frame; later keys override earlier ones.
    pub fn with_properties<I, K, V>(mut self, properties: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<PropertyValue>,
    {
        self.properties
            .extend(properties.into_iter().map(|(k, v)| (k.into(), v.into())));
        self
    }

    pub fn project(&self) -> Option<&ProjectRef> {
        self.project.as_deref()
    }

    pub fn properties(&self) -> &Properties {
        &self.properties
    }
}

/// Stack of scope frames. The bottom frame is always present.
#[derive(Debug, Clone)]
pub struct ScopeStack {
    frames: Vec<Scope>,
}

impl Default for ScopeStack {
    fn default() -> Self {
        Self::new()
    }
}

impl ScopeStack {
    pub fn new() -> Self {
        Self {
            frames: vec![Scope::default()],
        }
    }

    /// The innermost frame.
    pub fn current(&self) -> &Scope {
        // The bottom frame is never popped.
        &self.frames[self.frames.len() - 1]
    }

    pub fn depth(&self) -> usize {
        self.frames.len()
    }

    /// Push a frame whose project is `project`; properties are inherited.
    pub fn using_project(&mut self, project: ProjectRef) -> ScopeGuard<'_> {
        let frame = self.current().clone().with_project(project);
        self.push(frame)
    }

    /// Push a frame with `properties` merged over the current ones.
    pub fn using_properties<I, K, V>(&mut self, properties: I) -> ScopeGuard<'_>
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<PropertyValue>,
    {
        let frame = self.current().clone().with_properties(properties);
        self.push(frame)
    }

    fn push(&mut self, frame: Scope) -> ScopeGuard<'_> {
        self.frames.push(frame);
        ScopeGuard { stack: self }
    }
}

/// Pops its frame on drop. Derefs to the stack so scopes can nest.
#[must_use = "the scope is popped as soon as the guard is dropped"]
#[derive(Debug)]
pub struct ScopeGuard<'a> {
    stack: &'a mut ScopeStack,
}

impl Deref for ScopeGuard<'_> {
    type Target = ScopeStack;

    fn deref(&self) -> &ScopeStack {
        self.stack
    }
}

impl DerefMut for ScopeGuard<'_> {
    fn deref_mut(&mut self) -> &mut ScopeStack {
        self.stack
    }
}

impl Drop for ScopeGuard<'_> {
    fn drop(&mut self) {
        if self.stack.frames.len() > 1 {
            self.stack.frames.pop();
        }
    }
}
