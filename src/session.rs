//! Tracking of resolutions in progress, used to detect circular dependencies.
//!
//! A [ResolutionSession] is created at the top-level `get` or instantiation
//! call and threaded through every nested resolution. Cloning shares the
//! stack, which is what nested resolutions within one branch want;
//! [fork](ResolutionSession::fork) snapshots it for branches which must not
//! see each other's pushes, e.g. sibling injected arguments or a getter
//! invoked long after the original call completed.

use crate::error::ResolutionError;
use itertools::Itertools;
use parking_lot::Mutex;
use std::fmt;
use std::sync::Arc;

/// A single entry on the resolution stack.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum ResolutionElement {
    /// A binding currently having its value produced.
    Binding(String),
    /// An injection site currently being resolved.
    Injection { class: String, site: String },
}

impl fmt::Display for ResolutionElement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Binding(key) => write!(f, "{key}"),
            Self::Injection { class, site } => write!(f, "{class}.{site}"),
        }
    }
}

/// Stack of bindings and injections being resolved within one top-level call.
#[derive(Clone, Default)]
pub struct ResolutionSession {
    stack: Arc<Mutex<Vec<ResolutionElement>>>,
}

impl ResolutionSession {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshots the current stack into an independent session. Pushes and
    /// pops on either session no longer affect the other.
    pub fn fork(&self) -> Self {
        Self {
            stack: Arc::new(Mutex::new(self.stack.lock().clone())),
        }
    }

    /// Pushes an element, failing with the full cycle path if the element is
    /// already being resolved. The returned guard pops the element when
    /// dropped, on all exit paths.
    pub fn push(&self, element: ResolutionElement) -> Result<SessionGuard, ResolutionError> {
        let mut stack = self.stack.lock();
        if stack.contains(&element) {
            let path = stack.iter().chain([&element]).join(" --> ");
            return Err(ResolutionError::CircularDependency { path });
        }

        stack.push(element.clone());
        drop(stack);

        Ok(SessionGuard {
            session: self.clone(),
            element,
        })
    }

    pub fn depth(&self) -> usize {
        self.stack.lock().len()
    }

    /// Textual form of the current stack, outermost entry first.
    pub fn current_path(&self) -> String {
        self.stack.lock().iter().join(" --> ")
    }
}

impl fmt::Debug for ResolutionSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ResolutionSession({})", self.current_path())
    }
}

/// Pops its element from the owning session on drop.
#[derive(Debug)]
pub struct SessionGuard {
    session: ResolutionSession,
    element: ResolutionElement,
}

impl Drop for SessionGuard {
    fn drop(&mut self) {
        let mut stack = self.session.stack.lock();
        if let Some(position) = stack.iter().rposition(|entry| entry == &self.element) {
            stack.remove(position);
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::error::ResolutionError;
    use crate::session::{ResolutionElement, ResolutionSession};

    #[test]
    fn should_pop_element_when_guard_drops() {
        let session = ResolutionSession::new();

        {
            let _guard = session
                .push(ResolutionElement::Binding("a".to_string()))
                .unwrap();
            assert_eq!(session.depth(), 1);
        }

        assert_eq!(session.depth(), 0);
    }

    #[test]
    fn should_detect_cycle_with_full_path() {
        let session = ResolutionSession::new();
        let _a = session
            .push(ResolutionElement::Binding("a".to_string()))
            .unwrap();
        let _b = session
            .push(ResolutionElement::Binding("b".to_string()))
            .unwrap();

        assert_eq!(
            session
                .push(ResolutionElement::Binding("a".to_string()))
                .unwrap_err(),
            ResolutionError::CircularDependency {
                path: "a --> b --> a".to_string()
            }
        );
    }

    #[test]
    fn should_distinguish_binding_and_injection_elements() {
        let session = ResolutionSession::new();
        let _binding = session
            .push(ResolutionElement::Binding("a".to_string()))
            .unwrap();

        assert!(session
            .push(ResolutionElement::Injection {
                class: "a".to_string(),
                site: "constructor[0]".to_string(),
            })
            .is_ok());
    }

    #[test]
    fn should_isolate_forked_sessions() {
        let session = ResolutionSession::new();
        let _a = session
            .push(ResolutionElement::Binding("a".to_string()))
            .unwrap();

        let fork = session.fork();
        let _b = fork
            .push(ResolutionElement::Binding("b".to_string()))
            .unwrap();

        assert_eq!(session.depth(), 1);
        assert_eq!(fork.depth(), 2);

        // entries live at fork time still count towards cycles in the fork
        assert!(fork
            .push(ResolutionElement::Binding("a".to_string()))
            .is_err());
    }
}
