//! Host page context and interaction surface.
//!
//! The tracking layer never touches a real document. It reads the current
//! location through [`PageContext`] and registers listeners through
//! [`InteractionSurface`]; hosts adapt their UI toolkit to these traits.

#![allow(missing_docs)]

use std::sync::Arc;

use futures::future::BoxFuture;
use parking_lot::{Mutex, RwLock};

/// Where the user currently is.
pub trait PageContext: Send + Sync {
    fn user_agent(&self) -> String;
    fn url(&self) -> String;
    fn referrer(&self) -> String;
}

/// A [`PageContext`] with fixed values that can be moved with [`StaticPage::navigate`].
#[derive(Debug)]
pub struct StaticPage {
    user_agent: String,
    url: RwLock<String>,
    referrer: RwLock<String>,
}

impl StaticPage {
    #[must_use]
    pub fn new(user_agent: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            user_agent: user_agent.into(),
            url: RwLock::new(url.into()),
            referrer: RwLock::new(String::new()),
        }
    }

    /// Move to `url`; the previous url becomes the referrer.
    pub fn navigate(&self, url: impl Into<String>) {
        let mut current = self.url.write();
        let previous = std::mem::replace(&mut *current, url.into());
        *self.referrer.write() = previous;
    }
}

impl PageContext for StaticPage {
    fn user_agent(&self) -> String {
        self.user_agent.clone()
    }

    fn url(&self) -> String {
        self.url.read().clone()
    }

    fn referrer(&self) -> String {
        self.referrer.read().clone()
    }
}

/// The element a click landed on.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ClickTarget {
    pub text: String,
    pub classes: Vec<String>,
}

impl ClickTarget {
    #[must_use]
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            classes: Vec::new(),
        }
    }

    #[must_use]
    pub fn with_class(mut self, class: impl Into<String>) -> Self {
        self.classes.push(class.into());
        self
    }

    /// Text contains `Copy` or the class list holds `copy-btn`.
    #[must_use]
    pub fn is_copy_action(&self) -> bool {
        self.text.contains("Copy") || self.classes.iter().any(|c| c == "copy-btn")
    }
}

/// A form control (input, textarea, select).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InputElement {
    /// `text`, `textarea`, `select-one`, ...
    pub element_type: String,
    pub name: Option<String>,
    pub id: Option<String>,
}

impl InputElement {
    #[must_use]
    pub fn new(element_type: impl Into<String>) -> Self {
        Self {
            element_type: element_type.into(),
            name: None,
            id: None,
        }
    }

    #[must_use]
    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    #[must_use]
    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    /// `name`, else `id`, else empty.
    #[must_use]
    pub fn label(&self) -> String {
        self.name
            .clone()
            .or_else(|| self.id.clone())
            .unwrap_or_default()
    }
}

/// Async event callback.
pub type Listener<E> = Arc<dyn Fn(E) -> BoxFuture<'static, ()> + Send + Sync>;

/// Where listeners get attached.
pub trait InteractionSurface: Send + Sync {
    /// Register a document-wide click listener.
    fn on_click(&self, listener: Listener<ClickTarget>);

    /// Form controls present right now.
    fn input_elements(&self) -> Vec<InputElement>;

    /// Register a focus listener on one control.
    fn on_focus(&self, element: &InputElement, listener: Listener<()>);
}

/// In-memory surface that lets callers fire clicks and focus events.
#[derive(Default)]
pub struct MemorySurface {
    inputs: Mutex<Vec<InputElement>>,
    click_listeners: Mutex<Vec<Listener<ClickTarget>>>,
    focus_listeners: Mutex<Vec<(InputElement, Listener<()>)>>,
}

impl MemorySurface {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_input(&self, element: InputElement) {
        self.inputs.lock().push(element);
    }

    /// Deliver a click to every registered listener, in registration order.
    pub async fn click(&self, target: ClickTarget) {
        let listeners = self.click_listeners.lock().clone();
        for listener in listeners {
            listener(target.clone()).await;
        }
    }

    /// Deliver a focus event for `element`. Returns how many listeners ran.
    pub async fn focus(&self, element: &InputElement) -> usize {
        let listeners: Vec<Listener<()>> = self
            .focus_listeners
            .lock()
            .iter()
            .filter(|(el, _)| el == element)
            .map(|(_, listener)| listener.clone())
            .collect();
        for listener in &listeners {
            listener(()).await;
        }
        listeners.len()
    }
}

impl InteractionSurface for MemorySurface {
    fn on_click(&self, listener: Listener<ClickTarget>) {
        self.click_listeners.lock().push(listener);
    }

    fn input_elements(&self) -> Vec<InputElement> {
        self.inputs.lock().clone()
    }

    fn on_focus(&self, element: &InputElement, listener: Listener<()>) {
        self.focus_listeners
            .lock()
            .push((element.clone(), listener));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::FutureExt;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn navigate_sets_referrer() {
        let page = StaticPage::new("ua", "https://tools.example/");
        assert_eq!(page.referrer(), "");
        page.navigate("https://tools.example/love");
        assert_eq!(page.url(), "https://tools.example/love");
        assert_eq!(page.referrer(), "https://tools.example/");
    }

    #[test]
    fn copy_detection() {
        assert!(ClickTarget::new("Copy Result").is_copy_action());
        assert!(ClickTarget::new("").with_class("copy-btn").is_copy_action());
        assert!(!ClickTarget::new("copy").is_copy_action());
        assert!(!ClickTarget::new("Submit").with_class("btn").is_copy_action());
    }

    #[test]
    fn label_prefers_name() {
        let el = InputElement::new("text").named("prompt").with_id("p1");
        assert_eq!(el.label(), "prompt");
        assert_eq!(InputElement::new("text").with_id("p1").label(), "p1");
        assert_eq!(InputElement::new("text").label(), "");
    }

    #[tokio::test]
    async fn focus_reaches_only_matching_listeners() {
        let surface = MemorySurface::new();
        let a = InputElement::new("text").named("a");
        let b = InputElement::new("text").named("b");
        let hits = Arc::new(AtomicUsize::new(0));
        let counter = hits.clone();
        surface.on_focus(
            &a,
            Arc::new(move |()| {
                let counter = counter.clone();
                async move {
                    counter.fetch_add(1, Ordering::SeqCst);
                }
                .boxed()
            }),
        );
        assert_eq!(surface.focus(&a).await, 1);
        assert_eq!(surface.focus(&b).await, 0);
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }
}
