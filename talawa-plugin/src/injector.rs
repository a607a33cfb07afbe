//! Inline injector slots
//!
//! Injector components are already registered, so rendering is synchronous.
//! Every entry is resolved independently: a missing component or a failing
//! lookup drops that entry only and is reported in [`InjectorRender::failures`].

use serde::{Deserialize, Serialize};
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;

use crate::error::{PluginError, PluginResult};
use crate::extension::ExtensionPoint;
use crate::hooks::{plugin_injectors, ExtensionHook};
use crate::manager::{PluginHost, PluginManager};
use crate::messages::Messages;
use crate::registry::ComponentLookup;
use crate::types::InjectorSlot;
use crate::view::{Element, Props, Style};

pub const EMPTY_TEST_ID: &str = "plugin-injector-empty";
pub const CONTAINER_TEST_ID: &str = "plugin-injector-container";
pub const SLOT_TEST_ID: &str = "plugin-injector-slot";

/// Caller-facing injector properties
#[derive(Debug, Clone, Default)]
pub struct PluginInjectorProps {
    pub injector_type: InjectorSlot,
    /// Class of the outer container
    pub class_name: Option<String>,
    /// Style applied to every slot container
    pub style: Style,
    /// Forwarded verbatim as component props
    pub data: Props,
}

impl PluginInjectorProps {
    pub fn new(injector_type: InjectorSlot) -> Self {
        Self {
            injector_type,
            ..Default::default()
        }
    }

    pub fn with_data(mut self, data: Props) -> Self {
        self.data = data;
        self
    }

    pub fn with_class_name(mut self, class_name: impl Into<String>) -> Self {
        self.class_name = Some(class_name.into());
        self
    }

    pub fn with_style(mut self, style: Style) -> Self {
        self.style = style;
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FailureKind {
    /// Lookup found nothing
    Missing,
    /// Lookup or render failed
    Failed,
}

/// An entry left out of the rendered slot
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InjectorFailure {
    pub plugin_id: String,
    pub injector: Option<String>,
    /// Position in the injector list
    pub index: usize,
    pub kind: FailureKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Output of one injector render pass
#[derive(Debug, Clone)]
pub struct InjectorRender {
    pub element: Element,
    pub failures: Vec<InjectorFailure>,
}

impl InjectorRender {
    /// Number of slot containers rendered
    pub fn slot_count(&self) -> usize {
        self.element.find_all("data-testid", SLOT_TEST_ID).len()
    }

    pub fn failures_of(&self, kind: FailureKind) -> impl Iterator<Item = &InjectorFailure> + '_ {
        self.failures.iter().filter(move |f| f.kind == kind)
    }
}

fn render_entry(
    lookup: &dyn ComponentLookup,
    plugin_id: &str,
    injector: Option<&str>,
    data: &Props,
) -> PluginResult<Option<Element>> {
    let outcome = catch_unwind(AssertUnwindSafe(|| {
        match lookup.get_plugin_component(plugin_id, injector)? {
            Some(component) => component.render(data).map(Some),
            None => Ok(None),
        }
    }));

    outcome.unwrap_or_else(|_| {
        Err(PluginError::render_failed(
            injector.unwrap_or_default(),
            "component panicked while rendering",
        ))
    })
}

/// Render the injectors of one slot.
///
/// Entries are folded in list order; successes become keyed slot containers
/// and failures are logged and collected.
pub fn render_injectors(
    injectors: &[ExtensionPoint],
    lookup: &dyn ComponentLookup,
    props: &PluginInjectorProps,
    messages: &Messages,
) -> InjectorRender {
    if injectors.is_empty() {
        return InjectorRender {
            element: Element::div_text(messages.injector_empty.as_str()).with_attr("data-testid", EMPTY_TEST_ID),
            failures: Vec::new(),
        };
    }

    let mut slots = Vec::with_capacity(injectors.len());
    let mut failures = Vec::new();

    for (index, entry) in injectors.iter().enumerate() {
        let plugin_id = entry.plugin_id().unwrap_or("");
        let injector = entry
            .as_injector()
            .and_then(|injector| injector.injector.as_deref());

        match render_entry(lookup, plugin_id, injector, &props.data) {
            Ok(Some(rendered)) => slots.push(
                Element::node("div")
                    .with_key(format!("{}-{}", plugin_id, index))
                    .with_style(props.style.clone())
                    .with_attr("data-testid", SLOT_TEST_ID)
                    .with_child(rendered),
            ),
            Ok(None) => {
                tracing::warn!(
                    target: "plugin_injector",
                    plugin_id = %plugin_id,
                    injector = injector.unwrap_or_default(),
                    "Plugin component not found: {}/{}",
                    plugin_id,
                    injector.unwrap_or_default()
                );
                failures.push(InjectorFailure {
                    plugin_id: plugin_id.to_string(),
                    injector: injector.map(str::to_string),
                    index,
                    kind: FailureKind::Missing,
                    error: None,
                });
            }
            Err(e) => {
                tracing::error!(
                    target: "plugin_injector",
                    plugin_id = %plugin_id,
                    injector = injector.unwrap_or_default(),
                    error = %e,
                    "Error rendering plugin injector"
                );
                failures.push(InjectorFailure {
                    plugin_id: plugin_id.to_string(),
                    injector: injector.map(str::to_string),
                    index,
                    kind: FailureKind::Failed,
                    error: Some(e.to_string()),
                });
            }
        }
    }

    InjectorRender {
        element: Element::node("div")
            .with_class(props.class_name.clone())
            .with_attr("data-testid", CONTAINER_TEST_ID)
            .with_children(slots),
        failures,
    }
}

/// A mounted injector slot
pub struct PluginInjector {
    hook: ExtensionHook<ExtensionPoint>,
    lookup: Arc<dyn ComponentLookup>,
    props: PluginInjectorProps,
    messages: Messages,
}

impl PluginInjector {
    pub fn mount(host: Arc<dyn PluginHost>, lookup: Arc<dyn ComponentLookup>, props: PluginInjectorProps) -> Self {
        let hook = plugin_injectors(host, Some(props.injector_type));
        Self {
            hook,
            lookup,
            props,
            messages: Messages::default(),
        }
    }

    /// Mount against a manager serving as both host and component lookup
    pub fn for_manager(manager: Arc<PluginManager>, props: PluginInjectorProps) -> Self {
        Self::mount(manager.clone(), manager, props)
    }

    pub fn with_messages(mut self, messages: Messages) -> Self {
        self.messages = messages;
        self
    }

    /// Replace the payload forwarded to the components
    pub fn set_data(&mut self, data: Props) {
        self.props.data = data;
    }

    pub fn props(&self) -> &PluginInjectorProps {
        &self.props
    }

    /// Render the current snapshot of the slot
    pub fn render(&self) -> InjectorRender {
        render_injectors(&self.hook.current(), self.lookup.as_ref(), &self.props, &self.messages)
    }
}
