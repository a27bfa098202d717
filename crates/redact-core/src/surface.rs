//! Presentation-surface boundary.
//!
//! The commit engine talks to the outside world only through
//! [`ResourceAdapter`]. Attribute changes reach the adapter as an
//! [`AttributeDelta`]; [`AttributeDelta::ops`] routes its entries the way a
//! surface applies them: event handlers become subscribe/unsubscribe pairs and
//! the `style` attribute is expanded into one operation per property.
//!
//! [`MemorySurface`] is an in-memory adapter that keeps a resource tree and a
//! log of every call it receives.

use std::fmt;
use std::fmt::Write as _;

use indexmap::IndexMap;

use crate::collections::map::HashMap;
use crate::element::{
    Attributes, ElementKind, Event, EventHandler, StyleMap, Value, EVENT_PREFIX, STYLE, TEXT_VALUE,
};

/// Kind of resource a host or text fiber asks the adapter to create.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResourceKind<'a> {
    Host(&'a str),
    Text,
}

impl<'a> ResourceKind<'a> {
    /// `None` for function components, which own no resource.
    pub fn of(kind: &'a ElementKind) -> Option<Self> {
        match kind {
            ElementKind::Host(tag) => Some(ResourceKind::Host(&**tag)),
            ElementKind::Text => Some(ResourceKind::Text),
            ElementKind::Component(_) => None,
        }
    }
}

/// External collaborator owning the real presentation resources.
pub trait ResourceAdapter {
    type Handle: Clone + fmt::Debug + PartialEq;

    /// Creates a detached resource with its initial attributes applied.
    fn create_resource(&mut self, kind: ResourceKind<'_>, attributes: &Attributes) -> Self::Handle;

    /// Applies removed and changed/added attributes to an existing resource.
    fn apply_attribute_delta(&mut self, handle: &Self::Handle, delta: &AttributeDelta<'_>);

    /// Appends `child` as the last child of `parent`.
    fn attach_resource(&mut self, parent: &Self::Handle, child: &Self::Handle);

    /// Detaches `child` (and everything below it) from `parent`.
    fn remove_resource(&mut self, parent: &Self::Handle, child: &Self::Handle);
}

/// Difference between two attribute maps.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AttributeDelta<'a> {
    removed: Vec<(&'a str, &'a Value)>,
    changed: Vec<(&'a str, Option<&'a Value>, &'a Value)>,
}

impl<'a> AttributeDelta<'a> {
    pub fn between(previous: &'a Attributes, next: &'a Attributes) -> Self {
        let removed = previous
            .iter()
            .filter(|(key, _)| !next.contains_key(key.as_str()))
            .map(|(key, value)| (key.as_str(), value))
            .collect();
        let changed = next
            .iter()
            .filter_map(|(key, value)| {
                let old = previous.get(key);
                (old != Some(value)).then_some((key.as_str(), old, value))
            })
            .collect();
        Self { removed, changed }
    }

    /// Delta that adds every attribute of a freshly created resource.
    pub fn initial(attributes: &'a Attributes) -> Self {
        Self {
            removed: Vec::new(),
            changed: attributes
                .iter()
                .map(|(key, value)| (key.as_str(), None, value))
                .collect(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.removed.is_empty() && self.changed.is_empty()
    }

    pub fn removed_keys(&self) -> Vec<&'a str> {
        self.removed.iter().map(|(key, _)| *key).collect()
    }

    pub fn changed_entries(&self) -> Vec<(&'a str, &'a Value)> {
        self.changed.iter().map(|(key, _, value)| (*key, *value)).collect()
    }

    /// Routes the delta into surface operations.
    ///
    /// Order: stale handlers are unsubscribed, removed properties cleared,
    /// changed properties set, then new handlers subscribed.
    pub fn ops(&self) -> Vec<AttributeOp<'a>> {
        let mut unsubscribe = Vec::new();
        let mut clear = Vec::new();
        let mut set = Vec::new();
        let mut subscribe = Vec::new();

        for &(key, old) in &self.removed {
            match (event_name(key, old), old) {
                (Some(event), Value::Handler(handler)) => {
                    unsubscribe.push(AttributeOp::Unsubscribe { event, handler })
                }
                (_, Value::Style(style)) if key == STYLE => {
                    clear.extend(style.keys().map(|property| AttributeOp::ClearStyle {
                        property: property.as_str(),
                    }))
                }
                _ => clear.push(AttributeOp::Clear { key }),
            }
        }

        for &(key, old, new) in &self.changed {
            if let Some(previous) = old {
                if let (Some(event), Value::Handler(handler)) = (event_name(key, previous), previous) {
                    unsubscribe.push(AttributeOp::Unsubscribe { event, handler });
                }
            }
            match (event_name(key, new), new) {
                (Some(event), Value::Handler(handler)) => {
                    subscribe.push(AttributeOp::Subscribe { event, handler })
                }
                (_, Value::Style(style)) if key == STYLE => {
                    if let Some(Value::Style(previous)) = old {
                        clear.extend(
                            previous
                                .keys()
                                .filter(|property| !style.contains_key(property.as_str()))
                                .map(|property| AttributeOp::ClearStyle {
                                    property: property.as_str(),
                                }),
                        );
                    }
                    set.extend(style.iter().map(|(property, value)| AttributeOp::SetStyle {
                        property: property.as_str(),
                        value: value.as_str(),
                    }))
                }
                _ => set.push(AttributeOp::Set { key, value: new }),
            }
        }

        let mut ops = unsubscribe;
        ops.append(&mut clear);
        ops.append(&mut set);
        ops.append(&mut subscribe);
        ops
    }
}

/// `onClick` holding a handler is the `click` event.
fn event_name(key: &str, value: &Value) -> Option<String> {
    match value {
        Value::Handler(_) => key
            .strip_prefix(EVENT_PREFIX)
            .filter(|name| !name.is_empty())
            .map(str::to_lowercase),
        _ => None,
    }
}

/// One routed attribute operation.
#[derive(Debug, Clone, PartialEq)]
pub enum AttributeOp<'a> {
    Unsubscribe { event: String, handler: &'a EventHandler },
    Clear { key: &'a str },
    ClearStyle { property: &'a str },
    Set { key: &'a str, value: &'a Value },
    SetStyle { property: &'a str, value: &'a str },
    Subscribe { event: String, handler: &'a EventHandler },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ResourceId(pub usize);

impl fmt::Display for ResourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Call received by a [`MemorySurface`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SurfaceCall {
    Create { id: ResourceId, kind: String },
    Delta { id: ResourceId, removed: Vec<String>, changed: Vec<String> },
    Attach { parent: ResourceId, child: ResourceId },
    Remove { parent: ResourceId, child: ResourceId },
}

impl SurfaceCall {
    pub fn is_structural(&self) -> bool {
        !matches!(self, SurfaceCall::Delta { .. })
    }
}

#[derive(Debug, Clone)]
pub struct MemoryResource {
    kind: String,
    properties: IndexMap<String, Value>,
    style: StyleMap,
    listeners: HashMap<String, Vec<EventHandler>>,
    parent: Option<ResourceId>,
    children: Vec<ResourceId>,
}

impl MemoryResource {
    fn new(kind: &str) -> Self {
        Self {
            kind: kind.to_owned(),
            properties: IndexMap::new(),
            style: StyleMap::new(),
            listeners: HashMap::default(),
            parent: None,
            children: Vec::new(),
        }
    }

    pub fn kind(&self) -> &str {
        &self.kind
    }

    pub fn property(&self, key: &str) -> Option<&Value> {
        self.properties.get(key)
    }

    pub fn style(&self, property: &str) -> Option<&str> {
        self.style.get(property).map(String::as_str)
    }

    pub fn listener_count(&self, event: &str) -> usize {
        self.listeners.get(event).map_or(0, Vec::len)
    }

    pub fn parent(&self) -> Option<ResourceId> {
        self.parent
    }

    pub fn children(&self) -> &[ResourceId] {
        &self.children
    }

    fn apply(&mut self, op: AttributeOp<'_>) {
        match op {
            AttributeOp::Unsubscribe { event, handler } => {
                if let Some(handlers) = self.listeners.get_mut(&event) {
                    handlers.retain(|existing| !existing.ptr_eq(handler));
                }
            }
            AttributeOp::Clear { key } => {
                self.properties.shift_remove(key);
            }
            AttributeOp::ClearStyle { property } => {
                self.style.shift_remove(property);
            }
            AttributeOp::Set { key, value } => {
                self.properties.insert(key.to_owned(), value.clone());
            }
            AttributeOp::SetStyle { property, value } => {
                self.style.insert(property.to_owned(), value.to_owned());
            }
            AttributeOp::Subscribe { event, handler } => {
                self.listeners.entry(event).or_default().push(handler.clone());
            }
        }
    }
}

/// In-memory presentation surface.
#[derive(Debug, Default)]
pub struct MemorySurface {
    resources: Vec<Option<MemoryResource>>,
    calls: Vec<SurfaceCall>,
}

impl MemorySurface {
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a root resource to render into. Not recorded as a call.
    pub fn create_container(&mut self, tag: &str) -> ResourceId {
        self.insert(MemoryResource::new(tag))
    }

    fn insert(&mut self, resource: MemoryResource) -> ResourceId {
        let id = ResourceId(self.resources.len());
        self.resources.push(Some(resource));
        id
    }

    pub fn resource(&self, id: ResourceId) -> Option<&MemoryResource> {
        self.resources.get(id.0).and_then(Option::as_ref)
    }

    fn resource_mut(&mut self, id: ResourceId) -> Option<&mut MemoryResource> {
        self.resources.get_mut(id.0).and_then(Option::as_mut)
    }

    /// Number of live resources, containers included.
    pub fn len(&self) -> usize {
        self.resources.iter().filter(|r| r.is_some()).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn calls(&self) -> &[SurfaceCall] {
        &self.calls
    }

    pub fn take_calls(&mut self) -> Vec<SurfaceCall> {
        std::mem::take(&mut self.calls)
    }

    /// Concatenated `nodeValue` of every text resource below `id`, in order.
    pub fn text_content(&self, id: ResourceId) -> String {
        let mut output = String::new();
        self.collect_text(id, &mut output);
        output
    }

    fn collect_text(&self, id: ResourceId, output: &mut String) {
        let Some(resource) = self.resource(id) else {
            return;
        };
        if let Some(text) = resource.property(TEXT_VALUE).and_then(Value::as_text) {
            output.push_str(&text);
        }
        for &child in &resource.children {
            self.collect_text(child, output);
        }
    }

    /// Resources below `root` (exclusive) with the given kind, in pre-order.
    pub fn find_by_kind(&self, root: ResourceId, kind: &str) -> Vec<ResourceId> {
        let mut found = Vec::new();
        let mut stack: Vec<ResourceId> = self
            .resource(root)
            .map(|r| r.children.iter().rev().copied().collect())
            .unwrap_or_default();
        while let Some(id) = stack.pop() {
            if let Some(resource) = self.resource(id) {
                if resource.kind == kind {
                    found.push(id);
                }
                stack.extend(resource.children.iter().rev().copied());
            }
        }
        found
    }

    /// Delivers `event` to every handler subscribed on `id`. Returns how many
    /// handlers ran.
    pub fn dispatch(&self, id: ResourceId, event: &Event) -> usize {
        let handlers: Vec<EventHandler> = self
            .resource(id)
            .and_then(|resource| resource.listeners.get(&event.name))
            .cloned()
            .unwrap_or_default();
        for handler in &handlers {
            handler.call(event);
        }
        handlers.len()
    }

    pub fn dump_tree(&self, root: ResourceId) -> String {
        let mut output = String::new();
        self.dump_resource(&mut output, root, 0);
        output
    }

    fn dump_resource(&self, output: &mut String, id: ResourceId, depth: usize) {
        let indent = "  ".repeat(depth);
        let Some(resource) = self.resource(id) else {
            let _ = writeln!(output, "{indent}[{id}] (missing)");
            return;
        };
        let _ = write!(output, "{indent}[{id}] {}", resource.kind);
        for (key, value) in &resource.properties {
            let _ = write!(output, " {key}={value:?}");
        }
        if !resource.style.is_empty() {
            let _ = write!(output, " style={:?}", Value::Style(resource.style.clone()).to_string());
        }
        let mut events: Vec<_> = resource
            .listeners
            .iter()
            .filter(|(_, handlers)| !handlers.is_empty())
            .map(|(event, _)| event.as_str())
            .collect();
        events.sort_unstable();
        for event in events {
            let _ = write!(output, " on:{event}");
        }
        output.push('\n');
        for &child in &resource.children {
            self.dump_resource(output, child, depth + 1);
        }
    }

    fn drop_subtree(&mut self, id: ResourceId) {
        let children = match self.resources.get_mut(id.0).and_then(Option::take) {
            Some(resource) => resource.children,
            None => return,
        };
        for child in children {
            self.drop_subtree(child);
        }
    }
}

impl ResourceAdapter for MemorySurface {
    type Handle = ResourceId;

    fn create_resource(&mut self, kind: ResourceKind<'_>, attributes: &Attributes) -> ResourceId {
        let label = match kind {
            ResourceKind::Host(tag) => tag,
            ResourceKind::Text => "#text",
        };
        let mut resource = MemoryResource::new(label);
        for op in AttributeDelta::initial(attributes).ops() {
            resource.apply(op);
        }
        let id = self.insert(resource);
        self.calls.push(SurfaceCall::Create {
            id,
            kind: label.to_owned(),
        });
        id
    }

    fn apply_attribute_delta(&mut self, handle: &ResourceId, delta: &AttributeDelta<'_>) {
        self.calls.push(SurfaceCall::Delta {
            id: *handle,
            removed: delta.removed_keys().into_iter().map(str::to_owned).collect(),
            changed: delta
                .changed_entries()
                .into_iter()
                .map(|(key, _)| key.to_owned())
                .collect(),
        });
        let Some(resource) = self.resource_mut(*handle) else {
            log::error!("attribute delta for missing resource {handle}");
            return;
        };
        for op in delta.ops() {
            resource.apply(op);
        }
    }

    fn attach_resource(&mut self, parent: &ResourceId, child: &ResourceId) {
        self.calls.push(SurfaceCall::Attach {
            parent: *parent,
            child: *child,
        });
        if self.resource(*child).is_none() {
            log::error!("attach of missing resource {child} under {parent}");
            return;
        }
        match self.resource_mut(*parent) {
            Some(resource) => resource.children.push(*child),
            None => {
                log::error!("attach under missing resource {parent}");
                return;
            }
        }
        if let Some(resource) = self.resource_mut(*child) {
            resource.parent = Some(*parent);
        }
    }

    fn remove_resource(&mut self, parent: &ResourceId, child: &ResourceId) {
        self.calls.push(SurfaceCall::Remove {
            parent: *parent,
            child: *child,
        });
        match self.resource_mut(*parent) {
            Some(resource) => resource.children.retain(|id| id != child),
            None => log::error!("remove from missing resource {parent}"),
        }
        self.drop_subtree(*child);
    }
}

#[cfg(test)]
mod tests {
    use std::cell::Cell;
    use std::rc::Rc;

    use super::*;

    fn attrs(entries: Vec<(&str, Value)>) -> Attributes {
        entries
            .into_iter()
            .map(|(key, value)| (key.to_owned(), value))
            .collect()
    }

    fn style(entries: &[(&str, &str)]) -> Value {
        Value::Style(
            entries
                .iter()
                .map(|(k, v)| ((*k).to_owned(), (*v).to_owned()))
                .collect(),
        )
    }

    #[test]
    fn delta_reports_only_changed_and_removed_entries() {
        let previous = attrs(vec![("id", "a".into()), ("title", "x".into()), ("tab", 1.into())]);
        let next = attrs(vec![("id", "a".into()), ("title", "y".into()), ("lang", "en".into())]);

        let delta = AttributeDelta::between(&previous, &next);
        assert_eq!(delta.removed_keys(), vec!["tab"]);
        assert_eq!(
            delta.changed_entries(),
            vec![("title", &Value::from("y")), ("lang", &Value::from("en"))]
        );
        assert!(AttributeDelta::between(&next, &next).is_empty());
    }

    #[test]
    fn ops_route_events_and_styles() {
        let old_click = EventHandler::new(|_| {});
        let new_click = EventHandler::new(|_| {});
        let previous = attrs(vec![
            ("onClick", Value::Handler(old_click.clone())),
            ("style", style(&[("color", "red"), ("margin", "0")])),
            ("hidden", true.into()),
        ]);
        let next = attrs(vec![
            ("onClick", Value::Handler(new_click.clone())),
            ("style", style(&[("color", "blue")])),
        ]);

        let delta = AttributeDelta::between(&previous, &next);
        assert_eq!(
            delta.ops(),
            vec![
                AttributeOp::Unsubscribe {
                    event: "click".into(),
                    handler: &old_click,
                },
                AttributeOp::Clear { key: "hidden" },
                AttributeOp::ClearStyle { property: "margin" },
                AttributeOp::SetStyle {
                    property: "color",
                    value: "blue",
                },
                AttributeOp::Subscribe {
                    event: "click".into(),
                    handler: &new_click,
                },
            ]
        );
    }

    #[test]
    fn memory_surface_tracks_tree_and_listeners() {
        let mut surface = MemorySurface::new();
        let container = surface.create_container("root");
        let clicks = Rc::new(Cell::new(0));
        let handler = {
            let clicks = Rc::clone(&clicks);
            EventHandler::new(move |_| clicks.set(clicks.get() + 1))
        };

        let button = surface.create_resource(
            ResourceKind::Host("button"),
            &attrs(vec![("onClick", Value::Handler(handler.clone()))]),
        );
        let label = surface.create_resource(
            ResourceKind::Text,
            &attrs(vec![(TEXT_VALUE, "Press".into())]),
        );
        surface.attach_resource(&container, &button);
        surface.attach_resource(&button, &label);

        assert_eq!(surface.text_content(container), "Press");
        assert_eq!(surface.find_by_kind(container, "button"), vec![button]);
        assert_eq!(surface.dispatch(button, &Event::new("click")), 1);
        assert_eq!(clicks.get(), 1);

        let previous = attrs(vec![("onClick", Value::Handler(handler))]);
        let next = Attributes::new();
        surface.apply_attribute_delta(&button, &AttributeDelta::between(&previous, &next));
        assert_eq!(surface.dispatch(button, &Event::new("click")), 0);

        surface.remove_resource(&container, &button);
        assert!(surface.resource(button).is_none());
        assert!(surface.resource(label).is_none());
        assert_eq!(surface.len(), 1);
        assert_eq!(surface.calls().iter().filter(|c| c.is_structural()).count(), 5);
    }
}
