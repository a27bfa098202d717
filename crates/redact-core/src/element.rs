//! Element descriptors.
//!
//! An [`Element`] is the immutable description of one desired node and its
//! children. Components produce a fresh list of elements on every render and
//! the reconciler compares them against the retained fiber tree.
//!
//! Scalars placed among children (strings and numbers) are normalised into
//! [`ElementKind::Text`] descriptors at construction time, so nothing past the
//! element factory ever sees a bare scalar child.

use std::any::{Any, TypeId};
use std::fmt;
use std::rc::Rc;

use indexmap::IndexMap;

/// Ordered attribute map carried by every descriptor.
pub type Attributes = IndexMap<String, Value>;

/// Ordered `property -> value` map stored under the [`STYLE`] attribute.
pub type StyleMap = IndexMap<String, String>;

/// Attribute holding the text of a [`ElementKind::Text`] descriptor.
pub const TEXT_VALUE: &str = "nodeValue";

/// Attribute applied entry-by-entry instead of as a single assignment.
pub const STYLE: &str = "style";

/// Prefix marking event-style attribute keys (`onClick`, `onInput`, ...).
pub const EVENT_PREFIX: &str = "on";

/// Payload handed to event handlers by a presentation surface.
#[derive(Debug, Clone, PartialEq)]
pub struct Event {
    pub name: String,
    pub value: Option<Value>,
}

impl Event {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: None,
        }
    }

    pub fn with_value(mut self, value: impl Into<Value>) -> Self {
        self.value = Some(value.into());
        self
    }
}

/// Callback bound to an event attribute. Handlers compare by identity.
#[derive(Clone)]
pub struct EventHandler(Rc<dyn Fn(&Event)>);

impl EventHandler {
    pub fn new(handler: impl Fn(&Event) + 'static) -> Self {
        Self(Rc::new(handler))
    }

    pub fn call(&self, event: &Event) {
        (self.0)(event)
    }

    pub fn ptr_eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }
}

impl PartialEq for EventHandler {
    fn eq(&self, other: &Self) -> bool {
        self.ptr_eq(other)
    }
}

impl fmt::Debug for EventHandler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "EventHandler({:p})", Rc::as_ptr(&self.0) as *const ())
    }
}

/// Attribute value.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    Style(StyleMap),
    Handler(EventHandler),
}

impl Value {
    /// Returns the textual form of scalar values; `None` for styles and handlers.
    pub fn as_text(&self) -> Option<String> {
        match self {
            Value::Bool(value) => Some(value.to_string()),
            Value::Int(value) => Some(value.to_string()),
            Value::Float(value) => Some(value.to_string()),
            Value::Str(value) => Some(value.clone()),
            Value::Style(_) | Value::Handler(_) => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(value) => Some(value),
            _ => None,
        }
    }

    pub fn as_handler(&self) -> Option<&EventHandler> {
        match self {
            Value::Handler(handler) => Some(handler),
            _ => None,
        }
    }

    fn type_label(&self) -> &'static str {
        match self {
            Value::Bool(_) => "bool",
            Value::Int(_) => "int",
            Value::Float(_) => "float",
            Value::Str(_) => "string",
            Value::Style(_) => "style",
            Value::Handler(_) => "event handler",
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Style(style) => {
                let mut first = true;
                for (property, value) in style {
                    if !first {
                        f.write_str("; ")?;
                    }
                    first = false;
                    write!(f, "{property}: {value}")?;
                }
                Ok(())
            }
            Value::Handler(handler) => write!(f, "{handler:?}"),
            other => f.write_str(&other.as_text().unwrap_or_default()),
        }
    }
}

macro_rules! value_from_int {
    ($($ty:ty),*) => {
        $(impl From<$ty> for Value {
            fn from(value: $ty) -> Self {
                Value::Int(value as i64)
            }
        })*
    };
}

value_from_int!(i8, i16, i32, i64, u8, u16, u32, usize);

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Value::Bool(value)
    }
}

impl From<f32> for Value {
    fn from(value: f32) -> Self {
        Value::Float(value as f64)
    }
}

impl From<f64> for Value {
    fn from(value: f64) -> Self {
        Value::Float(value)
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value::Str(value.to_owned())
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Value::Str(value)
    }
}

impl From<StyleMap> for Value {
    fn from(value: StyleMap) -> Self {
        Value::Style(value)
    }
}

impl From<EventHandler> for Value {
    fn from(value: EventHandler) -> Self {
        Value::Handler(value)
    }
}

/// Rejected descriptor construction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ElementError {
    /// A child value that is neither a descriptor nor a text-convertible scalar.
    MalformedChild { parent: String, found: &'static str },
}

impl fmt::Display for ElementError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ElementError::MalformedChild { parent, found } => {
                write!(f, "{parent} cannot take a {found} value as a child")
            }
        }
    }
}

impl std::error::Error for ElementError {}

type RenderFn = dyn Fn(&Props) -> Vec<Element>;

/// A function component: receives props, returns a subtree.
///
/// Identity is the Rust type of the render function together with the
/// component name. Function items and closure expressions have a type of
/// their own, so building the component from the same one on every render
/// keeps it the same kind and keeps its state. Render functions passed as
/// `fn` pointers share one type and are told apart by address instead.
#[derive(Clone)]
pub struct Component {
    id: TypeId,
    address: Option<usize>,
    name: Rc<str>,
    render: Rc<RenderFn>,
}

impl Component {
    pub fn new<F, R>(name: &str, render: F) -> Self
    where
        F: Fn(&Props) -> R + 'static,
        R: IntoChildren + 'static,
    {
        let address = (&render as &dyn Any)
            .downcast_ref::<fn(&Props) -> R>()
            .map(|pointer| *pointer as usize);
        Self {
            id: TypeId::of::<F>(),
            address,
            name: Rc::from(name),
            render: Rc::new(move |props: &Props| {
                let mut children = Vec::new();
                render(props).into_children(&mut children);
                children
            }),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub(crate) fn render(&self, props: &Props) -> Vec<Element> {
        (self.render)(props)
    }
}

impl PartialEq for Component {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id && self.address == other.address && self.name == other.name
    }
}

impl fmt::Debug for Component {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Component").field(&self.name).finish()
    }
}

/// What an element (and the fiber built from it) is.
#[derive(Clone, PartialEq)]
pub enum ElementKind {
    Host(Rc<str>),
    Text,
    Component(Component),
}

impl ElementKind {
    pub fn is_component(&self) -> bool {
        matches!(self, ElementKind::Component(_))
    }

    /// Short label used in logs, tree dumps and errors.
    pub fn label(&self) -> &str {
        match self {
            ElementKind::Host(tag) => tag,
            ElementKind::Text => "#text",
            ElementKind::Component(component) => component.name(),
        }
    }
}

impl fmt::Debug for ElementKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ElementKind::Host(tag) => f.debug_tuple("Host").field(tag).finish(),
            ElementKind::Text => f.write_str("Text"),
            ElementKind::Component(component) => component.fmt(f),
        }
    }
}

/// Attributes and children of one descriptor.
#[derive(Debug, Clone, Default)]
pub struct Props {
    attributes: Attributes,
    children: Vec<Element>,
}

impl Props {
    pub fn new(attributes: Attributes, children: Vec<Element>) -> Self {
        Self {
            attributes,
            children,
        }
    }

    pub(crate) fn with_children(children: Vec<Element>) -> Self {
        Self {
            attributes: Attributes::new(),
            children,
        }
    }

    pub fn attributes(&self) -> &Attributes {
        &self.attributes
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.attributes.get(key)
    }

    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.get(key).and_then(Value::as_str)
    }

    pub fn get_int(&self, key: &str) -> Option<i64> {
        match self.get(key) {
            Some(Value::Int(value)) => Some(*value),
            _ => None,
        }
    }

    pub fn children(&self) -> &[Element] {
        &self.children
    }
}

/// Immutable descriptor of a desired node.
#[derive(Clone)]
pub struct Element {
    kind: ElementKind,
    props: Rc<Props>,
}

impl Element {
    fn with_kind(kind: ElementKind) -> Self {
        Self {
            kind,
            props: Rc::new(Props::default()),
        }
    }

    pub fn host(tag: impl Into<Rc<str>>) -> Self {
        Self::with_kind(ElementKind::Host(tag.into()))
    }

    pub fn text(text: impl fmt::Display) -> Self {
        Self::with_kind(ElementKind::Text).attr(TEXT_VALUE, text.to_string())
    }

    pub fn component(component: &Component) -> Self {
        Self::with_kind(ElementKind::Component(component.clone()))
    }

    pub fn kind(&self) -> &ElementKind {
        &self.kind
    }

    pub fn props(&self) -> &Props {
        &self.props
    }

    pub(crate) fn shared_props(&self) -> Rc<Props> {
        Rc::clone(&self.props)
    }

    pub fn attributes(&self) -> &Attributes {
        &self.props.attributes
    }

    pub fn children(&self) -> &[Element] {
        &self.props.children
    }

    pub fn attr(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        Rc::make_mut(&mut self.props)
            .attributes
            .insert(key.into(), value.into());
        self
    }

    /// Sets one entry of the [`STYLE`] attribute, creating it when missing.
    pub fn style(mut self, property: impl Into<String>, value: impl Into<String>) -> Self {
        let attributes = &mut Rc::make_mut(&mut self.props).attributes;
        let entry = attributes
            .entry(STYLE.to_owned())
            .or_insert_with(|| Value::Style(StyleMap::new()));
        match entry {
            Value::Style(style) => {
                style.insert(property.into(), value.into());
            }
            other => {
                let mut style = StyleMap::new();
                style.insert(property.into(), value.into());
                *other = Value::Style(style);
            }
        }
        self
    }

    /// Binds `handler` to `event`; `on("click", ..)` is stored under `onClick`.
    pub fn on(self, event: &str, handler: impl Fn(&Event) + 'static) -> Self {
        let mut key = String::with_capacity(EVENT_PREFIX.len() + event.len());
        key.push_str(EVENT_PREFIX);
        let mut chars = event.chars();
        if let Some(first) = chars.next() {
            key.extend(first.to_uppercase());
            key.push_str(chars.as_str());
        }
        self.attr(key, EventHandler::new(handler))
    }

    pub fn child(mut self, child: impl IntoChildren) -> Self {
        child.into_children(&mut Rc::make_mut(&mut self.props).children);
        self
    }

    pub fn children_from<I>(mut self, children: I) -> Self
    where
        I: IntoIterator,
        I::Item: IntoChildren,
    {
        let list = &mut Rc::make_mut(&mut self.props).children;
        for child in children {
            child.into_children(list);
        }
        self
    }

    /// Appends a dynamically typed child, rejecting values that cannot be text.
    pub fn try_child(self, value: Value) -> Result<Self, ElementError> {
        match value.as_text() {
            Some(text) => Ok(self.child(Element::text(text))),
            None => Err(ElementError::MalformedChild {
                parent: self.kind.label().to_owned(),
                found: value.type_label(),
            }),
        }
    }
}

impl fmt::Debug for Element {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Element")
            .field("kind", &self.kind)
            .field("attributes", &self.props.attributes)
            .field("children", &self.props.children)
            .finish()
    }
}

/// Values accepted as children. Sequences are flattened into the parent list.
pub trait IntoChildren {
    fn into_children(self, out: &mut Vec<Element>);
}

impl IntoChildren for Element {
    fn into_children(self, out: &mut Vec<Element>) {
        out.push(self);
    }
}

impl<T: IntoChildren> IntoChildren for Vec<T> {
    fn into_children(self, out: &mut Vec<Element>) {
        for child in self {
            child.into_children(out);
        }
    }
}

impl<T: IntoChildren + Clone> IntoChildren for &[T] {
    fn into_children(self, out: &mut Vec<Element>) {
        for child in self {
            child.clone().into_children(out);
        }
    }
}

impl<T: IntoChildren> IntoChildren for Option<T> {
    fn into_children(self, out: &mut Vec<Element>) {
        if let Some(child) = self {
            child.into_children(out);
        }
    }
}

impl IntoChildren for () {
    fn into_children(self, _out: &mut Vec<Element>) {}
}

impl IntoChildren for &str {
    fn into_children(self, out: &mut Vec<Element>) {
        out.push(Element::text(self));
    }
}

impl IntoChildren for String {
    fn into_children(self, out: &mut Vec<Element>) {
        out.push(Element::text(self));
    }
}

macro_rules! text_children {
    ($($ty:ty),*) => {
        $(impl IntoChildren for $ty {
            fn into_children(self, out: &mut Vec<Element>) {
                out.push(Element::text(self));
            }
        })*
    };
}

text_children!(i32, i64, u32, u64, usize, f32, f64);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scalar_children_become_text_descriptors() {
        let element = Element::host("p").child("Count: ").child(3).child(vec![
            Element::host("b"),
            Element::text("tail"),
        ]);

        let kinds: Vec<_> = element.children().iter().map(|c| c.kind().clone()).collect();
        assert_eq!(
            kinds,
            vec![
                ElementKind::Text,
                ElementKind::Text,
                ElementKind::Host(Rc::from("b")),
                ElementKind::Text,
            ]
        );
        assert_eq!(
            element.children()[1].props().get_str(TEXT_VALUE),
            Some("3")
        );
        assert!(element.children()[0].children().is_empty());
    }

    #[test]
    fn malformed_child_is_rejected_at_construction() {
        let handler = EventHandler::new(|_| {});
        let err = Element::host("div")
            .try_child(Value::Handler(handler))
            .unwrap_err();
        assert_eq!(
            err,
            ElementError::MalformedChild {
                parent: "div".into(),
                found: "event handler",
            }
        );

        let ok = Element::host("div").try_child(Value::Int(7)).expect("int child");
        assert_eq!(ok.children()[0].props().get_str(TEXT_VALUE), Some("7"));
    }

    #[test]
    fn style_and_event_helpers_build_expected_keys() {
        let element = Element::host("h1")
            .style("display", "flex")
            .style("align-items", "center")
            .on("click", |_| {});

        let style = match element.props().get(STYLE) {
            Some(Value::Style(style)) => style.clone(),
            other => panic!("unexpected style value {other:?}"),
        };
        assert_eq!(style.get("display").map(String::as_str), Some("flex"));
        assert_eq!(style.len(), 2);
        assert!(element.props().get("onClick").and_then(Value::as_handler).is_some());
    }

    #[test]
    fn component_identity_follows_render_function() {
        fn label(props: &Props) -> Element {
            Element::text(props.get_str("text").unwrap_or_default())
        }

        let first = Component::new("Label", label);
        let second = Component::new("Label", label);
        let other = Component::new("Other", |_: &Props| ());

        assert_eq!(first, second);
        assert_ne!(first, other);
        assert_eq!(
            ElementKind::Component(first.clone()),
            ElementKind::Component(second)
        );
        assert_eq!(first.render(&Props::default()).len(), 1);
    }

    #[test]
    fn fn_pointer_components_are_told_apart_by_address() {
        fn alpha(_: &Props) -> Element {
            Element::text("alpha")
        }
        fn beta(_: &Props) -> Element {
            Element::text("beta")
        }

        let alpha: fn(&Props) -> Element = alpha;
        let beta: fn(&Props) -> Element = beta;
        assert_eq!(Component::new("Same", alpha), Component::new("Same", alpha));
        assert_ne!(Component::new("Same", alpha), Component::new("Same", beta));
    }

    #[test]
    fn closures_from_one_factory_differ_by_name() {
        fn labelled(name: &str) -> Component {
            let text = name.to_owned();
            Component::new(name, move |_: &Props| Element::text(text.as_str()))
        }

        assert_eq!(labelled("left"), labelled("left"));
        assert_ne!(labelled("left"), labelled("right"));
    }
}
