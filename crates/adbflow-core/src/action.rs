//! Action types
//!
//! An [`Action`] is a single typed automation instruction. Its parameters
//! may reference run-time variables; once every reference has been
//! substituted the action becomes a [`ResolvedAction`] ready to dispatch.

use crate::error::ActionError;
use crate::key_code::KeyCode;
use crate::params;
use indexmap::IndexMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value;
use std::fmt;

/// Raw parameters of an action, in authoring order
pub type Parameters = IndexMap<String, ParamValue>;

/// The closed set of action kinds
///
/// A kind name that is not recognised is kept as [`ActionKind::Unsupported`]
/// so that loading never fails on it; dispatching it yields
/// [`ActionError::UnsupportedActionKind`].
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ActionKind {
    Touch,
    Typing,
    Press,
    Apk,
    Wait,
    Unsupported(String),
}

impl ActionKind {
    pub fn as_str(&self) -> &str {
        match self {
            ActionKind::Touch => "touch",
            ActionKind::Typing => "typing",
            ActionKind::Press => "press",
            ActionKind::Apk => "apk",
            ActionKind::Wait => "wait",
            ActionKind::Unsupported(kind) => kind,
        }
    }

    /// Parameter names this kind accepts
    pub fn allowed_params(&self) -> &'static [&'static str] {
        match self {
            ActionKind::Touch => &[
                params::X,
                params::Y,
                params::XPATH,
                params::TEXT,
                params::IMAGE,
                params::SWIPE_X,
                params::SWIPE_Y,
                params::DURATION_MILLIS,
            ],
            ActionKind::Typing => &[params::TEXT],
            ActionKind::Press => &[params::KEY],
            ActionKind::Apk => &[params::PACKAGE, params::APK_PATH],
            ActionKind::Wait => &[params::SLEEP_MILLIS, params::SLEEP_TIME],
            ActionKind::Unsupported(_) => &[],
        }
    }
}

impl From<&str> for ActionKind {
    fn from(s: &str) -> Self {
        match s.trim().to_ascii_lowercase().as_str() {
            "touch" => ActionKind::Touch,
            "typing" => ActionKind::Typing,
            "press" => ActionKind::Press,
            "apk" => ActionKind::Apk,
            "wait" => ActionKind::Wait,
            _ => ActionKind::Unsupported(s.to_string()),
        }
    }
}

impl fmt::Display for ActionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for ActionKind {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for ActionKind {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Ok(ActionKind::from(s.as_str()))
    }
}

/// A piece of a parameter string: literal text or a `{{ name }}` reference
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TemplatePart<'a> {
    Text(&'a str),
    Var(&'a str),
}

/// Split a string into literal text and `{{ name }}` references
///
/// Braces around something that is not a variable name are kept as text.
pub fn split_template(s: &str) -> Vec<TemplatePart<'_>> {
    let mut parts = Vec::new();
    let mut rest = s;

    while let Some(start) = rest.find("{{") {
        let after = &rest[start + 2..];
        let Some(end) = after.find("}}") else {
            break;
        };
        let name = after[..end].trim();

        if is_variable_name(name) {
            if start > 0 {
                parts.push(TemplatePart::Text(&rest[..start]));
            }
            parts.push(TemplatePart::Var(name));
        } else {
            parts.push(TemplatePart::Text(&rest[..start + 2 + end + 2]));
        }
        rest = &after[end + 2..];
    }

    if !rest.is_empty() {
        parts.push(TemplatePart::Text(rest));
    }
    parts
}

fn is_variable_name(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '.' | '-'))
}

/// A raw parameter value
///
/// Serialized as plain JSON/YAML: a string that is exactly `{{ name }}` is a
/// variable reference, a string mixing text and references is a template,
/// anything else is a literal.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "Value", into = "Value")]
pub enum ParamValue {
    /// Concrete value, passed through unchanged
    Literal(Value),
    /// Whole-value reference to a variable
    Variable(String),
    /// Text with embedded variable references
    Template(String),
}

impl ParamValue {
    /// Classify a parameter string
    pub fn parse(s: &str) -> Self {
        let parts = split_template(s);
        match parts.as_slice() {
            [TemplatePart::Var(name)] => ParamValue::Variable((*name).to_string()),
            parts if parts.iter().any(|p| matches!(p, TemplatePart::Var(_))) => {
                ParamValue::Template(s.to_string())
            }
            _ => ParamValue::Literal(Value::String(s.to_string())),
        }
    }

    pub fn literal(value: impl Into<Value>) -> Self {
        ParamValue::Literal(value.into())
    }

    pub fn variable(name: impl Into<String>) -> Self {
        ParamValue::Variable(name.into())
    }

    /// Names of the variables this value references
    pub fn variables(&self) -> Vec<&str> {
        match self {
            ParamValue::Literal(_) => Vec::new(),
            ParamValue::Variable(name) => vec![name.as_str()],
            ParamValue::Template(template) => split_template(template)
                .into_iter()
                .filter_map(|p| match p {
                    TemplatePart::Var(name) => Some(name),
                    TemplatePart::Text(_) => None,
                })
                .collect(),
        }
    }

    pub fn is_literal(&self) -> bool {
        matches!(self, ParamValue::Literal(_))
    }
}

impl From<Value> for ParamValue {
    fn from(value: Value) -> Self {
        match value {
            Value::String(s) => ParamValue::parse(&s),
            other => ParamValue::Literal(other),
        }
    }
}

impl From<ParamValue> for Value {
    fn from(value: ParamValue) -> Self {
        match value {
            ParamValue::Literal(v) => v,
            ParamValue::Variable(name) => Value::String(format!("{{{{ {} }}}}", name)),
            ParamValue::Template(template) => Value::String(template),
        }
    }
}

impl From<&str> for ParamValue {
    fn from(s: &str) -> Self {
        ParamValue::parse(s)
    }
}

impl From<String> for ParamValue {
    fn from(s: String) -> Self {
        ParamValue::parse(&s)
    }
}

impl From<i64> for ParamValue {
    fn from(n: i64) -> Self {
        ParamValue::Literal(n.into())
    }
}

impl From<i32> for ParamValue {
    fn from(n: i32) -> Self {
        ParamValue::Literal(n.into())
    }
}

/// Script action
///
/// Actions are immutable once authored; editing a workflow replaces them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Action {
    /// Which handler runs this action
    pub kind: ActionKind,

    /// Raw parameters
    #[serde(default)]
    pub parameters: Parameters,

    /// Optional human-readable label
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub alias: Option<String>,
}

impl Action {
    /// Create an action with no parameters
    pub fn new(kind: ActionKind) -> Self {
        Self {
            kind,
            parameters: Parameters::new(),
            alias: None,
        }
    }

    /// Builder-style parameter insert
    pub fn with_param(mut self, name: impl Into<String>, value: impl Into<ParamValue>) -> Self {
        self.parameters.insert(name.into(), value.into());
        self
    }

    /// Builder-style alias
    pub fn with_alias(mut self, alias: impl Into<String>) -> Self {
        self.alias = Some(alias.into());
        self
    }

    /// Tap an absolute coordinate
    pub fn touch_at(x: i32, y: i32) -> Self {
        Self::new(ActionKind::Touch)
            .with_param(params::X, x)
            .with_param(params::Y, y)
    }

    /// Tap the element showing `text`
    pub fn touch_text(text: impl Into<ParamValue>) -> Self {
        Self::new(ActionKind::Touch).with_param(params::TEXT, text)
    }

    pub fn typing(text: impl Into<ParamValue>) -> Self {
        Self::new(ActionKind::Typing).with_param(params::TEXT, text)
    }

    pub fn press(key: impl Into<ParamValue>) -> Self {
        Self::new(ActionKind::Press).with_param(params::KEY, key)
    }

    pub fn apk(package: impl Into<ParamValue>) -> Self {
        Self::new(ActionKind::Apk).with_param(params::PACKAGE, package)
    }

    pub fn wait(sleep_millis: impl Into<ParamValue>) -> Self {
        Self::new(ActionKind::Wait).with_param(params::SLEEP_MILLIS, sleep_millis)
    }

    /// Get display name
    pub fn display_name(&self) -> &str {
        self.alias.as_deref().unwrap_or_else(|| self.kind.as_str())
    }

    /// Names of all variables referenced by this action's parameters
    pub fn variables(&self) -> Vec<&str> {
        self.parameters
            .values()
            .flat_map(ParamValue::variables)
            .collect()
    }

    /// Check that the parameters fit the action kind
    ///
    /// Presence, unknown names and locator exclusivity are always checked.
    /// Values are only checked when they are literals; variable references
    /// are checked after resolution by the handler.
    pub fn validate(&self) -> Result<(), ActionError> {
        if let ActionKind::Unsupported(kind) = &self.kind {
            return Err(ActionError::UnsupportedActionKind(kind.clone()));
        }

        let allowed = self.kind.allowed_params();
        if let Some(name) = self
            .parameters
            .keys()
            .find(|name| !allowed.contains(&name.as_str()))
        {
            return Err(ActionError::invalid(
                name.clone(),
                format!("not a parameter of '{}' actions", self.kind),
            ));
        }

        match &self.kind {
            ActionKind::Touch => self.validate_touch(),
            ActionKind::Typing => self.require(params::TEXT).map(|_| ()),
            ActionKind::Press => {
                if let ParamValue::Literal(value) = self.require(params::KEY)? {
                    value_as_string(params::KEY, value)?.parse::<KeyCode>()?;
                }
                Ok(())
            }
            ActionKind::Apk => self.require(params::PACKAGE).map(|_| ()),
            ActionKind::Wait => self.validate_wait(),
            ActionKind::Unsupported(_) => Ok(()),
        }
    }

    fn require(&self, name: &str) -> Result<&ParamValue, ActionError> {
        self.parameters
            .get(name)
            .ok_or_else(|| ActionError::invalid(name, "missing required parameter"))
    }

    fn has(&self, name: &str) -> bool {
        self.parameters.contains_key(name)
    }

    fn validate_touch(&self) -> Result<(), ActionError> {
        if self.has(params::X) != self.has(params::Y) {
            return Err(ActionError::invalid(
                params::X,
                "x and y must be set together",
            ));
        }
        if self.has(params::SWIPE_X) != self.has(params::SWIPE_Y) {
            return Err(ActionError::invalid(
                params::SWIPE_X,
                "swipeX and swipeY must be set together",
            ));
        }

        let locators = [
            self.has(params::X),
            self.has(params::XPATH),
            self.has(params::TEXT),
            self.has(params::IMAGE),
        ]
        .into_iter()
        .filter(|set| *set)
        .count();

        if locators != 1 {
            return Err(ActionError::invalid(
                "locator",
                format!(
                    "exactly one of x/y, xpath, text or image must be set (found {})",
                    locators
                ),
            ));
        }
        Ok(())
    }

    fn validate_wait(&self) -> Result<(), ActionError> {
        let (name, value) = match (
            self.parameters.get(params::SLEEP_MILLIS),
            self.parameters.get(params::SLEEP_TIME),
        ) {
            (Some(v), None) => (params::SLEEP_MILLIS, v),
            (None, Some(v)) => (params::SLEEP_TIME, v),
            (Some(_), Some(_)) => {
                return Err(ActionError::invalid(
                    params::SLEEP_MILLIS,
                    "sleepMillis and sleepTime are mutually exclusive",
                ))
            }
            (None, None) => {
                return Err(ActionError::invalid(
                    params::SLEEP_MILLIS,
                    "missing required parameter",
                ))
            }
        };

        if let ParamValue::Literal(value) = value {
            if value_as_i64(name, value)? < 0 {
                return Err(ActionError::invalid(name, "must not be negative"));
            }
        }
        Ok(())
    }
}

/// An action with every variable reference replaced by a concrete value
///
/// Produced fresh for every execution attempt.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResolvedAction {
    kind: ActionKind,
    parameters: IndexMap<String, Value>,
}

impl ResolvedAction {
    pub fn new(kind: ActionKind, parameters: IndexMap<String, Value>) -> Self {
        Self { kind, parameters }
    }

    pub fn kind(&self) -> &ActionKind {
        &self.kind
    }

    pub fn parameters(&self) -> &IndexMap<String, Value> {
        &self.parameters
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.parameters.get(name)
    }

    pub fn has(&self, name: &str) -> bool {
        self.parameters.contains_key(name)
    }

    /// Optional parameter read as a string
    pub fn string(&self, name: &str) -> Result<Option<String>, ActionError> {
        self.get(name)
            .map(|value| value_as_string(name, value))
            .transpose()
    }

    /// Required parameter read as a string
    pub fn require_string(&self, name: &str) -> Result<String, ActionError> {
        self.string(name)?
            .ok_or_else(|| ActionError::invalid(name, "missing required parameter"))
    }

    /// Optional parameter read as an integer
    pub fn integer(&self, name: &str) -> Result<Option<i64>, ActionError> {
        self.get(name).map(|value| value_as_i64(name, value)).transpose()
    }

    /// Required parameter read as an integer
    pub fn require_integer(&self, name: &str) -> Result<i64, ActionError> {
        self.integer(name)?
            .ok_or_else(|| ActionError::invalid(name, "missing required parameter"))
    }
}

fn value_as_string(name: &str, value: &Value) -> Result<String, ActionError> {
    match value {
        Value::String(s) => Ok(s.clone()),
        Value::Number(n) => Ok(n.to_string()),
        Value::Bool(b) => Ok(b.to_string()),
        other => Err(ActionError::invalid(
            name,
            format!("expected a string, got {}", other),
        )),
    }
}

fn value_as_i64(name: &str, value: &Value) -> Result<i64, ActionError> {
    match value {
        Value::Number(n) => n
            .as_i64()
            .ok_or_else(|| ActionError::invalid(name, format!("expected an integer, got {}", n))),
        Value::String(s) => s
            .trim()
            .parse::<i64>()
            .map_err(|_| ActionError::invalid(name, format!("expected an integer, got '{}'", s))),
        other => Err(ActionError::invalid(
            name,
            format!("expected an integer, got {}", other),
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_param_value_classification() {
        assert_eq!(
            ParamValue::parse("{{ username }}"),
            ParamValue::Variable("username".to_string())
        );
        assert_eq!(
            ParamValue::parse("Hello {{name}}!"),
            ParamValue::Template("Hello {{name}}!".to_string())
        );
        assert_eq!(
            ParamValue::parse("plain text"),
            ParamValue::Literal(json!("plain text"))
        );
        // Not a variable name, so it stays literal
        assert_eq!(
            ParamValue::parse("{{ 1 + 2 }}"),
            ParamValue::Literal(json!("{{ 1 + 2 }}"))
        );
    }

    #[test]
    fn test_split_template() {
        let parts = split_template("a{{ x }}b{{y}}");
        assert_eq!(
            parts,
            vec![
                TemplatePart::Text("a"),
                TemplatePart::Var("x"),
                TemplatePart::Text("b"),
                TemplatePart::Var("y"),
            ]
        );
        assert_eq!(split_template("no close {{ x"), vec![TemplatePart::Text("no close {{ x")]);
    }

    #[test]
    fn test_action_deserialize() {
        let json = r#"{
            "kind": "touch",
            "parameters": {"x": 100, "y": "{{ row_y }}"}
        }"#;

        let action: Action = serde_json::from_str(json).unwrap();
        assert_eq!(action.kind, ActionKind::Touch);
        assert_eq!(action.parameters["x"], ParamValue::Literal(json!(100)));
        assert_eq!(action.variables(), vec!["row_y"]);
        assert!(action.validate().is_ok());
    }

    #[test]
    fn test_unknown_kind_is_kept() {
        let action: Action = serde_json::from_str(r#"{"kind": "unknown"}"#).unwrap();
        assert_eq!(action.kind, ActionKind::Unsupported("unknown".to_string()));
        assert!(matches!(
            action.validate(),
            Err(ActionError::UnsupportedActionKind(_))
        ));
    }

    #[test]
    fn test_action_serializes_variables_as_tokens() {
        let action = Action::typing("{{ username }}");
        let value = serde_json::to_value(&action).unwrap();
        assert_eq!(value["kind"], json!("typing"));
        assert_eq!(value["parameters"]["text"], json!("{{ username }}"));
    }

    #[test]
    fn test_touch_requires_exactly_one_locator() {
        assert!(Action::touch_at(1, 2).validate().is_ok());
        assert!(Action::touch_text("OK").validate().is_ok());

        let none = Action::new(ActionKind::Touch);
        assert!(matches!(
            none.validate(),
            Err(ActionError::InvalidParameter { .. })
        ));

        let two = Action::touch_at(1, 2).with_param(params::TEXT, "OK");
        assert!(matches!(
            two.validate(),
            Err(ActionError::InvalidParameter { .. })
        ));

        let half = Action::new(ActionKind::Touch).with_param(params::X, 5);
        assert!(half.validate().is_err());
    }

    #[test]
    fn test_unknown_parameter_rejected() {
        let action = Action::typing("hi").with_param("speed", 3);
        let err = action.validate().unwrap_err();
        assert!(matches!(err, ActionError::InvalidParameter { ref name, .. } if name == "speed"));
    }

    #[test]
    fn test_press_validates_literal_key() {
        assert!(Action::press("back").validate().is_ok());
        assert!(Action::press("{{ key }}").validate().is_ok());
        assert!(matches!(
            Action::press("warp").validate(),
            Err(ActionError::UnknownKeyCode(_))
        ));
    }

    #[test]
    fn test_wait_validation() {
        assert!(Action::wait(0).validate().is_ok());
        assert!(Action::wait(-1).validate().is_err());
        assert!(Action::wait("soon").validate().is_err());
        assert!(Action::wait("{{ delay }}").validate().is_ok());

        let legacy = Action::new(ActionKind::Wait).with_param(params::SLEEP_TIME, "250");
        assert!(legacy.validate().is_ok());
    }

    #[test]
    fn test_resolved_accessors() {
        let mut parameters = IndexMap::new();
        parameters.insert("sleepMillis".to_string(), json!("1500"));
        parameters.insert("text".to_string(), json!(42));
        let resolved = ResolvedAction::new(ActionKind::Wait, parameters);

        assert_eq!(resolved.require_integer("sleepMillis").unwrap(), 1500);
        assert_eq!(resolved.require_string("text").unwrap(), "42");
        assert_eq!(resolved.integer("missing").unwrap(), None);
        assert!(resolved.require_string("missing").is_err());
    }

    #[test]
    fn test_integer_parsing_is_strict() {
        let mut parameters = IndexMap::new();
        parameters.insert("n".to_string(), json!("1.5"));
        parameters.insert("m".to_string(), json!(2.5));
        let resolved = ResolvedAction::new(ActionKind::Wait, parameters);

        assert!(resolved.integer("n").is_err());
        assert!(resolved.integer("m").is_err());
    }
}
