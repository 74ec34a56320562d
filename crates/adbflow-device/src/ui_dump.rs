//! UI hierarchy parsing
//!
//! Parses the XML written by `uiautomator dump` into a flat list of nodes
//! and finds touch targets by visible text or by a small xpath subset:
//!
//! - `//*[@attr='value']`
//! - `//Class[@attr='value']` (class matched on its simple or full name)
//! - `//Class`

use crate::{DeviceError, DeviceResult};
use adbflow_core::Point;
use regex::Regex;
use std::collections::HashMap;
use std::sync::OnceLock;

static NODE_RE: OnceLock<Regex> = OnceLock::new();
static ATTR_RE: OnceLock<Regex> = OnceLock::new();
static BOUNDS_RE: OnceLock<Regex> = OnceLock::new();
static XPATH_RE: OnceLock<Regex> = OnceLock::new();

fn node_re() -> &'static Regex {
    NODE_RE.get_or_init(|| Regex::new(r"<node\b([^>]*?)/?>").expect("node pattern is valid"))
}

fn attr_re() -> &'static Regex {
    ATTR_RE.get_or_init(|| Regex::new(r#"([\w:-]+)="([^"]*)""#).expect("attribute pattern is valid"))
}

fn bounds_re() -> &'static Regex {
    BOUNDS_RE.get_or_init(|| {
        Regex::new(r"^\[(-?\d+),(-?\d+)\]\[(-?\d+),(-?\d+)\]$").expect("bounds pattern is valid")
    })
}

fn xpath_re() -> &'static Regex {
    XPATH_RE.get_or_init(|| {
        Regex::new(r#"^//([\w.$*]+)(?:\[@([\w:-]+)=['"]([^'"]*)['"]\])?$"#)
            .expect("xpath pattern is valid")
    })
}

/// Screen rectangle of a node
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Bounds {
    pub left: i32,
    pub top: i32,
    pub right: i32,
    pub bottom: i32,
}

impl Bounds {
    /// Parse `[left,top][right,bottom]`
    pub fn parse(s: &str) -> Option<Self> {
        let caps = bounds_re().captures(s.trim())?;
        let n = |i: usize| caps.get(i).and_then(|m| m.as_str().parse::<i32>().ok());
        Some(Self {
            left: n(1)?,
            top: n(2)?,
            right: n(3)?,
            bottom: n(4)?,
        })
    }

    pub fn center(&self) -> Point {
        Point::new(midpoint(self.left, self.right), midpoint(self.top, self.bottom))
    }

    pub fn is_empty(&self) -> bool {
        self.right <= self.left || self.bottom <= self.top
    }
}

/// Midpoint of two coordinates; dumps can carry values near `i32::MAX`
fn midpoint(a: i32, b: i32) -> i32 {
    ((i64::from(a) + i64::from(b)) / 2) as i32
}

/// One element of the UI hierarchy
#[derive(Debug, Clone, PartialEq)]
pub struct UiNode {
    pub attributes: HashMap<String, String>,
    pub bounds: Option<Bounds>,
}

impl UiNode {
    pub fn attr(&self, name: &str) -> Option<&str> {
        self.attributes.get(name).map(String::as_str)
    }

    /// Fully qualified widget class, e.g. `android.widget.Button`
    pub fn class(&self) -> Option<&str> {
        self.attr("class")
    }

    fn matches_class(&self, wanted: &str) -> bool {
        if wanted == "*" {
            return true;
        }
        match self.class() {
            Some(class) => class == wanted || class.rsplit('.').next() == Some(wanted),
            None => false,
        }
    }
}

/// A parsed xpath subset selector
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UiSelector {
    pub class: String,
    pub attribute: Option<(String, String)>,
}

impl UiSelector {
    pub fn parse(path: &str) -> DeviceResult<Self> {
        let caps = xpath_re().captures(path.trim()).ok_or_else(|| {
            DeviceError::Unsupported(format!(
                "xpath '{}' (expected //Class or //Class[@attr='value'])",
                path
            ))
        })?;

        let class = caps[1].to_string();
        let attribute = match (caps.get(2), caps.get(3)) {
            (Some(name), Some(value)) => Some((name.as_str().to_string(), value.as_str().to_string())),
            _ => None,
        };
        Ok(Self { class, attribute })
    }

    fn matches(&self, node: &UiNode) -> bool {
        if !node.matches_class(&self.class) {
            return false;
        }
        match &self.attribute {
            Some((name, value)) => node.attr(name) == Some(value.as_str()),
            None => true,
        }
    }
}

/// Flat view of a `uiautomator dump`
#[derive(Debug, Clone, Default, PartialEq)]
pub struct UiHierarchy {
    nodes: Vec<UiNode>,
}

impl UiHierarchy {
    /// Parse the dump; text outside `<node>` tags is ignored
    pub fn parse(xml: &str) -> Self {
        let nodes = node_re()
            .captures_iter(xml)
            .map(|caps| {
                let attributes: HashMap<String, String> = attr_re()
                    .captures_iter(&caps[1])
                    .map(|a| (a[1].to_string(), unescape_xml(&a[2])))
                    .collect();
                let bounds = attributes.get("bounds").and_then(|b| Bounds::parse(b));
                UiNode { attributes, bounds }
            })
            .collect();
        Self { nodes }
    }

    pub fn nodes(&self) -> &[UiNode] {
        &self.nodes
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// First visible node whose text or content description equals `text`
    pub fn find_by_text(&self, text: &str) -> Option<&UiNode> {
        self.visible()
            .find(|n| n.attr("text") == Some(text) || n.attr("content-desc") == Some(text))
    }

    /// First visible node matching the selector
    pub fn find(&self, selector: &UiSelector) -> Option<&UiNode> {
        self.visible().find(|n| selector.matches(n))
    }

    fn visible(&self) -> impl Iterator<Item = &UiNode> {
        self.nodes
            .iter()
            .filter(|n| n.bounds.map(|b| !b.is_empty()).unwrap_or(false))
    }
}

fn unescape_xml(s: &str) -> String {
    s.replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&apos;", "'")
        .replace("&amp;", "&")
}

#[cfg(test)]
mod tests {
    use super::*;

    const DUMP: &str = r#"<?xml version='1.0' encoding='UTF-8' standalone='yes' ?><hierarchy rotation="0"><node index="0" text="" resource-id="" class="android.widget.FrameLayout" bounds="[0,0][1080,2340]"><node index="0" text="Sign in" resource-id="com.example:id/login" class="android.widget.Button" content-desc="" bounds="[100,200][300,260]" /><node index="1" text="" resource-id="com.example:id/user" class="android.widget.EditText" content-desc="User name" bounds="[100,300][980,380]" /><node index="2" text="Hidden" class="android.widget.TextView" bounds="[0,0][0,0]" /><node index="3" text="Fish &amp; Chips" class="android.widget.TextView" bounds="[10,10][20,20]" /></node></hierarchy>UI hierchary dumped to: /dev/tty"#;

    #[test]
    fn test_parse_nodes() {
        let ui = UiHierarchy::parse(DUMP);
        assert_eq!(ui.len(), 5);
        assert_eq!(ui.nodes()[1].class(), Some("android.widget.Button"));
    }

    #[test]
    fn test_find_by_text_and_description() {
        let ui = UiHierarchy::parse(DUMP);

        let login = ui.find_by_text("Sign in").unwrap();
        assert_eq!(login.bounds.unwrap().center(), Point::new(200, 230));

        let user = ui.find_by_text("User name").unwrap();
        assert_eq!(user.attr("resource-id"), Some("com.example:id/user"));

        assert!(ui.find_by_text("Fish & Chips").is_some());
    }

    #[test]
    fn test_zero_size_nodes_are_skipped() {
        let ui = UiHierarchy::parse(DUMP);
        assert!(ui.find_by_text("Hidden").is_none());
    }

    #[test]
    fn test_xpath_subset() {
        let ui = UiHierarchy::parse(DUMP);

        let by_id = UiSelector::parse("//*[@resource-id='com.example:id/login']").unwrap();
        assert_eq!(ui.find(&by_id).unwrap().attr("text"), Some("Sign in"));

        let by_class = UiSelector::parse("//EditText").unwrap();
        assert!(ui.find(&by_class).is_some());

        let full_class = UiSelector::parse(r#"//android.widget.Button[@text="Sign in"]"#).unwrap();
        assert!(ui.find(&full_class).is_some());
    }

    #[test]
    fn test_unsupported_xpath() {
        assert!(matches!(
            UiSelector::parse("/hierarchy/node[1]"),
            Err(DeviceError::Unsupported(_))
        ));
    }

    #[test]
    fn test_bounds_parse() {
        assert_eq!(
            Bounds::parse("[1,2][3,4]"),
            Some(Bounds {
                left: 1,
                top: 2,
                right: 3,
                bottom: 4
            })
        );
        assert_eq!(Bounds::parse("garbage"), None);
    }

    #[test]
    fn test_center_of_extreme_bounds() {
        let bounds = Bounds::parse("[2147483000,-2147483648][2147483646,2147483647]").unwrap();
        assert_eq!(bounds.center(), Point::new(2147483323, 0));

        let bounds = Bounds::parse("[-2147483648,-2147483648][-2147483000,-10]").unwrap();
        assert_eq!(bounds.center(), Point::new(-2147483324, -1073741829));
    }
}
