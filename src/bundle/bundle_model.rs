use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::capture::context::FrameDescriptor;
use crate::dom::dom_model::Rect;
use crate::error::CaptureFailure;

/// Independent descriptors of one element. Every field is optional and
/// usable on its own by exactly one locate strategy.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LocatorSet {
    /// Absolute structural path from the nearest root, e.g. `/html/body/form/input[2]`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub xpath: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub aria_label: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub placeholder: Option<String>,

    /// Space-separated class list.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub class_list: Option<String>,

    /// Custom data attributes with the `data-` prefix stripped.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub data_attrs: BTreeMap<String, String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tag: Option<String>,

    /// Trimmed visible text, last-resort fuzzy match.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,

    /// Bounding box at capture time, final fallback.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bounding: Option<Rect>,
}

impl LocatorSet {
    /// True when no strategy could use this set. The tag alone is not a locator.
    pub fn is_empty(&self) -> bool {
        fn blank(v: &Option<String>) -> bool {
            v.as_deref().map_or(true, |s| s.trim().is_empty())
        }

        blank(&self.xpath)
            && blank(&self.id)
            && blank(&self.name)
            && blank(&self.aria_label)
            && blank(&self.placeholder)
            && blank(&self.class_list)
            && self.data_attrs.is_empty()
            && blank(&self.text)
            && self.bounding.is_none()
    }
}

/// Frame and shadow-root boundaries between the top document and the element.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContextChain {
    /// Outermost first.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub frames: Vec<FrameDescriptor>,

    /// Structural paths of shadow hosts, outermost first.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub shadow_hosts: Vec<String>,

    /// Whether any host in the chain uses a closed shadow root.
    #[serde(default)]
    pub closed_shadow: bool,
}

impl ContextChain {
    pub fn is_top_level(&self) -> bool {
        self.frames.is_empty() && self.shadow_hosts.is_empty()
    }
}

/// Portable identity of one element: the contract between capture and replay.
///
/// Built once at capture time and only read afterwards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ElementBundle {
    #[serde(flatten)]
    pub locators: LocatorSet,

    #[serde(default)]
    pub context: ContextChain,
}

impl ElementBundle {
    /// Combine locators and context, rejecting a bundle no strategy could use.
    pub fn new(locators: LocatorSet, context: ContextChain) -> Result<Self, CaptureFailure> {
        let bundle = Self { locators, context };
        bundle.validate()?;
        Ok(bundle)
    }

    pub fn validate(&self) -> Result<(), CaptureFailure> {
        if self.locators.is_empty() {
            return Err(CaptureFailure::EmptyBundle {
                tag: self.locators.tag.clone().unwrap_or_else(|| "?".into()),
            });
        }
        Ok(())
    }

    /// Stable SHA-1 over the bundle's canonical JSON, used to refer to the
    /// target in traces without logging its contents.
    pub fn fingerprint(&self) -> String {
        use sha1::{Digest, Sha1};

        let json = serde_json::to_string(self).unwrap_or_default();
        let mut hasher = Sha1::new();
        hasher.update(json.as_bytes());
        format!("{:x}", hasher.finalize())
    }

    /// Short human description for logs: `<input#email>` or `<button "Save">`.
    pub fn describe(&self) -> String {
        let tag = self.locators.tag.as_deref().unwrap_or("?");
        if let Some(id) = &self.locators.id {
            format!("<{}#{}>", tag, id)
        } else if let Some(name) = &self.locators.name {
            format!("<{} name={}>", tag, name)
        } else if let Some(text) = &self.locators.text {
            let short: String = text.chars().take(24).collect();
            format!("<{} \"{}\">", tag, short)
        } else if let Some(xpath) = &self.locators.xpath {
            format!("<{} {}>", tag, xpath)
        } else {
            format!("<{}>", tag)
        }
    }
}
