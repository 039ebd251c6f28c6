//! Visitor context classification.
//!
//! Every test here is a first-match walk over an ordered marker list, so the
//! order of each list is part of the contract: an Edge user agent also carries
//! `Chrome` and is reported as Chrome, an Android user agent also carries
//! `Linux` and is reported as Linux.

use std::fmt;

use serde::{Deserialize, Serialize};
use url::Url;

//
// ─── DEVICE ────────────────────────────────────────────────────────────────────
//

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeviceType {
    Mobile,
    Tablet,
    Desktop,
}

/// Matched case-insensitively.
const MOBILE_MARKERS: &[&str] = &[
    "android",
    "webos",
    "iphone",
    "ipod",
    "blackberry",
    "iemobile",
    "opera mini",
];

const TABLET_MARKERS: &[&str] = &["ipad"];

impl DeviceType {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            DeviceType::Mobile => "mobile",
            DeviceType::Tablet => "tablet",
            DeviceType::Desktop => "desktop",
        }
    }
}

impl fmt::Display for DeviceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Classify the device from a user-agent string. Mobile markers win over
/// tablet markers; anything else is a desktop.
#[must_use]
pub fn device_type(user_agent: &str) -> DeviceType {
    let ua = user_agent.to_ascii_lowercase();
    if MOBILE_MARKERS.iter().any(|m| ua.contains(m)) {
        DeviceType::Mobile
    } else if TABLET_MARKERS.iter().any(|m| ua.contains(m)) {
        DeviceType::Tablet
    } else {
        DeviceType::Desktop
    }
}

//
// ─── BROWSER ───────────────────────────────────────────────────────────────────
//

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Browser {
    Chrome,
    Firefox,
    Safari,
    Edge,
    Opera,
    #[serde(other)]
    Unknown,
}

const BROWSER_ORDER: &[(&str, Browser)] = &[
    ("Chrome", Browser::Chrome),
    ("Firefox", Browser::Firefox),
    ("Safari", Browser::Safari),
    ("Edge", Browser::Edge),
    ("Opera", Browser::Opera),
];

impl Browser {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Browser::Chrome => "Chrome",
            Browser::Firefox => "Firefox",
            Browser::Safari => "Safari",
            Browser::Edge => "Edge",
            Browser::Opera => "Opera",
            Browser::Unknown => "Unknown",
        }
    }
}

impl fmt::Display for Browser {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Classify the browser family. Case-sensitive, first match in affinity order.
#[must_use]
pub fn browser(user_agent: &str) -> Browser {
    BROWSER_ORDER
        .iter()
        .find(|(marker, _)| user_agent.contains(marker))
        .map_or(Browser::Unknown, |(_, b)| *b)
}

//
// ─── OPERATING SYSTEM ──────────────────────────────────────────────────────────
//

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OperatingSystem {
    Windows,
    #[serde(rename = "macOS")]
    MacOs,
    Linux,
    Android,
    #[serde(rename = "iOS")]
    Ios,
    #[serde(other)]
    Unknown,
}

const OS_ORDER: &[(&str, OperatingSystem)] = &[
    ("Windows", OperatingSystem::Windows),
    ("Mac", OperatingSystem::MacOs),
    ("Linux", OperatingSystem::Linux),
    ("Android", OperatingSystem::Android),
    ("iOS", OperatingSystem::Ios),
];

impl OperatingSystem {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            OperatingSystem::Windows => "Windows",
            OperatingSystem::MacOs => "macOS",
            OperatingSystem::Linux => "Linux",
            OperatingSystem::Android => "Android",
            OperatingSystem::Ios => "iOS",
            OperatingSystem::Unknown => "Unknown",
        }
    }
}

impl fmt::Display for OperatingSystem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Classify the operating system family. Case-sensitive, first match.
#[must_use]
pub fn operating_system(user_agent: &str) -> OperatingSystem {
    OS_ORDER
        .iter()
        .find(|(marker, _)| user_agent.contains(marker))
        .map_or(OperatingSystem::Unknown, |(_, os)| *os)
}

//
// ─── CAMPAIGN ATTRIBUTION ──────────────────────────────────────────────────────
//

/// The five UTM parameters. Absent parameters serialize as `null`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UtmParams {
    #[serde(default)]
    pub utm_source: Option<String>,
    #[serde(default)]
    pub utm_medium: Option<String>,
    #[serde(default)]
    pub utm_campaign: Option<String>,
    #[serde(default)]
    pub utm_term: Option<String>,
    #[serde(default)]
    pub utm_content: Option<String>,
}

impl UtmParams {
    /// Read the UTM parameters from an absolute URL.
    ///
    /// The first occurrence of a repeated parameter wins. A URL that does not
    /// parse yields all-`None` rather than an error.
    #[must_use]
    pub fn from_url(href: &str) -> Self {
        let Ok(url) = Url::parse(href) else {
            return Self::default();
        };
        let mut params = Self::default();
        for (key, value) in url.query_pairs() {
            let slot = match key.as_ref() {
                "utm_source" => &mut params.utm_source,
                "utm_medium" => &mut params.utm_medium,
                "utm_campaign" => &mut params.utm_campaign,
                "utm_term" => &mut params.utm_term,
                "utm_content" => &mut params.utm_content,
                _ => continue,
            };
            if slot.is_none() {
                *slot = Some(value.into_owned());
            }
        }
        params
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.utm_source.is_none()
            && self.utm_medium.is_none()
            && self.utm_campaign.is_none()
            && self.utm_term.is_none()
            && self.utm_content.is_none()
    }
}

//
// ─── COMBINED ──────────────────────────────────────────────────────────────────
//

/// Everything the classifier derives for one emission.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VisitorContext {
    pub device_type: DeviceType,
    pub browser: Browser,
    pub operating_system: OperatingSystem,
    pub utm: UtmParams,
}

impl VisitorContext {
    /// Classify from the raw user agent and the current location.
    #[must_use]
    pub fn classify(user_agent: &str, href: &str) -> Self {
        Self {
            device_type: device_type(user_agent),
            browser: browser(user_agent),
            operating_system: operating_system(user_agent),
            utm: UtmParams::from_url(href),
        }
    }
}
