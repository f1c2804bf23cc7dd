//! User-agent classification as an injected capability.
//!
//! Device and OS extraction is a pluggable seam: the ingestor takes any
//! [`UserAgentParser`], and the default [`BestEffortParser`] does cheap
//! substring classification. The contract is total: unparseable input
//! yields empty fields, never an error.

/// Device and operating system derived from a `User-Agent` string.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeviceInfo {
    /// Device family or model name. Empty when unknown.
    pub device_name: String,
    /// Operating system name. Empty when unknown.
    pub operating_system: String,
}

/// Capability contract for user-agent classification.
pub trait UserAgentParser: Send + Sync {
    /// Classifies a raw `User-Agent` header value.
    ///
    /// Must be tolerant of arbitrary input: an empty or unrecognizable
    /// agent returns a [`DeviceInfo`] with empty fields.
    fn parse(&self, user_agent: &str) -> DeviceInfo;
}

/// Substring-matching classifier covering the common browser and mobile
/// agent families.
#[derive(Debug, Clone, Copy, Default)]
pub struct BestEffortParser;

impl BestEffortParser {
    fn operating_system(user_agent: &str) -> &'static str {
        if user_agent.contains("Android") {
            "Android"
        } else if user_agent.contains("iPhone OS") || user_agent.contains("iOS") {
            "iOS"
        } else if user_agent.contains("Windows NT") {
            "Windows"
        } else if user_agent.contains("Mac OS X") {
            "macOS"
        } else if user_agent.contains("CrOS") {
            "ChromeOS"
        } else if user_agent.contains("Linux") {
            "Linux"
        } else {
            ""
        }
    }

    fn device_name(user_agent: &str) -> String {
        if user_agent.contains("iPhone") {
            return "iPhone".to_string();
        }
        if user_agent.contains("iPad") {
            return "iPad".to_string();
        }
        // Android agents carry a model token between the last ';' and the
        // closing ')' of the platform segment, e.g.
        // "(Linux; Android 13; Pixel 7)".
        if user_agent.contains("Android") {
            if let Some(model) = android_model(user_agent) {
                return model;
            }
            return "Android Device".to_string();
        }
        if user_agent.contains("Windows NT")
            || user_agent.contains("Mac OS X")
            || user_agent.contains("CrOS")
            || user_agent.contains("X11")
        {
            return "Desktop".to_string();
        }
        String::new()
    }
}

/// Extracts the device model from an Android platform segment.
fn android_model(user_agent: &str) -> Option<String> {
    let open = user_agent.find('(')?;
    let rest = user_agent.get(open + 1..)?;
    let close = rest.find(')')?;
    let segment = rest.get(..close)?;
    let model = segment.rsplit(';').next()?.trim();
    // "Build/..." suffixes are noise, older agents append them to the model.
    let model = model.split(" Build/").next().unwrap_or(model).trim();
    if model.is_empty() || model.eq_ignore_ascii_case("android") {
        None
    } else {
        Some(model.to_string())
    }
}

impl UserAgentParser for BestEffortParser {
    fn parse(&self, user_agent: &str) -> DeviceInfo {
        DeviceInfo {
            device_name: Self::device_name(user_agent),
            operating_system: Self::operating_system(user_agent).to_string(),
        }
    }
}
