//! Device identification from request metadata.
//!
//! The fingerprint is an opaque comparable string: two logins come from the
//! same device exactly when their fingerprints are byte-equal. The owner label
//! is only shown to humans (admin session lists, "active elsewhere" notices).

use std::net::IpAddr;

use chrono::{DateTime, Utc};
use sha2::{Digest, Sha256};

/// Longest client fingerprint stored verbatim; longer ones are hashed.
const MAX_FINGERPRINT_LEN: usize = 128;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceIdentity {
    pub fingerprint: String,
    pub owner_label: String,
}

impl DeviceIdentity {
    pub fn derive(
        ip: &str,
        user_agent: &str,
        client_fingerprint: Option<&str>,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            fingerprint: fingerprint(ip, user_agent, client_fingerprint),
            owner_label: owner_label(ip, user_agent, now),
        }
    }
}

fn sha256_hex(input: &str) -> String {
    let hash = Sha256::digest(input.as_bytes());
    format!("{hash:x}")
}

pub fn fingerprint(ip: &str, user_agent: &str, client_fingerprint: Option<&str>) -> String {
    match client_fingerprint.map(str::trim).filter(|fp| !fp.is_empty()) {
        Some(fp) if fp.len() > MAX_FINGERPRINT_LEN => sha256_hex(fp),
        Some(fp) => fp.to_string(),
        None => sha256_hex(&format!("{ip}:{user_agent}")),
    }
}

pub fn owner_label(ip: &str, user_agent: &str, now: DateTime<Utc>) -> String {
    let mut label = format!(
        "{} · {} · {}",
        parse_os(user_agent),
        parse_browser(user_agent),
        now.format("%Y-%m-%d %H:%M UTC")
    );
    if let Some(location) = coarse_location(ip) {
        label.push_str(" · ");
        label.push_str(location);
    }
    label
}

pub fn parse_os(user_agent: &str) -> &'static str {
    let ua = user_agent.to_ascii_lowercase();

    if ua.contains("windows") {
        "Windows"
    } else if ua.contains("android") {
        "Android"
    } else if ua.contains("iphone") || ua.contains("ipad") || ua.contains("ipod") {
        "iOS"
    } else if ua.contains("mac os") || ua.contains("macintosh") {
        "macOS"
    } else if ua.contains(" cros") {
        "ChromeOS"
    } else if ua.contains("linux") {
        "Linux"
    } else {
        "Unknown OS"
    }
}

// Order matters: Edge and Opera UAs also advertise Chrome, and nearly every
// engine advertises Safari.
pub fn parse_browser(user_agent: &str) -> &'static str {
    let ua = user_agent;

    if ua.contains("Edg/") {
        "Edge"
    } else if ua.contains("OPR/") || ua.contains("Opera") {
        "Opera"
    } else if ua.contains("SamsungBrowser") {
        "Samsung Internet"
    } else if ua.contains("Chrome/") || ua.contains("CriOS/") {
        "Chrome"
    } else if ua.contains("Firefox/") || ua.contains("FxiOS/") {
        "Firefox"
    } else if ua.contains("Safari/") {
        "Safari"
    } else {
        "Unknown browser"
    }
}

/// Location that can be derived without an external lookup.
pub fn coarse_location(ip: &str) -> Option<&'static str> {
    let addr: IpAddr = ip.trim().parse().ok()?;

    if addr.is_loopback() {
        return Some("Local");
    }

    let private = match addr {
        IpAddr::V4(v4) => v4.is_private() || v4.is_link_local(),
        IpAddr::V6(v6) => {
            let first = v6.segments()[0];
            // fc00::/7 unique-local, fe80::/10 link-local
            (first & 0xfe00) == 0xfc00 || (first & 0xffc0) == 0xfe80
        }
    };

    private.then_some("Private network")
}
