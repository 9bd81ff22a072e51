use std::net::IpAddr;

use serde::{Deserialize, Serialize};

pub const DEFAULT_CURRENCY: &str = "DZD";

/// Country a client is browsing from, with the currency the app bills in
/// there.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Region {
    /// ISO 3166-1 alpha-2 country code.
    pub region: String,
    pub region_name: String,
    pub currency: String,
    pub timezone: Option<String>,
}

impl Default for Region {
    fn default() -> Self {
        Self {
            region: "DZ".to_string(),
            region_name: "Algeria".to_string(),
            currency: DEFAULT_CURRENCY.to_string(),
            timezone: Some("Africa/Algiers".to_string()),
        }
    }
}

const EURO_COUNTRIES: &[&str] = &["FR", "DE", "IT", "ES", "BE", "NL", "PT", "AT", "IE", "GR"];

/// Billing currency for a country code. Unsupported countries pay in DZD.
pub fn currency_for_country(country_code: &str) -> &'static str {
    let code = country_code.trim().to_ascii_uppercase();
    match code.as_str() {
        "DZ" => "DZD",
        "US" => "USD",
        c if EURO_COUNTRIES.contains(&c) => "EUR",
        _ => DEFAULT_CURRENCY,
    }
}

/// Display name and main timezone for the countries the app bills in.
pub fn country_details(country_code: &str) -> Option<(&'static str, &'static str)> {
    let details = match country_code {
        "DZ" => ("Algeria", "Africa/Algiers"),
        "US" => ("United States", "America/New_York"),
        "FR" => ("France", "Europe/Paris"),
        "DE" => ("Germany", "Europe/Berlin"),
        "IT" => ("Italy", "Europe/Rome"),
        "ES" => ("Spain", "Europe/Madrid"),
        "BE" => ("Belgium", "Europe/Brussels"),
        "NL" => ("Netherlands", "Europe/Amsterdam"),
        "PT" => ("Portugal", "Europe/Lisbon"),
        "AT" => ("Austria", "Europe/Vienna"),
        "IE" => ("Ireland", "Europe/Dublin"),
        "GR" => ("Greece", "Europe/Athens"),
        _ => return None,
    };
    Some(details)
}

/// Region for a bare country code.
pub fn region_for_country(country_code: &str) -> Region {
    let code = country_code.trim().to_ascii_uppercase();
    let (name, timezone) = match country_details(&code) {
        Some((name, tz)) => (name.to_string(), Some(tz.to_string())),
        None => (code.clone(), None),
    };
    Region {
        currency: currency_for_country(&code).to_string(),
        region: code,
        region_name: name,
        timezone,
    }
}

/// Loopback, RFC 1918, link-local, unique-local IPv6 and unspecified
/// addresses cannot be located.
pub fn is_private_addr(ip: &IpAddr) -> bool {
    match ip {
        IpAddr::V4(v4) => {
            v4.is_loopback() || v4.is_private() || v4.is_link_local() || v4.is_unspecified()
        }
        IpAddr::V6(v6) => {
            if let Some(mapped) = v6.to_ipv4_mapped() {
                return is_private_addr(&IpAddr::V4(mapped));
            }
            let first = v6.segments()[0];
            v6.is_loopback()
                || v6.is_unspecified()
                || (first & 0xfe00) == 0xfc00
                || (first & 0xffc0) == 0xfe80
        }
    }
}

/// Same as [`is_private_addr`] for raw strings. `localhost`, empty and
/// unparseable values count as private.
pub fn is_private_ip(ip: &str) -> bool {
    let ip = ip.trim();
    if ip.is_empty() || ip.eq_ignore_ascii_case("localhost") {
        return true;
    }
    match ip.parse::<IpAddr>() {
        Ok(addr) => is_private_addr(&addr),
        Err(_) => true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn private_ranges_are_detected() {
        for ip in [
            "127.0.0.1",
            "10.1.2.3",
            "172.16.0.1",
            "172.31.255.255",
            "192.168.1.10",
            "169.254.0.1",
            "0.0.0.0",
            "::1",
            "::",
            "fc00::1",
            "fd12:3456::1",
            "fe80::1",
            "::ffff:192.168.0.1",
            "localhost",
            "",
        ] {
            assert!(is_private_ip(ip), "{} should be private", ip);
        }
    }

    #[test]
    fn public_addresses_are_not_private() {
        for ip in ["8.8.8.8", "172.32.0.1", "41.100.1.1", "2001:4860:4860::8888"] {
            assert!(!is_private_ip(ip), "{} should be public", ip);
        }
    }

    #[test]
    fn currency_follows_country() {
        assert_eq!(currency_for_country("DZ"), "DZD");
        assert_eq!(currency_for_country("us"), "USD");
        assert_eq!(currency_for_country("FR"), "EUR");
        assert_eq!(currency_for_country("GR"), "EUR");
        assert_eq!(currency_for_country("GB"), "DZD");
        assert_eq!(currency_for_country(""), "DZD");
    }

    #[test]
    fn unknown_country_keeps_code_as_name() {
        let region = region_for_country("jp");
        assert_eq!(region.region, "JP");
        assert_eq!(region.region_name, "JP");
        assert_eq!(region.currency, "DZD");
        assert_eq!(region.timezone, None);

        assert_eq!(region_for_country("DZ"), Region::default());
    }
}
