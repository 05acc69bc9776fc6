//! Per-site storage scope derived from a page URL.

use url::{Host, Url};

/// Second-level labels that sit under a two-letter country TLD and are not
/// registrable on their own (`example.co.uk`, `example.com.au`, ...).
const CCTLD_SECOND_LEVEL: &[&str] = &[
    "ac", "co", "com", "edu", "gov", "ltd", "ne", "net", "or", "org",
];

/// Site identifier used to namespace storage keys.
///
/// Accepts a full URL or a bare host. Subdomains are stripped down to the
/// registrable domain; IP addresses and single-label hosts are kept as-is.
/// Inputs without a host (such as `file://` pages) map to `"local"`.
pub fn site_id(input: &str) -> String {
    let input = input.trim();
    let parsed = Url::parse(input)
        .ok()
        .filter(|u| u.has_host() || u.scheme() == "file")
        .or_else(|| Url::parse(&format!("https://{input}")).ok());

    match parsed.as_ref().and_then(Url::host) {
        Some(Host::Domain(domain)) => registrable_domain(domain),
        Some(Host::Ipv4(ip)) => ip.to_string(),
        Some(Host::Ipv6(ip)) => ip.to_string(),
        None => "local".to_string(),
    }
}

fn registrable_domain(domain: &str) -> String {
    let domain = domain.trim_end_matches('.').to_ascii_lowercase();
    let labels: Vec<&str> = domain.split('.').filter(|l| !l.is_empty()).collect();
    let n = labels.len();
    if n <= 2 {
        return labels.join(".");
    }

    let tld = labels[n - 1];
    let second = labels[n - 2];
    let keep = if tld.len() == 2 && CCTLD_SECOND_LEVEL.contains(&second) {
        3
    } else {
        2
    };
    labels[n - keep..].join(".")
}
