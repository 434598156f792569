//! Server-side request forgery guard.
//!
//! Crawl targets come from API callers, so by default an engine refuses URLs
//! that resolve to loopback, private, link-local or otherwise reserved
//! addresses.

use std::net::IpAddr;

use url::Url;

use crawlgate_core::AppError;

/// Reject URLs whose host is, or resolves to, a private/reserved address.
pub async fn check_public_url(url: &Url) -> Result<(), AppError> {
    let host = url
        .host_str()
        .ok_or_else(|| AppError::validation("url", "URL has no host"))?;

    // IPv6 literals come back bracketed from host_str().
    let literal = host.trim_start_matches('[').trim_end_matches(']');
    if let Ok(ip) = literal.parse::<IpAddr>() {
        if is_private_ip(ip) {
            return Err(blocked(host, None));
        }
        return Ok(());
    }

    let port = url.port_or_known_default().unwrap_or(80);
    let addrs: Vec<_> = tokio::net::lookup_host((host, port))
        .await
        .map_err(|e| AppError::Engine(format!("DNS resolution failed for {host}: {e}")))?
        .collect();

    if addrs.is_empty() {
        return Err(AppError::Engine(format!(
            "DNS resolution returned no addresses for {host}"
        )));
    }

    if let Some(addr) = addrs.iter().find(|a| is_private_ip(a.ip())) {
        return Err(blocked(host, Some(addr.ip())));
    }

    Ok(())
}

fn blocked(host: &str, resolved: Option<IpAddr>) -> AppError {
    let message = match resolved {
        Some(ip) => format!("SSRF blocked: {host} resolves to private/reserved IP {ip}"),
        None => format!("SSRF blocked: {host} is a private/reserved IP"),
    };
    AppError::validation("url", message)
}

/// Check if an IP address is in a private/reserved/link-local range.
fn is_private_ip(ip: IpAddr) -> bool {
    match ip {
        IpAddr::V4(v4) => {
            v4.is_loopback()
                || v4.is_private()
                || v4.is_link_local() // 169.254.0.0/16, cloud metadata
                || v4.is_unspecified()
                || v4.is_broadcast()
                || v4.is_documentation()
                || v4.octets()[0] == 100 && (v4.octets()[1] & 0xC0) == 64 // 100.64.0.0/10
        }
        IpAddr::V6(v6) => {
            v6.is_loopback()
                || v6.is_unspecified()
                || (v6.segments()[0] & 0xFFC0) == 0xFE80 // fe80::/10
                || (v6.segments()[0] & 0xFE00) == 0xFC00 // fc00::/7
                || v6
                    .to_ipv4_mapped()
                    .is_some_and(|v4| is_private_ip(IpAddr::V4(v4)))
        }
    }
}
