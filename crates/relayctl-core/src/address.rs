//! Host and port syntax validation.
//!
//! Pure syntax checks, no DNS resolution. None of these functions panic.

/// Maximum length of a hostname in presentation format.
const MAX_HOSTNAME_LEN: usize = 253;
/// Maximum length of a single hostname label.
const MAX_LABEL_LEN: usize = 63;

/// Returns true iff `v` is a usable TCP/UDP port (1..=65535).
#[inline]
pub fn is_valid_port(v: i64) -> bool {
    (1..=i64::from(u16::MAX)).contains(&v)
}

/// Parse a port from user input.
///
/// Suitable as a clap `value_parser`.
pub fn parse_port(s: &str) -> Result<u16, String> {
    let v: i64 = s
        .trim()
        .parse()
        .map_err(|_| format!("'{s}' is not an integer"))?;
    if !is_valid_port(v) {
        return Err(format!("port {v} out of range (1-65535)"));
    }
    // Range checked above.
    Ok(v as u16)
}

/// Returns true iff `s` is a dotted-quad IPv4 literal or a syntactically
/// valid hostname.
///
/// A string made only of numeric labels is treated as an IPv4 attempt, so
/// `1.2.3.999` and `1.2.3` are rejected instead of passing as hostnames.
pub fn is_valid_address(s: &str) -> bool {
    if s.is_empty() || s.len() > MAX_HOSTNAME_LEN {
        return false;
    }
    let labels: Vec<&str> = s.split('.').collect();
    if labels
        .iter()
        .all(|l| !l.is_empty() && l.bytes().all(|b| b.is_ascii_digit()))
    {
        return is_ipv4(&labels);
    }
    labels.iter().all(|l| is_hostname_label(l))
}

fn is_ipv4(octets: &[&str]) -> bool {
    octets.len() == 4
        && octets
            .iter()
            .all(|o| o.len() <= 3 && o.parse::<u16>().is_ok_and(|v| v <= 255))
}

fn is_hostname_label(label: &str) -> bool {
    let bytes = label.as_bytes();
    let (Some(first), Some(last)) = (bytes.first(), bytes.last()) else {
        return false;
    };
    label.len() <= MAX_LABEL_LEN
        && first.is_ascii_alphanumeric()
        && last.is_ascii_alphanumeric()
        && bytes.iter().all(|b| b.is_ascii_alphanumeric() || *b == b'-')
}
