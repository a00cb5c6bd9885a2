//! Mirrors `SwhidOrUrlParamType`: accept either a literal extended SWHID or
//! an origin URL, hashing the latter into an origin SWHID.

use swh_model::ExtendedSwhid;

pub fn parse_swhid_or_url(value: &str) -> Result<ExtendedSwhid, String> {
    if value.starts_with("swh:1:") {
        value
            .parse()
            .map_err(|_| format!("expected extended SWHID, got {value:?}"))
    } else {
        eprintln!("Assuming {value} is an origin URL.");
        Ok(ExtendedSwhid::of_origin_url(value))
    }
}
