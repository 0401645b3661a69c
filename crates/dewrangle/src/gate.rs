use thiserror::Error;
use url::Url;

/// Hosts against which destructive operations are always allowed
pub static LOCAL_HOSTS: [&str; 2] = ["localhost", "127.0.0.1"];

/// True if `url` points at one of [`LOCAL_HOSTS`], either as a parsed host
/// or as a bare `host[:port]` prefix
pub fn is_localhost(url: &str) -> bool {
    let url = url.trim_matches('/');
    let host_matches =
        Url::parse(url).is_ok_and(|u| u.host_str().is_some_and(|h| LOCAL_HOSTS.contains(&h)));
    host_matches || LOCAL_HOSTS.iter().any(|h| url.starts_with(h))
}

pub fn check_delete_allowed(url: &str) -> Result<(), DeleteGateError> {
    if is_localhost(url) {
        Ok(())
    } else {
        tracing::warn!(%url, "Refusing destructive operation against non-local host");
        Err(DeleteGateError {
            url: url.to_owned(),
        })
    }
}

#[derive(Clone, Debug, Eq, Error, PartialEq)]
#[error(
    "cannot delete from {url} while the delete safety check is enabled; only localhost and 127.0.0.1 are allowed (pass --disable-delete-safety-check to override)"
)]
pub struct DeleteGateError {
    pub url: String,
}
