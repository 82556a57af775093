use aliri_braid::braid;
use std::fmt;

macro_rules! limited_reveal {
    ($ty:ty: $hidden:literal, $default:literal) => {
        impl fmt::Debug for $ty {
            fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
                if f.alternate() {
                    f.write_str("\"")?;
                    limited_reveal(&self.0, &mut *f, $default)?;
                    f.write_str("\"")
                } else {
                    f.write_str(concat!("***", $hidden, "***"))
                }
            }
        }

        impl fmt::Display for $ty {
            fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
                if f.alternate() {
                    limited_reveal(&self.0, &mut *f, $default)
                } else {
                    f.write_str(concat!("***", $hidden, "***"))
                }
            }
        }
    };
}

fn limited_reveal(unprotected: &str, f: &mut fmt::Formatter, default_len: usize) -> fmt::Result {
    let max_len = f.width().unwrap_or(default_len);
    if max_len <= 1 {
        f.write_str("…")
    } else if max_len > unprotected.len() {
        f.write_str(unprotected)
    } else {
        match unprotected.char_indices().nth(max_len - 2) {
            Some((idx, c)) if idx + c.len_utf8() < unprotected.len() => {
                f.write_str(&unprotected[0..idx + c.len_utf8()])?;
                f.write_str("…")
            }
            _ => f.write_str(unprotected),
        }
    }
}

/// A cluster endpoint hostname
#[braid(serde)]
pub struct Hostname;

/// An AWS region identifier, such as `us-east-1`
#[braid(serde)]
pub struct RegionName;

/// A database role to authenticate as
#[braid(serde)]
pub struct DbUser;

/// A named profile in the shared AWS configuration files
#[braid(serde)]
pub struct ProfileName;

/// A signed authentication token, used as a connection password
///
/// The value is redacted when formatted unless the alternate flag is given,
/// in which case only a short prefix is shown.
#[braid(serde, debug = "owned", display = "owned")]
pub struct AuthToken;

limited_reveal!(AuthTokenRef: "AUTH TOKEN", 24);
