//! Named logger emitting through `tracing`

use std::error::Error as StdError;
use std::fmt::{self, Display, Write as _};

/// Fill `{}` placeholders in `template` with `args`, left to right.
///
/// Placeholders without a matching argument render as nothing, extra
/// arguments are ignored, and a `{` not followed by `}` is kept as is.
pub fn fill_placeholders(template: &str, args: &[&dyn Display]) -> String {
    let mut out = String::with_capacity(template.len());
    let mut args = args.iter();
    let mut rest = template;

    while let Some(pos) = rest.find("{}") {
        out.push_str(&rest[..pos]);
        if let Some(arg) = args.next() {
            // Writing to a String cannot fail.
            let _ = write!(out, "{arg}");
        }
        rest = &rest[pos + 2..];
    }
    out.push_str(rest);
    out
}

/// Logger handle identified by name.
///
/// Messages are `{}` templates; every event carries the logger name in the
/// `logger` field, and the `*_err` variants add the error in `error`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnhancedLogger {
    name: String,
}

macro_rules! level_methods {
    ($($level:ident, $err:ident;)*) => {
        $(
            #[doc = concat!("Log at ", stringify!($level), " level")]
            pub fn $level(&self, template: &str, args: &[&dyn Display]) {
                let message = fill_placeholders(template, args);
                tracing::$level!(logger = self.name.as_str(), "{message}");
            }

            #[doc = concat!("Log at ", stringify!($level), " level with an attached error")]
            pub fn $err(&self, error: &dyn StdError, template: &str, args: &[&dyn Display]) {
                let message = fill_placeholders(template, args);
                tracing::$level!(logger = self.name.as_str(), error = %error, "{message}");
            }
        )*
    };
}

impl EnhancedLogger {
    /// Create a logger with the given name
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }

    /// Logger name
    pub fn name(&self) -> &str {
        &self.name
    }

    level_methods! {
        trace, trace_err;
        debug, debug_err;
        info, info_err;
        warn, warn_err;
        error, error_err;
    }
}

impl fmt::Display for EnhancedLogger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fill_in_order() {
        assert_eq!(fill_placeholders("{} + {} = {}", &[&1, &2, &3]), "1 + 2 = 3");
    }

    #[test]
    fn test_missing_args_render_empty() {
        assert_eq!(fill_placeholders("a={}, b={}", &[&"x"]), "a=x, b=");
    }

    #[test]
    fn test_extra_args_ignored() {
        assert_eq!(fill_placeholders("only {}", &[&1, &2]), "only 1");
    }

    #[test]
    fn test_lone_braces_kept() {
        assert_eq!(fill_placeholders("{x} {", &[&1]), "{x} {");
        assert_eq!(fill_placeholders("{{}}", &[&7]), "{7}");
        assert_eq!(fill_placeholders("", &[&7]), "");
    }

    #[test]
    fn test_logging_does_not_panic_without_subscriber() {
        let log = EnhancedLogger::new("test");
        let err = std::io::Error::new(std::io::ErrorKind::Other, "boom");

        log.info("hello {}", &[&"world"]);
        log.error_err(&err, "failed after {} tries", &[&3]);
        assert_eq!(log.name(), "test");
        assert_eq!(log.to_string(), "test");
    }
}
