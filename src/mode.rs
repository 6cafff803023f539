//! Environment mode the render handler runs in.

use std::fmt;
use std::str::FromStr;

/// Environment variable read by [`Mode::from_env`].
pub const MODE_ENV: &str = "SSR_BRIDGE_MODE";

/// Which environment the render handler is built for.
///
/// The bridge does not act on the mode itself. It is stamped onto every
/// inner [`Request`](crate::Request) so the handler can, for example, render
/// detailed error pages in development only.
#[derive(Clone, Copy, Debug, Default, Eq, Hash, PartialEq)]
pub enum Mode {
    Development,
    #[default]
    Production,
    Test,
}

impl Mode {
    /// Reads [`MODE_ENV`]. Unset or unrecognised values fall back to
    /// [`Mode::Production`].
    pub fn from_env() -> Self {
        std::env::var(MODE_ENV)
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or_default()
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Development => "development",
            Self::Production  => "production",
            Self::Test        => "test",
        }
    }
}

/// Parses `"development"`, `"production"` or `"test"`, ignoring ASCII case.
impl FromStr for Mode {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        [Self::Development, Self::Production, Self::Test]
            .into_iter()
            .find(|m| m.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or(())
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
