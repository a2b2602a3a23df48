//! Remote install command for the Chef runtime.
//!
//! Produces a POSIX `sh` snippet that installs Chef through the omnibus
//! installer only when it is missing or does not match the requested
//! version. Running it twice is harmless.

use serde::{Deserialize, Serialize};

/// Default omnibus installer URL.
pub const DEFAULT_OMNIBUS_URL: &str = "https://omnitruck.chef.io/install.sh";

/// The `require_chef_omnibus` setting: `true`, `false`, `"latest"` or a version.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum OmnibusRequirement {
    /// `true` installs when absent; `false` never installs.
    Enabled(bool),
    /// `"latest"` always upgrades, anything else pins that version.
    Version(String),
}

impl OmnibusRequirement {
    /// Returns the requested version, or `None` when installation is off.
    pub fn version(&self) -> Option<ChefVersion> {
        match self {
            OmnibusRequirement::Enabled(false) => None,
            OmnibusRequirement::Enabled(true) => Some(ChefVersion::Any),
            OmnibusRequirement::Version(v) if v.eq_ignore_ascii_case("latest") => {
                Some(ChefVersion::Latest)
            }
            OmnibusRequirement::Version(v) => Some(ChefVersion::Exact(v.trim().to_lowercase())),
        }
    }
}

/// Version directive derived from [`OmnibusRequirement`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChefVersion {
    /// Install only if Chef is absent.
    Any,
    /// Always install the latest release.
    Latest,
    /// Install unless this exact version is present.
    Exact(String),
}

/// Builds the install command, or `None` when no installation was requested.
pub fn install_command(
    requirement: Option<&OmnibusRequirement>,
    url: &str,
    sudo: bool,
) -> Option<String> {
    let version = requirement?.version()?;

    let (flag, version_args) = match &version {
        ChefVersion::Any => ("true".to_string(), String::new()),
        ChefVersion::Latest => ("latest".to_string(), String::new()),
        ChefVersion::Exact(v) => (escape(v), format!(" -v \"{}\"", escape(v))),
    };
    let url = escape(url);
    let sh = if sudo { "sudo -E sh" } else { "sh" };

    Some(format!(
        r#"sh -c '
should_update_chef() {{
  case "{flag}" in
    true|$(chef-solo -v | cut -d " " -f 2)) return 1 ;;
    latest|*) return 0 ;;
  esac
}}

if [ ! -d "/opt/chef" ] || should_update_chef ; then
  echo "-----> Installing Chef Omnibus ({flag})"
  if command -v curl >/dev/null 2>&1 ; then
    curl -sSL -o /tmp/install.sh "{url}"
  else
    wget -q -O /tmp/install.sh "{url}"
  fi
  {sh} /tmp/install.sh{version_args}
fi'"#
    ))
}

/// Escapes `value` for a double-quoted word inside the single-quoted script.
fn escape(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '\\' | '"' | '$' | '`' => {
                escaped.push('\\');
                escaped.push(c);
            }
            '\'' => escaped.push_str("'\\''"),
            _ => escaped.push(c),
        }
    }
    escaped
}
