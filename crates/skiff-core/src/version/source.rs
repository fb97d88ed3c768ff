//! Remote sources of the latest published version.

use anyhow::Context;
use async_trait::async_trait;
use serde::Deserialize;

/// Something that knows the latest published release.
#[async_trait]
pub trait VersionSource: Send + Sync {
    /// The latest published version.
    async fn latest_version(&self) -> anyhow::Result<String>;

    /// The newer version if one is published, otherwise `None`.
    async fn check_for_updates(&self, current_version: &str) -> anyhow::Result<Option<String>> {
        let latest = self.latest_version().await?;
        Ok(is_newer(&latest, current_version).then_some(latest))
    }
}

/// Whether `candidate` is a newer release than `current`.
///
/// Semver comparison when both parse (a leading `v` is ignored); otherwise
/// any difference counts as newer.
pub fn is_newer(candidate: &str, current: &str) -> bool {
    let parse = |v: &str| semver::Version::parse(v.trim().trim_start_matches('v'));
    match (parse(candidate), parse(current)) {
        (Ok(candidate), Ok(current)) => candidate > current,
        _ => candidate.trim() != current.trim(),
    }
}

/// npm-compatible registry (`GET <registry>/<package>/latest`).
#[derive(Debug, Clone)]
pub struct NpmRegistrySource {
    registry_url: String,
    package: String,
    client: reqwest::Client,
}

#[derive(Debug, Deserialize)]
struct LatestManifest {
    version: String,
}

impl NpmRegistrySource {
    pub fn new(registry_url: impl Into<String>, package: impl Into<String>) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(concat!("skiff/", env!("CARGO_PKG_VERSION")))
            .build()
            .context("Failed to build HTTP client")?;
        Ok(Self {
            registry_url: registry_url.into(),
            package: package.into(),
            client,
        })
    }

    pub fn latest_url(&self) -> String {
        format!(
            "{}/{}/latest",
            self.registry_url.trim_end_matches('/'),
            self.package
        )
    }
}

#[async_trait]
impl VersionSource for NpmRegistrySource {
    async fn latest_version(&self) -> anyhow::Result<String> {
        let url = self.latest_url();
        let response = self
            .client
            .get(&url)
            .send()
            .await
            .with_context(|| format!("Failed to fetch {}", url))?;

        if !response.status().is_success() {
            anyhow::bail!("Failed to fetch latest version: HTTP {} from {}", response.status(), url);
        }

        let manifest: LatestManifest = response
            .json()
            .await
            .context("Failed to parse registry response")?;

        Ok(manifest.version)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn semver_comparison() {
        assert!(is_newer("1.10.0", "1.9.3"));
        assert!(is_newer("v2.0.0", "1.9.9"));
        assert!(!is_newer("1.0.0", "1.0.0"));
        assert!(!is_newer("0.9.0", "1.0.0"));
        assert!(!is_newer("1.0.0-beta.1", "1.0.0"));
    }

    #[test]
    fn non_semver_compares_by_inequality() {
        assert!(is_newer("nightly-2", "nightly-1"));
        assert!(!is_newer("nightly-1", "nightly-1"));
    }

    #[test]
    fn latest_url_joins_cleanly() {
        let source = NpmRegistrySource::new("https://registry.npmjs.org/", "@tlc/agent-skills")
            .expect("source should build");
        assert_eq!(
            source.latest_url(),
            "https://registry.npmjs.org/@tlc/agent-skills/latest"
        );
    }
}
