//! Release check against a GitHub-style releases API

use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::debug;
use url::Url;

use crate::error::UpdateError;

/// Numeric components of a version string
///
/// A leading `v` and everything from the first letter on are dropped;
/// components that do not start with a digit count as 0.
/// `"v1.4.2-beta"` gives `[1, 4, 2]`, `"2.0rc1"` gives `[2, 0]`.
pub fn parse_version(version: &str) -> Vec<u64> {
    let version = if version.is_empty() { "0.0.0" } else { version };
    let trimmed = version.strip_prefix('v').unwrap_or(version);
    let numeric = match trimmed.find(|c: char| c.is_ascii_alphabetic()) {
        Some(pos) => &trimmed[..pos],
        None => trimmed,
    };

    numeric
        .split('.')
        .map(|part| {
            let digits: String = part.chars().take_while(|c| c.is_ascii_digit()).collect();
            digits.parse().unwrap_or(0)
        })
        .collect()
}

/// Whether `latest` is strictly newer than `current`; missing components
/// count as 0
pub fn is_newer(latest: &str, current: &str) -> bool {
    let a = parse_version(latest);
    let b = parse_version(current);
    for i in 0..a.len().max(b.len()) {
        let x = a.get(i).copied().unwrap_or(0);
        let y = b.get(i).copied().unwrap_or(0);
        if x != y {
            return x > y;
        }
    }
    false
}

#[derive(Debug, Clone, Deserialize)]
pub struct ReleaseAsset {
    pub name: String,
    pub browser_download_url: String,
}

#[derive(Debug, Deserialize)]
struct ReleaseResponse {
    tag_name: Option<String>,
    name: Option<String>,
    #[serde(default)]
    assets: Vec<ReleaseAsset>,
}

/// Latest published release
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LatestRelease {
    pub version: String,
    pub artifact_url: Option<String>,
}

/// Outcome of an update check, as handed to the UI
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateCheck {
    pub available: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub latest: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub current: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub artifact_url: Option<String>,
}

impl UpdateCheck {
    pub fn unavailable() -> Self {
        Self {
            available: false,
            latest: None,
            current: None,
            artifact_url: None,
        }
    }

    /// Compare a release with the running version
    ///
    /// Without a known current version any release with an artifact counts
    /// as available.
    pub fn evaluate(release: LatestRelease, current: Option<&str>) -> Self {
        if release.version.is_empty() {
            return Self::unavailable();
        }
        let has_artifact = release.artifact_url.is_some();
        let available = match current {
            Some(current) => has_artifact && is_newer(&release.version, current),
            None => has_artifact,
        };
        Self {
            available,
            latest: Some(release.version),
            current: current.map(String::from),
            artifact_url: release.artifact_url,
        }
    }
}

/// First asset whose name ends with `.{extension}` (case-insensitive)
pub fn select_asset<'a>(assets: &'a [ReleaseAsset], extension: &str) -> Option<&'a ReleaseAsset> {
    let suffix = format!(".{}", extension.to_ascii_lowercase());
    assets
        .iter()
        .find(|a| a.name.to_ascii_lowercase().ends_with(&suffix))
}

/// Fetch the latest release of `repo` (`owner/name`)
pub async fn fetch_latest_release(
    client: &Client,
    api_base: &Url,
    repo: &str,
    extension: &str,
) -> Result<LatestRelease, UpdateError> {
    let url = api_base.join(&format!("repos/{}/releases/latest", repo))?;
    debug!(%url, "Checking for release");

    let response = client
        .get(url)
        .header("Accept", "application/vnd.github+json")
        .send()
        .await?;
    let status = response.status();
    if !status.is_success() {
        let message = response
            .text()
            .await
            .unwrap_or_else(|_| format!("HTTP {}", status));
        return Err(UpdateError::Server {
            status: status.as_u16(),
            message,
        });
    }

    let release: ReleaseResponse = response
        .json()
        .await
        .map_err(|e| UpdateError::Parse(e.to_string()))?;

    Ok(LatestRelease {
        version: release.tag_name.or(release.name).unwrap_or_default(),
        artifact_url: select_asset(&release.assets, extension)
            .map(|a| a.browser_download_url.clone()),
    })
}

/// Check `repo` for a release newer than `current`
pub async fn check_for_update(
    client: &Client,
    api_base: &Url,
    repo: &str,
    extension: &str,
    current: Option<&str>,
) -> Result<UpdateCheck, UpdateError> {
    let release = fetch_latest_release(client, api_base, repo, extension).await?;
    Ok(UpdateCheck::evaluate(release, current))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_version() {
        assert_eq!(parse_version("v1.4.2"), vec![1, 4, 2]);
        assert_eq!(parse_version("1.4.2-beta.3"), vec![1, 4, 2]);
        assert_eq!(parse_version("2.0rc1"), vec![2, 0]);
        assert_eq!(parse_version("1..x"), vec![1, 0, 0]);
        assert_eq!(parse_version(""), vec![0, 0, 0]);
    }

    #[test]
    fn test_is_newer() {
        assert!(is_newer("v1.2.1", "1.2.0"));
        assert!(is_newer("1.10", "1.9.9"));
        assert!(!is_newer("1.2", "1.2.0"));
        assert!(!is_newer("1.2.0-beta", "1.2.0"));
        assert!(!is_newer("0.9", "1.0"));
    }

    #[test]
    fn test_select_asset() {
        let assets = vec![
            ReleaseAsset {
                name: "checksums.txt".into(),
                browser_download_url: "https://example.com/sums".into(),
            },
            ReleaseAsset {
                name: "cabin-1.3.0.PKG".into(),
                browser_download_url: "https://example.com/pkg".into(),
            },
        ];
        assert_eq!(
            select_asset(&assets, "pkg").map(|a| a.browser_download_url.as_str()),
            Some("https://example.com/pkg")
        );
        assert!(select_asset(&assets, "apk").is_none());
    }

    #[test]
    fn test_evaluate() {
        let release = LatestRelease {
            version: "v1.3.0".into(),
            artifact_url: Some("https://example.com/pkg".into()),
        };
        assert!(UpdateCheck::evaluate(release.clone(), Some("1.2.9")).available);
        assert!(!UpdateCheck::evaluate(release.clone(), Some("1.3.0")).available);
        assert!(UpdateCheck::evaluate(release, None).available);

        let no_asset = LatestRelease {
            version: "v9.0.0".into(),
            artifact_url: None,
        };
        let check = UpdateCheck::evaluate(no_asset, Some("1.0.0"));
        assert!(!check.available);
        assert_eq!(check.latest.as_deref(), Some("v9.0.0"));
    }
}
