// src/fetch/mod.rs

use anyhow::{Context, Result};
use reqwest::Client;
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::{debug, info};
use url::Url;

use crate::config::Config;
use crate::reference::{ReferencePaths, ReferenceTable};

/// Download `url` to `dest` unless `dest` already exists. Existing files are
/// never re-validated. Returns `dest`.
#[tracing::instrument(level = "info", skip(client, url, dest), fields(url = %url))]
pub async fn download_if_missing(client: &Client, url: &Url, dest: &Path) -> Result<PathBuf> {
    if fs::try_exists(dest)
        .await
        .with_context(|| format!("checking {:?}", dest))?
    {
        debug!(path = %dest.display(), "already cached");
        return Ok(dest.to_path_buf());
    }

    if let Some(parent) = dest.parent() {
        fs::create_dir_all(parent)
            .await
            .with_context(|| format!("creating {:?}", parent))?;
    }

    info!("downloading {}", url);
    let bytes = client
        .get(url.as_str())
        .send()
        .await
        .with_context(|| format!("GET {} failed", url))?
        .error_for_status()
        .with_context(|| format!("Non-success status {}", url))?
        .bytes()
        .await
        .with_context(|| format!("reading body from {}", url))?;

    // a partial download must never satisfy the presence check
    let tmp = dest.with_extension("part");
    fs::write(&tmp, &bytes)
        .await
        .with_context(|| format!("writing {:?}", tmp))?;
    fs::rename(&tmp, dest)
        .await
        .with_context(|| format!("renaming {:?} to {:?}", tmp, dest))?;
    info!(bytes = bytes.len(), "saving to {}", dest.display());

    Ok(dest.to_path_buf())
}

/// Make sure both reference tables are on disk, fetching them concurrently.
pub async fn ensure_reference_files(client: &Client, config: &Config) -> Result<ReferencePaths> {
    let paths = config.reference_paths();
    let (state_codes, county_race_pop) = futures::try_join!(
        download_if_missing(
            client,
            config.url(ReferenceTable::StateCodes),
            paths.path(ReferenceTable::StateCodes),
        ),
        download_if_missing(
            client,
            config.url(ReferenceTable::CountyRacePop),
            paths.path(ReferenceTable::CountyRacePop),
        ),
    )?;
    Ok(ReferencePaths {
        state_codes,
        county_race_pop,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[tokio::test]
    async fn existing_file_is_not_fetched() {
        let tmp = tempdir().unwrap();
        let dest = tmp.path().join("census").join("state.txt");
        std::fs::create_dir_all(dest.parent().unwrap()).unwrap();
        std::fs::write(&dest, "cached").unwrap();

        // nothing listens here; a request would fail
        let url = Url::parse("http://127.0.0.1:9/state.txt").unwrap();
        let got = download_if_missing(&Client::new(), &url, &dest)
            .await
            .unwrap();
        assert_eq!(got, dest);
        assert_eq!(std::fs::read_to_string(&dest).unwrap(), "cached");
    }

    #[tokio::test]
    async fn failed_download_leaves_nothing_behind() {
        let tmp = tempdir().unwrap();
        let dest = tmp.path().join("nested").join("cc-est2021-all.csv");
        let url = Url::parse("http://127.0.0.1:9/cc-est2021-all.csv").unwrap();
        assert!(download_if_missing(&Client::new(), &url, &dest)
            .await
            .is_err());
        assert!(!dest.exists());
    }

    #[tokio::test]
    async fn cached_reference_files_resolve_without_network() {
        let tmp = tempdir().unwrap();
        let mut config = Config::new(tmp.path()).unwrap();
        config.state_codes_url = Url::parse("http://127.0.0.1:9/state.txt").unwrap();
        config.county_race_pop_url = Url::parse("http://127.0.0.1:9/county.csv").unwrap();
        let expected = config.reference_paths();
        for table in ReferenceTable::ALL {
            let path = expected.path(table);
            std::fs::create_dir_all(path.parent().unwrap()).unwrap();
            std::fs::write(path, table.name()).unwrap();
        }

        let paths = ensure_reference_files(&Client::new(), &config)
            .await
            .unwrap();
        assert_eq!(paths.state_codes, expected.state_codes);
        assert_eq!(paths.county_race_pop, expected.county_race_pop);
    }
}
