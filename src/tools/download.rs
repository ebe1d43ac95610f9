//! Fetching sources: `download` and `get`.

use std::io::{Cursor, Read};
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{bail, Context, Result};
use flate2::read::GzDecoder;
use tar::Archive;
use url::Url;

use crate::core::conandata::SourceSpec;
use crate::core::conf::keys;
use crate::core::instance::Instance;
use crate::util::fs::{ensure_dir, move_dir};
use crate::util::hash::{checksum_matches, sha256_bytes};

const DEFAULT_TIMEOUT_SECS: u64 = 60;

/// Read the bytes behind a URL. `file://` URLs are read from disk.
pub fn fetch_bytes(url: &str, timeout: Duration) -> Result<Vec<u8>> {
    let parsed = Url::parse(url).with_context(|| format!("invalid url `{}`", url))?;
    if parsed.scheme() == "file" {
        let path = parsed
            .to_file_path()
            .map_err(|_| anyhow::anyhow!("invalid file url `{}`", url))?;
        return std::fs::read(&path)
            .with_context(|| format!("failed to read {}", path.display()));
    }

    let client = reqwest::blocking::Client::builder()
        .timeout(timeout)
        .build()
        .context("failed to create HTTP client")?;
    let response = client
        .get(url)
        .send()
        .with_context(|| format!("failed to download {}", url))?;
    if !response.status().is_success() {
        bail!("failed to download {}: HTTP {}", url, response.status());
    }
    let bytes = response
        .bytes()
        .with_context(|| format!("failed to read response body from {}", url))?;
    Ok(bytes.to_vec())
}

fn timeout(cx: &Instance) -> Duration {
    let secs = cx
        .conf
        .get_as::<u64>(keys::DOWNLOAD_TIMEOUT)
        .ok()
        .flatten()
        .unwrap_or(DEFAULT_TIMEOUT_SECS);
    Duration::from_secs(secs)
}

/// Try each mirror in turn; verify the checksum of the first that answers.
fn fetch_verified(cx: &Instance, urls: &[String], sha256: Option<&str>) -> Result<(String, Vec<u8>)> {
    if urls.is_empty() {
        bail!("no url given for `{}`", cx.reference);
    }
    let timeout = timeout(cx);
    let mut last_error = None;
    for url in urls {
        tracing::info!("{}: downloading {}", cx.reference, url);
        match fetch_bytes(url, timeout) {
            Ok(data) => {
                if let Some(expected) = sha256 {
                    let actual = sha256_bytes(&data);
                    if !checksum_matches(expected, &actual) {
                        bail!(
                            "sha256 mismatch for {}:\n  expected: {}\n  actual:   {}",
                            url,
                            expected,
                            actual
                        );
                    }
                    tracing::debug!("checksum verified: {}", &actual[..16]);
                }
                return Ok((url.clone(), data));
            }
            Err(e) => {
                tracing::warn!("{}: {:#}", cx.reference, e);
                last_error = Some(e);
            }
        }
    }
    Err(last_error.unwrap_or_else(|| anyhow::anyhow!("download failed")))
}

/// Download a file without extracting it.
///
/// `filename` is relative to the current folder.
pub fn download(cx: &Instance, urls: &[String], filename: &str, sha256: Option<&str>) -> Result<PathBuf> {
    let (_, data) = fetch_verified(cx, urls, sha256)?;
    let dest = cx.resolve(filename);
    if let Some(parent) = dest.parent() {
        ensure_dir(parent)?;
    }
    std::fs::write(&dest, data).with_context(|| format!("failed to write {}", dest.display()))?;
    Ok(dest)
}

/// Download, verify and extract an archive into `destination` (default:
/// the current folder).
pub fn get(
    cx: &Instance,
    urls: &[String],
    sha256: Option<&str>,
    strip_root: bool,
    destination: Option<&Path>,
) -> Result<()> {
    let (url, data) = fetch_verified(cx, urls, sha256)?;
    let dest = match destination {
        Some(d) => cx.resolve(d),
        None => cx.cwd.clone(),
    };
    let filename = url.rsplit('/').next().unwrap_or("download");

    if is_tar_gz(filename) {
        extract_tarball(&data, &dest, strip_root)
            .with_context(|| format!("failed to extract {}", url))?;
    } else if filename.ends_with(".tar") {
        extract_archive(Archive::new(Cursor::new(data)), &dest, strip_root)
            .with_context(|| format!("failed to extract {}", url))?;
    } else {
        ensure_dir(&dest)?;
        let target = dest.join(filename);
        std::fs::write(&target, data)
            .with_context(|| format!("failed to write {}", target.display()))?;
    }
    tracing::info!("{}: extracted {} into {}", cx.reference, filename, dest.display());
    Ok(())
}

/// `get` for a `conandata.yml` source entry. The entry's own `strip_root`
/// wins over the argument.
pub fn get_source(cx: &Instance, source: &SourceSpec, strip_root: bool) -> Result<()> {
    get(
        cx,
        source.url.as_slice(),
        source.sha256.as_deref(),
        source.strip_root.unwrap_or(strip_root),
        None,
    )
}

/// Fetch the sources listed in `conandata.yml` for the instance's version.
pub fn get_conandata_sources(cx: &Instance, strip_root: bool) -> Result<()> {
    let data = cx.conan_data()?;
    let source = data
        .sources_for(cx.version())
        .with_context(|| format!("conandata.yml has no sources for version {}", cx.version()))?;
    get_source(cx, source, strip_root)
}

fn is_tar_gz(filename: &str) -> bool {
    filename.ends_with(".tar.gz") || filename.ends_with(".tgz")
}

/// Extract a gzip-compressed tarball.
pub fn extract_tarball(data: &[u8], dest: &Path, strip_root: bool) -> Result<()> {
    let decoder = GzDecoder::new(Cursor::new(data));
    extract_archive(Archive::new(decoder), dest, strip_root)
}

fn extract_archive<R: Read>(mut archive: Archive<R>, dest: &Path, strip_root: bool) -> Result<()> {
    ensure_dir(dest)?;
    if !strip_root {
        archive
            .unpack(dest)
            .with_context(|| format!("failed to unpack into {}", dest.display()))?;
        return Ok(());
    }

    // Unpack beside the destination, then lift the single root folder.
    let staging = tempfile::Builder::new()
        .prefix(".extract-")
        .tempdir_in(dest)
        .context("failed to create extraction folder")?;
    archive
        .unpack(staging.path())
        .with_context(|| format!("failed to unpack into {}", staging.path().display()))?;

    let roots: Vec<PathBuf> = std::fs::read_dir(staging.path())?
        .filter_map(|e| e.ok())
        .map(|e| e.path())
        .collect();
    let [root] = roots.as_slice() else {
        bail!("strip_root requires a single root folder, found {} entries", roots.len());
    };
    if !root.is_dir() {
        bail!("strip_root requires a root folder, found file {}", root.display());
    }
    for entry in std::fs::read_dir(root)? {
        let entry = entry?;
        let target = dest.join(entry.file_name());
        if entry.file_type()?.is_dir() {
            move_dir(&entry.path(), &target)?;
        } else {
            std::fs::rename(entry.path(), &target)
                .with_context(|| format!("failed to move {}", target.display()))?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::fixtures;
    use crate::util::hash::sha256_bytes;
    use tempfile::TempDir;

    fn file_url(path: &Path) -> String {
        Url::from_file_path(path).unwrap().to_string()
    }

    #[test]
    fn test_get_strip_root() {
        let tmp = TempDir::new().unwrap();
        let data = fixtures::tarball(&[
            ("zlib-1.3.1/zlib.h", "#define ZLIB 1\n"),
            ("zlib-1.3.1/src/inflate.c", "int x;\n"),
        ]);
        let archive = tmp.path().join("zlib-1.3.1.tar.gz");
        std::fs::write(&archive, &data).unwrap();

        let cx = fixtures::sandboxed(tmp.path(), "zlib", "1.3.1", fixtures::linux_settings());
        get(&cx, &[file_url(&archive)], Some(&sha256_bytes(&data)), true, None).unwrap();

        let src = cx.source_folder();
        assert!(src.join("zlib.h").is_file());
        assert!(src.join("src/inflate.c").is_file());
        assert!(!src.join("zlib-1.3.1").exists());
    }

    #[test]
    fn test_get_keeps_root() {
        let tmp = TempDir::new().unwrap();
        let data = fixtures::tarball(&[("pkg-1.0/a.txt", "a")]);
        let archive = tmp.path().join("pkg.tgz");
        std::fs::write(&archive, &data).unwrap();

        let cx = fixtures::sandboxed(tmp.path(), "pkg", "1.0", fixtures::linux_settings());
        get(&cx, &[file_url(&archive)], None, false, None).unwrap();
        assert!(cx.source_folder().join("pkg-1.0/a.txt").is_file());
    }

    #[test]
    fn test_checksum_mismatch() {
        let tmp = TempDir::new().unwrap();
        let archive = tmp.path().join("pkg.tgz");
        std::fs::write(&archive, fixtures::tarball(&[("p/a", "a")])).unwrap();

        let cx = fixtures::sandboxed(tmp.path(), "pkg", "1.0", fixtures::linux_settings());
        let err = get(&cx, &[file_url(&archive)], Some("00ff"), true, None).unwrap_err();
        assert!(err.to_string().contains("sha256 mismatch"));
    }

    #[test]
    fn test_download_falls_back_to_mirror() {
        let tmp = TempDir::new().unwrap();
        let file = tmp.path().join("LICENSE");
        std::fs::write(&file, "MIT").unwrap();
        let missing = tmp.path().join("missing");

        let cx = fixtures::sandboxed(tmp.path(), "pkg", "1.0", fixtures::linux_settings());
        let out = download(
            &cx,
            &[file_url(&missing), file_url(&file)],
            "licenses/LICENSE",
            Some(&sha256_bytes(b"MIT")),
        )
        .unwrap();
        assert_eq!(std::fs::read_to_string(out).unwrap(), "MIT");
    }
}
