//! Byte loading with download-progress reporting.
//!
//! Native builds read from the filesystem in chunks so the caller's progress
//! callback sees intermediate totals. Web builds fetch relative to the page
//! origin; the browser fetch hands the body over in one piece, so progress
//! reports once before and once after the download.

use anyhow::{Context, Result};
use base64::Engine;

#[cfg(target_arch = "wasm32")]
fn format_url(file_name: &str) -> Result<reqwest::Url> {
    let window = web_sys::window().context("no window")?;
    let origin = window
        .location()
        .origin()
        .ok()
        .context("no window origin")?;
    let base = reqwest::Url::parse(&format!("{origin}/"))?;
    Ok(base.join(file_name)?)
}

/// Load a file, reporting `(loaded, total)` after every chunk.
///
/// `total` is 0 when the size is unknown up front.
pub async fn load_binary(
    file_name: &str,
    progress: &mut impl FnMut(u64, u64),
) -> Result<Vec<u8>> {
    #[cfg(target_arch = "wasm32")]
    let data = {
        let url = format_url(file_name)?;
        let response = reqwest::get(url).await?.error_for_status()?;
        let total = response.content_length().unwrap_or(0);
        progress(0, total);
        let data = response.bytes().await?.to_vec();
        progress(data.len() as u64, total.max(data.len() as u64));
        data
    };
    #[cfg(not(target_arch = "wasm32"))]
    let data = {
        use std::io::Read;

        let file = std::fs::File::open(file_name)
            .with_context(|| format!("could not open {file_name}"))?;
        let total = file.metadata()?.len();
        let mut reader = std::io::BufReader::new(file);
        let mut data = Vec::with_capacity(total as usize);
        let mut chunk = [0u8; 64 * 1024];
        loop {
            let read = reader.read(&mut chunk)?;
            if read == 0 {
                break;
            }
            data.extend_from_slice(&chunk[..read]);
            progress(data.len() as u64, total);
        }
        data
    };

    Ok(data)
}

/// Resolve a glTF-relative URI against the asset's own location and load it.
///
/// `data:` URIs are decoded in place instead of hitting IO.
pub async fn load_relative(asset_path: &str, uri: &str) -> Result<Vec<u8>> {
    if let Some(encoded) = uri.strip_prefix("data:") {
        let payload = encoded
            .split_once(";base64,")
            .map(|(_, payload)| payload)
            .context("only base64 data URIs are supported")?;
        return base64::engine::general_purpose::STANDARD
            .decode(payload)
            .context("invalid base64 in data URI");
    }

    let resolved = match asset_path.rsplit_once('/') {
        Some((dir, _)) => format!("{dir}/{uri}"),
        None => uri.to_string(),
    };
    load_binary(&resolved, &mut |_, _| {}).await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn decodes_base64_data_uris() {
        let bytes = load_relative("model.gltf", "data:application/octet-stream;base64,AAECAw==")
            .await
            .unwrap();
        assert_eq!(bytes, vec![0, 1, 2, 3]);
    }

    #[tokio::test]
    async fn rejects_unencoded_data_uris() {
        assert!(load_relative("model.gltf", "data:text/plain,hello")
            .await
            .is_err());
    }
}
