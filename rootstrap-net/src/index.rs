// rootstrap-net/src/index.rs
// Turns a mirror's HTML directory listing into a repository index.

use regex::Regex;
use reqwest::Client;
use rootstrap_common::error::{Result, RootstrapError};
use rootstrap_common::model::RepositoryIndex;
use tracing::debug;

use crate::http::fetch_text;

/// Scrapes every hyperlink target out of a directory listing and keeps the
/// last path component of each. Parent links, sort links and sub-directories
/// are dropped.
pub fn parse_listing(html: &str) -> Result<RepositoryIndex> {
    let href = Regex::new(r#"(?i)<a\s[^>]*href\s*=\s*["']([^"']*)["']"#)
        .map_err(|e| RootstrapError::Config(format!("Invalid listing pattern: {e}")))?;
    let names = href
        .captures_iter(html)
        .filter_map(|caps| caps.get(1))
        .map(|m| m.as_str())
        .filter(|target| !target.starts_with('?'))
        .filter_map(|target| target.rsplit('/').next())
        .filter(|name| !name.is_empty() && *name != "." && *name != "..")
        .map(str::to_string);
    Ok(RepositoryIndex::from_file_names(names))
}

/// Fetches the listing of `repo_url`. A listing without a single file link is
/// treated as a failed fetch, since every later step depends on it.
pub async fn fetch_index(client: &Client, repo_url: &str) -> Result<RepositoryIndex> {
    let url = format!("{}/", repo_url.trim_end_matches('/'));
    debug!("Fetching package list: {}", url);
    let body = fetch_text(client, &url).await?;
    let index = parse_listing(&body)?;
    if index.is_empty() {
        return Err(RootstrapError::Fetch {
            url,
            reason: "response is not a directory listing (no file links found)".to_string(),
        });
    }
    debug!("Repository index has {} entries", index.len());
    Ok(index)
}

#[cfg(test)]
mod tests {
    use mockito::Server;

    use super::*;
    use crate::http::build_http_client;

    const LISTING: &str = r#"<html>
<head><title>Index of /archlinux/core/os/x86_64/</title></head>
<body>
<h1>Index of /archlinux/core/os/x86_64/</h1><hr><pre><a href="../">../</a>
<a href="?C=N;O=D">Name</a>
<a href="acl-2.3.2-1-x86_64.pkg.tar.zst">acl-2.3.2-1-x86_64.pkg.tar.zst</a>      22-Jan-2024 10:01  139K
<a href="acl-2.3.2-1-x86_64.pkg.tar.zst.sig">acl-2.3.2-1-x86_64.pkg.tar.zst.sig</a>  22-Jan-2024 10:01  141
<a href="/archlinux/core/os/x86_64/zlib-1%3A1.3.1-1-x86_64.pkg.tar.zst">zlib</a>
<a class="dir" HREF="sub/">sub/</a>
</pre><hr></body>
</html>"#;

    #[test]
    fn scrapes_base_file_names() {
        let index = parse_listing(LISTING).unwrap();
        let names: Vec<&str> = index.iter().collect();
        assert_eq!(
            names,
            vec![
                "zlib-1%3A1.3.1-1-x86_64.pkg.tar.zst",
                "acl-2.3.2-1-x86_64.pkg.tar.zst.sig",
                "acl-2.3.2-1-x86_64.pkg.tar.zst",
            ]
        );
    }

    #[test]
    fn accepts_single_quoted_links() {
        let listing = "<a href='../'>../</a>\n<a href='zstd-1.5.6-1-x86_64.pkg.tar.zst'>zstd</a>\n";
        let index = parse_listing(listing).unwrap();
        let names: Vec<&str> = index.iter().collect();
        assert_eq!(names, vec!["zstd-1.5.6-1-x86_64.pkg.tar.zst"]);
    }

    #[tokio::test]
    async fn fetches_listing_from_mirror() {
        let mut server = Server::new_async().await;
        let _m = server
            .mock("GET", "/core/os/x86_64/")
            .with_status(200)
            .with_header("content-type", "text/html")
            .with_body(LISTING)
            .create_async()
            .await;

        let client = build_http_client().unwrap();
        let index = fetch_index(&client, &format!("{}/core/os/x86_64", server.url()))
            .await
            .unwrap();
        assert_eq!(index.len(), 3);
    }

    #[tokio::test]
    async fn non_listing_response_aborts() {
        let mut server = Server::new_async().await;
        let _m = server
            .mock("GET", "/core/os/x86_64/")
            .with_status(200)
            .with_body("<html><body>maintenance</body></html>")
            .create_async()
            .await;
        let _missing = server
            .mock("GET", "/gone/")
            .with_status(500)
            .create_async()
            .await;

        let client = build_http_client().unwrap();
        let err = fetch_index(&client, &format!("{}/core/os/x86_64/", server.url()))
            .await
            .unwrap_err();
        assert!(matches!(err, RootstrapError::Fetch { .. }));

        let err = fetch_index(&client, &format!("{}/gone", server.url()))
            .await
            .unwrap_err();
        assert!(matches!(err, RootstrapError::Fetch { .. }));
    }
}
