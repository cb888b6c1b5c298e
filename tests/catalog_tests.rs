use std::fs;

use hearth::catalog::{content_fingerprint, path_fingerprint, Catalog, CatalogCell};
use tempfile::TempDir;

fn write_webroot() -> TempDir {
    let dir = TempDir::new().unwrap();
    let root = dir.path();
    fs::create_dir_all(root.join("webpages/css")).unwrap();
    fs::create_dir_all(root.join("webpages/videos")).unwrap();
    fs::write(root.join("webpages/landing.html"), "<html>landing</html>").unwrap();
    fs::write(root.join("webpages/index.html"), "<html>index</html>").unwrap();
    fs::write(root.join("webpages/css/style.css"), "body { color: blue; }").unwrap();
    fs::write(root.join("webpages/videos/clip.mp4"), "not really a video").unwrap();
    dir
}

#[cfg(test)]
mod fingerprint_tests {
    use super::*;

    #[test]
    fn test_path_fingerprint_known_values() {
        // djb2: seed 5381, h = h * 33 + byte
        assert_eq!(path_fingerprint(""), 5381);
        assert_eq!(path_fingerprint("a"), 5381 * 33 + 97);
        assert_eq!(path_fingerprint("/a"), (5381 * 33 + 47) * 33 + 97);
    }

    #[test]
    fn test_content_fingerprint_known_values() {
        // additive: seed 5381, h = h + byte
        assert_eq!(content_fingerprint(b""), 5381);
        assert_eq!(content_fingerprint(b"abc"), 5381 + 97 + 98 + 99);
        assert_eq!(content_fingerprint(&[0u8]), 5381);
    }

    #[test]
    fn test_fingerprints_are_deterministic() {
        let path = "/srv/www/webpages/index.html";
        assert_eq!(path_fingerprint(path), path_fingerprint(path));
        let bytes = b"the same bytes every time";
        assert_eq!(content_fingerprint(bytes), content_fingerprint(bytes));
    }

    #[test]
    fn test_distinct_paths_get_distinct_fingerprints() {
        assert_ne!(
            path_fingerprint("/webpages/a.html"),
            path_fingerprint("/webpages/b.html")
        );
    }

    #[test]
    fn test_content_fingerprint_ignores_byte_order() {
        // The additive hash is order-blind; the stability contract, not
        // collision resistance, is what matters here.
        assert_eq!(content_fingerprint(b"abc"), content_fingerprint(b"cba"));
    }
}

#[cfg(test)]
mod build_tests {
    use super::*;

    #[test]
    fn test_build_indexes_regular_files() {
        let webroot = write_webroot();
        let catalog = Catalog::build(webroot.path()).unwrap();
        // landing, index, style; the videos clip is excluded
        assert_eq!(catalog.len(), 3);
    }

    #[test]
    fn test_lookup_by_resolved_path() {
        let webroot = write_webroot();
        let catalog = Catalog::build(webroot.path()).unwrap();
        let path = format!("{}/webpages/index.html", webroot.path().display());
        let entry = catalog.lookup(&path).expect("index.html should be cataloged");
        assert_eq!(entry.path, path);
        assert_eq!(entry.path_fingerprint, path_fingerprint(&path));
        assert_eq!(
            entry.content_fingerprint,
            content_fingerprint(b"<html>index</html>")
        );
    }

    #[test]
    fn test_lookup_miss_returns_none() {
        let webroot = write_webroot();
        let catalog = Catalog::build(webroot.path()).unwrap();
        let path = format!("{}/webpages/missing.html", webroot.path().display());
        assert!(catalog.lookup(&path).is_none());
    }

    #[test]
    fn test_videos_subtree_is_excluded() {
        let webroot = write_webroot();
        let catalog = Catalog::build(webroot.path()).unwrap();
        let path = format!("{}/webpages/videos/clip.mp4", webroot.path().display());
        assert!(catalog.lookup(&path).is_none());
    }

    #[test]
    fn test_last_modified_is_imf_fixdate() {
        let webroot = write_webroot();
        let catalog = Catalog::build(webroot.path()).unwrap();
        let path = format!("{}/webpages/index.html", webroot.path().display());
        let entry = catalog.lookup(&path).unwrap();
        assert!(entry.last_modified.ends_with(" GMT"));
        assert_eq!(entry.last_modified.len(), 29);
        assert!(httpdate::parse_http_date(&entry.last_modified).is_ok());
    }

    #[test]
    fn test_build_is_deterministic() {
        let webroot = write_webroot();
        let first = Catalog::build(webroot.path()).unwrap();
        let second = Catalog::build(webroot.path()).unwrap();
        assert_eq!(first.len(), second.len());
        let path = format!("{}/webpages/css/style.css", webroot.path().display());
        let a = first.lookup(&path).unwrap();
        let b = second.lookup(&path).unwrap();
        assert_eq!(a.path_fingerprint, b.path_fingerprint);
        assert_eq!(a.content_fingerprint, b.content_fingerprint);
        assert_eq!(a.last_modified, b.last_modified);
    }

    #[test]
    fn test_unreadable_root_fails_build() {
        let dir = TempDir::new().unwrap();
        // No webpages/ subtree at all.
        assert!(Catalog::build(dir.path()).is_err());
    }

    #[test]
    fn test_empty_webpages_builds_empty_catalog() {
        let dir = TempDir::new().unwrap();
        fs::create_dir_all(dir.path().join("webpages")).unwrap();
        let catalog = Catalog::build(dir.path()).unwrap();
        assert!(catalog.is_empty());
    }
}

#[cfg(test)]
mod cell_tests {
    use super::*;

    #[test]
    fn test_publish_swaps_snapshot() {
        let webroot = write_webroot();
        let cell = CatalogCell::new(Catalog::build(webroot.path()).unwrap());
        let before = cell.snapshot();

        let path = format!("{}/webpages/index.html", webroot.path().display());
        let old_fingerprint = before.lookup(&path).unwrap().content_fingerprint;

        fs::write(
            webroot.path().join("webpages/index.html"),
            "<html>rebuilt</html>",
        )
        .unwrap();
        cell.publish(Catalog::build(webroot.path()).unwrap());

        // The old snapshot stays intact for whoever still holds it.
        assert_eq!(
            before.lookup(&path).unwrap().content_fingerprint,
            old_fingerprint
        );
        let after = cell.snapshot();
        assert_eq!(
            after.lookup(&path).unwrap().content_fingerprint,
            content_fingerprint(b"<html>rebuilt</html>")
        );
        assert_ne!(
            after.lookup(&path).unwrap().content_fingerprint,
            old_fingerprint
        );
    }
}
