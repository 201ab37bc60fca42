//! Request classification.
//!
//! Decides which caching strategy, if any, applies to a request.

use std::fmt;

use reqwest::Method;
use serde::Serialize;
use url::{Origin, Url};

const IMAGE_PATH_PREFIXES: &[&str] = &["/uploads/", "/images/"];
const IMAGE_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "gif", "webp", "svg", "avif", "ico"];
const API_PATH_PREFIX: &str = "/api/";
const STATIC_EXTENSIONS: &[&str] = &["js", "mjs", "css", "woff", "woff2", "ttf", "otf", "eot"];

/// Resource classes with a caching strategy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ResourceClass {
    /// Cache-first.
    Image,
    /// Network-first.
    Api,
    /// Cache-first.
    Static,
}

impl ResourceClass {
    pub const ALL: [ResourceClass; 3] = [
        ResourceClass::Image,
        ResourceClass::Api,
        ResourceClass::Static,
    ];

    /// Short name used in cache names.
    pub fn slug(&self) -> &'static str {
        match self {
            ResourceClass::Image => "images",
            ResourceClass::Api => "api",
            ResourceClass::Static => "static",
        }
    }
}

impl fmt::Display for ResourceClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.slug())
    }
}

// == Classifier ==
/// Classifies requests relative to the origin being fronted.
#[derive(Debug, Clone)]
pub struct Classifier {
    origin: Origin,
    image_hosts: Vec<String>,
}

impl Classifier {
    pub fn new(origin: &Url, image_hosts: Vec<String>) -> Self {
        Self {
            origin: origin.origin(),
            image_hosts: image_hosts
                .into_iter()
                .map(|h| h.to_ascii_lowercase())
                .collect(),
        }
    }

    /// Strategy class for the request, `None` to pass it straight through.
    ///
    /// Only GETs are intercepted. Cross-origin requests are intercepted only
    /// for image hosts.
    pub fn classify(&self, method: &Method, url: &Url) -> Option<ResourceClass> {
        if *method != Method::GET {
            return None;
        }

        if url.origin() != self.origin {
            return self.is_image_host(url).then_some(ResourceClass::Image);
        }

        let path = url.path();
        let extension = extension_of(path);

        if IMAGE_PATH_PREFIXES.iter().any(|p| path.starts_with(p))
            || matches_any(extension.as_deref(), IMAGE_EXTENSIONS)
        {
            Some(ResourceClass::Image)
        } else if path.starts_with(API_PATH_PREFIX) {
            Some(ResourceClass::Api)
        } else if matches_any(extension.as_deref(), STATIC_EXTENSIONS) {
            Some(ResourceClass::Static)
        } else {
            None
        }
    }

    fn is_image_host(&self, url: &Url) -> bool {
        url.host_str()
            .map(|host| self.image_hosts.iter().any(|h| h == host))
            .unwrap_or(false)
    }
}

/// Lowercased extension of the last path segment.
fn extension_of(path: &str) -> Option<String> {
    let segment = path.rsplit('/').next()?;
    let (stem, ext) = segment.rsplit_once('.')?;
    if stem.is_empty() || ext.is_empty() {
        return None;
    }
    Some(ext.to_ascii_lowercase())
}

fn matches_any(extension: Option<&str>, list: &[&str]) -> bool {
    extension.map(|ext| list.contains(&ext)).unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn classifier() -> Classifier {
        let origin = Url::parse("http://localhost:5000").unwrap();
        Classifier::new(
            &origin,
            vec!["images.unsplash.com".into(), "res.cloudinary.com".into()],
        )
    }

    fn get(url: &str) -> Option<ResourceClass> {
        classifier().classify(&Method::GET, &Url::parse(url).unwrap())
    }

    #[test]
    fn test_images() {
        assert_eq!(get("http://localhost:5000/uploads/x.webp"), Some(ResourceClass::Image));
        assert_eq!(get("http://localhost:5000/images/banner"), Some(ResourceClass::Image));
        assert_eq!(get("http://localhost:5000/logo.SVG"), Some(ResourceClass::Image));
        assert_eq!(get("http://localhost:5000/favicon.ico"), Some(ResourceClass::Image));
    }

    #[test]
    fn test_image_path_wins_over_api() {
        assert_eq!(get("http://localhost:5000/api/hero/cover.jpg"), Some(ResourceClass::Image));
    }

    #[test]
    fn test_api() {
        assert_eq!(get("http://localhost:5000/api/hero"), Some(ResourceClass::Api));
        assert_eq!(get("http://localhost:5000/api/faq?lang=pt"), Some(ResourceClass::Api));
    }

    #[test]
    fn test_static() {
        assert_eq!(get("http://localhost:5000/app.js"), Some(ResourceClass::Static));
        assert_eq!(get("http://localhost:5000/assets/index.css"), Some(ResourceClass::Static));
        assert_eq!(get("http://localhost:5000/fonts/inter.woff2"), Some(ResourceClass::Static));
    }

    #[test]
    fn test_unclassified() {
        assert_eq!(get("http://localhost:5000/"), None);
        assert_eq!(get("http://localhost:5000/revendedor"), None);
        assert_eq!(get("http://localhost:5000/.env"), None);
    }

    #[test]
    fn test_non_get_passes_through() {
        let url = Url::parse("http://localhost:5000/api/leads").unwrap();
        assert_eq!(classifier().classify(&Method::POST, &url), None);
    }

    #[test]
    fn test_cross_origin() {
        assert_eq!(
            get("https://images.unsplash.com/photo-123?w=800"),
            Some(ResourceClass::Image)
        );
        assert_eq!(get("https://cdn.example.com/app.js"), None);
        assert_eq!(get("https://cdn.example.com/a.png"), None);
    }

    #[test]
    fn test_cache_slugs() {
        assert_eq!(ResourceClass::Image.slug(), "images");
        assert_eq!(ResourceClass::Static.to_string(), "static");
    }
}
