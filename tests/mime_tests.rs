use hearth::mime::{from_path, resolve, MediaType};

#[cfg(test)]
mod media_type_tests {
    use super::*;

    #[test]
    fn test_html_media_types() {
        assert_eq!(resolve("html").as_str(), "text/html");
        assert_eq!(resolve("htm").as_str(), "text/html");
        assert_eq!(resolve("HTML").as_str(), "text/html"); // case insensitive
    }

    #[test]
    fn test_text_media_types() {
        assert_eq!(resolve("css").as_str(), "text/css");
        assert_eq!(resolve("js").as_str(), "text/javascript");
        assert_eq!(resolve("json").as_str(), "application/json");
        assert_eq!(resolve("xml").as_str(), "application/xml");
        assert_eq!(resolve("txt").as_str(), "text/plain");
    }

    #[test]
    fn test_image_media_types() {
        assert_eq!(resolve("png").as_str(), "image/png");
        assert_eq!(resolve("jpg").as_str(), "image/jpeg");
        assert_eq!(resolve("jpeg").as_str(), "image/jpeg");
        assert_eq!(resolve("gif").as_str(), "image/gif");
        assert_eq!(resolve("svg").as_str(), "image/svg+xml");
        assert_eq!(resolve("ico").as_str(), "image/x-icon");
        assert_eq!(resolve("webp").as_str(), "image/webp");
    }

    #[test]
    fn test_font_media_types() {
        assert_eq!(resolve("woff").as_str(), "font/woff");
        assert_eq!(resolve("woff2").as_str(), "font/woff2");
        assert_eq!(resolve("ttf").as_str(), "font/ttf");
        assert_eq!(resolve("eot").as_str(), "application/vnd.ms-fontobject");
    }

    #[test]
    fn test_media_container_types() {
        assert_eq!(resolve("mp4").as_str(), "video/mp4");
        assert_eq!(resolve("webm").as_str(), "video/webm");
        assert_eq!(resolve("mp3").as_str(), "audio/mpeg");
        assert_eq!(resolve("wav").as_str(), "audio/wav");
        assert_eq!(resolve("ogg").as_str(), "audio/ogg");
    }

    #[test]
    fn test_leading_dot_tolerated() {
        assert_eq!(resolve(".html"), MediaType::Html);
        assert_eq!(resolve(".CSS"), MediaType::Css);
        assert_eq!(resolve(".pdf"), MediaType::Pdf);
    }

    #[test]
    fn test_unknown_extension() {
        assert_eq!(resolve("unknown").as_str(), "application/octet-stream");
        assert_eq!(resolve("xyz").as_str(), "application/octet-stream");
        assert_eq!(resolve("").as_str(), "application/octet-stream");
    }
}

#[cfg(test)]
mod path_resolution_tests {
    use super::*;

    #[test]
    fn test_path_with_directories() {
        assert_eq!(from_path("/css/main.css"), MediaType::Css);
        assert_eq!(from_path("/images/logo.png"), MediaType::Png);
        assert_eq!(from_path("/js/modules/app.js"), MediaType::Javascript);
    }

    #[test]
    fn test_no_extension() {
        assert_eq!(from_path("file"), MediaType::OctetStream);
        assert_eq!(from_path("/srv/www/Dockerfile"), MediaType::OctetStream);
    }

    #[test]
    fn test_uppercase_extension() {
        assert_eq!(from_path("/static/INDEX.HTML"), MediaType::Html);
        assert_eq!(from_path("/static/photo.JPEG"), MediaType::Jpeg);
    }

    #[test]
    fn test_dotted_directory_does_not_confuse() {
        assert_eq!(from_path("/v1.2/readme"), MediaType::OctetStream);
        assert_eq!(from_path("/v1.2/readme.txt"), MediaType::PlainText);
    }
}
