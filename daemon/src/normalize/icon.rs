use super::Enriched;
use url::Url;

const STEAM_HEADER: &str = "https://cdn.cloudflare.steamstatic.com/steam/apps";

/// Turns the panel's `DisplayImageSource` into a URL Discord can show.
///
/// `internal:<name>` points at the panel's bundled images, `steam:<appid>` at
/// the store header image and `url:<link>` is taken as is.
pub fn resolve_icon(source: &str, panel_url: &str) -> Enriched<String> {
    let source = source.trim();
    if source.is_empty() {
        return Enriched::degraded(String::new(), "no image source");
    }
    let Some((scheme, value)) = source.split_once(':') else {
        return Enriched::degraded(String::new(), format!("untyped image source '{}'", source));
    };
    let value = value.trim();

    match scheme {
        "internal" => internal_image(panel_url, value),
        "steam" => {
            if !value.is_empty() && value.chars().all(|c| c.is_ascii_digit()) {
                Enriched::Ok(format!("{}/{}/header.jpg", STEAM_HEADER, value))
            } else {
                Enriched::degraded(String::new(), format!("bad steam app id '{}'", value))
            }
        }
        "url" => match Url::parse(value) {
            Ok(url) if matches!(url.scheme(), "http" | "https") => Enriched::Ok(url.to_string()),
            Ok(url) => Enriched::degraded(
                String::new(),
                format!("unsupported image scheme '{}'", url.scheme()),
            ),
            Err(e) => Enriched::degraded(String::new(), format!("bad image url: {}", e)),
        },
        other => Enriched::degraded(
            String::new(),
            format!("unknown image source type '{}'", other),
        ),
    }
}

fn internal_image(panel_url: &str, name: &str) -> Enriched<String> {
    if name.is_empty() {
        return Enriched::degraded(String::new(), "empty internal image name");
    }
    let base = if panel_url.ends_with('/') {
        panel_url.to_string()
    } else {
        format!("{}/", panel_url)
    };
    let path = format!("Plugins/ADSModule/Images/{}.jpg", name);
    match Url::parse(&base).and_then(|b| b.join(&path)) {
        Ok(url) => Enriched::Ok(url.to_string()),
        Err(e) => Enriched::degraded(String::new(), format!("bad panel url: {}", e)),
    }
}
