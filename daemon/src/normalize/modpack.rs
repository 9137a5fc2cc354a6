use ampcord_protocol::management::instance::{Modpack, HIDDEN_SENTINEL};
use lazy_static::lazy_static;
use regex::Regex;

lazy_static! {
    static ref MODPACK_URL: Regex = Regex::new(r"^https?://\S+$").unwrap();
}

/// Reads the `name||url` convention from a welcome message or description.
pub fn parse_modpack(text: &str) -> Option<Modpack> {
    let (name, url) = text.split_once("||")?;
    let name = name.trim();
    if name.is_empty() {
        return None;
    }
    let url = url.trim();
    Some(Modpack {
        name: name.to_string(),
        url: MODPACK_URL.is_match(url).then(|| url.to_string()),
    })
}

pub fn is_hidden(welcome_message: &str) -> bool {
    welcome_message.trim().eq_ignore_ascii_case(HIDDEN_SENTINEL)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_modpack_with_url() {
        let modpack = parse_modpack(
            "All The Mods 9 || https://www.curseforge.com/minecraft/modpacks/all-the-mods-9",
        )
        .unwrap();
        assert_eq!(modpack.name, "All The Mods 9");
        assert_eq!(
            modpack.url.as_deref(),
            Some("https://www.curseforge.com/minecraft/modpacks/all-the-mods-9")
        );
    }

    #[test]
    fn test_modpack_bad_url() {
        let modpack = parse_modpack("Vanilla+||see discord").unwrap();
        assert_eq!(modpack.name, "Vanilla+");
        assert_eq!(modpack.url, None);
    }

    #[test]
    fn test_no_modpack() {
        assert_eq!(parse_modpack("Welcome to the server!"), None);
        assert_eq!(parse_modpack("||https://example.com"), None);
    }

    #[test]
    fn test_hidden_sentinel() {
        assert!(is_hidden("hidden"));
        assert!(is_hidden("  HIDDEN "));
        assert!(!is_hidden("hidden gem server"));
    }
}
