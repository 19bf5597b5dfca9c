use std::path::PathBuf;

pub const DEFAULT_SITE_BASE_URL: &str = "http://localhost:5001";
pub const DEFAULT_VERIFICATION_PATH: &str = "certificates/preview";

#[derive(Clone, Debug)]
pub struct Config {
    /// `None` runs against the in-process store.
    pub database_url: Option<String>,
    pub media_root: PathBuf,
    pub assets_dir: PathBuf,
    pub host: String,
    pub port: u16,
    pub site_base_url: String,
    pub verification_path: String,
    pub staff_api_token: Option<String>,
    pub institute_name: String,
    pub signature_lines: [String; 3],
}

impl Config {
    pub fn from_env() -> Result<Self, Box<dyn std::error::Error + Send + Sync>> {
        dotenvy::dotenv().ok();

        let database_url = std::env::var("DATABASE_URL")
            .ok()
            .filter(|url| !url.trim().is_empty() && url != "memory");

        let base_dir = std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."));
        let media_root = base_dir.join(
            std::env::var("MEDIA_ROOT").unwrap_or_else(|_| "media".to_string()),
        );
        let assets_dir = base_dir.join(
            std::env::var("ASSETS_DIR").unwrap_or_else(|_| "assets".to_string()),
        );

        let host = std::env::var("HOST").unwrap_or_else(|_| "0.0.0.0".to_string());
        let port: u16 = std::env::var("PORT")
            .unwrap_or_else(|_| "5001".to_string())
            .parse()
            .unwrap_or(5001);

        let site_base_url = std::env::var("SITE_BASE_URL")
            .unwrap_or_else(|_| DEFAULT_SITE_BASE_URL.to_string());
        let verification_path = std::env::var("VERIFICATION_PATH")
            .unwrap_or_else(|_| DEFAULT_VERIFICATION_PATH.to_string());

        let staff_api_token = std::env::var("STAFF_API_TOKEN")
            .ok()
            .filter(|t| !t.trim().is_empty());

        let institute_name =
            std::env::var("INSTITUTE_NAME").unwrap_or_else(|_| "Learning Institute".to_string());
        let signature_lines = match std::env::var("SIGNATURE_LINES") {
            Ok(raw) => parse_signature_lines(&raw, &institute_name),
            Err(_) => default_signature_lines(&institute_name),
        };

        Ok(Self {
            database_url,
            media_root,
            assets_dir,
            host,
            port,
            site_base_url,
            verification_path,
            staff_api_token,
            institute_name,
            signature_lines,
        })
    }

    /// Configuration rooted in `dir`, with no database and no staff token.
    pub fn local(dir: &std::path::Path) -> Self {
        let institute_name = "Learning Institute".to_string();
        Self {
            database_url: None,
            media_root: dir.join("media"),
            assets_dir: dir.join("assets"),
            host: "127.0.0.1".to_string(),
            port: 5001,
            site_base_url: DEFAULT_SITE_BASE_URL.to_string(),
            verification_path: DEFAULT_VERIFICATION_PATH.to_string(),
            staff_api_token: None,
            signature_lines: default_signature_lines(&institute_name),
            institute_name,
        }
    }
}

fn default_signature_lines(institute_name: &str) -> [String; 3] {
    [
        "Authorized Signature".to_string(),
        "Director".to_string(),
        institute_name.to_string(),
    ]
}

/// Splits `a|b|c` into exactly three lines, padding from the defaults.
fn parse_signature_lines(raw: &str, institute_name: &str) -> [String; 3] {
    let mut lines = default_signature_lines(institute_name);
    for (slot, part) in lines.iter_mut().zip(raw.split('|')) {
        let part = part.trim();
        if !part.is_empty() {
            *slot = part.to_string();
        }
    }
    lines
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn signature_lines_fill_missing_parts_from_defaults() {
        let lines = parse_signature_lines("Registrar| |", "Acme Academy");
        assert_eq!(lines[0], "Registrar");
        assert_eq!(lines[1], "Director");
        assert_eq!(lines[2], "Acme Academy");
    }

    #[test]
    fn extra_signature_parts_are_ignored() {
        let lines = parse_signature_lines("a|b|c|d", "X");
        assert_eq!(lines, ["a".to_string(), "b".to_string(), "c".to_string()]);
    }
}
