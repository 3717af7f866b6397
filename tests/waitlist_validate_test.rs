use std::collections::HashMap;

use oor3d::waitlist::{
    SignupRequest,
    config::{ConfigError, ServerConfig},
    normalize_email,
    validate::{MAX_HANDLE_LEN, is_valid_email},
};

fn valid() -> SignupRequest {
    SignupRequest {
        email: "  Ada@Example.COM ".to_string(),
        imvu_name: " PixelQueen ".to_string(),
        discord_tag: "pixelqueen#0420".to_string(),
        motivation: "Faster texture swaps".to_string(),
        social_link: Some("   ".to_string()),
        notes: Some(" hi ".to_string()),
    }
}

#[test]
fn email_shape() {
    for ok in ["a@b.co", "first.last+tag@sub.example.org", "  padded@example.com  "] {
        assert!(is_valid_email(ok), "{ok} should be valid");
    }
    for bad in ["", "foo@bar", "no-at.example.com", "two@@example.com", "sp ace@example.com", "@example.com"] {
        assert!(!is_valid_email(bad), "{bad} should be invalid");
    }
}

#[test]
fn normalization_trims_and_lowercases() {
    assert_eq!(normalize_email("  Ada@Example.COM\n"), "ada@example.com");
}

#[test]
fn valid_request_is_cleaned_up() {
    let signup = valid().validate().unwrap();

    assert_eq!(signup.email, "ada@example.com");
    assert_eq!(signup.imvu_name, "PixelQueen");
    assert_eq!(signup.social_link, None);
    assert_eq!(signup.notes.as_deref(), Some("hi"));
}

#[test]
fn every_problem_is_reported() {
    let request = SignupRequest {
        email: String::new(),
        imvu_name: "x".repeat(MAX_HANDLE_LEN + 1),
        discord_tag: "  ".to_string(),
        motivation: String::new(),
        social_link: None,
        notes: None,
    };

    let errors = request.validate().unwrap_err();

    assert_eq!(errors.get("email"), Some("Email is required"));
    assert_eq!(
        errors.get("imvuName"),
        Some(format!("Must be at most {MAX_HANDLE_LEN} characters").as_str())
    );
    assert_eq!(errors.get("discordTag"), Some("Discord tag is required"));
    assert_eq!(errors.get("motivation"), Some("Tell us why you want early access"));
    assert_eq!(errors.len(), 4);
}

#[test]
fn validation_errors_serialize_as_a_flat_map() {
    let mut request = valid();
    request.email = "foo@bar".to_string();

    let errors = request.validate().unwrap_err();

    assert_eq!(
        serde_json::to_value(&errors).unwrap(),
        serde_json::json!({ "email": "Please enter a valid email address" })
    );
    assert_eq!(errors.to_string(), "email: Please enter a valid email address");
}

#[test]
fn request_accepts_the_landing_page_payload() {
    let request: SignupRequest = serde_json::from_value(serde_json::json!({
        "email": "ada@example.com",
        "imvuName": "PixelQueen",
        "discordTag": "pq",
        "motivation": "why not",
    }))
    .unwrap();

    assert_eq!(request.discord_tag, "pq");
    assert_eq!(request.social_link, None);
    assert!(request.validate().is_ok());
}

fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
    let map: HashMap<String, String> = pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();
    move |key| map.get(key).cloned()
}

#[test]
fn server_config_defaults() {
    let config = ServerConfig::from_lookup(lookup(&[])).unwrap();

    assert_eq!(config, ServerConfig::default());
    assert_eq!(config.bind_addr.port(), 3000);
    assert!(!config.expose_duplicates);
}

#[test]
fn server_config_from_values() {
    let config = ServerConfig::from_lookup(lookup(&[
        ("OOR3D_BIND", "127.0.0.1:8088"),
        ("OOR3D_DATA_FILE", "/var/lib/oor3d/signups.json"),
        ("OOR3D_ADMIN_TOKEN", " s3cret "),
        ("OOR3D_EXPOSE_DUPLICATES", "TRUE"),
        ("OOR3D_ALLOWED_ORIGIN", ""),
    ]))
    .unwrap();

    assert_eq!(config.bind_addr.to_string(), "127.0.0.1:8088");
    assert_eq!(
        config.data_file.as_deref(),
        Some(std::path::Path::new("/var/lib/oor3d/signups.json"))
    );
    assert_eq!(config.admin_token.as_deref(), Some("s3cret"));
    assert!(config.expose_duplicates);
    assert_eq!(config.allowed_origin, None);
}

#[test]
fn server_config_rejects_bad_values() {
    let err = ServerConfig::from_lookup(lookup(&[("OOR3D_BIND", "localhost")])).unwrap_err();
    assert!(matches!(err, ConfigError::InvalidAddr { .. }));

    let err = ServerConfig::from_lookup(lookup(&[("OOR3D_EXPOSE_DUPLICATES", "maybe")])).unwrap_err();
    assert!(matches!(err, ConfigError::InvalidFlag { value, .. } if value == "maybe"));
}
