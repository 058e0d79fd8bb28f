//! Property-based tests for input validation, report rendering and error
//! sanitization

use proptest::prelude::*;
use serde_json::{json, Map, Value};
use songcrew::agents::render_report;
use songcrew::error::sanitize_error_message;
use songcrew::validation::{parse_report_input, validate_url, ReportInput};

const LABELS: [&str; 6] = [
    "Hit Potential Score",
    "Target Audience",
    "Strengths",
    "Concerns",
    "Market Comparison",
    "Recommendation",
];

proptest! {
    #[test]
    fn validate_url_never_panics(raw in ".*") {
        let _ = validate_url(&raw);
    }

    #[test]
    fn strings_without_a_colon_are_never_urls(raw in "[^:]*") {
        prop_assert!(validate_url(&raw).is_err());
    }

    #[test]
    fn http_urls_with_a_host_are_accepted(
        scheme in "https?",
        host in "[a-z][a-z0-9]{0,20}(\\.[a-z]{2,6}){1,2}",
        path in "(/[a-z0-9_-]{1,10}){0,3}",
    ) {
        let raw = format!("{scheme}://{host}{path}");
        let url = validate_url(&raw);
        prop_assert!(url.is_ok(), "rejected {}", raw);
        let url = url.unwrap();
        prop_assert_eq!(url.host_str(), Some(host.as_str()));
    }

    #[test]
    fn surrounding_whitespace_is_ignored(
        host in "[a-z]{1,10}\\.com",
        pad in "[ \t\n]{0,4}",
    ) {
        let raw = format!("{pad}https://{host}{pad}");
        prop_assert!(validate_url(&raw).is_ok());
    }

    #[test]
    fn report_always_has_every_label_in_order(song in ".*", score in 1u8..=10) {
        let mut feedback = Map::new();
        feedback.insert("hit_potential_score".to_string(), json!(score));
        let report = render_report(&ReportInput { song: song.clone(), feedback });

        let mut last = 0;
        for label in LABELS {
            let marker = format!("- **{label}:** ");
            let at = report.find(&marker);
            prop_assert!(at.is_some(), "missing {}", label);
            let at = at.unwrap();
            prop_assert!(at >= last);
            last = at;
        }
        prop_assert!(report.starts_with("## Generated Song\n\n```\n"));
        let score_line = format!("- **Hit Potential Score:** {score}\n");
        prop_assert!(report.contains(&score_line));
    }

    #[test]
    fn report_input_keeps_string_songs_verbatim(song in ".*") {
        let input = parse_report_input(&json!({"song": song.clone()}));
        prop_assert!(input.is_ok());
        prop_assert_eq!(input.unwrap().song, song);
    }

    #[test]
    fn report_input_from_object_equals_encoded_string(song in "[a-zA-Z ]{0,40}", score in 0i64..100) {
        let payload = json!({"song": song, "feedback": {"hit_potential_score": score}});
        let direct = parse_report_input(&payload).unwrap();
        let encoded = parse_report_input(&Value::String(payload.to_string())).unwrap();
        prop_assert_eq!(direct, encoded);
    }

    #[test]
    fn sanitized_messages_are_bounded(message in ".{0,2000}") {
        let sanitized = sanitize_error_message(&message);
        prop_assert!(sanitized.len() <= 500);
        if message.len() <= 500 && !message.contains(['=', ':', '/']) {
            prop_assert_eq!(sanitized, message);
        }
    }
}
