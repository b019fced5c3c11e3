#[cfg(test)]
mod tests {
    use std::fs;

    use axlay_protocol::{Align, Color, Selector};

    use crate::*;

    const RULES_RON: &str = r##"(
        detection: (poll_interval_ms: 20),
        rules: [
            (
                name: "login banner",
                package_name: "com.example",
                activity_name: Some("com.example.LoginActivity"),
                allow: [".text(\"Login\")"],
                deny: [".text(\"Disabled\")"],
                overlays: [
                    (
                        selector: ".text(\"Login\").instance(-1)",
                        overlay: (text: "Sign in", background_color: "#80FF0000", horizontal_align: "center"),
                    ),
                ],
            ),
            (name: "any screen", package_name: "com.example"),
        ],
    )"##;

    #[test]
    fn ron_rules_parse_with_defaults() {
        let cfg = load_from_str(RULES_RON, Format::Ron).unwrap();
        assert_eq!(cfg.detection.poll_interval_ms, 20);
        assert_eq!(cfg.detection.max_retries, 5);
        assert_eq!(cfg.detection.snapshot_capacity, 10);
        assert_eq!(cfg.rules.len(), 2);

        let rule = &cfg.rules[0];
        assert_eq!(rule.overlays.len(), 1);
        let req = &rule.overlays[0];
        assert_eq!(req.selector, Selector::text("Login").instance(-1));
        assert_eq!(req.overlay.text, "Sign in");
        assert_eq!(req.overlay.background_color, Color(0x80FF_0000));
        assert_eq!(req.overlay.horizontal_align, Align::Center);
        assert_eq!(req.overlay.font_size, 14.0);
    }

    #[test]
    fn rules_for_matches_package_and_relative_activity() {
        let cfg = load_from_str(RULES_RON, Format::Ron).unwrap();
        let names: Vec<_> = cfg
            .rules_for("com.example", Some(".LoginActivity"))
            .map(|r| r.name.as_str())
            .collect();
        assert_eq!(names, ["login banner", "any screen"]);

        let names: Vec<_> = cfg
            .rules_for("com.example", Some(".Home"))
            .map(|r| r.name.as_str())
            .collect();
        assert_eq!(names, ["any screen"]);

        assert_eq!(cfg.rules_for("com.other", None).count(), 0);
    }

    #[test]
    fn matched_rule_outlives_the_lookup_keys() {
        let cfg = load_from_str(RULES_RON, Format::Ron).unwrap();
        let rule = {
            let package = String::from("com.example");
            let activity = String::from(".Home");
            cfg.rules_for(&package, Some(&activity)).next()
        };
        assert_eq!(rule.map(|r| r.name.as_str()), Some("any screen"));
    }

    #[test]
    fn json_config_parses() {
        let json = r#"{
            "filters": {"denylist": ["com.launcher"]},
            "rules": [{
                "name": "pay",
                "package_name": "com.shop",
                "overlays": [{"uiAutomatorCode": ".resourceId(\"com.shop:id/pay\")",
                              "overlay": {"text": "Free", "fontSize": 20}}]
            }]
        }"#;
        let cfg = load_from_str(json, Format::Json).unwrap();
        assert_eq!(
            cfg.filters.effective_denylist(),
            ["com.launcher".to_string(), OWN_PACKAGE.to_string()]
        );
        assert_eq!(cfg.filters.shell_packages, ["com.android.systemui"]);
        assert_eq!(cfg.rules[0].overlays[0].overlay.font_size, 20.0);
    }

    #[test]
    fn bad_allow_selector_names_the_rule() {
        let ron = r#"(rules: [(name: "broken", package_name: "p", allow: [".label(\"x\")"])])"#;
        let err = load_from_str(ron, Format::Ron).unwrap_err();
        match &err {
            Error::Validation { rule, message, .. } => {
                assert_eq!(rule.as_deref(), Some("broken"));
                assert!(message.contains("label"), "{message}");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn bad_overlay_selector_fails_to_parse() {
        let ron = r#"(rules: [(name: "r", package_name: "p", overlays: [(selector: "nope")])])"#;
        assert!(matches!(
            load_from_str(ron, Format::Ron),
            Err(Error::Parse { .. })
        ));
    }

    #[test]
    fn unknown_field_fails_with_location() {
        let ron = "(\n  detection: (pol_interval_ms: 5),\n)";
        match load_from_str(ron, Format::Ron).unwrap_err() {
            Error::Parse { line, excerpt, .. } => {
                assert_eq!(line, 2);
                assert!(excerpt.contains('^'));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn zero_snapshot_capacity_is_rejected() {
        let ron = "(detection: (snapshot_capacity: 0))";
        assert!(matches!(
            load_from_str(ron, Format::Ron),
            Err(Error::Validation { .. })
        ));
    }

    #[test]
    fn load_from_path_checks_extension_and_attaches_path() {
        let dir = std::env::temp_dir().join(format!("axlay-config-{}", std::process::id()));
        fs::create_dir_all(&dir).unwrap();

        let txt = dir.join("config.txt");
        fs::write(&txt, "()").unwrap();
        assert!(matches!(load_from_path(&txt), Err(Error::Read { .. })));

        let bad = dir.join("bad.ron");
        fs::write(&bad, "(rules: [(name: \"\", package_name: \"p\")])").unwrap();
        let err = load_from_path(&bad).unwrap_err();
        assert_eq!(err.path(), Some(bad.as_path()));

        let good = dir.join("good.json");
        fs::write(&good, "{}").unwrap();
        assert_eq!(load_from_path(&good).unwrap(), Config::default());

        fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn explicit_config_path_wins() {
        let p = std::path::Path::new("/tmp/explicit.ron");
        assert_eq!(resolve_config_path(Some(p)).unwrap(), p);
    }
}
