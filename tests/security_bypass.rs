//! Security tests - bypass attempts and edge cases

use warden_rs::{Adapter, Enforcer, MemoryAdapter, Model, PolicyValues, WardenError};

const PATH_MODEL: &str = "
[request_definition]
r = sub, obj, act

[policy_definition]
p = sub, obj, act

[policy_effect]
e = some(where (p.eft == allow))

[matchers]
m = r.sub == p.sub && keyMatch2(r.obj, p.obj) && r.act == p.act
";

#[test]
fn test_path_traversal_attempts() {
    let e = Enforcer::from_text(PATH_MODEL, "p, alice, /public/*, read").unwrap();

    assert!(e.enforce(["alice", "/public/file.txt", "read"]).unwrap());

    // Matching is textual; traversal segments don't escape into other trees
    assert!(!e.enforce(["alice", "/private/secret.txt", "read"]).unwrap());
    assert!(!e.enforce(["alice", "/publicity/file.txt", "read"]).unwrap());
    assert!(!e.enforce(["alice", "/PUBLIC/file.txt", "read"]).unwrap());
    assert!(!e.enforce(["alice", "public/file.txt", "read"]).unwrap());
    assert!(!e.enforce(["alice", "//public/file.txt", "read"]).unwrap());
}

#[test]
fn test_named_segment_does_not_span_slashes() {
    let e = Enforcer::from_text(PATH_MODEL, "p, alice, /users/:id/profile, read").unwrap();

    assert!(e.enforce(["alice", "/users/42/profile", "read"]).unwrap());
    assert!(!e.enforce(["alice", "/users/42/../admin/profile", "read"]).unwrap());
    assert!(!e.enforce(["alice", "/users//profile", "read"]).unwrap());
}

#[test]
fn test_dots_are_literal_for_key_match() {
    let e = Enforcer::from_text(PATH_MODEL, "p, alice, /files/report.pdf, read").unwrap();
    let matcher = "r.sub == p.sub && keyMatch(r.obj, p.obj) && r.act == p.act";

    assert!(e
        .enforce_with_matcher(matcher, ["alice", "/files/report.pdf", "read"])
        .unwrap());
    assert!(!e
        .enforce_with_matcher(matcher, ["alice", "/files/reportXpdf", "read"])
        .unwrap());
}

#[test]
fn test_empty_and_whitespace_subjects() {
    let e = Enforcer::from_text(PATH_MODEL, "p, alice, /data, read").unwrap();

    assert!(!e.enforce(["", "/data", "read"]).unwrap());
    assert!(!e.enforce([" alice", "/data", "read"]).unwrap());
    assert!(!e.enforce(["alice ", "/data", "read"]).unwrap());
    assert!(!e.enforce(["ALICE", "/data", "read"]).unwrap());
}

#[test]
fn test_short_requests_are_rejected() {
    let e = Enforcer::from_text(PATH_MODEL, "p, alice, /data, read").unwrap();

    let err = e.enforce(["alice", "/data"]).unwrap_err();
    assert!(matches!(
        err,
        WardenError::RequestArity {
            expected: 3,
            actual: 2
        }
    ));
}

#[test]
fn test_csv_injection_in_rule_values() {
    let mut adapter = MemoryAdapter::new();
    let model = Model::from_text(PATH_MODEL).unwrap();
    let mut e = Enforcer::with_adapter(model, MemoryAdapter::new()).unwrap();

    // A comma inside a value must not create an extra column on reload
    assert!(e.add_policy(["mallory", "/data, alice", "read"]).unwrap());
    assert!(e.add_policy(["quote\"r", "/data", "read"]).unwrap());

    adapter.save_policy(e.model()).unwrap();
    let text = adapter.to_csv_string();
    let reloaded = Enforcer::from_text(PATH_MODEL, &text).unwrap();

    assert_eq!(reloaded.get_policy().len(), 2);
    assert!(reloaded.has_policy(["mallory", "/data, alice", "read"]));
    assert!(reloaded.has_policy(["quote\"r", "/data", "read"]));
    assert!(!reloaded.enforce(["alice", "/data", "read"]).unwrap());
}

#[test]
fn test_malformed_policy_text_rejected() {
    assert!(matches!(
        MemoryAdapter::from_csv_str("p, \"unterminated, data, read"),
        Err(WardenError::Adapter(_))
    ));
    assert!(matches!(
        MemoryAdapter::from_csv_str("p"),
        Err(WardenError::Adapter(_))
    ));
}

#[test]
fn test_unknown_policy_type_rejected_on_load() {
    let err = Enforcer::from_text(PATH_MODEL, "p9, alice, /data, read").unwrap_err();
    assert!(matches!(err, WardenError::AssertionNotFound { .. }));
}

#[test]
fn test_short_policy_rows_are_errors_not_denials() {
    let mut e = Enforcer::from_text(PATH_MODEL, "").unwrap();
    e.add_policy(PolicyValues::from(["alice", "/data"])).unwrap();

    let err = e.enforce(["alice", "/data", "read"]).unwrap_err();
    assert!(matches!(err, WardenError::PolicyArity { .. }));
}

#[test]
fn test_filter_with_only_empty_values_removes_nothing() {
    let mut e = Enforcer::from_text(PATH_MODEL, "p, alice, /data, read\np, bob, /data, write").unwrap();

    assert!(!e.remove_filtered_policy(0, &["", ""]).unwrap());
    assert!(!e.remove_filtered_policy(0, &[]).unwrap());
    assert_eq!(e.get_policy().len(), 2);
}

#[test]
fn test_invalid_regex_surfaces_as_error() {
    let model = "
[request_definition]
r = sub, obj, act

[policy_definition]
p = sub, obj, act

[policy_effect]
e = some(where (p.eft == allow))

[matchers]
m = r.sub == p.sub && regexMatch(r.obj, p.obj)
";
    let e = Enforcer::from_text(model, "p, alice, (unclosed, read").unwrap();
    let err = e.enforce(["alice", "/data", "read"]).unwrap_err();
    assert!(matches!(err, WardenError::InvalidRegex(_)));
}
